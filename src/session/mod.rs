use async_trait::async_trait;
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderValue, StatusCode},
    middleware::Next,
    response::Response,
};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::services::cart::Cart;
use crate::AppState;

const REDIS_KEY_PREFIX: &str = "session:";

/// Per-visitor state carried across requests. The cart lives here so
/// anonymous visitors can browse and logged-in users keep their cart
/// between visits to the same browser.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct SessionData {
    pub user_id: Option<i64>,
    #[serde(default)]
    pub cart: Cart,
}

/// Storage backend for session state, keyed by the opaque cookie value.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load(&self, sid: &str) -> Result<Option<SessionData>, ServiceError>;
    async fn save(&self, sid: &str, data: &SessionData) -> Result<(), ServiceError>;
    async fn delete(&self, sid: &str) -> Result<(), ServiceError>;
}

/// Redis-backed sessions, stored as JSON with a rolling TTL.
pub struct RedisSessionStore {
    client: redis::Client,
    ttl_secs: u64,
}

impl RedisSessionStore {
    pub fn new(redis_url: &str, ttl_secs: u64) -> Result<Self, ServiceError> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| ServiceError::Internal(format!("Redis client error: {}", e)))?;
        Ok(Self { client, ttl_secs })
    }

    fn key(sid: &str) -> String {
        format!("{}{}", REDIS_KEY_PREFIX, sid)
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn load(&self, sid: &str) -> Result<Option<SessionData>, ServiceError> {
        let mut conn = self
            .client
            .get_async_connection()
            .await
            .map_err(|e| ServiceError::Internal(format!("Redis connection error: {}", e)))?;
        let raw: Option<String> = redis::cmd("GET")
            .arg(Self::key(sid))
            .query_async(&mut conn)
            .await
            .map_err(|e| ServiceError::Internal(format!("Redis read error: {}", e)))?;
        match raw {
            Some(json) => match serde_json::from_str(&json) {
                Ok(data) => Ok(Some(data)),
                Err(e) => {
                    // Corrupt session payloads are dropped, not fatal.
                    warn!(sid, "Discarding undecodable session payload: {}", e);
                    Ok(None)
                }
            },
            None => Ok(None),
        }
    }

    async fn save(&self, sid: &str, data: &SessionData) -> Result<(), ServiceError> {
        let mut conn = self
            .client
            .get_async_connection()
            .await
            .map_err(|e| ServiceError::Internal(format!("Redis connection error: {}", e)))?;
        let json = serde_json::to_string(data)
            .map_err(|e| ServiceError::Internal(format!("Session encode error: {}", e)))?;
        redis::cmd("SETEX")
            .arg(Self::key(sid))
            .arg(self.ttl_secs)
            .arg(json)
            .query_async::<_, ()>(&mut conn)
            .await
            .map_err(|e| ServiceError::Internal(format!("Redis write error: {}", e)))?;
        Ok(())
    }

    async fn delete(&self, sid: &str) -> Result<(), ServiceError> {
        let mut conn = self
            .client
            .get_async_connection()
            .await
            .map_err(|e| ServiceError::Internal(format!("Redis connection error: {}", e)))?;
        redis::cmd("DEL")
            .arg(Self::key(sid))
            .query_async::<_, ()>(&mut conn)
            .await
            .map_err(|e| ServiceError::Internal(format!("Redis delete error: {}", e)))?;
        Ok(())
    }
}

/// Process-local sessions for development and tests.
#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: DashMap<String, SessionData>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn load(&self, sid: &str) -> Result<Option<SessionData>, ServiceError> {
        Ok(self.sessions.get(sid).map(|entry| entry.clone()))
    }

    async fn save(&self, sid: &str, data: &SessionData) -> Result<(), ServiceError> {
        self.sessions.insert(sid.to_string(), data.clone());
        Ok(())
    }

    async fn delete(&self, sid: &str) -> Result<(), ServiceError> {
        self.sessions.remove(sid);
        Ok(())
    }
}

/// Live session handle injected into request extensions by the session
/// middleware. Handlers mutate `data` and persist through `save`.
#[derive(Clone)]
pub struct Session {
    pub sid: String,
    pub data: SessionData,
    store: Arc<dyn SessionStore>,
}

impl Session {
    pub fn user_id(&self) -> Option<i64> {
        self.data.user_id
    }

    pub async fn save(&self) -> Result<(), ServiceError> {
        self.store.save(&self.sid, &self.data).await
    }

    pub async fn destroy(&self) -> Result<(), ServiceError> {
        self.store.delete(&self.sid).await
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Session
where
    S: Send + Sync,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Session>()
            .cloned()
            .ok_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

fn cookie_value(headers: &axum::http::HeaderMap, name: &str) -> Option<String> {
    let raw = headers.get(header::COOKIE)?.to_str().ok()?;
    raw.split(';').find_map(|pair| {
        let (k, v) = pair.trim().split_once('=')?;
        (k == name).then(|| v.to_string())
    })
}

/// Loads (or creates) the session for each request and sets the cookie on
/// the way out when a new session was minted.
pub async fn session_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let cookie_name = state.config.session_cookie.clone();
    let existing_sid = cookie_value(request.headers(), &cookie_name);

    let (sid, data, is_new) = match existing_sid {
        Some(sid) => match state.sessions.load(&sid).await {
            Ok(Some(data)) => (sid, data, false),
            Ok(None) => {
                debug!(%sid, "Session cookie references no stored session");
                (sid, SessionData::default(), true)
            }
            Err(e) => {
                warn!("Session load failed, starting fresh: {}", e);
                (sid, SessionData::default(), true)
            }
        },
        None => (Uuid::new_v4().to_string(), SessionData::default(), true),
    };

    request.extensions_mut().insert(Session {
        sid: sid.clone(),
        data,
        store: state.sessions.clone(),
    });

    let mut response = next.run(request).await;

    if is_new {
        let cookie = format!(
            "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
            cookie_name, sid, state.config.session_ttl_secs
        );
        if let Ok(value) = HeaderValue::from_str(&cookie) {
            response.headers_mut().append(header::SET_COOKIE, value);
        }
    }

    response
}
