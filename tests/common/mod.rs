#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use chrono::Utc;
use http_body_util::BodyExt;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ConnectOptions, Database, DatabaseConnection, Set};
use sea_orm_migration::MigratorTrait;
use serde_json::Value;
use tower::ServiceExt;

use storefront_api::auth::{Argon2Verifier, CredentialVerifier};
use storefront_api::config::AppConfig;
use storefront_api::entities::{product, user};
use storefront_api::errors::ServiceError;
use storefront_api::events::event_channel;
use storefront_api::gateway::{
    sign_payload, CreateSessionRequest, GatewaySession, PaymentGateway, SessionStatus,
    SIGNATURE_HEADER,
};
use storefront_api::session::InMemorySessionStore;
use storefront_api::{app_router, AppState};

pub const WEBHOOK_SECRET: &str = "whsec_test_secret";

/// Scriptable stand-in for the hosted payment processor. Records every
/// create request and serves configured payment states, rejecting empty
/// line-item lists the way the real processor does.
#[derive(Default)]
pub struct MockGateway {
    counter: AtomicU64,
    pub fail_create: AtomicBool,
    pub created: Mutex<Vec<CreateSessionRequest>>,
    statuses: Mutex<HashMap<String, SessionStatus>>,
}

impl MockGateway {
    pub fn set_paid(&self, session_id: &str, payment_intent: &str) {
        self.statuses.lock().unwrap().insert(
            session_id.to_string(),
            SessionStatus {
                id: session_id.to_string(),
                payment_status: "paid".to_string(),
                payment_intent: Some(payment_intent.to_string()),
            },
        );
    }

    pub fn fail_next_create(&self) {
        self.fail_create.store(true, Ordering::SeqCst);
    }

    pub fn last_request(&self) -> Option<CreateSessionRequest> {
        self.created.lock().unwrap().last().cloned()
    }

    pub fn create_calls(&self) -> usize {
        self.created.lock().unwrap().len()
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    async fn create_session(
        &self,
        request: &CreateSessionRequest,
    ) -> Result<GatewaySession, ServiceError> {
        if self.fail_create.swap(false, Ordering::SeqCst) {
            return Err(ServiceError::Gateway("connection refused".to_string()));
        }
        if request.line_items.is_empty() {
            return Err(ServiceError::Gateway(
                "at least one line item is required".to_string(),
            ));
        }
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        let id = format!("cs_test_{}", n);
        self.created.lock().unwrap().push(request.clone());
        Ok(GatewaySession {
            url: format!("https://pay.test/session/{}", id),
            id,
        })
    }

    async fn retrieve_session(&self, session_id: &str) -> Result<SessionStatus, ServiceError> {
        Ok(self
            .statuses
            .lock()
            .unwrap()
            .get(session_id)
            .cloned()
            .unwrap_or_else(|| SessionStatus {
                id: session_id.to_string(),
                payment_status: "unpaid".to_string(),
                payment_intent: None,
            }))
    }
}

pub struct TestApp {
    pub db: Arc<DatabaseConnection>,
    pub router: Router,
    pub gateway: Arc<MockGateway>,
    pub config: Arc<AppConfig>,
}

pub async fn spawn_app() -> TestApp {
    let mut options = ConnectOptions::new("sqlite::memory:".to_string());
    options
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(Duration::from_secs(3600))
        .max_lifetime(Duration::from_secs(3600))
        .sqlx_logging(false);
    let db = Arc::new(Database::connect(options).await.expect("connect sqlite"));
    migrations::Migrator::up(db.as_ref(), None)
        .await
        .expect("apply migrations");

    let mut config = AppConfig::new(
        "sqlite::memory:".to_string(),
        "127.0.0.1".to_string(),
        0,
        "test".to_string(),
        "http://localhost:8080".to_string(),
        "sk_test_123".to_string(),
        WEBHOOK_SECRET.to_string(),
    );
    config.log_level = "warn".to_string();
    let config = Arc::new(config);

    let gateway = Arc::new(MockGateway::default());
    let (events, _event_rx) = event_channel(1024);

    let state = AppState::build(
        db.clone(),
        config.clone(),
        Arc::new(InMemorySessionStore::new()),
        gateway.clone(),
        Arc::new(Argon2Verifier),
        events,
    );

    TestApp {
        db,
        router: app_router(state),
        gateway,
        config,
    }
}

pub struct TestResponse {
    pub status: StatusCode,
    pub cookie: Option<String>,
    pub body: Value,
}

fn extract_sid(response: &axum::response::Response) -> Option<String> {
    response
        .headers()
        .get(header::SET_COOKIE)?
        .to_str()
        .ok()?
        .split(';')
        .next()?
        .split_once('=')
        .map(|(_, v)| v.to_string())
}

impl TestApp {
    pub async fn request(
        &self,
        method: &str,
        uri: &str,
        cookie: Option<&str>,
        body: Option<Value>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(sid) = cookie {
            builder = builder.header(header::COOKIE, format!("sid={}", sid));
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::to_vec(&json).unwrap()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let cookie = extract_sid(&response);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };

        TestResponse {
            status,
            cookie,
            body,
        }
    }

    /// Posts a raw webhook body with an optional signature header.
    pub async fn post_webhook(&self, payload: &[u8], signature: Option<&str>) -> TestResponse {
        let mut builder = Request::builder()
            .method("POST")
            .uri("/api/v1/webhooks/payment")
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(sig) = signature {
            builder = builder.header(SIGNATURE_HEADER, sig);
        }
        let request = builder.body(Body::from(payload.to_vec())).unwrap();

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);

        TestResponse {
            status,
            cookie: None,
            body,
        }
    }

    /// Logs in and returns the session cookie value.
    pub async fn login(&self, identifier: &str, password: &str) -> String {
        let response = self
            .request(
                "POST",
                "/api/v1/auth/login",
                None,
                Some(serde_json::json!({ "identifier": identifier, "password": password })),
            )
            .await;
        assert_eq!(response.status, StatusCode::OK, "login failed");
        response.cookie.expect("login sets the session cookie")
    }
}

/// Parses a JSON decimal field, accepting string or number encodings.
pub fn decimal_field(value: &Value) -> Decimal {
    match value {
        Value::String(s) => s.parse().expect("decimal string"),
        Value::Number(n) => n.to_string().parse().expect("decimal number"),
        other => panic!("expected decimal, got {other:?}"),
    }
}

/// Signs a webhook payload the way the gateway would, timestamped now.
pub fn signed_header(payload: &[u8]) -> String {
    let ts = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs() as i64;
    format!("t={},v1={}", ts, sign_payload(WEBHOOK_SECRET, ts, payload))
}

pub async fn seed_product(
    db: &DatabaseConnection,
    name: &str,
    slug: &str,
    price: Decimal,
    stock: i32,
) -> product::Model {
    product::ActiveModel {
        seller_id: Set(None),
        name: Set(name.to_string()),
        slug: Set(slug.to_string()),
        description: Set(Some(format!("{} description", name))),
        price: Set(price),
        stock: Set(stock),
        image_filename: Set(None),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("seed product")
}

pub async fn seed_user(
    db: &DatabaseConnection,
    username: &str,
    password: &str,
    is_admin: bool,
) -> user::Model {
    let hash = Argon2Verifier.hash(password).expect("hash password");
    user::ActiveModel {
        username: Set(username.to_string()),
        email: Set(format!("{}@example.com", username)),
        password_hash: Set(hash),
        is_admin: Set(is_admin),
        is_seller: Set(false),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("seed user")
}
