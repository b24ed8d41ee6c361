use axum::{extract::State, response::IntoResponse, Json};
use serde::Deserialize;
use tracing::info;
use utoipa::ToSchema;
use validator::Validate;

use crate::errors::ServiceError;
use crate::handlers::common::{no_content_response, success_response, validate_input};
use crate::session::Session;
use crate::AppState;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    /// Username or email address.
    #[validate(length(min = 1))]
    pub identifier: String,
    #[validate(length(min = 1))]
    pub password: String,
}

/// Log in with username or email. On success the account is bound to the
/// current session; the session cart is kept.
#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in"),
        (status = 401, description = "Invalid credentials")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    mut session: Session,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    validate_input(&payload)?;

    let account = state
        .services
        .auth
        .authenticate(&payload.identifier, &payload.password)
        .await?;

    session.data.user_id = Some(account.id);
    session.save().await?;
    info!(user_id = account.id, "User logged in");

    Ok(success_response(account))
}

/// Log out the session user. The cart stays with the browser session.
#[utoipa::path(
    post,
    path = "/api/v1/auth/logout",
    responses((status = 204, description = "Logged out"))
)]
pub async fn logout(mut session: Session) -> Result<impl IntoResponse, ServiceError> {
    session.data.user_id = None;
    session.save().await?;
    Ok(no_content_response())
}
