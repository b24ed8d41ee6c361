use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    response::IntoResponse,
    Json,
};
use serde_json::json;
use tracing::info;

use crate::errors::ServiceError;
use crate::gateway::{self, SIGNATURE_HEADER};
use crate::AppState;

/// Inbound payment notification. The signature is verified against the
/// raw body before anything is parsed; a bad signature is the only path
/// to a non-200 response. Verified events are always acknowledged, even
/// when they cannot be applied, so the gateway does not retry events we
/// have already disposed of.
#[utoipa::path(
    post,
    path = "/api/v1/webhooks/payment",
    request_body(content = String, content_type = "application/json"),
    responses(
        (status = 200, description = "Event acknowledged"),
        (status = 400, description = "Missing or invalid signature")
    )
)]
pub async fn payment_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ServiceError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| ServiceError::InvalidSignature("missing signature header".to_string()))?;

    let event = gateway::verify_webhook(
        &body,
        signature,
        &state.config.gateway_webhook_secret,
        state.config.gateway_webhook_tolerance_secs,
    )?;

    let outcome = state.services.checkout.apply_webhook_event(&event).await;
    info!(
        event_type = %event.event_type,
        session_id = event.session_id.as_deref().unwrap_or("-"),
        ?outcome,
        "Webhook processed"
    );

    Ok(Json(json!({ "received": true })))
}
