use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use utoipa::ToSchema;
use validator::Validate;

use crate::auth::require_admin;
use crate::errors::ServiceError;
use crate::events::Event;
use crate::handlers::common::{success_response, validate_input};
use crate::session::Session;
use crate::AppState;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct SetOrderStatusRequest {
    #[validate(length(min = 1, max = 64))]
    pub status: String,
}

/// Back-office status override. Any non-empty status string is accepted;
/// unrecognized values are applied with a warning in the log.
#[utoipa::path(
    put,
    path = "/api/v1/admin/orders/{id}/status",
    params(("id" = i64, Path, description = "Order id")),
    request_body = SetOrderStatusRequest,
    responses(
        (status = 200, description = "Order with updated status"),
        (status = 403, description = "Administrator access required"),
        (status = 404, description = "Unknown order")
    )
)]
pub async fn set_order_status(
    State(state): State<AppState>,
    session: Session,
    Path(order_id): Path<i64>,
    Json(payload): Json<SetOrderStatusRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    require_admin(&state.services.auth, &session).await?;
    validate_input(&payload)?;

    let before = state.services.orders.get(order_id).await?;
    let updated = state
        .services
        .orders
        .set_status(order_id, &payload.status)
        .await?;

    state
        .events
        .send_or_log(Event::OrderStatusChanged {
            order_id,
            old_status: before.status,
            new_status: updated.status.clone(),
        })
        .await;

    Ok(success_response(updated))
}
