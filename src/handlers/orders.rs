use axum::{
    extract::{Path, State},
    response::IntoResponse,
};
use serde::Serialize;

use crate::auth::require_user;
use crate::entities::{order, order_item};
use crate::errors::ServiceError;
use crate::handlers::common::success_response;
use crate::session::Session;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct OrderDetail {
    #[serde(flatten)]
    pub order: order::Model,
    pub items: Vec<order_item::Model>,
}

/// The logged-in user's order history, newest first.
#[utoipa::path(
    get,
    path = "/api/v1/orders",
    responses(
        (status = 200, description = "Orders belonging to the session user"),
        (status = 401, description = "Not logged in")
    )
)]
pub async fn my_orders(
    State(state): State<AppState>,
    session: Session,
) -> Result<impl IntoResponse, ServiceError> {
    let user_id = require_user(&session)?;
    let orders = state.services.orders.list_for_user(user_id).await?;
    Ok(success_response(orders))
}

/// One order with its snapshotted line items. Visible to its owner and
/// to administrators.
#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}",
    params(("id" = i64, Path, description = "Order id")),
    responses(
        (status = 200, description = "Order detail"),
        (status = 403, description = "Order belongs to another user"),
        (status = 404, description = "Unknown order")
    )
)]
pub async fn order_detail(
    State(state): State<AppState>,
    session: Session,
    Path(order_id): Path<i64>,
) -> Result<impl IntoResponse, ServiceError> {
    let user_id = require_user(&session)?;
    let order = state.services.orders.get(order_id).await?;

    if order.user_id != Some(user_id) {
        let account = state.services.auth.get_user(user_id).await?;
        if !account.is_admin {
            return Err(ServiceError::Forbidden(
                "Order belongs to another user".to_string(),
            ));
        }
    }

    let items = state.services.orders.items_for(order_id).await?;
    Ok(success_response(OrderDetail { order, items }))
}
