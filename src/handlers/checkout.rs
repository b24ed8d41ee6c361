use axum::{
    extract::{Query, State},
    response::IntoResponse,
};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::auth::require_user;
use crate::errors::ServiceError;
use crate::handlers::common::{created_response, success_response};
use crate::session::Session;
use crate::AppState;

#[derive(Debug, Deserialize, IntoParams)]
pub struct SuccessRedirectQuery {
    /// Gateway session id substituted into the success URL.
    pub session_id: String,
    pub order_id: i64,
}

/// Begin checkout: snapshot the session cart into a pending order and
/// create the hosted payment session. The cart is left intact until a
/// confirmation proves payment.
#[utoipa::path(
    post,
    path = "/api/v1/checkout/session",
    responses(
        (status = 201, description = "Order created; redirect the customer"),
        (status = 400, description = "Cart is empty"),
        (status = 401, description = "Not logged in"),
        (status = 502, description = "Payment gateway unavailable")
    )
)]
pub async fn start_checkout(
    State(state): State<AppState>,
    session: Session,
) -> Result<impl IntoResponse, ServiceError> {
    let user_id = require_user(&session)?;
    let redirect = state
        .services
        .checkout
        .initiate_checkout(Some(user_id), &session.data.cart)
        .await?;
    Ok(created_response(redirect))
}

/// Landing endpoint for the customer's return from the hosted payment
/// page. Payment state is re-verified server-side; the cart is cleared
/// only once the order is actually paid.
#[utoipa::path(
    get,
    path = "/api/v1/checkout/success",
    params(SuccessRedirectQuery),
    responses(
        (status = 200, description = "Order with verified payment state"),
        (status = 401, description = "Not logged in"),
        (status = 404, description = "Unknown order")
    )
)]
pub async fn checkout_success(
    State(state): State<AppState>,
    mut session: Session,
    Query(query): Query<SuccessRedirectQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    require_user(&session)?;
    let confirmation = state
        .services
        .checkout
        .confirm_success_redirect(&query.session_id, query.order_id)
        .await?;

    if confirmation.paid && !session.data.cart.is_empty() {
        session.data.cart.clear();
        session.save().await?;
    }

    Ok(success_response(confirmation))
}
