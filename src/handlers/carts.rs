use axum::{extract::State, response::IntoResponse, Json};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use utoipa::ToSchema;

use crate::auth::require_user;
use crate::errors::ServiceError;
use crate::handlers::common::{no_content_response, success_response};
use crate::services::cart::coerce_quantity;
use crate::session::Session;
use crate::AppState;

#[derive(Debug, Deserialize, ToSchema)]
pub struct AddCartItemRequest {
    pub product_id: i64,
    /// Free-form quantity; numbers and numeric strings are accepted and
    /// anything unusable falls back to one.
    #[schema(value_type = Object)]
    pub quantity: Option<Value>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateCartRequest {
    /// Full replacement map of product id to quantity. Absent means the
    /// client sent no quantity fields and the cart stays as it is.
    #[schema(value_type = Object)]
    pub quantities: Option<HashMap<String, Value>>,
}

/// Current cart contents priced against the live catalog.
#[utoipa::path(
    get,
    path = "/api/v1/cart",
    responses((status = 200, description = "Priced cart view"))
)]
pub async fn view_cart(
    State(state): State<AppState>,
    session: Session,
) -> Result<impl IntoResponse, ServiceError> {
    let view = state.services.carts.view(&session.data.cart).await?;
    Ok(success_response(view))
}

/// Put a product in the cart. Adding an id already present accumulates
/// onto its quantity. The product is not checked against the catalog
/// here; stale ids are dropped at display and checkout time instead.
#[utoipa::path(
    post,
    path = "/api/v1/cart/items",
    request_body = AddCartItemRequest,
    responses(
        (status = 200, description = "Updated cart view"),
        (status = 401, description = "Not logged in")
    )
)]
pub async fn add_cart_item(
    State(state): State<AppState>,
    mut session: Session,
    Json(payload): Json<AddCartItemRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    require_user(&session)?;

    let quantity = coerce_quantity(payload.quantity.as_ref());
    session.data.cart.add(payload.product_id, quantity);
    session.save().await?;

    let view = state.services.carts.view(&session.data.cart).await?;
    Ok(success_response(view))
}

/// Replace the cart wholesale from an update form. Quantities at or
/// below zero remove the line.
#[utoipa::path(
    put,
    path = "/api/v1/cart",
    request_body = UpdateCartRequest,
    responses(
        (status = 200, description = "Updated cart view"),
        (status = 401, description = "Not logged in")
    )
)]
pub async fn update_cart(
    State(state): State<AppState>,
    mut session: Session,
    Json(payload): Json<UpdateCartRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    require_user(&session)?;

    let quantities = payload.quantities.map(|raw| {
        raw.into_iter()
            .filter_map(|(key, value)| {
                let product_id: i64 = key.trim().parse().ok()?;
                let quantity = match &value {
                    Value::Number(n) => n.as_i64()?,
                    Value::String(s) => s.trim().parse().ok()?,
                    _ => return None,
                };
                Some((product_id, quantity))
            })
            .collect::<HashMap<_, _>>()
    });

    session.data.cart.set_all(quantities);
    session.save().await?;

    let view = state.services.carts.view(&session.data.cart).await?;
    Ok(success_response(view))
}

/// Empty the cart.
#[utoipa::path(
    delete,
    path = "/api/v1/cart",
    responses(
        (status = 204, description = "Cart emptied"),
        (status = 401, description = "Not logged in")
    )
)]
pub async fn clear_cart(mut session: Session) -> Result<impl IntoResponse, ServiceError> {
    require_user(&session)?;
    session.data.cart.clear();
    session.save().await?;
    Ok(no_content_response())
}
