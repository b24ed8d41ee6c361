use std::sync::Arc;

use crate::auth::AuthService;
use crate::services::cart::CartService;
use crate::services::catalog::CatalogService;
use crate::services::checkout::CheckoutService;
use crate::services::orders::OrderService;

pub mod admin;
pub mod auth;
pub mod carts;
pub mod checkout;
pub mod common;
pub mod orders;
pub mod products;
pub mod webhooks;

/// Service container handed to every handler through application state.
pub struct AppServices {
    pub catalog: Arc<CatalogService>,
    pub carts: Arc<CartService>,
    pub orders: Arc<OrderService>,
    pub checkout: Arc<CheckoutService>,
    pub auth: Arc<AuthService>,
}
