pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod gateway;
pub mod handlers;
pub mod openapi;
pub mod services;
pub mod session;

use axum::{
    http::HeaderValue,
    middleware,
    routing::{get, post, put},
    Json, Router,
};
use sea_orm::DatabaseConnection;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};
use tracing::warn;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::auth::{AuthService, CredentialVerifier};
use crate::config::AppConfig;
use crate::events::EventSender;
use crate::gateway::PaymentGateway;
use crate::handlers::AppServices;
use crate::services::cart::CartService;
use crate::services::catalog::CatalogService;
use crate::services::checkout::CheckoutService;
use crate::services::orders::OrderService;
use crate::session::SessionStore;

/// Shared application state threaded through every handler.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: Arc<AppConfig>,
    pub sessions: Arc<dyn SessionStore>,
    pub events: EventSender,
    pub services: Arc<AppServices>,
}

impl AppState {
    /// Wires the service graph from its leaf dependencies.
    pub fn build(
        db: Arc<DatabaseConnection>,
        config: Arc<AppConfig>,
        sessions: Arc<dyn SessionStore>,
        gateway: Arc<dyn PaymentGateway>,
        verifier: Arc<dyn CredentialVerifier>,
        events: EventSender,
    ) -> Self {
        let catalog = Arc::new(CatalogService::new(db.clone()));
        let orders = Arc::new(OrderService::new(db.clone()));
        let carts = Arc::new(CartService::new(catalog.clone()));
        let checkout = Arc::new(CheckoutService::new(
            db.clone(),
            orders.clone(),
            catalog.clone(),
            gateway,
            events.clone(),
            config.clone(),
        ));
        let auth = Arc::new(AuthService::new(db.clone(), verifier));

        Self {
            db,
            config,
            sessions,
            events,
            services: Arc::new(AppServices {
                catalog,
                carts,
                orders,
                checkout,
                auth,
            }),
        }
    }
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

fn api_v1_routes() -> Router<AppState> {
    Router::new()
        .route("/products", get(handlers::products::list_products))
        .route("/products/search", get(handlers::products::search_products))
        .route("/products/:slug", get(handlers::products::get_product))
        .route(
            "/cart",
            get(handlers::carts::view_cart)
                .put(handlers::carts::update_cart)
                .delete(handlers::carts::clear_cart),
        )
        .route("/cart/items", post(handlers::carts::add_cart_item))
        .route("/checkout/session", post(handlers::checkout::start_checkout))
        .route("/checkout/success", get(handlers::checkout::checkout_success))
        .route("/orders", get(handlers::orders::my_orders))
        .route("/orders/:id", get(handlers::orders::order_detail))
        .route("/webhooks/payment", post(handlers::webhooks::payment_webhook))
        .route(
            "/admin/orders/:id/status",
            put(handlers::admin::set_order_status),
        )
        .route("/auth/login", post(handlers::auth::login))
        .route("/auth/logout", post(handlers::auth::logout))
}

fn cors_layer(config: &AppConfig) -> CorsLayer {
    if config.should_allow_permissive_cors() {
        return CorsLayer::permissive();
    }
    match &config.cors_allowed_origins {
        Some(origins) => {
            let parsed: Vec<HeaderValue> = origins
                .split(',')
                .filter_map(|origin| HeaderValue::from_str(origin.trim()).ok())
                .collect();
            CorsLayer::new().allow_origin(parsed)
        }
        None => {
            warn!("No CORS origins configured; cross-origin requests will be refused");
            CorsLayer::new()
        }
    }
}

/// Assembles the full application router with session handling and
/// observability layers.
pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/api/v1", api_v1_routes())
        .layer(middleware::from_fn_with_state(
            state.clone(),
            session::session_middleware,
        ))
        .merge(
            SwaggerUi::new("/docs").url("/api-docs/openapi.json", openapi::ApiDoc::openapi()),
        )
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(cors_layer(&state.config))
        .with_state(state)
}
