use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::errors::ServiceError;
use crate::handlers::common::success_response;
use crate::AppState;

#[derive(Debug, Deserialize, IntoParams)]
pub struct ListProductsQuery {
    /// Optional search term matched against name and description.
    pub q: Option<String>,
}

/// List storefront products, newest first, optionally filtered by a
/// search term.
#[utoipa::path(
    get,
    path = "/api/v1/products",
    params(ListProductsQuery),
    responses((status = 200, description = "Products for the storefront page"))
)]
pub async fn list_products(
    State(state): State<AppState>,
    Query(query): Query<ListProductsQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    let products = match query.q.as_deref().map(str::trim) {
        Some(term) if !term.is_empty() => state.services.catalog.search(term).await?,
        _ => state.services.catalog.list_recent().await?,
    };
    Ok(success_response(products))
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct SearchProductsQuery {
    /// Search term matched against name and description.
    pub q: String,
}

/// Dedicated search endpoint. A blank term behaves like the unfiltered
/// listing.
#[utoipa::path(
    get,
    path = "/api/v1/products/search",
    params(SearchProductsQuery),
    responses((status = 200, description = "Products matching the search term"))
)]
pub async fn search_products(
    State(state): State<AppState>,
    Query(query): Query<SearchProductsQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    let term = query.q.trim();
    let products = if term.is_empty() {
        state.services.catalog.list_recent().await?
    } else {
        state.services.catalog.search(term).await?
    };
    Ok(success_response(products))
}

/// Fetch a single product by its URL slug.
#[utoipa::path(
    get,
    path = "/api/v1/products/{slug}",
    params(("slug" = String, Path, description = "Product slug")),
    responses(
        (status = 200, description = "Product detail"),
        (status = 404, description = "No product with this slug")
    )
)]
pub async fn get_product(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse, ServiceError> {
    let product = state.services.catalog.get_by_slug(&slug).await?;
    Ok(success_response(product))
}
