//! Product API endpoints
//!
//! - GET /api/v1/products - Paged list (`search`, `min_price`, `max_price`, `is_active`)
//! - GET /api/v1/products/{id} - Get a product
//! - POST /api/v1/products - Create (admin)
//! - PUT /api/v1/products/{id} - Partial update (admin)
//! - DELETE /api/v1/products/{id} - Delete (admin)
//!
//! Prices are integer cents, including the `min_price`/`max_price` filters.

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;

use crate::api::common::{default_page, default_per_page, AppJson, AppPath, AppQuery};
use crate::api::middleware::{ApiError, AppState};
use crate::models::{
    CreateProductInput, ListParams, PagedResult, Product, ProductFilter, UpdateProductInput,
};

#[derive(Debug, Deserialize)]
pub struct ListProductsQuery {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_per_page")]
    pub per_page: u32,
    pub search: Option<String>,
    pub min_price: Option<i64>,
    pub max_price: Option<i64>,
    pub is_active: Option<bool>,
}

pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_products))
        .route("/{id}", get(get_product))
}

pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_product))
        .route("/{id}", put(update_product).delete(delete_product))
}

/// GET /api/v1/products
async fn list_products(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<ListProductsQuery>,
) -> Result<Json<PagedResult<Product>>, ApiError> {
    let filter = ProductFilter {
        search: query.search,
        min_price_cents: query.min_price,
        max_price_cents: query.max_price,
        is_active: query.is_active,
    };
    let params = ListParams::new(query.page, query.per_page);
    Ok(Json(state.product_service.list(&filter, &params).await?))
}

/// GET /api/v1/products/{id}
async fn get_product(
    State(state): State<AppState>,
    AppPath(id): AppPath<i64>,
) -> Result<Json<Product>, ApiError> {
    Ok(Json(state.product_service.get(id).await?))
}

/// POST /api/v1/products
async fn create_product(
    State(state): State<AppState>,
    AppJson(body): AppJson<CreateProductInput>,
) -> Result<impl IntoResponse, ApiError> {
    let product = state.product_service.create(body).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

/// PUT /api/v1/products/{id}
async fn update_product(
    State(state): State<AppState>,
    AppPath(id): AppPath<i64>,
    AppJson(body): AppJson<UpdateProductInput>,
) -> Result<Json<Product>, ApiError> {
    Ok(Json(state.product_service.update(id, body).await?))
}

/// DELETE /api/v1/products/{id}
async fn delete_product(
    State(state): State<AppState>,
    AppPath(id): AppPath<i64>,
) -> Result<StatusCode, ApiError> {
    state.product_service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
