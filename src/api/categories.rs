//! Category API endpoints
//!
//! - GET /api/v1/categories - All categories ordered by name
//! - GET /api/v1/categories/{id} - Get a category
//! - GET /api/v1/categories/slug/{slug} - Get a category by slug
//! - POST /api/v1/categories - Create (admin)
//! - PUT /api/v1/categories/{id} - Partial update (admin)
//! - DELETE /api/v1/categories/{id} - Delete; articles become uncategorized (admin)

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};

use crate::api::common::{AppJson, AppPath};
use crate::api::middleware::{ApiError, AppState};
use crate::models::{Category, CreateCategoryInput, UpdateCategoryInput};

pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_categories))
        .route("/{id}", get(get_category))
        .route("/slug/{slug}", get(get_category_by_slug))
}

pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_category))
        .route("/{id}", put(update_category).delete(delete_category))
}

/// GET /api/v1/categories
async fn list_categories(State(state): State<AppState>) -> Result<Json<Vec<Category>>, ApiError> {
    Ok(Json(state.category_service.list().await?))
}

/// GET /api/v1/categories/{id}
async fn get_category(
    State(state): State<AppState>,
    AppPath(id): AppPath<i64>,
) -> Result<Json<Category>, ApiError> {
    Ok(Json(state.category_service.get(id).await?))
}

/// GET /api/v1/categories/slug/{slug}
async fn get_category_by_slug(
    State(state): State<AppState>,
    AppPath(slug): AppPath<String>,
) -> Result<Json<Category>, ApiError> {
    Ok(Json(state.category_service.get_by_slug(&slug).await?))
}

/// POST /api/v1/categories
async fn create_category(
    State(state): State<AppState>,
    AppJson(body): AppJson<CreateCategoryInput>,
) -> Result<impl IntoResponse, ApiError> {
    let category = state.category_service.create(body).await?;
    Ok((StatusCode::CREATED, Json(category)))
}

/// PUT /api/v1/categories/{id}
async fn update_category(
    State(state): State<AppState>,
    AppPath(id): AppPath<i64>,
    AppJson(body): AppJson<UpdateCategoryInput>,
) -> Result<Json<Category>, ApiError> {
    Ok(Json(state.category_service.update(id, body).await?))
}

/// DELETE /api/v1/categories/{id}
async fn delete_category(
    State(state): State<AppState>,
    AppPath(id): AppPath<i64>,
) -> Result<StatusCode, ApiError> {
    state.category_service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
