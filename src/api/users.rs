//! User management API endpoints
//!
//! - GET /api/v1/users - Paged user list (admin)
//! - GET /api/v1/users/{id} - Get a user (self or admin)
//! - PUT /api/v1/users/{id} - Partial update (self or admin)
//! - DELETE /api/v1/users/{id} - Soft delete (admin)

use axum::{
    extract::State,
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use crate::api::common::{default_page, default_per_page, AppJson, AppPath, AppQuery};
use crate::api::middleware::{ApiError, AppState, AuthUser};
use crate::models::{ListParams, PagedResult, UpdateUserInput, User, UserFilter, UserRole};

#[derive(Debug, Deserialize)]
pub struct ListUsersQuery {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_per_page")]
    pub per_page: u32,
    pub search: Option<String>,
    pub role: Option<UserRole>,
    pub is_active: Option<bool>,
}

/// Routes open to any authenticated user
pub fn protected_router() -> Router<AppState> {
    Router::new().route("/{id}", get(get_user).put(update_user))
}

/// Routes restricted to admins
pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_users))
        .route("/{id}", axum::routing::delete(delete_user))
}

/// GET /api/v1/users
async fn list_users(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<ListUsersQuery>,
) -> Result<Json<PagedResult<User>>, ApiError> {
    let filter = UserFilter {
        search: query.search,
        role: query.role,
        is_active: query.is_active,
    };
    let params = ListParams::new(query.page, query.per_page);
    Ok(Json(state.user_service.list(&filter, &params).await?))
}

/// GET /api/v1/users/{id}
async fn get_user(
    State(state): State<AppState>,
    auth: AuthUser,
    AppPath(id): AppPath<i64>,
) -> Result<Json<User>, ApiError> {
    if !auth.user.can_manage(id) {
        return Err(ApiError::forbidden("You may only view your own account"));
    }
    Ok(Json(state.user_service.get(id).await?))
}

/// PUT /api/v1/users/{id}
async fn update_user(
    State(state): State<AppState>,
    auth: AuthUser,
    AppPath(id): AppPath<i64>,
    AppJson(body): AppJson<UpdateUserInput>,
) -> Result<Json<User>, ApiError> {
    Ok(Json(state.user_service.update(&auth.user, id, body).await?))
}

/// DELETE /api/v1/users/{id}
async fn delete_user(
    State(state): State<AppState>,
    auth: AuthUser,
    AppPath(id): AppPath<i64>,
) -> Result<StatusCode, ApiError> {
    state.user_service.delete(&auth.user, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
