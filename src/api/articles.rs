//! Article API endpoints
//!
//! Handles HTTP requests for article management:
//! - GET /api/v1/articles - Paged list (published only unless an admin asks for a status)
//! - GET /api/v1/articles/{id} - Get an article (drafts visible to author/admin)
//! - GET /api/v1/articles/slug/{slug} - Get a published article and count the view
//! - POST /api/v1/articles - Create a draft
//! - PUT /api/v1/articles/{id} - Partial update (author/admin)
//! - DELETE /api/v1/articles/{id} - Soft delete (author/admin)
//! - POST /api/v1/articles/{id}/publish - draft → published
//! - POST /api/v1/articles/{id}/archive - published → archived

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;

use crate::api::common::{default_page, default_per_page, AppJson, AppPath, AppQuery};
use crate::api::middleware::{ApiError, AppState, AuthUser, MaybeAuthUser};
use crate::models::{
    Article, ArticleFilter, ArticleStatus, CreateArticleInput, ListParams, PagedResult,
    UpdateArticleInput,
};

/// Query parameters for listing articles
#[derive(Debug, Deserialize)]
pub struct ListArticlesQuery {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_per_page")]
    pub per_page: u32,
    pub category_id: Option<i64>,
    pub author_id: Option<i64>,
    pub search: Option<String>,
    /// Admins only
    pub status: Option<ArticleStatus>,
}

/// Routes that read articles; mounted behind `optional_auth`
pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_articles))
        .route("/{id}", get(get_article))
        .route("/slug/{slug}", get(get_article_by_slug))
}

/// Routes that modify articles; mounted behind `require_auth`
pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_article))
        .route("/{id}", put(update_article).delete(delete_article))
        .route("/{id}/publish", post(publish_article))
        .route("/{id}/archive", post(archive_article))
}

/// GET /api/v1/articles
async fn list_articles(
    State(state): State<AppState>,
    MaybeAuthUser(viewer): MaybeAuthUser,
    AppQuery(query): AppQuery<ListArticlesQuery>,
) -> Result<Json<PagedResult<Article>>, ApiError> {
    let is_admin = viewer.as_ref().is_some_and(AuthUser::is_admin);
    let status = match query.status {
        None => Some(ArticleStatus::Published),
        Some(ArticleStatus::Published) => Some(ArticleStatus::Published),
        Some(status) if is_admin => Some(status),
        Some(_) => return Err(ApiError::forbidden("Only admins may list unpublished articles")),
    };

    let filter = ArticleFilter {
        status,
        category_id: query.category_id,
        author_id: query.author_id,
        search: query.search,
    };
    let params = ListParams::new(query.page, query.per_page);
    Ok(Json(state.article_service.list(&filter, &params).await?))
}

/// GET /api/v1/articles/{id}
async fn get_article(
    State(state): State<AppState>,
    MaybeAuthUser(viewer): MaybeAuthUser,
    AppPath(id): AppPath<i64>,
) -> Result<Json<Article>, ApiError> {
    let viewer = viewer.as_ref().map(|auth| &auth.user);
    Ok(Json(state.article_service.get_visible(id, viewer).await?))
}

/// GET /api/v1/articles/slug/{slug}
async fn get_article_by_slug(
    State(state): State<AppState>,
    AppPath(slug): AppPath<String>,
) -> Result<Json<Article>, ApiError> {
    Ok(Json(state.article_service.view(&slug).await?))
}

/// POST /api/v1/articles
async fn create_article(
    State(state): State<AppState>,
    auth: AuthUser,
    AppJson(body): AppJson<CreateArticleInput>,
) -> Result<impl IntoResponse, ApiError> {
    let article = state.article_service.create(&auth.user, body).await?;
    Ok((StatusCode::CREATED, Json(article)))
}

/// PUT /api/v1/articles/{id}
async fn update_article(
    State(state): State<AppState>,
    auth: AuthUser,
    AppPath(id): AppPath<i64>,
    AppJson(body): AppJson<UpdateArticleInput>,
) -> Result<Json<Article>, ApiError> {
    Ok(Json(state.article_service.update(&auth.user, id, body).await?))
}

/// DELETE /api/v1/articles/{id}
async fn delete_article(
    State(state): State<AppState>,
    auth: AuthUser,
    AppPath(id): AppPath<i64>,
) -> Result<StatusCode, ApiError> {
    state.article_service.delete(&auth.user, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/articles/{id}/publish
async fn publish_article(
    State(state): State<AppState>,
    auth: AuthUser,
    AppPath(id): AppPath<i64>,
) -> Result<Json<Article>, ApiError> {
    Ok(Json(state.article_service.publish(&auth.user, id).await?))
}

/// POST /api/v1/articles/{id}/archive
async fn archive_article(
    State(state): State<AppState>,
    auth: AuthUser,
    AppPath(id): AppPath<i64>,
) -> Result<Json<Article>, ApiError> {
    Ok(Json(state.article_service.archive(&auth.user, id).await?))
}
