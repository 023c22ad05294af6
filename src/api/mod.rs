//! API layer - HTTP handlers and routing
//!
//! All endpoints live under `/api/v1`:
//! - Health check
//! - Auth endpoints (register, login, refresh, logout, me, password)
//! - User management
//! - Category, article and product CRUD

pub mod articles;
pub mod auth;
pub mod categories;
pub mod common;
pub mod health;
pub mod middleware;
pub mod products;
pub mod users;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::{
    http::{header, HeaderValue, Method},
    middleware as axum_middleware, Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::{Config, ServerConfig};
use crate::db::repositories::{
    SqlxArticleRepository, SqlxCategoryRepository, SqlxProductRepository,
    SqlxRefreshTokenRepository, SqlxUserRepository,
};
use crate::db::DynDatabasePool;
use crate::services::{
    email, ArticleService, CategoryService, DynMailer, ProductService, TokenService, UserService,
};

pub use middleware::{ApiError, AppState, AuthUser};

impl AppState {
    /// Wire repositories and services over `pool`, with the mailer
    /// selected by configuration
    pub fn from_config(pool: DynDatabasePool, config: &Config) -> Result<Self> {
        let mailer = email::from_config(&config.mail).context("Failed to set up mailer")?;
        Ok(Self::with_mailer(pool, config, mailer))
    }

    pub fn with_mailer(pool: DynDatabasePool, config: &Config, mailer: DynMailer) -> Self {
        let user_repo = SqlxUserRepository::boxed(pool.clone());
        let category_repo = SqlxCategoryRepository::boxed(pool.clone());

        let token_service = Arc::new(TokenService::new(
            &config.jwt,
            SqlxRefreshTokenRepository::boxed(pool.clone()),
            user_repo.clone(),
        ));
        let user_service = Arc::new(UserService::new(user_repo, token_service.clone(), mailer));
        let category_service = Arc::new(CategoryService::new(category_repo.clone()));
        let article_service = Arc::new(ArticleService::new(
            SqlxArticleRepository::boxed(pool.clone()),
            category_repo,
        ));
        let product_service = Arc::new(ProductService::new(SqlxProductRepository::boxed(pool.clone())));

        Self {
            pool,
            user_service,
            token_service,
            category_service,
            article_service,
            product_service,
        }
    }
}

/// Build the `/api/v1` router
pub fn build_api_router(state: AppState) -> Router<AppState> {
    // Admin routes (need admin role)
    let admin_routes = Router::new()
        .nest("/users", users::admin_router())
        .nest("/categories", categories::admin_router())
        .nest("/products", products::admin_router())
        .route_layer(axum_middleware::from_fn(middleware::require_admin))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    // Protected routes (need auth but not admin)
    let protected_routes = Router::new()
        .nest("/auth", auth::protected_router())
        .nest("/users", users::protected_router())
        .nest("/articles", articles::protected_router())
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    // Article reads see drafts when the caller is the author or an admin
    let article_reads = Router::new()
        .nest("/articles", articles::public_router())
        .route_layer(axum_middleware::from_fn_with_state(
            state,
            middleware::optional_auth,
        ));

    // Public routes
    Router::new()
        .nest("/health", health::router())
        .nest("/auth", auth::public_router())
        .nest("/categories", categories::public_router())
        .nest("/products", products::public_router())
        .merge(article_reads)
        .merge(admin_routes)
        .merge(protected_routes)
}

/// Build the complete router with middleware
pub fn build_router(state: AppState, server: &ServerConfig) -> Result<Router> {
    let origin = if server.cors_origin.trim() == "*" {
        AllowOrigin::any()
    } else {
        let value = server
            .cors_origin
            .parse::<HeaderValue>()
            .with_context(|| format!("Invalid server.cors_origin: {}", server.cors_origin))?;
        AllowOrigin::exact(value)
    };
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    Ok(Router::new()
        .nest("/api/v1", build_api_router(state.clone()))
        .fallback(fallback)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors)
                .layer(TimeoutLayer::new(Duration::from_secs(server.request_timeout_secs))),
        )
        .with_state(state))
}

async fn fallback() -> ApiError {
    ApiError::not_found("Route not found")
}
