//! Authentication API endpoints
//!
//! Handles HTTP requests for user authentication:
//! - POST /api/v1/auth/register - User registration
//! - POST /api/v1/auth/login - User login
//! - POST /api/v1/auth/refresh - Rotate a refresh token
//! - POST /api/v1/auth/logout - Revoke refresh tokens
//! - GET /api/v1/auth/me - Get current user
//! - PUT /api/v1/auth/password - Change password

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::common::{invalid_input, AppJson};
use crate::api::middleware::{ApiError, AppState, AuthUser};
use crate::models::{ChangePasswordInput, LoginInput, RegisterInput, User};
use crate::services::TokenPair;

/// Response for successful authentication
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: User,
    pub tokens: TokenPair,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct LogoutRequest {
    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// Build public auth routes (no auth required)
pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/refresh", post(refresh))
}

/// Build protected auth routes (requires auth middleware)
pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/logout", post(logout))
        .route("/me", get(get_current_user))
        .route("/password", put(change_password))
}

/// POST /api/v1/auth/register
///
/// The first registered account becomes admin.
async fn register(
    State(state): State<AppState>,
    AppJson(body): AppJson<RegisterInput>,
) -> Result<impl IntoResponse, ApiError> {
    let (user, tokens) = state.user_service.register(body).await?;
    Ok((StatusCode::CREATED, Json(AuthResponse { user, tokens })))
}

/// POST /api/v1/auth/login
async fn login(
    State(state): State<AppState>,
    AppJson(body): AppJson<LoginInput>,
) -> Result<Json<AuthResponse>, ApiError> {
    let (user, tokens) = state.user_service.login(body).await?;
    Ok(Json(AuthResponse { user, tokens }))
}

/// POST /api/v1/auth/refresh
///
/// The presented refresh token is consumed; reusing it fails.
async fn refresh(
    State(state): State<AppState>,
    AppJson(body): AppJson<RefreshRequest>,
) -> Result<Json<TokenPair>, ApiError> {
    let tokens = state.token_service.refresh(&body.refresh_token).await?;
    Ok(Json(tokens))
}

/// POST /api/v1/auth/logout
///
/// With `{"refresh_token": ..}` revokes that token; with no body revokes
/// every refresh token of the caller.
async fn logout(
    State(state): State<AppState>,
    auth: AuthUser,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    let request = if body.iter().all(u8::is_ascii_whitespace) {
        LogoutRequest::default()
    } else {
        serde_json::from_slice::<LogoutRequest>(&body)
            .map_err(|e| invalid_input("request body", e))?
    };

    state
        .user_service
        .logout(auth.id, request.refresh_token.as_deref())
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/auth/me
async fn get_current_user(auth: AuthUser) -> Json<User> {
    Json(auth.user)
}

/// PUT /api/v1/auth/password
///
/// Logs out every session of the caller on success.
async fn change_password(
    State(state): State<AppState>,
    auth: AuthUser,
    AppJson(body): AppJson<ChangePasswordInput>,
) -> Result<StatusCode, ApiError> {
    state
        .user_service
        .change_password(auth.id, &body.current_password, &body.new_password)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
