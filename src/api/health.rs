//! Health check endpoint
//!
//! - GET /api/v1/health - Liveness plus a database ping

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde::Serialize;

use crate::api::middleware::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: &'static str,
    pub version: &'static str,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(health))
}

/// GET /api/v1/health
///
/// Returns 503 when the database cannot be reached.
async fn health(State(state): State<AppState>) -> impl IntoResponse {
    match state.pool.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(HealthResponse {
                status: "ok",
                database: "ok",
                version: env!("CARGO_PKG_VERSION"),
            }),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "Health check: database unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse {
                    status: "degraded",
                    database: "unavailable",
                    version: env!("CARGO_PKG_VERSION"),
                }),
            )
        }
    }
}
