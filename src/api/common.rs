//! Common API utilities and shared types
//!
//! Extractors here wrap axum's `Json`, `Path` and `Query` so that malformed
//! input is reported in the standard error envelope as `VALIDATION_ERROR`.

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{FromRequest, FromRequestParts};

use super::middleware::ApiError;
use crate::models::DEFAULT_PER_PAGE;

/// JSON body extractor with envelope-shaped rejections
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct AppJson<T>(pub T);

/// Path extractor with envelope-shaped rejections
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
pub struct AppPath<T>(pub T);

/// Query string extractor with envelope-shaped rejections
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct AppQuery<T>(pub T);

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        invalid_input("request body", rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        invalid_input("path parameter", rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        invalid_input("query parameter", rejection.body_text())
    }
}

/// `VALIDATION_ERROR` with the parser's message under `details.reason`
pub(crate) fn invalid_input(what: &str, reason: impl std::fmt::Display) -> ApiError {
    ApiError::with_details(
        "VALIDATION_ERROR",
        format!("Invalid {}", what),
        serde_json::json!({ "reason": reason.to_string() }),
    )
}

/// Default page number (1-indexed)
pub fn default_page() -> u32 {
    1
}

/// Default page size for list endpoints
pub fn default_per_page() -> u32 {
    DEFAULT_PER_PAGE
}
