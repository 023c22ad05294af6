//! Service error taxonomy
//!
//! Every service returns `ServiceError`; the API layer maps each variant to
//! one HTTP status.

/// Error types for service operations
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// Input failed a field constraint
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// Missing, invalid or expired credentials
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Authenticated but not allowed
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Uniqueness violation or invalid state transition
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl ServiceError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }
}

/// Map a repository error, turning unique-constraint races into `Conflict`
pub(crate) fn map_write_error(err: anyhow::Error, conflict: impl FnOnce() -> String) -> ServiceError {
    if crate::db::is_unique_violation(&err) {
        ServiceError::Conflict(conflict())
    } else {
        ServiceError::Internal(err)
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;
