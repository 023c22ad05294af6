//! Database repositories
//!
//! Repository pattern implementations for database access.
//! Each repository handles the SQL for one table, with a SQLite and a
//! PostgreSQL variant of every query.

pub mod article;
pub mod category;
pub mod product;
pub mod refresh_token;
pub mod user;

pub use article::{ArticleRepository, SqlxArticleRepository};
pub use category::{CategoryRepository, SqlxCategoryRepository};
pub use product::{ProductRepository, SqlxProductRepository};
pub use refresh_token::{RefreshTokenRepository, SqlxRefreshTokenRepository};
pub use user::{SqlxUserRepository, UserRepository};

/// Whether an error chain contains a unique-constraint violation
/// (PostgreSQL `23505`, SQLite `2067`/`1555`).
pub fn is_unique_violation(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        matches!(
            cause.downcast_ref::<sqlx::Error>(),
            Some(sqlx::Error::Database(db_err))
                if matches!(db_err.code().as_deref(), Some("23505" | "2067" | "1555"))
        )
    })
}

/// `%term%` pattern for LIKE/ILIKE with wildcards in the term escaped
pub(crate) fn like_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}
