//! Database layer
//!
//! Supports:
//! - PostgreSQL (production)
//! - SQLite (local development and tests)
//!
//! The backend is selected by `database.driver` in the configuration.
//!
//! # Usage
//!
//! ```ignore
//! use keel::config::DatabaseConfig;
//! use keel::db::{create_pool, migrations, Backend};
//!
//! let pool = create_pool(&DatabaseConfig::default()).await?;
//! migrations::run_migrations(&pool).await?;
//! pool.ping().await?;
//!
//! match pool.backend() {
//!     Backend::Postgres(pg) => { /* Postgres-specific SQL */ }
//!     Backend::Sqlite(sqlite) => { /* SQLite-specific SQL */ }
//! }
//! ```

pub mod migrations;
pub mod pool;
pub mod repositories;

pub use repositories::is_unique_violation;
pub use pool::{
    create_pool, create_test_pool, Backend, DatabasePool, DynDatabasePool, PostgresDatabase,
    SqliteDatabase,
};
