//! Database migrations
//!
//! Migrations are embedded in the binary as SQL strings, one up/down pair
//! per dialect. Versions are timestamps (`YYYYMMDDhhmmss`) and must be
//! strictly increasing.
//!
//! # Usage
//!
//! ```ignore
//! use keel::db::{create_pool, migrations};
//!
//! let pool = create_pool(&config).await?;
//! migrations::run_migrations(&pool).await?;
//! migrations::rollback(&pool, 1).await?;
//! ```

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{PgPool, SqlitePool};

use super::{Backend, DynDatabasePool};

/// A schema change with SQL for both backends
#[derive(Debug, Clone)]
pub struct Migration {
    /// Timestamp version, unique and increasing
    pub version: i64,
    /// Human-readable migration name
    pub name: &'static str,
    pub up_sqlite: &'static str,
    pub up_postgres: &'static str,
    pub down_sqlite: &'static str,
    pub down_postgres: &'static str,
}

/// Migration record stored in the database
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MigrationRecord {
    pub version: i64,
    pub name: String,
    pub applied_at: DateTime<Utc>,
}

/// Applied/pending state of one known migration
#[derive(Debug, Clone)]
pub struct MigrationStatus {
    pub version: i64,
    pub name: &'static str,
    pub applied_at: Option<DateTime<Utc>>,
}

impl MigrationStatus {
    pub fn is_applied(&self) -> bool {
        self.applied_at.is_some()
    }
}

pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 20250110093000,
        name: "create_users",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                username VARCHAR(50) NOT NULL,
                email VARCHAR(255) NOT NULL,
                password_hash VARCHAR(255) NOT NULL,
                full_name VARCHAR(100),
                role VARCHAR(20) NOT NULL DEFAULT 'user',
                is_active BOOLEAN NOT NULL DEFAULT 1,
                created_at TIMESTAMP NOT NULL,
                updated_at TIMESTAMP NOT NULL,
                deleted_at TIMESTAMP
            );
            CREATE UNIQUE INDEX IF NOT EXISTS idx_users_username ON users(username) WHERE deleted_at IS NULL;
            CREATE UNIQUE INDEX IF NOT EXISTS idx_users_email ON users(email) WHERE deleted_at IS NULL;
        "#,
        up_postgres: r#"
            CREATE TABLE IF NOT EXISTS users (
                id BIGSERIAL PRIMARY KEY,
                username VARCHAR(50) NOT NULL,
                email VARCHAR(255) NOT NULL,
                password_hash VARCHAR(255) NOT NULL,
                full_name VARCHAR(100),
                role VARCHAR(20) NOT NULL DEFAULT 'user' CHECK (role IN ('admin', 'user')),
                is_active BOOLEAN NOT NULL DEFAULT TRUE,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                deleted_at TIMESTAMPTZ
            );
            CREATE UNIQUE INDEX IF NOT EXISTS idx_users_username ON users(username) WHERE deleted_at IS NULL;
            CREATE UNIQUE INDEX IF NOT EXISTS idx_users_email ON users(email) WHERE deleted_at IS NULL;
        "#,
        down_sqlite: "DROP TABLE IF EXISTS users;",
        down_postgres: "DROP TABLE IF EXISTS users;",
    },
    Migration {
        version: 20250110093500,
        name: "create_refresh_tokens",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS refresh_tokens (
                id VARCHAR(64) PRIMARY KEY,
                user_id INTEGER NOT NULL,
                expires_at TIMESTAMP NOT NULL,
                created_at TIMESTAMP NOT NULL,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_refresh_tokens_user_id ON refresh_tokens(user_id);
            CREATE INDEX IF NOT EXISTS idx_refresh_tokens_expires_at ON refresh_tokens(expires_at);
        "#,
        up_postgres: r#"
            CREATE TABLE IF NOT EXISTS refresh_tokens (
                id VARCHAR(64) PRIMARY KEY,
                user_id BIGINT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                expires_at TIMESTAMPTZ NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            );
            CREATE INDEX IF NOT EXISTS idx_refresh_tokens_user_id ON refresh_tokens(user_id);
            CREATE INDEX IF NOT EXISTS idx_refresh_tokens_expires_at ON refresh_tokens(expires_at);
        "#,
        down_sqlite: "DROP TABLE IF EXISTS refresh_tokens;",
        down_postgres: "DROP TABLE IF EXISTS refresh_tokens;",
    },
    Migration {
        version: 20250111101500,
        name: "create_categories",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS categories (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name VARCHAR(100) NOT NULL UNIQUE,
                slug VARCHAR(120) NOT NULL UNIQUE,
                description TEXT,
                created_at TIMESTAMP NOT NULL,
                updated_at TIMESTAMP NOT NULL
            );
        "#,
        up_postgres: r#"
            CREATE TABLE IF NOT EXISTS categories (
                id BIGSERIAL PRIMARY KEY,
                name VARCHAR(100) NOT NULL UNIQUE,
                slug VARCHAR(120) NOT NULL UNIQUE,
                description TEXT,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            );
        "#,
        down_sqlite: "DROP TABLE IF EXISTS categories;",
        down_postgres: "DROP TABLE IF EXISTS categories;",
    },
    Migration {
        version: 20250111102000,
        name: "create_articles",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS articles (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title VARCHAR(200) NOT NULL,
                slug VARCHAR(255) NOT NULL,
                content TEXT NOT NULL,
                excerpt VARCHAR(500),
                featured_image VARCHAR(500),
                status VARCHAR(20) NOT NULL DEFAULT 'draft' CHECK (status IN ('draft', 'published', 'archived')),
                author_id INTEGER NOT NULL,
                category_id INTEGER,
                view_count INTEGER NOT NULL DEFAULT 0,
                published_at TIMESTAMP,
                created_at TIMESTAMP NOT NULL,
                updated_at TIMESTAMP NOT NULL,
                deleted_at TIMESTAMP,
                FOREIGN KEY (author_id) REFERENCES users(id) ON DELETE CASCADE,
                FOREIGN KEY (category_id) REFERENCES categories(id) ON DELETE SET NULL
            );
            CREATE UNIQUE INDEX IF NOT EXISTS idx_articles_slug ON articles(slug) WHERE deleted_at IS NULL;
            CREATE INDEX IF NOT EXISTS idx_articles_status ON articles(status);
            CREATE INDEX IF NOT EXISTS idx_articles_author_id ON articles(author_id);
            CREATE INDEX IF NOT EXISTS idx_articles_category_id ON articles(category_id);
        "#,
        up_postgres: r#"
            CREATE TABLE IF NOT EXISTS articles (
                id BIGSERIAL PRIMARY KEY,
                title VARCHAR(200) NOT NULL,
                slug VARCHAR(255) NOT NULL,
                content TEXT NOT NULL,
                excerpt VARCHAR(500),
                featured_image VARCHAR(500),
                status VARCHAR(20) NOT NULL DEFAULT 'draft' CHECK (status IN ('draft', 'published', 'archived')),
                author_id BIGINT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                category_id BIGINT REFERENCES categories(id) ON DELETE SET NULL,
                view_count BIGINT NOT NULL DEFAULT 0,
                published_at TIMESTAMPTZ,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                deleted_at TIMESTAMPTZ
            );
            CREATE UNIQUE INDEX IF NOT EXISTS idx_articles_slug ON articles(slug) WHERE deleted_at IS NULL;
            CREATE INDEX IF NOT EXISTS idx_articles_status ON articles(status);
            CREATE INDEX IF NOT EXISTS idx_articles_author_id ON articles(author_id);
            CREATE INDEX IF NOT EXISTS idx_articles_category_id ON articles(category_id);
        "#,
        down_sqlite: "DROP TABLE IF EXISTS articles;",
        down_postgres: "DROP TABLE IF EXISTS articles;",
    },
    Migration {
        version: 20250114160000,
        name: "create_products",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS products (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name VARCHAR(200) NOT NULL,
                sku VARCHAR(50) NOT NULL UNIQUE,
                description TEXT,
                price_cents INTEGER NOT NULL CHECK (price_cents >= 0),
                stock INTEGER NOT NULL DEFAULT 0 CHECK (stock >= 0),
                is_active BOOLEAN NOT NULL DEFAULT 1,
                created_at TIMESTAMP NOT NULL,
                updated_at TIMESTAMP NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_products_name ON products(name);
        "#,
        up_postgres: r#"
            CREATE TABLE IF NOT EXISTS products (
                id BIGSERIAL PRIMARY KEY,
                name VARCHAR(200) NOT NULL,
                sku VARCHAR(50) NOT NULL UNIQUE,
                description TEXT,
                price_cents BIGINT NOT NULL CHECK (price_cents >= 0),
                stock BIGINT NOT NULL DEFAULT 0 CHECK (stock >= 0),
                is_active BOOLEAN NOT NULL DEFAULT TRUE,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            );
            CREATE INDEX IF NOT EXISTS idx_products_name ON products(name);
        "#,
        down_sqlite: "DROP TABLE IF EXISTS products;",
        down_postgres: "DROP TABLE IF EXISTS products;",
    },
];

/// Apply all pending migrations in version order.
///
/// Each migration runs in its own transaction together with its
/// bookkeeping row. Returns the number of migrations applied.
pub async fn run_migrations(pool: &DynDatabasePool) -> Result<usize> {
    create_migrations_table(pool).await?;

    let applied = get_applied_migrations(pool).await?;
    let mut count = 0;

    for migration in MIGRATIONS {
        if applied.iter().any(|r| r.version == migration.version) {
            continue;
        }
        tracing::info!(version = migration.version, name = migration.name, "Applying migration");
        match pool.backend() {
            Backend::Sqlite(p) => apply_sqlite(p, migration).await,
            Backend::Postgres(p) => apply_postgres(p, migration).await,
        }
        .with_context(|| format!("Failed to apply migration: {}", migration.name))?;
        count += 1;
    }

    if count > 0 {
        tracing::info!("Applied {} migration(s)", count);
    } else {
        tracing::debug!("No pending migrations");
    }

    Ok(count)
}

/// Revert the `steps` most recently applied migrations, newest first.
///
/// Returns the reverted versions.
pub async fn rollback(pool: &DynDatabasePool, steps: usize) -> Result<Vec<i64>> {
    create_migrations_table(pool).await?;

    let applied = get_applied_migrations(pool).await?;
    let mut reverted = Vec::new();

    for record in applied.iter().rev().take(steps) {
        let Some(migration) = get_migration(record.version) else {
            bail!(
                "Applied migration {} ({}) is unknown to this binary",
                record.version,
                record.name
            );
        };
        tracing::info!(version = migration.version, name = migration.name, "Reverting migration");
        match pool.backend() {
            Backend::Sqlite(p) => revert_sqlite(p, migration).await,
            Backend::Postgres(p) => revert_postgres(p, migration).await,
        }
        .with_context(|| format!("Failed to revert migration: {}", migration.name))?;
        reverted.push(migration.version);
    }

    Ok(reverted)
}

/// Applied/pending state of every known migration
pub async fn status(pool: &DynDatabasePool) -> Result<Vec<MigrationStatus>> {
    create_migrations_table(pool).await?;
    let applied = get_applied_migrations(pool).await?;

    Ok(MIGRATIONS
        .iter()
        .map(|m| MigrationStatus {
            version: m.version,
            name: m.name,
            applied_at: applied
                .iter()
                .find(|r| r.version == m.version)
                .map(|r| r.applied_at),
        })
        .collect())
}

async fn create_migrations_table(pool: &DynDatabasePool) -> Result<()> {
    let sql = match pool.backend() {
        Backend::Sqlite(_) => {
            r#"
            CREATE TABLE IF NOT EXISTS _migrations (
                version INTEGER PRIMARY KEY,
                name VARCHAR(255) NOT NULL UNIQUE,
                applied_at TIMESTAMP NOT NULL
            )
            "#
        }
        Backend::Postgres(_) => {
            r#"
            CREATE TABLE IF NOT EXISTS _migrations (
                version BIGINT PRIMARY KEY,
                name VARCHAR(255) NOT NULL UNIQUE,
                applied_at TIMESTAMPTZ NOT NULL
            )
            "#
        }
    };

    pool.execute(sql).await?;
    Ok(())
}

async fn get_applied_migrations(pool: &DynDatabasePool) -> Result<Vec<MigrationRecord>> {
    const SQL: &str = "SELECT version, name, applied_at FROM _migrations ORDER BY version";
    let records = match pool.backend() {
        Backend::Sqlite(p) => sqlx::query_as::<_, MigrationRecord>(SQL).fetch_all(p).await?,
        Backend::Postgres(p) => sqlx::query_as::<_, MigrationRecord>(SQL).fetch_all(p).await?,
    };
    Ok(records)
}

async fn apply_sqlite(pool: &SqlitePool, migration: &Migration) -> Result<()> {
    let mut tx = pool.begin().await?;
    for statement in split_sql_statements(migration.up_sqlite) {
        sqlx::query(statement)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Failed to execute: {}", truncate_sql(statement)))?;
    }
    sqlx::query("INSERT INTO _migrations (version, name, applied_at) VALUES (?, ?, ?)")
        .bind(migration.version)
        .bind(migration.name)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;
    Ok(())
}

async fn apply_postgres(pool: &PgPool, migration: &Migration) -> Result<()> {
    let mut tx = pool.begin().await?;
    for statement in split_sql_statements(migration.up_postgres) {
        sqlx::query(statement)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Failed to execute: {}", truncate_sql(statement)))?;
    }
    sqlx::query("INSERT INTO _migrations (version, name, applied_at) VALUES ($1, $2, $3)")
        .bind(migration.version)
        .bind(migration.name)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;
    Ok(())
}

async fn revert_sqlite(pool: &SqlitePool, migration: &Migration) -> Result<()> {
    let mut tx = pool.begin().await?;
    for statement in split_sql_statements(migration.down_sqlite) {
        sqlx::query(statement)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Failed to execute: {}", truncate_sql(statement)))?;
    }
    sqlx::query("DELETE FROM _migrations WHERE version = ?")
        .bind(migration.version)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;
    Ok(())
}

async fn revert_postgres(pool: &PgPool, migration: &Migration) -> Result<()> {
    let mut tx = pool.begin().await?;
    for statement in split_sql_statements(migration.down_postgres) {
        sqlx::query(statement)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Failed to execute: {}", truncate_sql(statement)))?;
    }
    sqlx::query("DELETE FROM _migrations WHERE version = $1")
        .bind(migration.version)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;
    Ok(())
}

/// Truncate SQL for error messages
fn truncate_sql(sql: &str) -> String {
    match sql.char_indices().nth(100) {
        Some((idx, _)) => format!("{}...", &sql[..idx]),
        None => sql.to_string(),
    }
}

/// Split SQL into individual statements, dropping comment-only fragments
fn split_sql_statements(sql: &str) -> Vec<&str> {
    sql.split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty() && !is_comment_only(s))
        .collect()
}

/// Check if a string contains only SQL comments
fn is_comment_only(s: &str) -> bool {
    s.lines().all(|line| {
        let trimmed = line.trim();
        trimmed.is_empty() || trimmed.starts_with("--")
    })
}

/// Number of known migrations not yet applied
pub async fn pending_count(pool: &DynDatabasePool) -> Result<usize> {
    Ok(status(pool).await?.iter().filter(|s| !s.is_applied()).count())
}

/// Get the total number of migrations defined
pub fn total_migrations() -> usize {
    MIGRATIONS.len()
}

/// Get migration by version
pub fn get_migration(version: i64) -> Option<&'static Migration> {
    MIGRATIONS.iter().find(|m| m.version == version)
}
