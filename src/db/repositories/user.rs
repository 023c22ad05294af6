//! User repository
//!
//! This module provides:
//! - `UserRepository` trait defining the interface for user data access
//! - `SqlxUserRepository` implementing the trait for SQLite and PostgreSQL
//!
//! Soft-deleted rows are filtered out of every query.

use super::like_pattern;
use crate::db::{Backend, DynDatabasePool};
use crate::models::{User, UserFilter};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder, Sqlite, SqlitePool};
use std::sync::Arc;

/// User repository trait
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert a user and return it with its assigned ID
    async fn create(&self, user: &User) -> Result<User>;

    async fn get_by_id(&self, id: i64) -> Result<Option<User>>;

    async fn get_by_username(&self, username: &str) -> Result<Option<User>>;

    async fn get_by_email(&self, email: &str) -> Result<Option<User>>;

    /// List users matching the filter, newest first
    async fn list(&self, filter: &UserFilter, offset: i64, limit: i64) -> Result<Vec<User>>;

    /// Count users matching the filter
    async fn count(&self, filter: &UserFilter) -> Result<i64>;

    /// Persist profile fields (everything except the password hash)
    async fn update(&self, user: &User) -> Result<Option<User>>;

    /// Mark a user deleted. Returns false if no live user matched.
    async fn soft_delete(&self, id: i64) -> Result<bool>;

    async fn update_password(&self, id: i64, password_hash: &str) -> Result<bool>;

    /// Count all live users
    async fn count_all(&self) -> Result<i64>;
}

/// SQLx-based user repository implementation
pub struct SqlxUserRepository {
    pool: DynDatabasePool,
}

impl SqlxUserRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn UserRepository> {
        Arc::new(Self::new(pool))
    }
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: i64,
    username: String,
    email: String,
    password_hash: String,
    full_name: Option<String>,
    role: String,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
}

impl TryFrom<UserRow> for User {
    type Error = anyhow::Error;

    fn try_from(row: UserRow) -> Result<Self> {
        Ok(User {
            id: row.id,
            username: row.username,
            email: row.email,
            password_hash: row.password_hash,
            full_name: row.full_name,
            role: row.role.parse()?,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
            deleted_at: row.deleted_at,
        })
    }
}

fn into_users(rows: Vec<UserRow>) -> Result<Vec<User>> {
    rows.into_iter().map(User::try_from).collect()
}

const USER_COLUMNS: &str =
    "id, username, email, password_hash, full_name, role, is_active, created_at, updated_at, deleted_at";

/// Append the optional filters to a query that already has a WHERE clause.
/// `$like` is the case-insensitive match operator of the dialect.
macro_rules! push_user_filters {
    ($builder:ident, $filter:expr, $like:literal) => {
        if let Some(search) = $filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            let pattern = like_pattern(search);
            $builder.push(concat!(" AND (username ", $like, " "));
            $builder.push_bind(pattern.clone());
            $builder.push(concat!(" ESCAPE '\\' OR email ", $like, " "));
            $builder.push_bind(pattern.clone());
            $builder.push(concat!(" ESCAPE '\\' OR full_name ", $like, " "));
            $builder.push_bind(pattern);
            $builder.push(" ESCAPE '\\')");
        }
        if let Some(role) = $filter.role {
            $builder.push(" AND role = ");
            $builder.push_bind(role.as_str());
        }
        if let Some(is_active) = $filter.is_active {
            $builder.push(" AND is_active = ");
            $builder.push_bind(is_active);
        }
    };
}

#[async_trait]
impl UserRepository for SqlxUserRepository {
    async fn create(&self, user: &User) -> Result<User> {
        match self.pool.backend() {
            Backend::Sqlite(p) => sqlite::create(p, user).await,
            Backend::Postgres(p) => postgres::create(p, user).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<User>> {
        match self.pool.backend() {
            Backend::Sqlite(p) => sqlite::get_by_id(p, id).await,
            Backend::Postgres(p) => postgres::get_by_id(p, id).await,
        }
    }

    async fn get_by_username(&self, username: &str) -> Result<Option<User>> {
        match self.pool.backend() {
            Backend::Sqlite(p) => sqlite::get_by_column(p, "username", username).await,
            Backend::Postgres(p) => postgres::get_by_column(p, "username", username).await,
        }
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<User>> {
        match self.pool.backend() {
            Backend::Sqlite(p) => sqlite::get_by_column(p, "email", email).await,
            Backend::Postgres(p) => postgres::get_by_column(p, "email", email).await,
        }
    }

    async fn list(&self, filter: &UserFilter, offset: i64, limit: i64) -> Result<Vec<User>> {
        match self.pool.backend() {
            Backend::Sqlite(p) => sqlite::list(p, filter, offset, limit).await,
            Backend::Postgres(p) => postgres::list(p, filter, offset, limit).await,
        }
    }

    async fn count(&self, filter: &UserFilter) -> Result<i64> {
        match self.pool.backend() {
            Backend::Sqlite(p) => sqlite::count(p, filter).await,
            Backend::Postgres(p) => postgres::count(p, filter).await,
        }
    }

    async fn update(&self, user: &User) -> Result<Option<User>> {
        match self.pool.backend() {
            Backend::Sqlite(p) => sqlite::update(p, user).await,
            Backend::Postgres(p) => postgres::update(p, user).await,
        }
    }

    async fn soft_delete(&self, id: i64) -> Result<bool> {
        match self.pool.backend() {
            Backend::Sqlite(p) => sqlite::soft_delete(p, id).await,
            Backend::Postgres(p) => postgres::soft_delete(p, id).await,
        }
    }

    async fn update_password(&self, id: i64, password_hash: &str) -> Result<bool> {
        match self.pool.backend() {
            Backend::Sqlite(p) => sqlite::update_password(p, id, password_hash).await,
            Backend::Postgres(p) => postgres::update_password(p, id, password_hash).await,
        }
    }

    async fn count_all(&self) -> Result<i64> {
        self.count(&UserFilter::default()).await
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

mod sqlite {
    use super::*;

    pub async fn create(pool: &SqlitePool, user: &User) -> Result<User> {
        let now = Utc::now();
        let sql = format!(
            "INSERT INTO users (username, email, password_hash, full_name, role, is_active, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?) RETURNING {}",
            USER_COLUMNS
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(&user.username)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(&user.full_name)
            .bind(user.role.as_str())
            .bind(user.is_active)
            .bind(now)
            .bind(now)
            .fetch_one(pool)
            .await
            .context("Failed to create user")?;
        row.try_into()
    }

    pub async fn get_by_id(pool: &SqlitePool, id: i64) -> Result<Option<User>> {
        let sql = format!(
            "SELECT {} FROM users WHERE id = ? AND deleted_at IS NULL",
            USER_COLUMNS
        );
        sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .fetch_optional(pool)
            .await
            .context("Failed to get user by ID")?
            .map(User::try_from)
            .transpose()
    }

    /// `column` is always a fixed identifier, never user input
    pub async fn get_by_column(pool: &SqlitePool, column: &str, value: &str) -> Result<Option<User>> {
        let sql = format!(
            "SELECT {} FROM users WHERE {} = ? AND deleted_at IS NULL",
            USER_COLUMNS, column
        );
        sqlx::query_as::<_, UserRow>(&sql)
            .bind(value)
            .fetch_optional(pool)
            .await
            .with_context(|| format!("Failed to get user by {}", column))?
            .map(User::try_from)
            .transpose()
    }

    pub async fn list(pool: &SqlitePool, filter: &UserFilter, offset: i64, limit: i64) -> Result<Vec<User>> {
        let mut builder = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {} FROM users WHERE deleted_at IS NULL",
            USER_COLUMNS
        ));
        push_user_filters!(builder, filter, "LIKE");
        builder.push(" ORDER BY created_at DESC, id DESC LIMIT ");
        builder.push_bind(limit);
        builder.push(" OFFSET ");
        builder.push_bind(offset);

        let rows = builder
            .build_query_as::<UserRow>()
            .fetch_all(pool)
            .await
            .context("Failed to list users")?;
        into_users(rows)
    }

    pub async fn count(pool: &SqlitePool, filter: &UserFilter) -> Result<i64> {
        let mut builder =
            QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM users WHERE deleted_at IS NULL");
        push_user_filters!(builder, filter, "LIKE");
        builder
            .build_query_scalar::<i64>()
            .fetch_one(pool)
            .await
            .context("Failed to count users")
    }

    pub async fn update(pool: &SqlitePool, user: &User) -> Result<Option<User>> {
        let sql = format!(
            "UPDATE users SET username = ?, email = ?, full_name = ?, role = ?, is_active = ?, updated_at = ? \
             WHERE id = ? AND deleted_at IS NULL RETURNING {}",
            USER_COLUMNS
        );
        sqlx::query_as::<_, UserRow>(&sql)
            .bind(&user.username)
            .bind(&user.email)
            .bind(&user.full_name)
            .bind(user.role.as_str())
            .bind(user.is_active)
            .bind(Utc::now())
            .bind(user.id)
            .fetch_optional(pool)
            .await
            .context("Failed to update user")?
            .map(User::try_from)
            .transpose()
    }

    pub async fn soft_delete(pool: &SqlitePool, id: i64) -> Result<bool> {
        let now = Utc::now();
        let result = sqlx::query(
            "UPDATE users SET deleted_at = ?, updated_at = ? WHERE id = ? AND deleted_at IS NULL",
        )
        .bind(now)
        .bind(now)
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to delete user")?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn update_password(pool: &SqlitePool, id: i64, password_hash: &str) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE users SET password_hash = ?, updated_at = ? WHERE id = ? AND deleted_at IS NULL",
        )
        .bind(password_hash)
        .bind(Utc::now())
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to update password")?;
        Ok(result.rows_affected() > 0)
    }
}

// ============================================================================
// PostgreSQL implementations
// ============================================================================

mod postgres {
    use super::*;

    pub async fn create(pool: &PgPool, user: &User) -> Result<User> {
        let now = Utc::now();
        let sql = format!(
            "INSERT INTO users (username, email, password_hash, full_name, role, is_active, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING {}",
            USER_COLUMNS
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(&user.username)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(&user.full_name)
            .bind(user.role.as_str())
            .bind(user.is_active)
            .bind(now)
            .bind(now)
            .fetch_one(pool)
            .await
            .context("Failed to create user")?;
        row.try_into()
    }

    pub async fn get_by_id(pool: &PgPool, id: i64) -> Result<Option<User>> {
        let sql = format!(
            "SELECT {} FROM users WHERE id = $1 AND deleted_at IS NULL",
            USER_COLUMNS
        );
        sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .fetch_optional(pool)
            .await
            .context("Failed to get user by ID")?
            .map(User::try_from)
            .transpose()
    }

    pub async fn get_by_column(pool: &PgPool, column: &str, value: &str) -> Result<Option<User>> {
        let sql = format!(
            "SELECT {} FROM users WHERE {} = $1 AND deleted_at IS NULL",
            USER_COLUMNS, column
        );
        sqlx::query_as::<_, UserRow>(&sql)
            .bind(value)
            .fetch_optional(pool)
            .await
            .with_context(|| format!("Failed to get user by {}", column))?
            .map(User::try_from)
            .transpose()
    }

    pub async fn list(pool: &PgPool, filter: &UserFilter, offset: i64, limit: i64) -> Result<Vec<User>> {
        let mut builder = QueryBuilder::<Postgres>::new(format!(
            "SELECT {} FROM users WHERE deleted_at IS NULL",
            USER_COLUMNS
        ));
        push_user_filters!(builder, filter, "ILIKE");
        builder.push(" ORDER BY created_at DESC, id DESC LIMIT ");
        builder.push_bind(limit);
        builder.push(" OFFSET ");
        builder.push_bind(offset);

        let rows = builder
            .build_query_as::<UserRow>()
            .fetch_all(pool)
            .await
            .context("Failed to list users")?;
        into_users(rows)
    }

    pub async fn count(pool: &PgPool, filter: &UserFilter) -> Result<i64> {
        let mut builder =
            QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM users WHERE deleted_at IS NULL");
        push_user_filters!(builder, filter, "ILIKE");
        builder
            .build_query_scalar::<i64>()
            .fetch_one(pool)
            .await
            .context("Failed to count users")
    }

    pub async fn update(pool: &PgPool, user: &User) -> Result<Option<User>> {
        let sql = format!(
            "UPDATE users SET username = $1, email = $2, full_name = $3, role = $4, is_active = $5, updated_at = $6 \
             WHERE id = $7 AND deleted_at IS NULL RETURNING {}",
            USER_COLUMNS
        );
        sqlx::query_as::<_, UserRow>(&sql)
            .bind(&user.username)
            .bind(&user.email)
            .bind(&user.full_name)
            .bind(user.role.as_str())
            .bind(user.is_active)
            .bind(Utc::now())
            .bind(user.id)
            .fetch_optional(pool)
            .await
            .context("Failed to update user")?
            .map(User::try_from)
            .transpose()
    }

    pub async fn soft_delete(pool: &PgPool, id: i64) -> Result<bool> {
        let now = Utc::now();
        let result = sqlx::query(
            "UPDATE users SET deleted_at = $1, updated_at = $2 WHERE id = $3 AND deleted_at IS NULL",
        )
        .bind(now)
        .bind(now)
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to delete user")?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn update_password(pool: &PgPool, id: i64, password_hash: &str) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE users SET password_hash = $1, updated_at = $2 WHERE id = $3 AND deleted_at IS NULL",
        )
        .bind(password_hash)
        .bind(Utc::now())
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to update password")?;
        Ok(result.rows_affected() > 0)
    }
}
