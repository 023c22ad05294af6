//! Category repository
//!
//! Database operations for categories. Categories are hard-deleted; their
//! articles are detached (`category_id = NULL`) in the same transaction.

use crate::db::{Backend, DynDatabasePool};
use crate::models::Category;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, SqlitePool};
use std::sync::Arc;

/// Category repository trait
#[async_trait]
pub trait CategoryRepository: Send + Sync {
    async fn create(&self, name: &str, slug: &str, description: Option<&str>) -> Result<Category>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Category>>;

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Category>>;

    async fn get_by_name(&self, name: &str) -> Result<Option<Category>>;

    /// All categories ordered by name
    async fn list(&self) -> Result<Vec<Category>>;

    async fn update(&self, category: &Category) -> Result<Option<Category>>;

    /// Delete a category. Returns false if it did not exist.
    async fn delete(&self, id: i64) -> Result<bool>;

    /// Check if a slug is taken, ignoring `exclude_id`
    async fn exists_by_slug(&self, slug: &str, exclude_id: Option<i64>) -> Result<bool>;
}

/// SQLx-based category repository implementation
pub struct SqlxCategoryRepository {
    pool: DynDatabasePool,
}

impl SqlxCategoryRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn CategoryRepository> {
        Arc::new(Self::new(pool))
    }
}

#[derive(sqlx::FromRow)]
struct CategoryRow {
    id: i64,
    name: String,
    slug: String,
    description: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<CategoryRow> for Category {
    fn from(row: CategoryRow) -> Self {
        Category {
            id: row.id,
            name: row.name,
            slug: row.slug,
            description: row.description,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const CATEGORY_COLUMNS: &str = "id, name, slug, description, created_at, updated_at";

#[async_trait]
impl CategoryRepository for SqlxCategoryRepository {
    async fn create(&self, name: &str, slug: &str, description: Option<&str>) -> Result<Category> {
        match self.pool.backend() {
            Backend::Sqlite(p) => sqlite::create(p, name, slug, description).await,
            Backend::Postgres(p) => postgres::create(p, name, slug, description).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Category>> {
        match self.pool.backend() {
            Backend::Sqlite(p) => sqlite::get_by_id(p, id).await,
            Backend::Postgres(p) => postgres::get_by_id(p, id).await,
        }
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Category>> {
        match self.pool.backend() {
            Backend::Sqlite(p) => sqlite::get_by_column(p, "slug", slug).await,
            Backend::Postgres(p) => postgres::get_by_column(p, "slug", slug).await,
        }
    }

    async fn get_by_name(&self, name: &str) -> Result<Option<Category>> {
        match self.pool.backend() {
            Backend::Sqlite(p) => sqlite::get_by_column(p, "name", name).await,
            Backend::Postgres(p) => postgres::get_by_column(p, "name", name).await,
        }
    }

    async fn list(&self) -> Result<Vec<Category>> {
        let sql = format!("SELECT {} FROM categories ORDER BY name", CATEGORY_COLUMNS);
        let rows = match self.pool.backend() {
            Backend::Sqlite(p) => sqlx::query_as::<_, CategoryRow>(&sql).fetch_all(p).await,
            Backend::Postgres(p) => sqlx::query_as::<_, CategoryRow>(&sql).fetch_all(p).await,
        }
        .context("Failed to list categories")?;
        Ok(rows.into_iter().map(Category::from).collect())
    }

    async fn update(&self, category: &Category) -> Result<Option<Category>> {
        match self.pool.backend() {
            Backend::Sqlite(p) => sqlite::update(p, category).await,
            Backend::Postgres(p) => postgres::update(p, category).await,
        }
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        match self.pool.backend() {
            Backend::Sqlite(p) => sqlite::delete(p, id).await,
            Backend::Postgres(p) => postgres::delete(p, id).await,
        }
    }

    async fn exists_by_slug(&self, slug: &str, exclude_id: Option<i64>) -> Result<bool> {
        match self.pool.backend() {
            Backend::Sqlite(p) => sqlite::exists_by_slug(p, slug, exclude_id).await,
            Backend::Postgres(p) => postgres::exists_by_slug(p, slug, exclude_id).await,
        }
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

mod sqlite {
    use super::*;

    pub async fn create(
        pool: &SqlitePool,
        name: &str,
        slug: &str,
        description: Option<&str>,
    ) -> Result<Category> {
        let now = Utc::now();
        let sql = format!(
            "INSERT INTO categories (name, slug, description, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?) RETURNING {}",
            CATEGORY_COLUMNS
        );
        let row = sqlx::query_as::<_, CategoryRow>(&sql)
            .bind(name)
            .bind(slug)
            .bind(description)
            .bind(now)
            .bind(now)
            .fetch_one(pool)
            .await
            .context("Failed to create category")?;
        Ok(row.into())
    }

    pub async fn get_by_id(pool: &SqlitePool, id: i64) -> Result<Option<Category>> {
        let sql = format!("SELECT {} FROM categories WHERE id = ?", CATEGORY_COLUMNS);
        let row = sqlx::query_as::<_, CategoryRow>(&sql)
            .bind(id)
            .fetch_optional(pool)
            .await
            .context("Failed to get category by ID")?;
        Ok(row.map(Category::from))
    }

    pub async fn get_by_column(pool: &SqlitePool, column: &str, value: &str) -> Result<Option<Category>> {
        let sql = format!("SELECT {} FROM categories WHERE {} = ?", CATEGORY_COLUMNS, column);
        let row = sqlx::query_as::<_, CategoryRow>(&sql)
            .bind(value)
            .fetch_optional(pool)
            .await
            .with_context(|| format!("Failed to get category by {}", column))?;
        Ok(row.map(Category::from))
    }

    pub async fn update(pool: &SqlitePool, category: &Category) -> Result<Option<Category>> {
        let sql = format!(
            "UPDATE categories SET name = ?, slug = ?, description = ?, updated_at = ? \
             WHERE id = ? RETURNING {}",
            CATEGORY_COLUMNS
        );
        let row = sqlx::query_as::<_, CategoryRow>(&sql)
            .bind(&category.name)
            .bind(&category.slug)
            .bind(&category.description)
            .bind(Utc::now())
            .bind(category.id)
            .fetch_optional(pool)
            .await
            .context("Failed to update category")?;
        Ok(row.map(Category::from))
    }

    pub async fn delete(pool: &SqlitePool, id: i64) -> Result<bool> {
        let mut tx = pool.begin().await?;
        sqlx::query("UPDATE articles SET category_id = NULL WHERE category_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await
            .context("Failed to detach articles from category")?;
        let result = sqlx::query("DELETE FROM categories WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await
            .context("Failed to delete category")?;
        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn exists_by_slug(pool: &SqlitePool, slug: &str, exclude_id: Option<i64>) -> Result<bool> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM categories WHERE slug = ? AND (? IS NULL OR id != ?)",
        )
        .bind(slug)
        .bind(exclude_id)
        .bind(exclude_id)
        .fetch_one(pool)
        .await
        .context("Failed to check category slug")?;
        Ok(count > 0)
    }
}

// ============================================================================
// PostgreSQL implementations
// ============================================================================

mod postgres {
    use super::*;

    pub async fn create(
        pool: &PgPool,
        name: &str,
        slug: &str,
        description: Option<&str>,
    ) -> Result<Category> {
        let now = Utc::now();
        let sql = format!(
            "INSERT INTO categories (name, slug, description, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {}",
            CATEGORY_COLUMNS
        );
        let row = sqlx::query_as::<_, CategoryRow>(&sql)
            .bind(name)
            .bind(slug)
            .bind(description)
            .bind(now)
            .bind(now)
            .fetch_one(pool)
            .await
            .context("Failed to create category")?;
        Ok(row.into())
    }

    pub async fn get_by_id(pool: &PgPool, id: i64) -> Result<Option<Category>> {
        let sql = format!("SELECT {} FROM categories WHERE id = $1", CATEGORY_COLUMNS);
        let row = sqlx::query_as::<_, CategoryRow>(&sql)
            .bind(id)
            .fetch_optional(pool)
            .await
            .context("Failed to get category by ID")?;
        Ok(row.map(Category::from))
    }

    pub async fn get_by_column(pool: &PgPool, column: &str, value: &str) -> Result<Option<Category>> {
        let sql = format!("SELECT {} FROM categories WHERE {} = $1", CATEGORY_COLUMNS, column);
        let row = sqlx::query_as::<_, CategoryRow>(&sql)
            .bind(value)
            .fetch_optional(pool)
            .await
            .with_context(|| format!("Failed to get category by {}", column))?;
        Ok(row.map(Category::from))
    }

    pub async fn update(pool: &PgPool, category: &Category) -> Result<Option<Category>> {
        let sql = format!(
            "UPDATE categories SET name = $1, slug = $2, description = $3, updated_at = $4 \
             WHERE id = $5 RETURNING {}",
            CATEGORY_COLUMNS
        );
        let row = sqlx::query_as::<_, CategoryRow>(&sql)
            .bind(&category.name)
            .bind(&category.slug)
            .bind(&category.description)
            .bind(Utc::now())
            .bind(category.id)
            .fetch_optional(pool)
            .await
            .context("Failed to update category")?;
        Ok(row.map(Category::from))
    }

    pub async fn delete(pool: &PgPool, id: i64) -> Result<bool> {
        let mut tx = pool.begin().await?;
        sqlx::query("UPDATE articles SET category_id = NULL WHERE category_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .context("Failed to detach articles from category")?;
        let result = sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .context("Failed to delete category")?;
        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn exists_by_slug(pool: &PgPool, slug: &str, exclude_id: Option<i64>) -> Result<bool> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM categories WHERE slug = $1 AND ($2::BIGINT IS NULL OR id != $2)",
        )
        .bind(slug)
        .bind(exclude_id)
        .fetch_one(pool)
        .await
        .context("Failed to check category slug")?;
        Ok(count > 0)
    }
}
