//! Product repository

use super::like_pattern;
use crate::db::{Backend, DynDatabasePool};
use crate::models::{Product, ProductFilter};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder, Sqlite, SqlitePool};
use std::sync::Arc;

/// Product repository trait
#[async_trait]
pub trait ProductRepository: Send + Sync {
    async fn create(&self, product: &Product) -> Result<Product>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Product>>;

    async fn get_by_sku(&self, sku: &str) -> Result<Option<Product>>;

    /// List products matching the filter, ordered by name
    async fn list(&self, filter: &ProductFilter, offset: i64, limit: i64) -> Result<Vec<Product>>;

    async fn count(&self, filter: &ProductFilter) -> Result<i64>;

    async fn update(&self, product: &Product) -> Result<Option<Product>>;

    async fn delete(&self, id: i64) -> Result<bool>;

    /// Check if a SKU is taken, ignoring `exclude_id`
    async fn exists_by_sku(&self, sku: &str, exclude_id: Option<i64>) -> Result<bool>;
}

/// SQLx-based product repository implementation
pub struct SqlxProductRepository {
    pool: DynDatabasePool,
}

impl SqlxProductRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn ProductRepository> {
        Arc::new(Self::new(pool))
    }
}

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: i64,
    name: String,
    sku: String,
    description: Option<String>,
    price_cents: i64,
    stock: i64,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Product {
            id: row.id,
            name: row.name,
            sku: row.sku,
            description: row.description,
            price_cents: row.price_cents,
            stock: row.stock,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const PRODUCT_COLUMNS: &str =
    "id, name, sku, description, price_cents, stock, is_active, created_at, updated_at";

macro_rules! push_product_filters {
    ($builder:ident, $filter:expr, $like:literal) => {
        if let Some(search) = $filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            let pattern = like_pattern(search);
            $builder.push(concat!(" AND (name ", $like, " "));
            $builder.push_bind(pattern.clone());
            $builder.push(concat!(" ESCAPE '\\' OR sku ", $like, " "));
            $builder.push_bind(pattern);
            $builder.push(" ESCAPE '\\')");
        }
        if let Some(min) = $filter.min_price_cents {
            $builder.push(" AND price_cents >= ");
            $builder.push_bind(min);
        }
        if let Some(max) = $filter.max_price_cents {
            $builder.push(" AND price_cents <= ");
            $builder.push_bind(max);
        }
        if let Some(is_active) = $filter.is_active {
            $builder.push(" AND is_active = ");
            $builder.push_bind(is_active);
        }
    };
}

#[async_trait]
impl ProductRepository for SqlxProductRepository {
    async fn create(&self, product: &Product) -> Result<Product> {
        match self.pool.backend() {
            Backend::Sqlite(p) => sqlite::create(p, product).await,
            Backend::Postgres(p) => postgres::create(p, product).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Product>> {
        match self.pool.backend() {
            Backend::Sqlite(p) => {
                let sql = format!("SELECT {} FROM products WHERE id = ?", PRODUCT_COLUMNS);
                sqlx::query_as::<_, ProductRow>(&sql).bind(id).fetch_optional(p).await
            }
            Backend::Postgres(p) => {
                let sql = format!("SELECT {} FROM products WHERE id = $1", PRODUCT_COLUMNS);
                sqlx::query_as::<_, ProductRow>(&sql).bind(id).fetch_optional(p).await
            }
        }
        .map(|row| row.map(Product::from))
        .context("Failed to get product by ID")
    }

    async fn get_by_sku(&self, sku: &str) -> Result<Option<Product>> {
        match self.pool.backend() {
            Backend::Sqlite(p) => {
                let sql = format!("SELECT {} FROM products WHERE sku = ?", PRODUCT_COLUMNS);
                sqlx::query_as::<_, ProductRow>(&sql).bind(sku).fetch_optional(p).await
            }
            Backend::Postgres(p) => {
                let sql = format!("SELECT {} FROM products WHERE sku = $1", PRODUCT_COLUMNS);
                sqlx::query_as::<_, ProductRow>(&sql).bind(sku).fetch_optional(p).await
            }
        }
        .map(|row| row.map(Product::from))
        .context("Failed to get product by SKU")
    }

    async fn list(&self, filter: &ProductFilter, offset: i64, limit: i64) -> Result<Vec<Product>> {
        let rows = match self.pool.backend() {
            Backend::Sqlite(p) => {
                let mut builder = QueryBuilder::<Sqlite>::new(format!(
                    "SELECT {} FROM products WHERE 1=1",
                    PRODUCT_COLUMNS
                ));
                push_product_filters!(builder, filter, "LIKE");
                builder.push(" ORDER BY name, id LIMIT ");
                builder.push_bind(limit);
                builder.push(" OFFSET ");
                builder.push_bind(offset);
                builder.build_query_as::<ProductRow>().fetch_all(p).await
            }
            Backend::Postgres(p) => {
                let mut builder = QueryBuilder::<Postgres>::new(format!(
                    "SELECT {} FROM products WHERE 1=1",
                    PRODUCT_COLUMNS
                ));
                push_product_filters!(builder, filter, "ILIKE");
                builder.push(" ORDER BY name, id LIMIT ");
                builder.push_bind(limit);
                builder.push(" OFFSET ");
                builder.push_bind(offset);
                builder.build_query_as::<ProductRow>().fetch_all(p).await
            }
        }
        .context("Failed to list products")?;
        Ok(rows.into_iter().map(Product::from).collect())
    }

    async fn count(&self, filter: &ProductFilter) -> Result<i64> {
        match self.pool.backend() {
            Backend::Sqlite(p) => {
                let mut builder = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM products WHERE 1=1");
                push_product_filters!(builder, filter, "LIKE");
                builder.build_query_scalar::<i64>().fetch_one(p).await
            }
            Backend::Postgres(p) => {
                let mut builder = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM products WHERE 1=1");
                push_product_filters!(builder, filter, "ILIKE");
                builder.build_query_scalar::<i64>().fetch_one(p).await
            }
        }
        .context("Failed to count products")
    }

    async fn update(&self, product: &Product) -> Result<Option<Product>> {
        match self.pool.backend() {
            Backend::Sqlite(p) => sqlite::update(p, product).await,
            Backend::Postgres(p) => postgres::update(p, product).await,
        }
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let affected = match self.pool.backend() {
            Backend::Sqlite(p) => sqlx::query("DELETE FROM products WHERE id = ?")
                .bind(id)
                .execute(p)
                .await
                .map(|r| r.rows_affected()),
            Backend::Postgres(p) => sqlx::query("DELETE FROM products WHERE id = $1")
                .bind(id)
                .execute(p)
                .await
                .map(|r| r.rows_affected()),
        }
        .context("Failed to delete product")?;
        Ok(affected > 0)
    }

    async fn exists_by_sku(&self, sku: &str, exclude_id: Option<i64>) -> Result<bool> {
        let count: i64 = match self.pool.backend() {
            Backend::Sqlite(p) => {
                sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE sku = ? AND (? IS NULL OR id != ?)")
                    .bind(sku)
                    .bind(exclude_id)
                    .bind(exclude_id)
                    .fetch_one(p)
                    .await
            }
            Backend::Postgres(p) => {
                sqlx::query_scalar(
                    "SELECT COUNT(*) FROM products WHERE sku = $1 AND ($2::BIGINT IS NULL OR id != $2)",
                )
                .bind(sku)
                .bind(exclude_id)
                .fetch_one(p)
                .await
            }
        }
        .context("Failed to check product SKU")?;
        Ok(count > 0)
    }
}

mod sqlite {
    use super::*;

    pub async fn create(pool: &SqlitePool, product: &Product) -> Result<Product> {
        let now = Utc::now();
        let sql = format!(
            "INSERT INTO products (name, sku, description, price_cents, stock, is_active, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?) RETURNING {}",
            PRODUCT_COLUMNS
        );
        let row = sqlx::query_as::<_, ProductRow>(&sql)
            .bind(&product.name)
            .bind(&product.sku)
            .bind(&product.description)
            .bind(product.price_cents)
            .bind(product.stock)
            .bind(product.is_active)
            .bind(now)
            .bind(now)
            .fetch_one(pool)
            .await
            .context("Failed to create product")?;
        Ok(row.into())
    }

    pub async fn update(pool: &SqlitePool, product: &Product) -> Result<Option<Product>> {
        let sql = format!(
            "UPDATE products SET name = ?, sku = ?, description = ?, price_cents = ?, stock = ?, \
             is_active = ?, updated_at = ? WHERE id = ? RETURNING {}",
            PRODUCT_COLUMNS
        );
        let row = sqlx::query_as::<_, ProductRow>(&sql)
            .bind(&product.name)
            .bind(&product.sku)
            .bind(&product.description)
            .bind(product.price_cents)
            .bind(product.stock)
            .bind(product.is_active)
            .bind(Utc::now())
            .bind(product.id)
            .fetch_optional(pool)
            .await
            .context("Failed to update product")?;
        Ok(row.map(Product::from))
    }
}

mod postgres {
    use super::*;

    pub async fn create(pool: &PgPool, product: &Product) -> Result<Product> {
        let now = Utc::now();
        let sql = format!(
            "INSERT INTO products (name, sku, description, price_cents, stock, is_active, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING {}",
            PRODUCT_COLUMNS
        );
        let row = sqlx::query_as::<_, ProductRow>(&sql)
            .bind(&product.name)
            .bind(&product.sku)
            .bind(&product.description)
            .bind(product.price_cents)
            .bind(product.stock)
            .bind(product.is_active)
            .bind(now)
            .bind(now)
            .fetch_one(pool)
            .await
            .context("Failed to create product")?;
        Ok(row.into())
    }

    pub async fn update(pool: &PgPool, product: &Product) -> Result<Option<Product>> {
        let sql = format!(
            "UPDATE products SET name = $1, sku = $2, description = $3, price_cents = $4, stock = $5, \
             is_active = $6, updated_at = $7 WHERE id = $8 RETURNING {}",
            PRODUCT_COLUMNS
        );
        let row = sqlx::query_as::<_, ProductRow>(&sql)
            .bind(&product.name)
            .bind(&product.sku)
            .bind(&product.description)
            .bind(product.price_cents)
            .bind(product.stock)
            .bind(product.is_active)
            .bind(Utc::now())
            .bind(product.id)
            .fetch_optional(pool)
            .await
            .context("Failed to update product")?;
        Ok(row.map(Product::from))
    }
}
