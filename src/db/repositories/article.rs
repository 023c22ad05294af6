//! Article repository
//!
//! This module provides:
//! - `ArticleRepository` trait defining the interface for article data access
//! - `SqlxArticleRepository` implementing the trait for SQLite and PostgreSQL
//!
//! Soft-deleted articles are invisible to every query.

use super::like_pattern;
use crate::db::{Backend, DynDatabasePool};
use crate::models::{Article, ArticleFilter, ArticleStatus};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder, Sqlite, SqlitePool};
use std::sync::Arc;

/// Article repository trait
#[async_trait]
pub trait ArticleRepository: Send + Sync {
    /// Insert an article and return it with its assigned ID
    async fn create(&self, article: &Article) -> Result<Article>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Article>>;

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Article>>;

    /// List articles matching the filter, newest first
    async fn list(&self, filter: &ArticleFilter, offset: i64, limit: i64) -> Result<Vec<Article>>;

    async fn count(&self, filter: &ArticleFilter) -> Result<i64>;

    /// Persist editable fields. Status and counters are left untouched.
    async fn update(&self, article: &Article) -> Result<Option<Article>>;

    /// Move an article to `status`, recording `published_at` when given
    async fn set_status(
        &self,
        id: i64,
        status: ArticleStatus,
        published_at: Option<DateTime<Utc>>,
    ) -> Result<Option<Article>>;

    async fn soft_delete(&self, id: i64) -> Result<bool>;

    /// Check if a slug is taken by a live article, ignoring `exclude_id`
    async fn exists_by_slug(&self, slug: &str, exclude_id: Option<i64>) -> Result<bool>;

    async fn increment_view_count(&self, id: i64) -> Result<bool>;
}

/// SQLx-based article repository implementation
pub struct SqlxArticleRepository {
    pool: DynDatabasePool,
}

impl SqlxArticleRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn ArticleRepository> {
        Arc::new(Self::new(pool))
    }
}

#[derive(sqlx::FromRow)]
struct ArticleRow {
    id: i64,
    title: String,
    slug: String,
    content: String,
    excerpt: Option<String>,
    featured_image: Option<String>,
    status: String,
    author_id: i64,
    category_id: Option<i64>,
    view_count: i64,
    published_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
}

impl TryFrom<ArticleRow> for Article {
    type Error = anyhow::Error;

    fn try_from(row: ArticleRow) -> Result<Self> {
        Ok(Article {
            id: row.id,
            title: row.title,
            slug: row.slug,
            content: row.content,
            excerpt: row.excerpt,
            featured_image: row.featured_image,
            status: row.status.parse()?,
            author_id: row.author_id,
            category_id: row.category_id,
            view_count: row.view_count,
            published_at: row.published_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
            deleted_at: row.deleted_at,
        })
    }
}

fn into_articles(rows: Vec<ArticleRow>) -> Result<Vec<Article>> {
    rows.into_iter().map(Article::try_from).collect()
}

const ARTICLE_COLUMNS: &str = "id, title, slug, content, excerpt, featured_image, status, author_id, \
     category_id, view_count, published_at, created_at, updated_at, deleted_at";

macro_rules! push_article_filters {
    ($builder:ident, $filter:expr, $like:literal) => {
        if let Some(status) = $filter.status {
            $builder.push(" AND status = ");
            $builder.push_bind(status.as_str());
        }
        if let Some(category_id) = $filter.category_id {
            $builder.push(" AND category_id = ");
            $builder.push_bind(category_id);
        }
        if let Some(author_id) = $filter.author_id {
            $builder.push(" AND author_id = ");
            $builder.push_bind(author_id);
        }
        if let Some(search) = $filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            let pattern = like_pattern(search);
            $builder.push(concat!(" AND (title ", $like, " "));
            $builder.push_bind(pattern.clone());
            $builder.push(concat!(" ESCAPE '\\' OR content ", $like, " "));
            $builder.push_bind(pattern);
            $builder.push(" ESCAPE '\\')");
        }
    };
}

#[async_trait]
impl ArticleRepository for SqlxArticleRepository {
    async fn create(&self, article: &Article) -> Result<Article> {
        match self.pool.backend() {
            Backend::Sqlite(p) => sqlite::create(p, article).await,
            Backend::Postgres(p) => postgres::create(p, article).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Article>> {
        let sql = format!(
            "SELECT {} FROM articles WHERE id = {} AND deleted_at IS NULL",
            ARTICLE_COLUMNS,
            self.placeholder(1)
        );
        let row = match self.pool.backend() {
            Backend::Sqlite(p) => sqlx::query_as::<_, ArticleRow>(&sql).bind(id).fetch_optional(p).await,
            Backend::Postgres(p) => sqlx::query_as::<_, ArticleRow>(&sql).bind(id).fetch_optional(p).await,
        }
        .context("Failed to get article by ID")?;
        row.map(Article::try_from).transpose()
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Article>> {
        let sql = format!(
            "SELECT {} FROM articles WHERE slug = {} AND deleted_at IS NULL",
            ARTICLE_COLUMNS,
            self.placeholder(1)
        );
        let row = match self.pool.backend() {
            Backend::Sqlite(p) => sqlx::query_as::<_, ArticleRow>(&sql).bind(slug).fetch_optional(p).await,
            Backend::Postgres(p) => sqlx::query_as::<_, ArticleRow>(&sql).bind(slug).fetch_optional(p).await,
        }
        .context("Failed to get article by slug")?;
        row.map(Article::try_from).transpose()
    }

    async fn list(&self, filter: &ArticleFilter, offset: i64, limit: i64) -> Result<Vec<Article>> {
        match self.pool.backend() {
            Backend::Sqlite(p) => sqlite::list(p, filter, offset, limit).await,
            Backend::Postgres(p) => postgres::list(p, filter, offset, limit).await,
        }
    }

    async fn count(&self, filter: &ArticleFilter) -> Result<i64> {
        match self.pool.backend() {
            Backend::Sqlite(p) => sqlite::count(p, filter).await,
            Backend::Postgres(p) => postgres::count(p, filter).await,
        }
    }

    async fn update(&self, article: &Article) -> Result<Option<Article>> {
        match self.pool.backend() {
            Backend::Sqlite(p) => sqlite::update(p, article).await,
            Backend::Postgres(p) => postgres::update(p, article).await,
        }
    }

    async fn set_status(
        &self,
        id: i64,
        status: ArticleStatus,
        published_at: Option<DateTime<Utc>>,
    ) -> Result<Option<Article>> {
        match self.pool.backend() {
            Backend::Sqlite(p) => sqlite::set_status(p, id, status, published_at).await,
            Backend::Postgres(p) => postgres::set_status(p, id, status, published_at).await,
        }
    }

    async fn soft_delete(&self, id: i64) -> Result<bool> {
        let now = Utc::now();
        let sql = format!(
            "UPDATE articles SET deleted_at = {}, updated_at = {} WHERE id = {} AND deleted_at IS NULL",
            self.placeholder(1),
            self.placeholder(2),
            self.placeholder(3)
        );
        let result = match self.pool.backend() {
            Backend::Sqlite(p) => sqlx::query(&sql).bind(now).bind(now).bind(id).execute(p).await.map(|r| r.rows_affected()),
            Backend::Postgres(p) => sqlx::query(&sql).bind(now).bind(now).bind(id).execute(p).await.map(|r| r.rows_affected()),
        }
        .context("Failed to delete article")?;
        Ok(result > 0)
    }

    async fn exists_by_slug(&self, slug: &str, exclude_id: Option<i64>) -> Result<bool> {
        match self.pool.backend() {
            Backend::Sqlite(p) => sqlite::exists_by_slug(p, slug, exclude_id).await,
            Backend::Postgres(p) => postgres::exists_by_slug(p, slug, exclude_id).await,
        }
    }

    async fn increment_view_count(&self, id: i64) -> Result<bool> {
        let sql = format!(
            "UPDATE articles SET view_count = view_count + 1 WHERE id = {} AND deleted_at IS NULL",
            self.placeholder(1)
        );
        let affected = match self.pool.backend() {
            Backend::Sqlite(p) => sqlx::query(&sql).bind(id).execute(p).await.map(|r| r.rows_affected()),
            Backend::Postgres(p) => sqlx::query(&sql).bind(id).execute(p).await.map(|r| r.rows_affected()),
        }
        .context("Failed to increment view count")?;
        Ok(affected > 0)
    }
}

impl SqlxArticleRepository {
    /// Bind placeholder for the n-th parameter in the active dialect
    fn placeholder(&self, n: usize) -> String {
        match self.pool.backend() {
            Backend::Sqlite(_) => "?".to_string(),
            Backend::Postgres(_) => format!("${}", n),
        }
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

mod sqlite {
    use super::*;

    pub async fn create(pool: &SqlitePool, article: &Article) -> Result<Article> {
        let now = Utc::now();
        let sql = format!(
            "INSERT INTO articles (title, slug, content, excerpt, featured_image, status, author_id, \
             category_id, view_count, published_at, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, 0, ?, ?, ?) RETURNING {}",
            ARTICLE_COLUMNS
        );
        sqlx::query_as::<_, ArticleRow>(&sql)
            .bind(&article.title)
            .bind(&article.slug)
            .bind(&article.content)
            .bind(&article.excerpt)
            .bind(&article.featured_image)
            .bind(article.status.as_str())
            .bind(article.author_id)
            .bind(article.category_id)
            .bind(article.published_at)
            .bind(now)
            .bind(now)
            .fetch_one(pool)
            .await
            .context("Failed to create article")?
            .try_into()
    }

    pub async fn list(pool: &SqlitePool, filter: &ArticleFilter, offset: i64, limit: i64) -> Result<Vec<Article>> {
        let mut builder = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {} FROM articles WHERE deleted_at IS NULL",
            ARTICLE_COLUMNS
        ));
        push_article_filters!(builder, filter, "LIKE");
        builder.push(" ORDER BY COALESCE(published_at, created_at) DESC, id DESC LIMIT ");
        builder.push_bind(limit);
        builder.push(" OFFSET ");
        builder.push_bind(offset);

        let rows = builder
            .build_query_as::<ArticleRow>()
            .fetch_all(pool)
            .await
            .context("Failed to list articles")?;
        into_articles(rows)
    }

    pub async fn count(pool: &SqlitePool, filter: &ArticleFilter) -> Result<i64> {
        let mut builder =
            QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM articles WHERE deleted_at IS NULL");
        push_article_filters!(builder, filter, "LIKE");
        builder
            .build_query_scalar::<i64>()
            .fetch_one(pool)
            .await
            .context("Failed to count articles")
    }

    pub async fn update(pool: &SqlitePool, article: &Article) -> Result<Option<Article>> {
        let sql = format!(
            "UPDATE articles SET title = ?, slug = ?, content = ?, excerpt = ?, featured_image = ?, \
             category_id = ?, updated_at = ? WHERE id = ? AND deleted_at IS NULL RETURNING {}",
            ARTICLE_COLUMNS
        );
        sqlx::query_as::<_, ArticleRow>(&sql)
            .bind(&article.title)
            .bind(&article.slug)
            .bind(&article.content)
            .bind(&article.excerpt)
            .bind(&article.featured_image)
            .bind(article.category_id)
            .bind(Utc::now())
            .bind(article.id)
            .fetch_optional(pool)
            .await
            .context("Failed to update article")?
            .map(Article::try_from)
            .transpose()
    }

    pub async fn set_status(
        pool: &SqlitePool,
        id: i64,
        status: ArticleStatus,
        published_at: Option<DateTime<Utc>>,
    ) -> Result<Option<Article>> {
        let sql = format!(
            "UPDATE articles SET status = ?, published_at = COALESCE(?, published_at), updated_at = ? \
             WHERE id = ? AND deleted_at IS NULL RETURNING {}",
            ARTICLE_COLUMNS
        );
        sqlx::query_as::<_, ArticleRow>(&sql)
            .bind(status.as_str())
            .bind(published_at)
            .bind(Utc::now())
            .bind(id)
            .fetch_optional(pool)
            .await
            .context("Failed to update article status")?
            .map(Article::try_from)
            .transpose()
    }

    pub async fn exists_by_slug(pool: &SqlitePool, slug: &str, exclude_id: Option<i64>) -> Result<bool> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM articles WHERE slug = ? AND deleted_at IS NULL AND (? IS NULL OR id != ?)",
        )
        .bind(slug)
        .bind(exclude_id)
        .bind(exclude_id)
        .fetch_one(pool)
        .await
        .context("Failed to check article slug")?;
        Ok(count > 0)
    }
}

// ============================================================================
// PostgreSQL implementations
// ============================================================================

mod postgres {
    use super::*;

    pub async fn create(pool: &PgPool, article: &Article) -> Result<Article> {
        let now = Utc::now();
        let sql = format!(
            "INSERT INTO articles (title, slug, content, excerpt, featured_image, status, author_id, \
             category_id, view_count, published_at, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 0, $9, $10, $11) RETURNING {}",
            ARTICLE_COLUMNS
        );
        sqlx::query_as::<_, ArticleRow>(&sql)
            .bind(&article.title)
            .bind(&article.slug)
            .bind(&article.content)
            .bind(&article.excerpt)
            .bind(&article.featured_image)
            .bind(article.status.as_str())
            .bind(article.author_id)
            .bind(article.category_id)
            .bind(article.published_at)
            .bind(now)
            .bind(now)
            .fetch_one(pool)
            .await
            .context("Failed to create article")?
            .try_into()
    }

    pub async fn list(pool: &PgPool, filter: &ArticleFilter, offset: i64, limit: i64) -> Result<Vec<Article>> {
        let mut builder = QueryBuilder::<Postgres>::new(format!(
            "SELECT {} FROM articles WHERE deleted_at IS NULL",
            ARTICLE_COLUMNS
        ));
        push_article_filters!(builder, filter, "ILIKE");
        builder.push(" ORDER BY COALESCE(published_at, created_at) DESC, id DESC LIMIT ");
        builder.push_bind(limit);
        builder.push(" OFFSET ");
        builder.push_bind(offset);

        let rows = builder
            .build_query_as::<ArticleRow>()
            .fetch_all(pool)
            .await
            .context("Failed to list articles")?;
        into_articles(rows)
    }

    pub async fn count(pool: &PgPool, filter: &ArticleFilter) -> Result<i64> {
        let mut builder =
            QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM articles WHERE deleted_at IS NULL");
        push_article_filters!(builder, filter, "ILIKE");
        builder
            .build_query_scalar::<i64>()
            .fetch_one(pool)
            .await
            .context("Failed to count articles")
    }

    pub async fn update(pool: &PgPool, article: &Article) -> Result<Option<Article>> {
        let sql = format!(
            "UPDATE articles SET title = $1, slug = $2, content = $3, excerpt = $4, featured_image = $5, \
             category_id = $6, updated_at = $7 WHERE id = $8 AND deleted_at IS NULL RETURNING {}",
            ARTICLE_COLUMNS
        );
        sqlx::query_as::<_, ArticleRow>(&sql)
            .bind(&article.title)
            .bind(&article.slug)
            .bind(&article.content)
            .bind(&article.excerpt)
            .bind(&article.featured_image)
            .bind(article.category_id)
            .bind(Utc::now())
            .bind(article.id)
            .fetch_optional(pool)
            .await
            .context("Failed to update article")?
            .map(Article::try_from)
            .transpose()
    }

    pub async fn set_status(
        pool: &PgPool,
        id: i64,
        status: ArticleStatus,
        published_at: Option<DateTime<Utc>>,
    ) -> Result<Option<Article>> {
        let sql = format!(
            "UPDATE articles SET status = $1, published_at = COALESCE($2, published_at), updated_at = $3 \
             WHERE id = $4 AND deleted_at IS NULL RETURNING {}",
            ARTICLE_COLUMNS
        );
        sqlx::query_as::<_, ArticleRow>(&sql)
            .bind(status.as_str())
            .bind(published_at)
            .bind(Utc::now())
            .bind(id)
            .fetch_optional(pool)
            .await
            .context("Failed to update article status")?
            .map(Article::try_from)
            .transpose()
    }

    pub async fn exists_by_slug(pool: &PgPool, slug: &str, exclude_id: Option<i64>) -> Result<bool> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM articles WHERE slug = $1 AND deleted_at IS NULL \
             AND ($2::BIGINT IS NULL OR id != $2)",
        )
        .bind(slug)
        .bind(exclude_id)
        .fetch_one(pool)
        .await
        .context("Failed to check article slug")?;
        Ok(count > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{SqlxUserRepository, UserRepository};
    use crate::db::{create_test_pool, migrations};
    use crate::models::{User, UserRole};

    async fn setup_test_repo() -> (SqlxArticleRepository, i64) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        let author = SqlxUserRepository::new(pool.clone())
            .create(&User::new(
                "author".to_string(),
                "author@example.com".to_string(),
                "hash".to_string(),
                None,
                UserRole::User,
            ))
            .await
            .expect("Failed to create author");
        (SqlxArticleRepository::new(pool), author.id)
    }

    fn draft(author_id: i64, title: &str, slug: &str) -> Article {
        let now = Utc::now();
        Article {
            id: 0,
            title: title.to_string(),
            slug: slug.to_string(),
            content: format!("Body of {}", title),
            excerpt: None,
            featured_image: None,
            status: ArticleStatus::Draft,
            author_id,
            category_id: None,
            view_count: 0,
            published_at: None,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    #[tokio::test]
    async fn test_create_and_get_article() {
        let (repo, author) = setup_test_repo().await;
        let created = repo.create(&draft(author, "Hello", "hello")).await.unwrap();

        assert!(created.id > 0);
        assert_eq!(created.status, ArticleStatus::Draft);
        assert_eq!(created.view_count, 0);

        let by_id = repo.get_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(by_id.title, "Hello");
        assert_eq!(by_id.content, "Body of Hello");
        let by_slug = repo.get_by_slug("hello").await.unwrap().unwrap();
        assert_eq!(by_slug.id, created.id);
    }

    #[tokio::test]
    async fn test_update_leaves_status_alone() {
        let (repo, author) = setup_test_repo().await;
        let mut article = repo.create(&draft(author, "Hello", "hello")).await.unwrap();

        article.title = "Hello again".to_string();
        article.status = ArticleStatus::Archived;
        let updated = repo.update(&article).await.unwrap().unwrap();

        assert_eq!(updated.title, "Hello again");
        assert_eq!(updated.status, ArticleStatus::Draft);
    }

    #[tokio::test]
    async fn test_set_status_keeps_first_published_at() {
        let (repo, author) = setup_test_repo().await;
        let article = repo.create(&draft(author, "Hello", "hello")).await.unwrap();

        let published = repo
            .set_status(article.id, ArticleStatus::Published, Some(Utc::now()))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(published.status, ArticleStatus::Published);
        let first = published.published_at.expect("published_at set");

        let archived = repo
            .set_status(article.id, ArticleStatus::Archived, None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(archived.status, ArticleStatus::Archived);
        assert_eq!(archived.published_at, Some(first));
    }

    #[tokio::test]
    async fn test_soft_delete_hides_article() {
        let (repo, author) = setup_test_repo().await;
        let article = repo.create(&draft(author, "Hello", "hello")).await.unwrap();

        assert!(repo.soft_delete(article.id).await.unwrap());
        assert!(repo.get_by_id(article.id).await.unwrap().is_none());
        assert!(repo.get_by_slug("hello").await.unwrap().is_none());
        assert!(!repo.exists_by_slug("hello", None).await.unwrap());
        assert!(!repo.soft_delete(article.id).await.unwrap());

        // The slug is free again
        repo.create(&draft(author, "Hello", "hello")).await.unwrap();
    }

    #[tokio::test]
    async fn test_exists_by_slug_excluding() {
        let (repo, author) = setup_test_repo().await;
        let article = repo.create(&draft(author, "Hello", "hello")).await.unwrap();

        assert!(repo.exists_by_slug("hello", None).await.unwrap());
        assert!(!repo.exists_by_slug("hello", Some(article.id)).await.unwrap());
    }

    #[tokio::test]
    async fn test_increment_view_count() {
        let (repo, author) = setup_test_repo().await;
        let article = repo.create(&draft(author, "Hello", "hello")).await.unwrap();

        repo.increment_view_count(article.id).await.unwrap();
        repo.increment_view_count(article.id).await.unwrap();
        let found = repo.get_by_id(article.id).await.unwrap().unwrap();
        assert_eq!(found.view_count, 2);
        assert!(!repo.increment_view_count(999).await.unwrap());
    }

    #[tokio::test]
    async fn test_list_filters() {
        let (repo, author) = setup_test_repo().await;
        let rust = repo.create(&draft(author, "Learning Rust", "learning-rust")).await.unwrap();
        repo.create(&draft(author, "Cooking pasta", "cooking-pasta")).await.unwrap();
        repo.set_status(rust.id, ArticleStatus::Published, Some(Utc::now()))
            .await
            .unwrap();

        let published = ArticleFilter::published();
        assert_eq!(repo.count(&published).await.unwrap(), 1);
        let items = repo.list(&published, 0, 10).await.unwrap();
        assert_eq!(items[0].slug, "learning-rust");

        let search = ArticleFilter {
            search: Some("PASTA".to_string()),
            ..Default::default()
        };
        assert_eq!(repo.count(&search).await.unwrap(), 1);

        let by_author = ArticleFilter {
            author_id: Some(author),
            ..Default::default()
        };
        assert_eq!(repo.count(&by_author).await.unwrap(), 2);
        assert_eq!(repo.list(&by_author, 1, 10).await.unwrap().len(), 1);

        let other_author = ArticleFilter {
            author_id: Some(author + 100),
            ..Default::default()
        };
        assert_eq!(repo.count(&other_author).await.unwrap(), 0);
    }
}
