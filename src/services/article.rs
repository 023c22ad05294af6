//! Article service
//!
//! Implements business logic for article management:
//! - Create, read, update, soft-delete articles
//! - Slug generation and uniqueness
//! - Category existence checks
//! - Publication workflow (draft → published → archived)
//! - View counting for published articles
//!
//! Only the author or an admin may modify an article.

use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;

use super::error::{map_write_error, ServiceError, ServiceResult};
use super::validation::{
    normalize_optional, resolve_slug, validate_length, validate_optional_length, validate_url,
};
use crate::db::repositories::{ArticleRepository, CategoryRepository};
use crate::models::{
    Article, ArticleFilter, ArticleStatus, CreateArticleInput, ListParams, PagedResult,
    UpdateArticleInput, User,
};

const TITLE_MAX: usize = 200;
const CONTENT_MAX: usize = 100_000;
const EXCERPT_MAX: usize = 500;

/// Article service for managing articles
pub struct ArticleService {
    repo: Arc<dyn ArticleRepository>,
    category_repo: Arc<dyn CategoryRepository>,
}

impl ArticleService {
    pub fn new(repo: Arc<dyn ArticleRepository>, category_repo: Arc<dyn CategoryRepository>) -> Self {
        Self {
            repo,
            category_repo,
        }
    }

    /// Create a new draft owned by `author`
    ///
    /// # Errors
    /// - `Validation` for out-of-range fields or an unknown category
    /// - `Conflict` if the slug is taken by a live article
    pub async fn create(&self, author: &User, input: CreateArticleInput) -> ServiceResult<Article> {
        let title = input.title.trim().to_string();
        validate_length("title", &title, 1, TITLE_MAX)?;
        validate_length("content", &input.content, 1, CONTENT_MAX)?;
        let excerpt = normalize_optional(input.excerpt);
        validate_optional_length("excerpt", excerpt.as_deref(), EXCERPT_MAX)?;
        let featured_image = normalize_optional(input.featured_image);
        if let Some(url) = &featured_image {
            validate_url("featured_image", url)?;
        }

        let slug = resolve_slug(input.slug.as_deref(), &title)?;
        self.ensure_slug_free(&slug, None).await?;
        if let Some(category_id) = input.category_id {
            self.ensure_category_exists(category_id).await?;
        }

        let now = Utc::now();
        let article = Article {
            id: 0,
            title,
            slug,
            content: input.content,
            excerpt,
            featured_image,
            status: ArticleStatus::Draft,
            author_id: author.id,
            category_id: input.category_id,
            view_count: 0,
            published_at: None,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };

        let created = self
            .repo
            .create(&article)
            .await
            .map_err(|e| map_write_error(e, || format!("Article slug already exists: {}", article.slug)))?;

        tracing::info!(article_id = created.id, author_id = author.id, slug = %created.slug, "Article created");
        Ok(created)
    }

    /// Get an article by ID regardless of status
    pub async fn get(&self, id: i64) -> ServiceResult<Article> {
        self.repo
            .get_by_id(id)
            .await
            .context("Failed to get article")?
            .ok_or_else(|| ServiceError::not_found(format!("Article not found: {}", id)))
    }

    /// Get an article as seen by `viewer`.
    ///
    /// Unpublished articles are reported as missing to everyone except
    /// their author and admins.
    pub async fn get_visible(&self, id: i64, viewer: Option<&User>) -> ServiceResult<Article> {
        let article = self.get(id).await?;
        let privileged = viewer.is_some_and(|u| u.can_manage(article.author_id));
        if !article.is_published() && !privileged {
            return Err(ServiceError::not_found(format!("Article not found: {}", id)));
        }
        Ok(article)
    }

    pub async fn get_by_slug(&self, slug: &str) -> ServiceResult<Article> {
        self.repo
            .get_by_slug(slug)
            .await
            .context("Failed to get article")?
            .ok_or_else(|| ServiceError::not_found(format!("Article not found: {}", slug)))
    }

    /// Fetch a published article by slug and count the view
    pub async fn view(&self, slug: &str) -> ServiceResult<Article> {
        let mut article = self.get_by_slug(slug).await?;
        if !article.is_published() {
            return Err(ServiceError::not_found(format!("Article not found: {}", slug)));
        }

        if self
            .repo
            .increment_view_count(article.id)
            .await
            .context("Failed to count view")?
        {
            article.view_count += 1;
        }
        Ok(article)
    }

    /// List articles, newest first
    pub async fn list(&self, filter: &ArticleFilter, params: &ListParams) -> ServiceResult<PagedResult<Article>> {
        let total = self.repo.count(filter).await.context("Failed to count articles")?;
        let items = self
            .repo
            .list(filter, params.offset(), params.limit())
            .await
            .context("Failed to list articles")?;
        Ok(PagedResult::new(items, total, params))
    }

    /// Apply a partial update.
    ///
    /// A blank `excerpt` or `featured_image` clears the field; a blank
    /// `slug` regenerates it from the title. Published articles must keep
    /// their featured image.
    pub async fn update(&self, actor: &User, id: i64, input: UpdateArticleInput) -> ServiceResult<Article> {
        let mut article = self.get(id).await?;
        ensure_can_modify(actor, &article)?;
        if !input.has_changes() {
            return Ok(article);
        }

        if let Some(title) = input.title {
            let title = title.trim().to_string();
            validate_length("title", &title, 1, TITLE_MAX)?;
            article.title = title;
        }
        if let Some(slug) = input.slug {
            let slug = resolve_slug(Some(&slug), &article.title)?;
            if slug != article.slug {
                self.ensure_slug_free(&slug, Some(id)).await?;
            }
            article.slug = slug;
        }
        if let Some(content) = input.content {
            validate_length("content", &content, 1, CONTENT_MAX)?;
            article.content = content;
        }
        if let Some(excerpt) = input.excerpt {
            let excerpt = normalize_optional(Some(excerpt));
            validate_optional_length("excerpt", excerpt.as_deref(), EXCERPT_MAX)?;
            article.excerpt = excerpt;
        }
        if let Some(image) = input.featured_image {
            let image = normalize_optional(Some(image));
            match &image {
                Some(url) => validate_url("featured_image", url)?,
                None if article.is_published() => {
                    return Err(ServiceError::validation(
                        "featured_image cannot be removed from a published article",
                    ))
                }
                None => {}
            }
            article.featured_image = image;
        }
        if let Some(category_id) = input.category_id {
            self.ensure_category_exists(category_id).await?;
            article.category_id = Some(category_id);
        }

        let updated = self
            .repo
            .update(&article)
            .await
            .map_err(|e| map_write_error(e, || format!("Article slug already exists: {}", article.slug)))?
            .ok_or_else(|| ServiceError::not_found(format!("Article not found: {}", id)))?;

        tracing::info!(article_id = id, actor_id = actor.id, "Article updated");
        Ok(updated)
    }

    /// Publish a draft. Requires a featured image.
    pub async fn publish(&self, actor: &User, id: i64) -> ServiceResult<Article> {
        let article = self.get(id).await?;
        ensure_can_modify(actor, &article)?;
        ensure_transition(&article, ArticleStatus::Published)?;
        if !article.has_featured_image() {
            return Err(ServiceError::validation(
                "featured_image is required to publish an article",
            ));
        }

        let published = self
            .repo
            .set_status(id, ArticleStatus::Published, Some(Utc::now()))
            .await
            .context("Failed to publish article")?
            .ok_or_else(|| ServiceError::not_found(format!("Article not found: {}", id)))?;

        tracing::info!(article_id = id, actor_id = actor.id, "Article published");
        Ok(published)
    }

    /// Archive a published article
    pub async fn archive(&self, actor: &User, id: i64) -> ServiceResult<Article> {
        let article = self.get(id).await?;
        ensure_can_modify(actor, &article)?;
        ensure_transition(&article, ArticleStatus::Archived)?;

        let archived = self
            .repo
            .set_status(id, ArticleStatus::Archived, None)
            .await
            .context("Failed to archive article")?
            .ok_or_else(|| ServiceError::not_found(format!("Article not found: {}", id)))?;

        tracing::info!(article_id = id, actor_id = actor.id, "Article archived");
        Ok(archived)
    }

    /// Soft-delete an article
    pub async fn delete(&self, actor: &User, id: i64) -> ServiceResult<()> {
        let article = self.get(id).await?;
        ensure_can_modify(actor, &article)?;

        let deleted = self.repo.soft_delete(id).await.context("Failed to delete article")?;
        if !deleted {
            return Err(ServiceError::not_found(format!("Article not found: {}", id)));
        }
        tracing::info!(article_id = id, actor_id = actor.id, "Article deleted");
        Ok(())
    }

    async fn ensure_slug_free(&self, slug: &str, exclude_id: Option<i64>) -> ServiceResult<()> {
        if self
            .repo
            .exists_by_slug(slug, exclude_id)
            .await
            .context("Failed to check article slug")?
        {
            return Err(ServiceError::conflict(format!("Article slug already exists: {}", slug)));
        }
        Ok(())
    }

    async fn ensure_category_exists(&self, category_id: i64) -> ServiceResult<()> {
        let category = self
            .category_repo
            .get_by_id(category_id)
            .await
            .context("Failed to check category")?;
        if category.is_none() {
            return Err(ServiceError::validation(format!(
                "category_id does not exist: {}",
                category_id
            )));
        }
        Ok(())
    }
}

fn ensure_can_modify(actor: &User, article: &Article) -> ServiceResult<()> {
    if actor.can_manage(article.author_id) {
        Ok(())
    } else {
        Err(ServiceError::forbidden("Only the author or an admin may modify this article"))
    }
}

fn ensure_transition(article: &Article, next: ArticleStatus) -> ServiceResult<()> {
    if article.status.can_transition_to(next) {
        Ok(())
    } else {
        Err(ServiceError::conflict(format!(
            "Cannot move article from {} to {}",
            article.status, next
        )))
    }
}
