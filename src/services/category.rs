//! Category service
//!
//! Implements business logic for category management:
//! - Create, read, update, delete categories
//! - Name uniqueness
//! - Slug generation from name
//! - Deleting a category leaves its articles uncategorized

use std::sync::Arc;

use anyhow::Context;

use super::error::{map_write_error, ServiceError, ServiceResult};
use super::validation::{normalize_optional, resolve_slug, validate_length, validate_optional_length};
use crate::db::repositories::CategoryRepository;
use crate::models::{Category, CreateCategoryInput, UpdateCategoryInput};

const NAME_MAX: usize = 100;
const DESCRIPTION_MAX: usize = 500;

/// Category service for managing article categories
pub struct CategoryService {
    repo: Arc<dyn CategoryRepository>,
}

impl CategoryService {
    pub fn new(repo: Arc<dyn CategoryRepository>) -> Self {
        Self { repo }
    }

    /// Create a new category
    ///
    /// # Errors
    /// - `Validation` if the name, slug or description is out of range
    /// - `Conflict` if the name or slug is already taken
    pub async fn create(&self, input: CreateCategoryInput) -> ServiceResult<Category> {
        let name = input.name.trim().to_string();
        validate_length("name", &name, 1, NAME_MAX)?;
        let description = normalize_optional(input.description);
        validate_optional_length("description", description.as_deref(), DESCRIPTION_MAX)?;

        let slug = resolve_slug(input.slug.as_deref(), &name)?;

        self.ensure_name_free(&name, None).await?;
        self.ensure_slug_free(&slug, None).await?;

        let category = self
            .repo
            .create(&name, &slug, description.as_deref())
            .await
            .map_err(|e| map_write_error(e, || format!("Category '{}' already exists", name)))?;

        tracing::info!(category_id = category.id, slug = %category.slug, "Category created");
        Ok(category)
    }

    pub async fn get(&self, id: i64) -> ServiceResult<Category> {
        self.repo
            .get_by_id(id)
            .await
            .context("Failed to get category")?
            .ok_or_else(|| ServiceError::not_found(format!("Category not found: {}", id)))
    }

    pub async fn get_by_slug(&self, slug: &str) -> ServiceResult<Category> {
        self.repo
            .get_by_slug(slug)
            .await
            .context("Failed to get category")?
            .ok_or_else(|| ServiceError::not_found(format!("Category not found: {}", slug)))
    }

    /// All categories ordered by name
    pub async fn list(&self) -> ServiceResult<Vec<Category>> {
        Ok(self.repo.list().await.context("Failed to list categories")?)
    }

    /// Apply a partial update. A blank description clears it.
    pub async fn update(&self, id: i64, input: UpdateCategoryInput) -> ServiceResult<Category> {
        let mut category = self.get(id).await?;
        if !input.has_changes() {
            return Ok(category);
        }

        if let Some(name) = input.name {
            let name = name.trim().to_string();
            validate_length("name", &name, 1, NAME_MAX)?;
            if name != category.name {
                self.ensure_name_free(&name, Some(id)).await?;
            }
            category.name = name;
        }
        if let Some(slug) = input.slug {
            let slug = resolve_slug(Some(&slug), &category.name)?;
            if slug != category.slug {
                self.ensure_slug_free(&slug, Some(id)).await?;
            }
            category.slug = slug;
        }
        if let Some(description) = input.description {
            let description = normalize_optional(Some(description));
            validate_optional_length("description", description.as_deref(), DESCRIPTION_MAX)?;
            category.description = description;
        }

        let updated = self
            .repo
            .update(&category)
            .await
            .map_err(|e| map_write_error(e, || "Category name or slug already exists".to_string()))?
            .ok_or_else(|| ServiceError::not_found(format!("Category not found: {}", id)))?;

        tracing::info!(category_id = id, "Category updated");
        Ok(updated)
    }

    /// Delete a category; its articles become uncategorized
    pub async fn delete(&self, id: i64) -> ServiceResult<()> {
        let deleted = self.repo.delete(id).await.context("Failed to delete category")?;
        if !deleted {
            return Err(ServiceError::not_found(format!("Category not found: {}", id)));
        }
        tracing::info!(category_id = id, "Category deleted");
        Ok(())
    }

    async fn ensure_name_free(&self, name: &str, exclude_id: Option<i64>) -> ServiceResult<()> {
        let existing = self
            .repo
            .get_by_name(name)
            .await
            .context("Failed to check category name")?;
        match existing {
            Some(other) if Some(other.id) != exclude_id => Err(ServiceError::conflict(format!(
                "Category name already exists: {}",
                name
            ))),
            _ => Ok(()),
        }
    }

    async fn ensure_slug_free(&self, slug: &str, exclude_id: Option<i64>) -> ServiceResult<()> {
        if self
            .repo
            .exists_by_slug(slug, exclude_id)
            .await
            .context("Failed to check category slug")?
        {
            return Err(ServiceError::conflict(format!(
                "Category slug already exists: {}",
                slug
            )));
        }
        Ok(())
    }
}
