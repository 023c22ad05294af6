//! Article model
//!
//! This module provides:
//! - `Article` entity
//! - `ArticleStatus` and its allowed transitions
//! - Input and filter types used by the article service

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Article entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    pub id: i64,
    pub title: String,
    /// URL-friendly slug, unique among live articles
    pub slug: String,
    pub content: String,
    pub excerpt: Option<String>,
    /// Cover image URL, required before publishing
    pub featured_image: Option<String>,
    pub status: ArticleStatus,
    pub author_id: i64,
    pub category_id: Option<i64>,
    pub view_count: i64,
    /// Set when the article is first published
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing)]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Article {
    pub fn is_published(&self) -> bool {
        self.status == ArticleStatus::Published
    }

    pub fn has_featured_image(&self) -> bool {
        self.featured_image
            .as_deref()
            .is_some_and(|s| !s.trim().is_empty())
    }
}

/// Article publication status.
///
/// Transitions only move forward: draft → published → archived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArticleStatus {
    /// Not visible to the public
    #[default]
    Draft,
    /// Visible to the public
    Published,
    /// Hidden but kept
    Archived,
}

impl ArticleStatus {
    /// Database string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            ArticleStatus::Draft => "draft",
            ArticleStatus::Published => "published",
            ArticleStatus::Archived => "archived",
        }
    }

    pub fn can_transition_to(&self, next: ArticleStatus) -> bool {
        matches!(
            (self, next),
            (ArticleStatus::Draft, ArticleStatus::Published)
                | (ArticleStatus::Published, ArticleStatus::Archived)
        )
    }
}

impl fmt::Display for ArticleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ArticleStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "draft" => Ok(ArticleStatus::Draft),
            "published" => Ok(ArticleStatus::Published),
            "archived" => Ok(ArticleStatus::Archived),
            _ => Err(anyhow::anyhow!("Invalid article status: {}", s)),
        }
    }
}

/// Input for creating an article. New articles always start as drafts.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateArticleInput {
    pub title: String,
    /// Generated from the title when empty
    #[serde(default)]
    pub slug: Option<String>,
    pub content: String,
    #[serde(default)]
    pub excerpt: Option<String>,
    #[serde(default)]
    pub featured_image: Option<String>,
    #[serde(default)]
    pub category_id: Option<i64>,
}

/// Partial article update. Status changes go through publish/archive.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateArticleInput {
    pub title: Option<String>,
    pub slug: Option<String>,
    pub content: Option<String>,
    pub excerpt: Option<String>,
    pub featured_image: Option<String>,
    pub category_id: Option<i64>,
}

impl UpdateArticleInput {
    pub fn has_changes(&self) -> bool {
        self.title.is_some()
            || self.slug.is_some()
            || self.content.is_some()
            || self.excerpt.is_some()
            || self.featured_image.is_some()
            || self.category_id.is_some()
    }
}

/// Filters for the article list
#[derive(Debug, Clone, Default)]
pub struct ArticleFilter {
    pub status: Option<ArticleStatus>,
    pub category_id: Option<i64>,
    pub author_id: Option<i64>,
    /// Case-insensitive match on title or content
    pub search: Option<String>,
}

impl ArticleFilter {
    pub fn published() -> Self {
        Self {
            status: Some(ArticleStatus::Published),
            ..Default::default()
        }
    }
}
