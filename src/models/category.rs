//! Category model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Article category. Deleting one leaves its articles uncategorized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    /// Display name (unique)
    pub name: String,
    /// URL-friendly slug (unique)
    pub slug: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a category. An empty slug is generated from the name.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateCategoryInput {
    pub name: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Partial category update
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateCategoryInput {
    pub name: Option<String>,
    pub slug: Option<String>,
    pub description: Option<String>,
}

impl UpdateCategoryInput {
    pub fn has_changes(&self) -> bool {
        self.name.is_some() || self.slug.is_some() || self.description.is_some()
    }
}
