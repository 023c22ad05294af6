//! Product model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Catalog product. Prices are integer cents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub name: String,
    /// Stock keeping unit, upper-case and unique
    pub sku: String,
    pub description: Option<String>,
    pub price_cents: i64,
    pub stock: i64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateProductInput {
    pub name: String,
    pub sku: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price_cents: i64,
    #[serde(default)]
    pub stock: i64,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

/// Partial product update
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateProductInput {
    pub name: Option<String>,
    pub sku: Option<String>,
    pub description: Option<String>,
    pub price_cents: Option<i64>,
    pub stock: Option<i64>,
    pub is_active: Option<bool>,
}

impl UpdateProductInput {
    pub fn has_changes(&self) -> bool {
        self.name.is_some()
            || self.sku.is_some()
            || self.description.is_some()
            || self.price_cents.is_some()
            || self.stock.is_some()
            || self.is_active.is_some()
    }
}

/// Filters for the product list
#[derive(Debug, Clone, Default)]
pub struct ProductFilter {
    /// Case-insensitive match on name or sku
    pub search: Option<String>,
    pub min_price_cents: Option<i64>,
    pub max_price_cents: Option<i64>,
    pub is_active: Option<bool>,
}
