//! Product service
//!
//! Catalog CRUD with SKU normalization and uniqueness. Products are
//! hard-deleted.

use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;

use super::error::{map_write_error, ServiceError, ServiceResult};
use super::validation::{normalize_optional, normalize_sku, validate_length, validate_optional_length};
use crate::db::repositories::ProductRepository;
use crate::models::{
    CreateProductInput, ListParams, PagedResult, Product, ProductFilter, UpdateProductInput,
};

const NAME_MAX: usize = 200;
const DESCRIPTION_MAX: usize = 5000;

pub struct ProductService {
    repo: Arc<dyn ProductRepository>,
}

impl ProductService {
    pub fn new(repo: Arc<dyn ProductRepository>) -> Self {
        Self { repo }
    }

    pub async fn create(&self, input: CreateProductInput) -> ServiceResult<Product> {
        let name = input.name.trim().to_string();
        validate_length("name", &name, 1, NAME_MAX)?;
        let sku = normalize_sku(&input.sku)?;
        let description = normalize_optional(input.description);
        validate_optional_length("description", description.as_deref(), DESCRIPTION_MAX)?;
        validate_non_negative("price_cents", input.price_cents)?;
        validate_non_negative("stock", input.stock)?;

        self.ensure_sku_free(&sku, None).await?;

        let now = Utc::now();
        let product = Product {
            id: 0,
            name,
            sku,
            description,
            price_cents: input.price_cents,
            stock: input.stock,
            is_active: input.is_active,
            created_at: now,
            updated_at: now,
        };

        let created = self
            .repo
            .create(&product)
            .await
            .map_err(|e| map_write_error(e, || format!("SKU already exists: {}", product.sku)))?;

        tracing::info!(product_id = created.id, sku = %created.sku, "Product created");
        Ok(created)
    }

    pub async fn get(&self, id: i64) -> ServiceResult<Product> {
        self.repo
            .get_by_id(id)
            .await
            .context("Failed to get product")?
            .ok_or_else(|| ServiceError::not_found(format!("Product not found: {}", id)))
    }

    pub async fn list(&self, filter: &ProductFilter, params: &ListParams) -> ServiceResult<PagedResult<Product>> {
        if let (Some(min), Some(max)) = (filter.min_price_cents, filter.max_price_cents) {
            if min > max {
                return Err(ServiceError::validation("min_price must not exceed max_price"));
            }
        }

        let total = self.repo.count(filter).await.context("Failed to count products")?;
        let items = self
            .repo
            .list(filter, params.offset(), params.limit())
            .await
            .context("Failed to list products")?;
        Ok(PagedResult::new(items, total, params))
    }

    /// Apply a partial update. A blank description clears it.
    pub async fn update(&self, id: i64, input: UpdateProductInput) -> ServiceResult<Product> {
        let mut product = self.get(id).await?;
        if !input.has_changes() {
            return Ok(product);
        }

        if let Some(name) = input.name {
            let name = name.trim().to_string();
            validate_length("name", &name, 1, NAME_MAX)?;
            product.name = name;
        }
        if let Some(sku) = input.sku {
            let sku = normalize_sku(&sku)?;
            if sku != product.sku {
                self.ensure_sku_free(&sku, Some(id)).await?;
            }
            product.sku = sku;
        }
        if let Some(description) = input.description {
            let description = normalize_optional(Some(description));
            validate_optional_length("description", description.as_deref(), DESCRIPTION_MAX)?;
            product.description = description;
        }
        if let Some(price) = input.price_cents {
            validate_non_negative("price_cents", price)?;
            product.price_cents = price;
        }
        if let Some(stock) = input.stock {
            validate_non_negative("stock", stock)?;
            product.stock = stock;
        }
        if let Some(is_active) = input.is_active {
            product.is_active = is_active;
        }

        let updated = self
            .repo
            .update(&product)
            .await
            .map_err(|e| map_write_error(e, || format!("SKU already exists: {}", product.sku)))?
            .ok_or_else(|| ServiceError::not_found(format!("Product not found: {}", id)))?;

        tracing::info!(product_id = id, "Product updated");
        Ok(updated)
    }

    pub async fn delete(&self, id: i64) -> ServiceResult<()> {
        let deleted = self.repo.delete(id).await.context("Failed to delete product")?;
        if !deleted {
            return Err(ServiceError::not_found(format!("Product not found: {}", id)));
        }
        tracing::info!(product_id = id, "Product deleted");
        Ok(())
    }

    async fn ensure_sku_free(&self, sku: &str, exclude_id: Option<i64>) -> ServiceResult<()> {
        if self
            .repo
            .exists_by_sku(sku, exclude_id)
            .await
            .context("Failed to check SKU")?
        {
            return Err(ServiceError::conflict(format!("SKU already exists: {}", sku)));
        }
        Ok(())
    }
}

fn validate_non_negative(field: &str, value: i64) -> ServiceResult<()> {
    if value < 0 {
        return Err(ServiceError::validation(format!("{} must not be negative", field)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::SqlxProductRepository;
    use crate::db::{create_test_pool, migrations};

    async fn setup_test_service() -> ProductService {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        ProductService::new(SqlxProductRepository::boxed(pool))
    }

    fn input(name: &str, sku: &str, price_cents: i64) -> CreateProductInput {
        CreateProductInput {
            name: name.to_string(),
            sku: sku.to_string(),
            description: None,
            price_cents,
            stock: 10,
            is_active: true,
        }
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let service = setup_test_service().await;
        let product = service.create(input("Widget", "wid-001", 1999)).await.unwrap();

        assert_eq!(product.sku, "WID-001");
        assert_eq!(product.price_cents, 1999);
        assert_eq!(service.get(product.id).await.unwrap(), product);
    }

    #[tokio::test]
    async fn test_negative_values_rejected() {
        let service = setup_test_service().await;
        assert!(matches!(
            service.create(input("Widget", "WID-001", -1)).await,
            Err(ServiceError::Validation(_))
        ));

        let mut negative_stock = input("Widget", "WID-001", 100);
        negative_stock.stock = -5;
        assert!(matches!(
            service.create(negative_stock).await,
            Err(ServiceError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_sku_conflict_is_case_insensitive() {
        let service = setup_test_service().await;
        service.create(input("Widget", "WID-001", 100)).await.unwrap();
        assert!(matches!(
            service.create(input("Other", "wid-001", 100)).await,
            Err(ServiceError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_partial_update() {
        let service = setup_test_service().await;
        let product = service.create(input("Widget", "WID-001", 100)).await.unwrap();

        let update = UpdateProductInput {
            price_cents: Some(250),
            ..Default::default()
        };
        let updated = service.update(product.id, update).await.unwrap();
        assert_eq!(updated.price_cents, 250);
        assert_eq!(updated.name, "Widget");
        assert_eq!(updated.stock, 10);

        let bad = UpdateProductInput {
            stock: Some(-1),
            ..Default::default()
        };
        assert!(matches!(service.update(product.id, bad).await, Err(ServiceError::Validation(_))));
    }

    #[tokio::test]
    async fn test_delete() {
        let service = setup_test_service().await;
        let product = service.create(input("Widget", "WID-001", 100)).await.unwrap();

        service.delete(product.id).await.unwrap();
        assert!(matches!(service.get(product.id).await, Err(ServiceError::NotFound(_))));
        assert!(matches!(service.delete(product.id).await, Err(ServiceError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_list_price_range() {
        let service = setup_test_service().await;
        service.create(input("Cheap", "CHP-001", 100)).await.unwrap();
        service.create(input("Mid", "MID-001", 500)).await.unwrap();
        service.create(input("Dear", "DER-001", 5000)).await.unwrap();

        let filter = ProductFilter {
            min_price_cents: Some(200),
            max_price_cents: Some(1000),
            ..Default::default()
        };
        let page = service.list(&filter, &ListParams::default()).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].name, "Mid");

        let inverted = ProductFilter {
            min_price_cents: Some(1000),
            max_price_cents: Some(10),
            ..Default::default()
        };
        assert!(matches!(
            service.list(&inverted, &ListParams::default()).await,
            Err(ServiceError::Validation(_))
        ));
    }
}
