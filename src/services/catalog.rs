use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::domain::aggregates::{NewProduct, Product, ProductPatch};
use crate::domain::value_objects::ServingOptionsInput;
use crate::error::{ApiResult, AppError};
use crate::store::CatalogStore;

/// Product fields as sent by the admin UI; used for create and partial update.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductInput {
    pub name: Option<String>,
    pub price_per_unit: Option<Decimal>,
    pub photo: Option<String>,
    pub description: Option<String>,
    pub is_special_offer: Option<bool>,
    pub manufacturer: Option<String>,
    pub serving_options: Option<ServingOptionsInput>,
    pub default_packet_count: Option<i64>,
}

impl ProductInput {
    fn into_new(self) -> ApiResult<NewProduct> {
        let price_per_unit = self.price_per_unit.ok_or_else(|| AppError::BadRequest("price per unit is required".into()))?;
        Ok(NewProduct {
            name: self.name.unwrap_or_default(),
            price_per_unit,
            photo: self.photo.filter(|p| !p.trim().is_empty()),
            description: self.description.unwrap_or_default(),
            is_special_offer: self.is_special_offer.unwrap_or(false),
            manufacturer: self.manufacturer,
            serving_options: self.serving_options.map(ServingOptionsInput::into_options).unwrap_or_default(),
            default_packet_count: self.default_packet_count.unwrap_or(0),
        })
    }

    /// An empty photo or manufacturer clears the stored value.
    fn into_patch(self) -> ProductPatch {
        ProductPatch {
            name: self.name,
            price_per_unit: self.price_per_unit,
            photo: self.photo.map(|p| Some(p).filter(|p| !p.trim().is_empty())),
            description: self.description,
            is_special_offer: self.is_special_offer,
            manufacturer: self.manufacturer.map(Some),
            serving_options: self.serving_options.map(ServingOptionsInput::into_options),
            default_packet_count: self.default_packet_count,
        }
    }
}

fn parse_product_id(raw: &str) -> ApiResult<Uuid> {
    Uuid::parse_str(raw.trim()).map_err(|_| AppError::BadRequest("invalid product id".into()))
}

fn not_found() -> AppError { AppError::NotFound("product not found".into()) }

#[derive(Clone)]
pub struct CatalogService {
    store: Arc<dyn CatalogStore>,
}

impl CatalogService {
    pub fn new(store: Arc<dyn CatalogStore>) -> Self { Self { store } }

    pub async fn list(&self, specials_only: bool) -> ApiResult<Vec<Product>> {
        Ok(self.store.list(specials_only).await?)
    }

    pub async fn get(&self, raw_id: &str) -> ApiResult<Product> {
        let id = parse_product_id(raw_id)?;
        self.store.find_by_id(id).await?.ok_or_else(not_found)
    }

    /// Distinct manufacturer names, sorted without regard to case.
    pub async fn manufacturers(&self) -> ApiResult<Vec<String>> {
        let mut names = self.store.manufacturers().await?;
        names.sort_by_key(|n| n.to_lowercase());
        names.dedup();
        Ok(names)
    }

    pub async fn create(&self, input: ProductInput) -> ApiResult<Product> {
        let product = Product::create(input.into_new()?, Utc::now())?;
        self.store.insert(&product).await?;
        info!(product_id = %product.id, name = %product.name, "product created");
        Ok(product)
    }

    pub async fn update(&self, raw_id: &str, input: ProductInput) -> ApiResult<Product> {
        let mut product = self.get(raw_id).await?;
        product.apply(input.into_patch(), Utc::now())?;
        if !self.store.update(&product).await? {
            return Err(not_found());
        }
        info!(product_id = %product.id, "product updated");
        Ok(product)
    }

    /// Orders keep their own snapshot, so deleting never touches order history.
    pub async fn delete(&self, raw_id: &str) -> ApiResult<()> {
        let id = parse_product_id(raw_id)?;
        if !self.store.delete(id).await? {
            return Err(not_found());
        }
        info!(product_id = %id, "product deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use rust_decimal_macros::dec;

    fn input(name: &str, manufacturer: Option<&str>) -> ProductInput {
        ProductInput {
            name: Some(name.into()),
            price_per_unit: Some(dec!(9.90)),
            manufacturer: manufacturer.map(str::to_string),
            serving_options: Some(ServingOptionsInput::Csv("sliced, whole,".into())),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_update_delete() {
        let service = CatalogService::new(Arc::new(MemoryStore::new()));
        let bread = service.create(input("Bread", Some("Angel"))).await.unwrap();
        assert_eq!(bread.serving_options, vec!["sliced", "whole"]);

        let patch = ProductInput { price_per_unit: Some(dec!(11)), manufacturer: Some(String::new()), ..Default::default() };
        let updated = service.update(&bread.id.to_string(), patch).await.unwrap();
        assert_eq!(updated.price_per_unit, dec!(11));
        assert_eq!(updated.manufacturer, None);
        assert_eq!(updated.name, "Bread");

        service.delete(&bread.id.to_string()).await.unwrap();
        assert!(matches!(service.get(&bread.id.to_string()).await, Err(AppError::NotFound(_))));
        assert!(matches!(service.delete("nope").await, Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_create_requires_price_and_name() {
        let service = CatalogService::new(Arc::new(MemoryStore::new()));
        let no_price = ProductInput { name: Some("Milk".into()), ..Default::default() };
        assert!(matches!(service.create(no_price).await, Err(AppError::BadRequest(_))));
        let no_name = ProductInput { price_per_unit: Some(dec!(1)), ..Default::default() };
        match service.create(no_name).await {
            Err(AppError::BadRequest(m)) => assert_eq!(m, "product name is required"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_manufacturers_sorted_ignoring_case() {
        let service = CatalogService::new(Arc::new(MemoryStore::new()));
        for (name, m) in [("Milk", Some("tnuva")), ("Bread", Some("Angel")), ("Salt", None), ("Cheese", Some("Strauss"))] {
            service.create(input(name, m)).await.unwrap();
        }
        assert_eq!(service.manufacturers().await.unwrap(), vec!["Angel", "Strauss", "tnuva"]);
        let names: Vec<String> = service.list(false).await.unwrap().into_iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["Bread", "Cheese", "Milk", "Salt"]);
    }
}
