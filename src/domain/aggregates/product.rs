//! Product Aggregate

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Catalog entry. Orders copy what they need from it at write time and never
/// join back, so editing or deleting a product leaves order history intact.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    #[serde(rename = "_id")]
    pub id: Uuid,
    #[validate(length(min = 1, message = "product name is required"))]
    pub name: String,
    #[serde(serialize_with = "rust_decimal::serde::float::serialize")]
    pub price_per_unit: Decimal,
    pub photo: Option<String>,
    pub description: String,
    pub is_special_offer: bool,
    pub manufacturer: Option<String>,
    pub serving_options: Vec<String>,
    pub default_packet_count: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields an admin supplies when creating a product.
#[derive(Clone, Debug, Default)]
pub struct NewProduct {
    pub name: String,
    pub price_per_unit: Decimal,
    pub photo: Option<String>,
    pub description: String,
    pub is_special_offer: bool,
    pub manufacturer: Option<String>,
    pub serving_options: Vec<String>,
    pub default_packet_count: i64,
}

/// Partial update; `None` leaves the field as it is. `manufacturer` and
/// `photo` use a nested option so they can be cleared.
#[derive(Clone, Debug, Default)]
pub struct ProductPatch {
    pub name: Option<String>,
    pub price_per_unit: Option<Decimal>,
    pub photo: Option<Option<String>>,
    pub description: Option<String>,
    pub is_special_offer: Option<bool>,
    pub manufacturer: Option<Option<String>>,
    pub serving_options: Option<Vec<String>>,
    pub default_packet_count: Option<i64>,
}

impl Product {
    pub fn create(input: NewProduct, now: DateTime<Utc>) -> Result<Self, ProductError> {
        let product = Self {
            id: Uuid::now_v7(),
            name: input.name.trim().to_string(),
            price_per_unit: check_price(input.price_per_unit)?,
            photo: input.photo,
            description: input.description.trim().to_string(),
            is_special_offer: input.is_special_offer,
            manufacturer: clean_manufacturer(input.manufacturer),
            serving_options: clean_options(input.serving_options),
            default_packet_count: check_packet_count(input.default_packet_count)?,
            created_at: now,
            updated_at: now,
        };
        product.validate()?;
        Ok(product)
    }

    pub fn apply(&mut self, patch: ProductPatch, now: DateTime<Utc>) -> Result<(), ProductError> {
        let mut next = self.clone();
        if let Some(name) = patch.name { next.name = name.trim().to_string(); }
        if let Some(price) = patch.price_per_unit { next.price_per_unit = check_price(price)?; }
        if let Some(photo) = patch.photo { next.photo = photo; }
        if let Some(description) = patch.description { next.description = description.trim().to_string(); }
        if let Some(special) = patch.is_special_offer { next.is_special_offer = special; }
        if let Some(manufacturer) = patch.manufacturer { next.manufacturer = clean_manufacturer(manufacturer); }
        if let Some(options) = patch.serving_options { next.serving_options = clean_options(options); }
        if let Some(count) = patch.default_packet_count { next.default_packet_count = check_packet_count(count)?; }
        next.validate()?;
        next.updated_at = now;
        *self = next;
        Ok(())
    }

    pub fn offers(&self, option: &str) -> bool { self.serving_options.iter().any(|o| o == option) }
}

/// Prices are stored as `NUMERIC(12, 2)`.
pub const PRICE_SCALE: u32 = 2;
pub const MAX_PRICE: Decimal = Decimal::from_parts(3_567_587_327, 232, 0, false, 2); // 9_999_999_999.99

fn check_price(price: Decimal) -> Result<Decimal, ProductError> {
    if price < Decimal::ZERO { return Err(ProductError::NegativePrice); }
    if price.normalize().scale() > PRICE_SCALE { return Err(ProductError::PricePrecision(price)); }
    if price > MAX_PRICE { return Err(ProductError::PriceTooLarge(price)); }
    Ok(price)
}

fn check_packet_count(count: i64) -> Result<u32, ProductError> {
    u32::try_from(count).map_err(|_| ProductError::InvalidPacketCount(count))
}

fn clean_manufacturer(value: Option<String>) -> Option<String> {
    value.map(|m| m.trim().to_string()).filter(|m| !m.is_empty())
}

fn clean_options(options: Vec<String>) -> Vec<String> {
    options.into_iter().map(|o| o.trim().to_string()).filter(|o| !o.is_empty()).collect()
}

#[derive(Debug, thiserror::Error)]
pub enum ProductError {
    #[error("price cannot be negative")]
    NegativePrice,
    #[error("price {0} has more than two decimal places")]
    PricePrecision(Decimal),
    #[error("price {0} is too large")]
    PriceTooLarge(Decimal),
    #[error("{0} is not a valid packet count")]
    InvalidPacketCount(i64),
    #[error(transparent)]
    Invalid(#[from] validator::ValidationErrors),
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn tomatoes() -> NewProduct {
        NewProduct {
            name: " Tomatoes ".into(),
            price_per_unit: dec!(12.50),
            manufacturer: Some("  ".into()),
            serving_options: vec![" whole".into(), "".into(), "diced ".into()],
            default_packet_count: 2,
            ..Default::default()
        }
    }

    #[test]
    fn test_product_create_cleans_input() {
        let p = Product::create(tomatoes(), Utc::now()).unwrap();
        assert_eq!(p.name, "Tomatoes");
        assert_eq!(p.manufacturer, None);
        assert_eq!(p.serving_options, vec!["whole", "diced"]);
        assert!(p.offers("diced"));
        assert!(!p.offers("sliced"));
    }

    #[test]
    fn test_product_rejects_negative_values() {
        let mut input = tomatoes();
        input.price_per_unit = dec!(-1);
        assert!(matches!(Product::create(input, Utc::now()), Err(ProductError::NegativePrice)));

        let mut input = tomatoes();
        input.default_packet_count = -3;
        assert!(matches!(Product::create(input, Utc::now()), Err(ProductError::InvalidPacketCount(-3))));

        let mut input = tomatoes();
        input.name = "   ".into();
        assert!(matches!(Product::create(input, Utc::now()), Err(ProductError::Invalid(_))));
    }

    #[test]
    fn test_price_must_fit_two_decimal_places() {
        assert_eq!(MAX_PRICE, dec!(9999999999.99));

        let mut input = tomatoes();
        input.price_per_unit = dec!(1.005);
        assert!(matches!(Product::create(input, Utc::now()), Err(ProductError::PricePrecision(_))));

        let mut input = tomatoes();
        input.price_per_unit = dec!(1.500);
        assert_eq!(Product::create(input, Utc::now()).unwrap().price_per_unit, dec!(1.5));

        let mut input = tomatoes();
        input.price_per_unit = dec!(10000000000);
        assert!(matches!(Product::create(input, Utc::now()), Err(ProductError::PriceTooLarge(_))));

        let mut p = Product::create(tomatoes(), Utc::now()).unwrap();
        let patch = ProductPatch { price_per_unit: Some(dec!(0.001)), ..Default::default() };
        assert!(matches!(p.apply(patch, Utc::now()), Err(ProductError::PricePrecision(_))));
        assert_eq!(p.price_per_unit, dec!(12.50));
    }

    #[test]
    fn test_patch_is_all_or_nothing() {
        let mut p = Product::create(tomatoes(), Utc::now()).unwrap();
        let before = p.clone();
        let patch = ProductPatch { name: Some("Cherry".into()), price_per_unit: Some(dec!(-2)), ..Default::default() };
        assert!(p.apply(patch, Utc::now()).is_err());
        assert_eq!(p, before);

        let patch = ProductPatch { manufacturer: Some(Some("Tnuva".into())), ..Default::default() };
        p.apply(patch, Utc::now()).unwrap();
        assert_eq!(p.manufacturer.as_deref(), Some("Tnuva"));
        assert_eq!(p.name, "Tomatoes");
    }
}
