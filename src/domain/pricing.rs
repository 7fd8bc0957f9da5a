//! Basket snapshotting: turns requested lines into priced order line items
//! against the current catalog.

use std::{collections::HashMap, fmt, str::FromStr};

use uuid::Uuid;

use crate::domain::aggregates::{LineItem, Product};

/// One requested basket line after id parsing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BasketLine {
    pub product_id: Uuid,
    pub quantity: u32,
    pub selected_serving_option: Option<String>,
    pub packet_count: Option<u32>,
}

/// Whether a product that defines serving options forces the customer to pick one.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ServingOptionPolicy {
    #[default]
    Optional,
    Required,
}

impl FromStr for ServingOptionPolicy {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "optional" => Ok(Self::Optional),
            "required" => Ok(Self::Required),
            other => Err(format!("unknown serving option policy '{other}' (expected optional or required)")),
        }
    }
}

impl fmt::Display for ServingOptionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self { Self::Optional => "optional", Self::Required => "required" })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PricingError {
    #[error("some products are no longer available ({})", join_ids(.0))]
    MissingProducts(Vec<Uuid>),
    #[error("product '{product}' has no serving options to choose from")]
    NoServingOptions { product: String },
    #[error("serving option '{option}' is not valid for product '{product}'. available options: {}", .allowed.join(", "))]
    InvalidServingOption { product: String, option: String, allowed: Vec<String> },
    #[error("a serving option must be selected for product '{product}'")]
    ServingOptionRequired { product: String },
}

fn join_ids(ids: &[Uuid]) -> String {
    ids.iter().map(Uuid::to_string).collect::<Vec<_>>().join(", ")
}

/// Ids requested by the basket that the catalog does not contain, in request order.
pub fn missing_products(basket: &[BasketLine], catalog: &HashMap<Uuid, Product>) -> Vec<Uuid> {
    let mut missing: Vec<Uuid> = Vec::new();
    for line in basket {
        if !catalog.contains_key(&line.product_id) && !missing.contains(&line.product_id) {
            missing.push(line.product_id);
        }
    }
    missing
}

/// Prices every line at the product's current unit price and copies the
/// product fields an order keeps. Lines keep their input order.
pub fn snapshot_lines(
    basket: &[BasketLine],
    catalog: &HashMap<Uuid, Product>,
    policy: ServingOptionPolicy,
) -> Result<Vec<LineItem>, PricingError> {
    let missing = missing_products(basket, catalog);
    if !missing.is_empty() { return Err(PricingError::MissingProducts(missing)); }

    basket
        .iter()
        .map(|line| {
            let product = &catalog[&line.product_id];
            Ok(LineItem {
                product_id: product.id,
                name: product.name.clone(),
                quantity: line.quantity,
                price_at_order: product.price_per_unit,
                selected_serving_option: check_serving_option(product, line.selected_serving_option.as_deref(), policy)?,
                manufacturer: product.manufacturer.clone(),
                packet_count: line.packet_count.filter(|c| *c >= 1),
            })
        })
        .collect()
}

fn check_serving_option(product: &Product, requested: Option<&str>, policy: ServingOptionPolicy) -> Result<Option<String>, PricingError> {
    match requested.filter(|o| !o.is_empty()) {
        Some(option) if product.serving_options.is_empty() => {
            tracing::debug!(product = %product.id, option, "serving option sent for product without options");
            Err(PricingError::NoServingOptions { product: product.name.clone() })
        }
        Some(option) if !product.offers(option) => Err(PricingError::InvalidServingOption {
            product: product.name.clone(),
            option: option.to_string(),
            allowed: product.serving_options.clone(),
        }),
        Some(option) => Ok(Some(option.to_string())),
        None if policy == ServingOptionPolicy::Required && !product.serving_options.is_empty() => {
            Err(PricingError::ServingOptionRequired { product: product.name.clone() })
        }
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    use crate::domain::aggregates::NewProduct;

    fn catalog() -> (HashMap<Uuid, Product>, Uuid, Uuid) {
        let fish = Product::create(NewProduct {
            name: "Sea bream".into(),
            price_per_unit: dec!(12.50),
            manufacturer: Some("Dag Eilat".into()),
            serving_options: vec!["whole".into(), "filleted".into()],
            ..Default::default()
        }, Utc::now()).unwrap();
        let milk = Product::create(NewProduct { name: "Milk".into(), price_per_unit: dec!(6.90), ..Default::default() }, Utc::now()).unwrap();
        let (fish_id, milk_id) = (fish.id, milk.id);
        (HashMap::from([(fish.id, fish), (milk.id, milk)]), fish_id, milk_id)
    }

    fn line(product_id: Uuid, quantity: u32, option: Option<&str>) -> BasketLine {
        BasketLine { product_id, quantity, selected_serving_option: option.map(str::to_string), packet_count: None }
    }

    #[test]
    fn test_snapshot_copies_current_product_fields() {
        let (catalog, fish, milk) = catalog();
        let mut basket = vec![line(fish, 2, Some("filleted")), line(milk, 1, None)];
        basket[0].packet_count = Some(3);
        let lines = snapshot_lines(&basket, &catalog, ServingOptionPolicy::Optional).unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].name, "Sea bream");
        assert_eq!(lines[0].price_at_order, dec!(12.50));
        assert_eq!(lines[0].selected_serving_option.as_deref(), Some("filleted"));
        assert_eq!(lines[0].manufacturer.as_deref(), Some("Dag Eilat"));
        assert_eq!(lines[0].packet_count, Some(3));
        assert_eq!(lines[1].manufacturer, None);
    }

    #[test]
    fn test_missing_products_are_named() {
        let (catalog, fish, _) = catalog();
        let ghost = Uuid::new_v4();
        let basket = vec![line(ghost, 1, None), line(fish, 1, None), line(ghost, 2, None)];
        let err = snapshot_lines(&basket, &catalog, ServingOptionPolicy::Optional).unwrap_err();
        assert_eq!(err, PricingError::MissingProducts(vec![ghost]));
        assert!(err.to_string().contains(&ghost.to_string()));
    }

    #[test]
    fn test_invalid_serving_option_names_product_and_choices() {
        let (catalog, fish, milk) = catalog();
        let err = snapshot_lines(&[line(fish, 1, Some("smoked"))], &catalog, ServingOptionPolicy::Optional).unwrap_err();
        assert_eq!(err.to_string(), "serving option 'smoked' is not valid for product 'Sea bream'. available options: whole, filleted");

        let err = snapshot_lines(&[line(milk, 1, Some("sliced"))], &catalog, ServingOptionPolicy::Optional).unwrap_err();
        assert_eq!(err, PricingError::NoServingOptions { product: "Milk".into() });
    }

    #[test]
    fn test_serving_option_policy() {
        let (catalog, fish, milk) = catalog();
        let basket = [line(fish, 1, None), line(milk, 1, Some(""))];
        let lines = snapshot_lines(&basket, &catalog, ServingOptionPolicy::Optional).unwrap();
        assert_eq!(lines[0].selected_serving_option, None);
        assert_eq!(lines[1].selected_serving_option, None);

        let err = snapshot_lines(&basket, &catalog, ServingOptionPolicy::Required).unwrap_err();
        assert_eq!(err, PricingError::ServingOptionRequired { product: "Sea bream".into() });
        // products without options are unaffected by the policy
        assert!(snapshot_lines(&basket[1..], &catalog, ServingOptionPolicy::Required).is_ok());
    }

    #[test]
    fn test_policy_parse() {
        assert_eq!("Required".parse::<ServingOptionPolicy>().unwrap(), ServingOptionPolicy::Required);
        assert!("sometimes".parse::<ServingOptionPolicy>().is_err());
    }
}
