//! Order Engine: places, revises and re-statuses orders against the current
//! catalog. Every operation validates fully before its single store write.

use std::{collections::HashMap, sync::Arc};

use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use super::events::EventPublisher;
use super::settings::SettingsService;
use crate::domain::aggregates::{
    Account, LineItem, Order, OrderCustomer, OrderError, OrderStatus, Product,
};
use crate::domain::pricing::{snapshot_lines, BasketLine, ServingOptionPolicy};
use crate::domain::value_objects::packet_count_from;
use crate::error::{ApiResult, AppError};
use crate::store::{CatalogStore, OrderStore};

const INVALID_PRODUCT_ID: &str = "the basket contains an invalid product id";
const INVALID_ITEMS: &str = "invalid order items (malformed product id or negative quantity)";
const ORDER_NOT_FOUND: &str = "order not found or does not belong to this user";

/// One basket line as sent by the client.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BasketItem {
    #[serde(default)]
    pub product_id: String,
    #[serde(default)]
    pub quantity: Value,
    #[serde(default)]
    pub selected_serving_option: Option<String>,
    #[serde(default)]
    pub packet_count: Option<Value>,
}

impl BasketItem {
    fn parsed_id(&self) -> Option<Uuid> { Uuid::parse_str(self.product_id.trim()).ok() }

    fn whole_quantity(&self) -> Option<i64> {
        match &self.quantity {
            Value::Number(n) => n.as_i64().or_else(|| {
                n.as_f64()
                    .filter(|f| f.fract() == 0.0 && f.abs() < 1e15)
                    .map(|f| f as i64)
            }),
            _ => None,
        }
    }

    fn to_line(&self, product_id: Uuid, quantity: u32) -> BasketLine {
        BasketLine {
            product_id,
            quantity,
            selected_serving_option: self
                .selected_serving_option
                .as_deref()
                .map(str::trim)
                .map(str::to_string),
            packet_count: packet_count_from(self.packet_count.as_ref()),
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceOrder {
    #[serde(default)]
    pub products: Vec<BasketItem>,
    #[serde(default)]
    pub delivery_address: String,
    #[serde(default)]
    pub note: Option<String>,
}

/// Replacement basket. A quantity of 0 removes the line.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviseOrder {
    #[serde(default)]
    pub products: Option<Vec<BasketItem>>,
    #[serde(default)]
    pub delivery_address: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
}

pub fn parse_order_id(raw: &str) -> ApiResult<Uuid> {
    Uuid::parse_str(raw.trim()).map_err(|_| AppError::BadRequest("invalid order id".into()))
}

#[derive(Clone)]
pub struct OrderEngine {
    catalog: Arc<dyn CatalogStore>,
    orders: Arc<dyn OrderStore>,
    settings: SettingsService,
    events: Arc<dyn EventPublisher>,
    policy: ServingOptionPolicy,
}

impl OrderEngine {
    pub fn new(
        catalog: Arc<dyn CatalogStore>,
        orders: Arc<dyn OrderStore>,
        settings: SettingsService,
        events: Arc<dyn EventPublisher>,
        policy: ServingOptionPolicy,
    ) -> Self {
        Self { catalog, orders, settings, events, policy }
    }

    #[tracing::instrument(skip_all, fields(user_id = %account.id()))]
    pub async fn place(&self, account: &Account, input: PlaceOrder) -> ApiResult<Order> {
        if input.products.is_empty() {
            return Err(OrderError::EmptyBasket.into());
        }
        if input.delivery_address.trim().is_empty() {
            return Err(OrderError::MissingAddress.into());
        }
        let basket = input
            .products
            .iter()
            .map(|item| {
                let product_id = item
                    .parsed_id()
                    .ok_or_else(|| AppError::BadRequest(INVALID_PRODUCT_ID.into()))?;
                // anything that is not a positive whole number fails line validation below
                let quantity =
                    item.whole_quantity().and_then(|q| u32::try_from(q).ok()).unwrap_or(0);
                Ok(item.to_line(product_id, quantity))
            })
            .collect::<ApiResult<Vec<_>>>()?;

        let lines = self.snapshot(&basket).await?;
        let completion_date = self.settings.default_completion_date().await?;
        let profile = account.profile();
        let customer = OrderCustomer {
            id: profile.id,
            name: profile.name.clone(),
            phone: profile.phone.as_str().to_string(),
        };

        let mut order = Order::place(
            customer,
            &input.delivery_address,
            lines,
            completion_date,
            input.note.as_deref(),
            Utc::now(),
        )?;
        self.orders.insert(&order).await?;
        info!(
            order_id = %order.id(),
            total = %order.total_price(),
            lines = order.products().len(),
            "order created"
        );
        self.publish(&mut order).await;
        Ok(order)
    }

    #[tracing::instrument(skip_all, fields(user_id = %account.id(), order_id = raw_id))]
    pub async fn revise(
        &self,
        account: &Account,
        raw_id: &str,
        input: ReviseOrder,
    ) -> ApiResult<Order> {
        let id = parse_order_id(raw_id)?;
        let mut order = self.find_mine(account, id).await?;
        if !order.status().is_editable() {
            warn!(status = %order.status(), "edit refused");
            return Err(OrderError::NotEditable(order.status()).into());
        }

        let items = input.products.ok_or_else(|| AppError::BadRequest(INVALID_ITEMS.into()))?;
        let mut basket = Vec::with_capacity(items.len());
        for item in &items {
            let (Some(product_id), Some(quantity)) = (item.parsed_id(), item.whole_quantity())
            else {
                return Err(AppError::BadRequest(INVALID_ITEMS.into()));
            };
            let quantity = u32::try_from(quantity)
                .map_err(|_| AppError::BadRequest(INVALID_ITEMS.into()))?;
            if quantity > 0 {
                basket.push(item.to_line(product_id, quantity));
            }
        }
        if basket.is_empty() {
            return Err(OrderError::EmptyAfterRevision.into());
        }

        // re-priced against today's catalog, not the earlier snapshot
        let lines = self.snapshot(&basket).await?;
        order.revise(lines, input.delivery_address.as_deref(), input.note.as_deref(), Utc::now())?;
        self.orders.save(&order).await?;
        info!(total = %order.total_price(), lines = order.products().len(), "order updated");
        self.publish(&mut order).await;
        Ok(order)
    }

    pub async fn list_mine(&self, account: &Account) -> ApiResult<Vec<Order>> {
        Ok(self.orders.list_for_user(account.id()).await?)
    }

    pub async fn get_mine(&self, account: &Account, raw_id: &str) -> ApiResult<Order> {
        let id = parse_order_id(raw_id)?;
        self.find_mine(account, id).await
    }

    /// Admin status overwrite. Any status may follow any other.
    #[tracing::instrument(skip(self))]
    pub async fn set_status(&self, raw_id: &str, raw_status: &str) -> ApiResult<Order> {
        let id = parse_order_id(raw_id)?;
        let next: OrderStatus = raw_status.trim().parse()?;
        let mut order = self
            .orders
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound("order not found".into()))?;
        if order.set_status(next, Utc::now())? {
            self.orders.save(&order).await?;
            info!(status = %next, "order status changed");
            self.publish(&mut order).await;
        }
        Ok(order)
    }

    async fn find_mine(&self, account: &Account, id: Uuid) -> ApiResult<Order> {
        self.orders
            .find_for_user(id, account.id())
            .await?
            .ok_or_else(|| AppError::NotFound(ORDER_NOT_FOUND.into()))
    }

    async fn snapshot(&self, basket: &[BasketLine]) -> ApiResult<Vec<LineItem>> {
        let mut ids: Vec<Uuid> = basket.iter().map(|l| l.product_id).collect();
        ids.sort_unstable();
        ids.dedup();
        let catalog: HashMap<Uuid, Product> =
            self.catalog.find_by_ids(&ids).await?.into_iter().map(|p| (p.id, p)).collect();
        snapshot_lines(basket, &catalog, self.policy).map_err(|e| {
            warn!(error = %e, "basket rejected");
            e.into()
        })
    }

    async fn publish(&self, order: &mut Order) {
        for event in order.take_events() {
            self.events.publish(&event).await;
        }
    }
}
