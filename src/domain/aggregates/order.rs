//! Order Aggregate

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use uuid::Uuid;
use validator::Validate;

use crate::domain::events::OrderEvent;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderStatus {
    #[default]
    Pending,
    Confirmed,
    Processing,
    Ready,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 6] = [
        OrderStatus::Pending, OrderStatus::Confirmed, OrderStatus::Processing,
        OrderStatus::Ready, OrderStatus::Delivered, OrderStatus::Cancelled,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Pending => "Pending",
            OrderStatus::Confirmed => "Confirmed",
            OrderStatus::Processing => "Processing",
            OrderStatus::Ready => "Ready",
            OrderStatus::Delivered => "Delivered",
            OrderStatus::Cancelled => "Cancelled",
        }
    }

    /// Customers may change items, address and note only before processing starts.
    pub fn is_editable(self) -> bool { matches!(self, OrderStatus::Pending | OrderStatus::Confirmed) }

    /// The status graph is flat: an admin may move any status to any other,
    /// including back out of `Delivered` or `Cancelled`.
    pub fn can_transition_to(self, _next: OrderStatus) -> bool { true }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for OrderStatus {
    type Err = InvalidStatus;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL.into_iter().find(|st| st.as_str() == s).ok_or_else(|| InvalidStatus(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid status '{0}'. valid statuses: {}", OrderStatus::ALL.map(OrderStatus::as_str).join(", "))]
pub struct InvalidStatus(pub String);

/// Snapshot of one product inside an order. Name, manufacturer and price are
/// copied from the catalog when the line is written and never re-read.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    pub product_id: Uuid,
    #[validate(length(min = 1, message = "line item name is required"))]
    pub name: String,
    #[validate(range(min = 1, message = "quantity must be at least 1"))]
    pub quantity: u32,
    #[serde(serialize_with = "rust_decimal::serde::float::serialize")]
    pub price_at_order: Decimal,
    pub selected_serving_option: Option<String>,
    pub manufacturer: Option<String>,
    #[validate(range(min = 1, message = "packet count must be at least 1 when given"))]
    pub packet_count: Option<u32>,
}

impl LineItem {
    pub fn line_total(&self) -> Option<Decimal> { self.price_at_order.checked_mul(Decimal::from(self.quantity)) }
}

/// Customer fields copied onto the order at creation time.
#[derive(Clone, Debug)]
pub struct OrderCustomer {
    pub id: Uuid,
    pub name: String,
    pub phone: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    #[serde(rename = "_id")]
    pub(crate) id: Uuid,
    pub(crate) user_id: Uuid,
    #[validate(length(min = 1, message = "customer name is required"))]
    pub(crate) user_name: String,
    #[validate(length(min = 1, message = "customer phone is required"))]
    pub(crate) user_phone: String,
    #[validate(length(min = 1, message = "delivery address is required"))]
    pub(crate) delivery_address: String,
    #[validate]
    pub(crate) products: Vec<LineItem>,
    #[serde(serialize_with = "rust_decimal::serde::float::serialize")]
    pub(crate) total_price: Decimal,
    pub(crate) order_date: DateTime<Utc>,
    pub(crate) modification_date: Option<DateTime<Utc>>,
    pub(crate) completion_date: DateTime<Utc>,
    pub(crate) status: OrderStatus,
    pub(crate) note: Option<String>,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) updated_at: DateTime<Utc>,
    #[serde(skip)]
    pub(crate) events: Vec<OrderEvent>,
}

impl Order {
    /// Places a new order. Orders placed by a customer skip `Pending` and
    /// start out `Confirmed`.
    pub fn place(
        customer: OrderCustomer,
        delivery_address: &str,
        lines: Vec<LineItem>,
        completion_date: DateTime<Utc>,
        note: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Self, OrderError> {
        if lines.is_empty() { return Err(OrderError::EmptyBasket); }
        let delivery_address = delivery_address.trim();
        if delivery_address.is_empty() { return Err(OrderError::MissingAddress); }

        let mut order = Self {
            id: Uuid::now_v7(),
            user_id: customer.id,
            user_name: customer.name,
            user_phone: customer.phone,
            delivery_address: delivery_address.to_string(),
            total_price: total_of(&lines)?,
            products: lines,
            order_date: now,
            modification_date: None,
            completion_date,
            status: OrderStatus::Confirmed,
            note: clean_note(note),
            created_at: now,
            updated_at: now,
            events: vec![],
        };
        order.validate()?;
        order.raise_event(OrderEvent::Created { order_id: order.id, user_id: order.user_id, total_price: order.total_price, at: now });
        Ok(order)
    }

    pub fn id(&self) -> Uuid { self.id }
    pub fn user_id(&self) -> Uuid { self.user_id }
    pub fn user_name(&self) -> &str { &self.user_name }
    pub fn user_phone(&self) -> &str { &self.user_phone }
    pub fn delivery_address(&self) -> &str { &self.delivery_address }
    pub fn products(&self) -> &[LineItem] { &self.products }
    pub fn total_price(&self) -> Decimal { self.total_price }
    pub fn order_date(&self) -> DateTime<Utc> { self.order_date }
    pub fn modification_date(&self) -> Option<DateTime<Utc>> { self.modification_date }
    pub fn completion_date(&self) -> DateTime<Utc> { self.completion_date }
    pub fn status(&self) -> OrderStatus { self.status }
    pub fn note(&self) -> Option<&str> { self.note.as_deref() }

    /// Replaces the line items of an editable order. A blank address keeps the
    /// current one; the note is always replaced.
    pub fn revise(
        &mut self,
        lines: Vec<LineItem>,
        delivery_address: Option<&str>,
        note: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<(), OrderError> {
        if !self.status.is_editable() { return Err(OrderError::NotEditable(self.status)); }
        if lines.is_empty() { return Err(OrderError::EmptyAfterRevision); }

        let mut next = self.clone();
        next.total_price = total_of(&lines)?;
        next.products = lines;
        if let Some(address) = delivery_address.map(str::trim).filter(|a| !a.is_empty()) {
            next.delivery_address = address.to_string();
        }
        next.note = clean_note(note);
        next.validate()?;
        next.touch(now);
        next.raise_event(OrderEvent::Revised { order_id: next.id, total_price: next.total_price, line_count: next.products.len(), at: now });
        *self = next;
        Ok(())
    }

    /// Overwrites the status. Returns whether anything changed; re-setting the
    /// current status is accepted and leaves the record untouched.
    pub fn set_status(&mut self, next: OrderStatus, now: DateTime<Utc>) -> Result<bool, OrderError> {
        if !self.status.can_transition_to(next) { return Err(OrderError::Transition { from: self.status, to: next }); }
        if self.status == next { return Ok(false); }
        let from = std::mem::replace(&mut self.status, next);
        self.touch(now);
        self.raise_event(OrderEvent::StatusChanged { order_id: self.id, from, to: next, at: now });
        Ok(true)
    }

    pub fn take_events(&mut self) -> Vec<OrderEvent> { std::mem::take(&mut self.events) }
    fn raise_event(&mut self, e: OrderEvent) { self.events.push(e); }
    fn touch(&mut self, now: DateTime<Utc>) { self.modification_date = Some(now); self.updated_at = now; }
}

/// Totals are stored as `NUMERIC(14, 2)`.
pub const MAX_TOTAL: Decimal = Decimal::from_parts(276_447_231, 23_283, 0, false, 2); // 999_999_999_999.99

fn total_of(lines: &[LineItem]) -> Result<Decimal, OrderError> {
    let total = lines.iter().try_fold(Decimal::ZERO, |acc, line| {
        line.line_total().and_then(|t| acc.checked_add(t)).ok_or(OrderError::TotalOverflow)
    })?;
    if total > MAX_TOTAL { return Err(OrderError::TotalOverflow); }
    Ok(total)
}

fn clean_note(note: Option<&str>) -> Option<String> {
    note.map(str::trim).filter(|n| !n.is_empty()).map(str::to_string)
}

#[derive(Debug, thiserror::Error)]
pub enum OrderError {
    #[error("the basket is empty")]
    EmptyBasket,
    #[error("delivery address is required")]
    MissingAddress,
    #[error("an order in status '{0}' can no longer be changed")]
    NotEditable(OrderStatus),
    #[error("cannot update to an empty order; removing every item does not cancel the order")]
    EmptyAfterRevision,
    #[error("status cannot move from {from} to {to}")]
    Transition { from: OrderStatus, to: OrderStatus },
    #[error("order total is too large")]
    TotalOverflow,
    #[error(transparent)]
    Invalid(#[from] validator::ValidationErrors),
}
