//! Domain events
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::domain::aggregates::OrderStatus;

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum OrderEvent {
    #[serde(rename_all = "camelCase")]
    Created { order_id: Uuid, user_id: Uuid, total_price: Decimal, at: DateTime<Utc> },
    #[serde(rename_all = "camelCase")]
    Revised { order_id: Uuid, total_price: Decimal, line_count: usize, at: DateTime<Utc> },
    #[serde(rename_all = "camelCase")]
    StatusChanged { order_id: Uuid, from: OrderStatus, to: OrderStatus, at: DateTime<Utc> },
}

impl OrderEvent {
    /// Subject suffix used when the event is published.
    pub fn kind(&self) -> &'static str {
        match self {
            OrderEvent::Created { .. } => "created",
            OrderEvent::Revised { .. } => "revised",
            OrderEvent::StatusChanged { .. } => "status_changed",
        }
    }

    pub fn order_id(&self) -> Uuid {
        match self {
            OrderEvent::Created { order_id, .. }
            | OrderEvent::Revised { order_id, .. }
            | OrderEvent::StatusChanged { order_id, .. } => *order_id,
        }
    }
}
