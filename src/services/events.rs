//! Order event fan-out. Publishing happens after the write and never fails
//! the request that produced the event.

use async_trait::async_trait;

use crate::domain::events::OrderEvent;

pub const SUBJECT_PREFIX: &str = "orders";

#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: &OrderEvent);
}

/// Used when no broker is configured.
pub struct LogPublisher;

#[async_trait]
impl EventPublisher for LogPublisher {
    async fn publish(&self, event: &OrderEvent) {
        tracing::info!(order_id = %event.order_id(), kind = event.kind(), "order event");
    }
}

pub struct NatsPublisher {
    client: async_nats::Client,
}

impl NatsPublisher {
    pub fn new(client: async_nats::Client) -> Self { Self { client } }

    pub fn subject(event: &OrderEvent) -> String { format!("{SUBJECT_PREFIX}.{}", event.kind()) }
}

#[async_trait]
impl EventPublisher for NatsPublisher {
    async fn publish(&self, event: &OrderEvent) {
        let payload = match serde_json::to_vec(event) {
            Ok(p) => p,
            Err(e) => {
                tracing::error!(error = %e, "failed to encode order event");
                return;
            }
        };
        if let Err(e) = self.client.publish(Self::subject(event), payload.into()).await {
            tracing::warn!(error = %e, order_id = %event.order_id(), "failed to publish order event");
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use tokio::sync::Mutex;

    /// Collects published events for assertions.
    #[derive(Default)]
    pub struct RecordingPublisher {
        pub events: Mutex<Vec<OrderEvent>>,
    }

    #[async_trait]
    impl EventPublisher for RecordingPublisher {
        async fn publish(&self, event: &OrderEvent) {
            self.events.lock().await.push(event.clone());
        }
    }
}
