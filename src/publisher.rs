//! Outbound cart events.
//!
//! Publication is fire-and-forget: a cart write that succeeded is never
//! reported as failed because its events could not be delivered.

use async_trait::async_trait;

use crate::domain::CartEvent;

#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: &CartEvent);
}

const SUBJECT_PREFIX: &str = "cart";

/// Publishes events as JSON on `cart.<event name>`.
pub struct NatsPublisher {
    client: async_nats::Client,
}

impl NatsPublisher {
    pub fn new(client: async_nats::Client) -> Self { Self { client } }
}

#[async_trait]
impl EventPublisher for NatsPublisher {
    async fn publish(&self, event: &CartEvent) {
        let subject = format!("{SUBJECT_PREFIX}.{}", event.name());
        let payload = match serde_json::to_vec(event) {
            Ok(payload) => payload,
            Err(error) => {
                tracing::warn!(%error, %subject, "failed to encode cart event");
                return;
            }
        };
        if let Err(error) = self.client.publish(subject.clone(), payload.into()).await {
            tracing::warn!(%error, %subject, cart = %event.cart_id(), "failed to publish cart event");
        }
    }
}

/// Used when no broker is configured; events only reach the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogPublisher;

#[async_trait]
impl EventPublisher for LogPublisher {
    async fn publish(&self, event: &CartEvent) {
        tracing::debug!(event = event.name(), cart = %event.cart_id(), "cart event");
    }
}
