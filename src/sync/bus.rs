use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::debug;

/// In-process named-channel pub/sub, decoupling push-notification receipt
/// from screen logic. Subscribing to an unknown channel creates it.
pub struct EventBus {
    channels: DashMap<String, broadcast::Sender<Value>>,
    buffer: usize,
}

impl EventBus {
    /// Channel carrying inbound push-notification payloads.
    pub const NOTIFICATIONS: &'static str = "notifications";

    pub fn new(buffer: usize) -> Self {
        Self {
            channels: DashMap::new(),
            buffer,
        }
    }

    fn sender(&self, channel: &str) -> broadcast::Sender<Value> {
        self.channels
            .entry(channel.to_string())
            .or_insert_with(|| broadcast::channel(self.buffer).0)
            .clone()
    }

    pub fn subscribe(&self, channel: &str) -> broadcast::Receiver<Value> {
        self.sender(channel).subscribe()
    }

    /// Publish to a named channel; returns the number of live subscribers.
    pub fn publish(&self, channel: &str, payload: Value) -> usize {
        match self.sender(channel).send(payload) {
            Ok(count) => count,
            Err(_) => {
                debug!(channel, "published with no subscribers");
                0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn subscribers_receive_published_payloads() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe("orders");

        let delivered = bus.publish("orders", json!({ "id": "order_1" }));
        assert_eq!(delivered, 1);

        let payload = rx.recv().await.unwrap();
        assert_eq!(payload["id"], "order_1");
    }

    #[tokio::test]
    async fn channels_are_isolated_by_name() {
        let bus = EventBus::new(8);
        let mut orders = bus.subscribe("orders");
        let _payments = bus.subscribe("payments");

        bus.publish("payments", json!({ "id": "payment_1" }));

        assert!(matches!(
            orders.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));
    }

    #[test]
    fn publish_without_subscribers_reaches_nobody() {
        let bus = EventBus::new(8);
        assert_eq!(bus.publish("empty", json!(1)), 0);
    }
}
