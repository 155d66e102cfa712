use std::sync::Arc;

use futures::StreamExt;
use futures::stream::BoxStream;
use serde_json::Value;
use tokio_stream::wrappers::BroadcastStream;

use crate::sync::bus::EventBus;

/// Realtime pub/sub transport, subscribe-by-name. Each subscription yields a
/// lazy stream of JSON messages; streams may end and are restartable by
/// subscribing again.
pub trait RealtimeTransport: Send + Sync {
    fn subscribe(&self, channel: &str) -> BoxStream<'static, Value>;
}

/// Adapter exposing an [`EventBus`] as a realtime transport. Production wires
/// a socket-backed transport here; tests and in-process fan-out use the bus.
pub struct BusTransport {
    bus: Arc<EventBus>,
}

impl BusTransport {
    pub fn new(bus: Arc<EventBus>) -> Self {
        Self { bus }
    }
}

impl RealtimeTransport for BusTransport {
    fn subscribe(&self, channel: &str) -> BoxStream<'static, Value> {
        let rx = self.bus.subscribe(channel);
        BroadcastStream::new(rx)
            .filter_map(|message| async move { message.ok() })
            .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn bus_transport_streams_published_messages() {
        let bus = Arc::new(EventBus::new(8));
        let transport = BusTransport::new(bus.clone());

        let mut stream = transport.subscribe("order.order_1");
        bus.publish("order.order_1", json!({ "id": "order_1" }));

        let message = stream.next().await.unwrap();
        assert_eq!(message["id"], "order_1");
    }
}
