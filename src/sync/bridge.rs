use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use serde_json::Value;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, info};
use uuid::Uuid;

use crate::engine::controller::OrderController;
use crate::sync::bus::EventBus;
use crate::sync::transport::RealtimeTransport;

const RESUBSCRIBE_DELAY: Duration = Duration::from_millis(250);

/// Whether an inbound realtime message pertains to an order update, decided
/// by the id-prefixed discriminator the backend puts on every message.
fn pertains_to_order(message: &Value) -> bool {
    message
        .get("id")
        .and_then(Value::as_str)
        .is_some_and(|id| id.starts_with("order"))
}

/// Subscribes a controller to its per-order realtime channel, the local
/// notification channel, and the foreground-focus signal; any pertinent
/// signal triggers a reload. Overlapping reloads are reconciled by the
/// controller's generation counters.
pub struct SyncBridge;

impl SyncBridge {
    pub fn spawn(
        controller: Arc<OrderController>,
        transport: Arc<dyn RealtimeTransport>,
        bus: Arc<EventBus>,
        mut focus: watch::Receiver<u64>,
    ) -> SyncHandle {
        let subscription_id = Uuid::new_v4();
        let channel = format!("order.{}", controller.order_id());
        info!(%subscription_id, channel, "order sync subscription opened");

        let task_controller = controller.clone();
        let task = tokio::spawn(async move {
            let controller = task_controller;
            let mut realtime = transport.subscribe(&channel);
            let mut notifications = bus.subscribe(EventBus::NOTIFICATIONS);

            // The value present at subscription time is not a resume signal.
            focus.mark_unchanged();

            loop {
                tokio::select! {
                    message = realtime.next() => match message {
                        Some(message) if pertains_to_order(&message) => {
                            reload(&controller, "realtime").await;
                        }
                        Some(_) => {}
                        None => {
                            debug!(%subscription_id, "realtime stream ended; resubscribing");
                            sleep(RESUBSCRIBE_DELAY).await;
                            realtime = transport.subscribe(&channel);
                        }
                    },
                    notification = notifications.recv() => match notification {
                        Ok(_) | Err(RecvError::Lagged(_)) => {
                            reload(&controller, "notification").await;
                        }
                        Err(RecvError::Closed) => break,
                    },
                    changed = focus.changed() => match changed {
                        Ok(()) => reload(&controller, "focus").await,
                        Err(_) => break,
                    },
                }

                if controller.is_closed() {
                    break;
                }
            }

            debug!(%subscription_id, "order sync subscription loop ended");
        });

        SyncHandle {
            subscription_id,
            controller,
            task,
        }
    }
}

async fn reload(controller: &OrderController, source: &str) {
    controller
        .metrics()
        .sync_signals_total
        .with_label_values(&[source])
        .inc();

    let _ = controller.load_order().await;
}

/// Owns the sync subscription for the lifetime of the screen. Closing (or
/// dropping) releases the subscription and marks the controller torn down, so
/// responses still in flight are discarded rather than applied.
pub struct SyncHandle {
    subscription_id: Uuid,
    controller: Arc<OrderController>,
    task: JoinHandle<()>,
}

impl SyncHandle {
    pub fn subscription_id(&self) -> Uuid {
        self.subscription_id
    }

    pub fn close(&self) {
        info!(subscription_id = %self.subscription_id, "order sync subscription closed");
        self.controller.close();
        self.task.abort();
    }
}

impl Drop for SyncHandle {
    fn drop(&mut self) {
        self.close();
    }
}
