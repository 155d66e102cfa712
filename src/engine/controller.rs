use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use serde_json::Value;
use tokio::sync::{Mutex, RwLock, broadcast};
use tracing::{debug, info, warn};

use crate::api::{ActivityUpdate, DriverContext, OrderApi, StartParams};
use crate::config::Config;
use crate::engine::resolver::{self, NextStep};
use crate::error::CoreError;
use crate::models::activity::Activity;
use crate::models::document::OrderDocument;
use crate::models::payload::{GeoPoint, Waypoint};
use crate::observability::metrics::Metrics;

/// Prompts and outcomes surfaced to the rendering layer. Backend errors never
/// escape the controller; they arrive here as non-fatal alerts.
#[derive(Debug, Clone)]
pub enum ControllerEvent {
    /// The order document was replaced with a fresh server snapshot.
    OrderReplaced,
    Alert {
        title: String,
        message: String,
    },
    /// Start was rejected because the order is undispatched; the driver must
    /// confirm pickup ([`confirm_pickup`](OrderController::confirm_pickup)) or
    /// abandon and resync.
    ConfirmPickup,
    /// The only offered activity would dispatch an undispatched order.
    ConfirmDispatch(Activity),
    /// Candidate next activities for the driver to pick from.
    ActivityChoices(Vec<Activity>),
    /// No further activities exist; completing the order is the only step left.
    CompleteAvailable,
    /// The chosen activity requires proof-of-delivery capture; hand off with
    /// the serialized order and destination, no backend call made.
    PodRequired {
        activity: Activity,
        order: Value,
        waypoint: Option<Waypoint>,
    },
    /// The screen should be dismissed (adhoc decline).
    Dismissed,
}

/// Clears its loading flag on every exit path, early returns included.
struct FlagGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> FlagGuard<'a> {
    fn set(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self { flag }
    }
}

impl Drop for FlagGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

/// Orchestrates state-changing operations for a single order screen.
///
/// Mutating calls are serialized: a second intent arriving while one is in
/// flight is rejected with [`CoreError::Busy`]. Reloads may overlap and are
/// reconciled by issue generation, so a stale response can never overwrite a
/// newer snapshot. After [`close`](Self::close) every pending response is
/// discarded.
pub struct OrderController {
    api: Arc<dyn OrderApi>,
    driver: DriverContext,
    order_id: String,
    doc: RwLock<OrderDocument>,
    events: broadcast::Sender<ControllerEvent>,
    action_lock: Mutex<()>,
    loading_action: AtomicBool,
    loading_activity: AtomicBool,
    refreshing: AtomicBool,
    load_gen: AtomicU64,
    applied_gen: AtomicU64,
    closed: AtomicBool,
    pending_pickup_retry: AtomicBool,
    pending_dispatch_confirm: AtomicBool,
    pending_activities: RwLock<Vec<Activity>>,
    timeout: Duration,
    metrics: Metrics,
}

impl OrderController {
    pub fn new(
        api: Arc<dyn OrderApi>,
        driver: DriverContext,
        initial: Value,
        config: &Config,
        metrics: Metrics,
    ) -> Self {
        let doc = OrderDocument::new(initial);
        let order_id = doc.id().to_string();
        let (events, _) = broadcast::channel(config.event_buffer_size);

        Self {
            api,
            driver,
            order_id,
            doc: RwLock::new(doc),
            events,
            action_lock: Mutex::new(()),
            loading_action: AtomicBool::new(false),
            loading_activity: AtomicBool::new(false),
            refreshing: AtomicBool::new(false),
            load_gen: AtomicU64::new(0),
            applied_gen: AtomicU64::new(0),
            closed: AtomicBool::new(false),
            pending_pickup_retry: AtomicBool::new(false),
            pending_dispatch_confirm: AtomicBool::new(false),
            pending_activities: RwLock::new(Vec::new()),
            timeout: config.request_timeout(),
            metrics,
        }
    }

    pub fn order_id(&self) -> &str {
        &self.order_id
    }

    pub fn driver(&self) -> &DriverContext {
        &self.driver
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Current document snapshot.
    pub async fn order(&self) -> OrderDocument {
        self.doc.read().await.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ControllerEvent> {
        self.events.subscribe()
    }

    /// Candidate activities awaiting driver selection, as stored by the last
    /// [`update_activity`](Self::update_activity) round trip.
    pub async fn pending_activities(&self) -> Vec<Activity> {
        self.pending_activities.read().await.clone()
    }

    pub fn is_loading_action(&self) -> bool {
        self.loading_action.load(Ordering::SeqCst)
    }

    pub fn is_loading_activity(&self) -> bool {
        self.loading_activity.load(Ordering::SeqCst)
    }

    pub fn is_refreshing(&self) -> bool {
        self.refreshing.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Teardown boundary. In-flight backend requests are left to complete but
    /// their results are discarded; loading flags are released. Operations
    /// invoked afterwards are rejected with [`CoreError::Closed`].
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.loading_action.store(false, Ordering::SeqCst);
        self.loading_activity.store(false, Ordering::SeqCst);
        self.refreshing.store(false, Ordering::SeqCst);
    }

    /// Refetch the order by id and replace the document. Overlapping reloads
    /// resolve by issue generation; a load issued before the currently applied
    /// snapshot is discarded. Failures leave the previous document intact and
    /// surface as a non-fatal alert.
    pub async fn load_order(&self) -> Result<(), CoreError> {
        self.ensure_open()?;
        let _flag = FlagGuard::set(&self.refreshing);
        let issue = self.load_gen.fetch_add(1, Ordering::SeqCst) + 1;

        match self.call(self.api.find_order(&self.order_id)).await {
            Ok(value) => {
                if self.apply_loaded(issue, value).await {
                    self.metrics
                        .order_loads_total
                        .with_label_values(&["success"])
                        .inc();
                } else {
                    self.metrics
                        .order_loads_total
                        .with_label_values(&["stale"])
                        .inc();
                    debug!(order_id = %self.order_id, issue, "discarded stale order load");
                }
            }
            Err(err) => {
                self.metrics
                    .order_loads_total
                    .with_label_values(&["error"])
                    .inc();
                self.alert("Error", err.summary());
            }
        }

        Ok(())
    }

    /// Request order start. An undispatched-order rejection becomes a
    /// [`ControllerEvent::ConfirmPickup`] prompt instead of an alert.
    pub async fn start(&self, params: StartParams) -> Result<(), CoreError> {
        self.ensure_open()?;
        let _lock = self.action_lock.try_lock().map_err(|_| CoreError::Busy)?;
        let _flag = FlagGuard::set(&self.loading_action);
        let started = Instant::now();

        match self.call(self.api.start_order(&self.order_id, &params)).await {
            Ok(value) => {
                self.count_action("start", "success");
                self.apply_mutation(value).await;
            }
            Err(err) if err.is_not_dispatched() && !params.skip_dispatch => {
                self.count_action("start", "precondition");
                info!(order_id = %self.order_id, "start rejected: order not dispatched");
                self.pending_pickup_retry.store(true, Ordering::SeqCst);
                let _ = self.events.send(ControllerEvent::ConfirmPickup);
            }
            Err(err) => {
                self.count_action("start", "error");
                self.alert("Error", err.summary());
            }
        }

        self.observe("start", started);
        Ok(())
    }

    /// Driver confirmed pickup after the dispatch precondition failed. Retries
    /// `start` with `skip_dispatch` exactly once per prompt.
    pub async fn confirm_pickup(&self) -> Result<(), CoreError> {
        if !self.pending_pickup_retry.swap(false, Ordering::SeqCst) {
            return Ok(());
        }

        let result = self
            .start(StartParams {
                skip_dispatch: true,
                assign: None,
            })
            .await;

        // A busy rejection never fired the retry; re-arm the prompt so the
        // driver can confirm again once the in-flight action settles.
        if matches!(result, Err(CoreError::Busy)) {
            self.pending_pickup_retry.store(true, Ordering::SeqCst);
        }

        result
    }

    /// Driver chose "not yet" on the pickup prompt; resync instead.
    pub async fn abandon_pickup(&self) -> Result<(), CoreError> {
        self.pending_pickup_retry.store(false, Ordering::SeqCst);
        self.load_order().await
    }

    /// Accept an adhoc order ping by starting it with self-assignment.
    pub async fn accept_adhoc(&self) -> Result<(), CoreError> {
        self.start(StartParams {
            skip_dispatch: false,
            assign: Some(self.driver.id.clone()),
        })
        .await
    }

    /// Decline an adhoc order ping. Local only: no backend call is made, the
    /// order stays available for reassignment server-side.
    pub fn decline_adhoc(&self) {
        info!(order_id = %self.order_id, "adhoc order declined locally");
        let _ = self.events.send(ControllerEvent::Dismissed);
    }

    /// Ask the backend for the valid next activities at the current
    /// destination and surface the classified step as an event.
    pub async fn update_activity(&self) -> Result<(), CoreError> {
        self.ensure_open()?;
        let _lock = self.action_lock.try_lock().map_err(|_| CoreError::Busy)?;
        let _flag = FlagGuard::set(&self.loading_action);
        let started = Instant::now();

        let waypoint = {
            let doc = self.doc.read().await;
            doc.current_destination().map(|place| place.id)
        };

        let offered = self
            .call(self.api.next_activity(&self.order_id, waypoint.as_deref()))
            .await;
        self.observe("next_activity", started);

        match offered {
            Ok(offered) => {
                let step = {
                    let doc = self.doc.read().await;
                    resolver::classify_next(&doc, offered)
                };

                match step {
                    NextStep::Complete => {
                        self.pending_activities.write().await.clear();
                        let _ = self.events.send(ControllerEvent::CompleteAvailable);
                    }
                    NextStep::ConfirmDispatch(activity) => {
                        self.pending_activities.write().await.clear();
                        self.pending_dispatch_confirm.store(true, Ordering::SeqCst);
                        let _ = self.events.send(ControllerEvent::ConfirmDispatch(activity));
                    }
                    NextStep::Choose(activities) => {
                        *self.pending_activities.write().await = activities.clone();
                        let _ = self.events.send(ControllerEvent::ActivityChoices(activities));
                    }
                }
            }
            Err(err) => self.alert("Error", err.summary()),
        }

        Ok(())
    }

    /// Driver confirmed sending an update on an undispatched order.
    pub async fn confirm_dispatch(&self) -> Result<(), CoreError> {
        self.ensure_open()?;
        // Lock before consuming the one-shot flag; a busy rejection must leave
        // the confirmation armed.
        let _lock = self.action_lock.try_lock().map_err(|_| CoreError::Busy)?;
        if !self.pending_dispatch_confirm.swap(false, Ordering::SeqCst) {
            return Ok(());
        }

        let _flag = FlagGuard::set(&self.loading_activity);
        let started = Instant::now();

        match self
            .call(
                self.api
                    .update_activity(&self.order_id, &ActivityUpdate::skip_dispatch()),
            )
            .await
        {
            Ok(value) => {
                self.count_action("update_activity", "success");
                self.apply_mutation(value).await;
            }
            Err(err) => {
                self.count_action("update_activity", "error");
                self.alert("Error", err.summary());
            }
        }

        self.observe("update_activity", started);
        Ok(())
    }

    /// Driver canceled the dispatch confirmation; resync instead.
    pub async fn cancel_dispatch(&self) -> Result<(), CoreError> {
        self.pending_dispatch_confirm.store(false, Ordering::SeqCst);
        self.load_order().await
    }

    /// Send a chosen activity update. Activities gated on proof of delivery
    /// are handed off for capture instead of being posted directly.
    pub async fn send_activity_update(&self, activity: Activity) -> Result<(), CoreError> {
        self.ensure_open()?;
        let _lock = self.action_lock.try_lock().map_err(|_| CoreError::Busy)?;
        let _flag = FlagGuard::set(&self.loading_activity);

        if activity.require_pod {
            let (order, waypoint) = {
                let doc = self.doc.read().await;
                (doc.serialize(), doc.current_destination())
            };

            self.count_action("update_activity", "pod_handoff");
            let _ = self.events.send(ControllerEvent::PodRequired {
                activity,
                order,
                waypoint,
            });
            return Ok(());
        }

        let started = Instant::now();
        match self
            .call(
                self.api
                    .update_activity(&self.order_id, &ActivityUpdate::activity(activity)),
            )
            .await
        {
            Ok(value) => {
                self.count_action("update_activity", "success");
                self.apply_mutation(value).await;
            }
            Err(err) => {
                self.count_action("update_activity", "error");
                self.alert("Error", err.summary());
            }
        }

        self.pending_activities.write().await.clear();
        self.observe("update_activity", started);
        Ok(())
    }

    /// Set the current destination waypoint. Silent no-op unless the order is
    /// multi-drop, in progress, and has no destination set.
    pub async fn set_destination(&self, waypoint_id: &str) -> Result<(), CoreError> {
        self.ensure_open()?;
        if waypoint_id.is_empty() {
            return Ok(());
        }

        {
            let doc = self.doc.read().await;
            if !doc.can_set_destination() {
                debug!(order_id = %self.order_id, waypoint_id, "destination change not applicable");
                return Ok(());
            }
        }

        let _lock = self.action_lock.try_lock().map_err(|_| CoreError::Busy)?;
        let _flag = FlagGuard::set(&self.loading_action);
        let started = Instant::now();

        match self
            .call(self.api.set_destination(&self.order_id, waypoint_id))
            .await
        {
            Ok(value) => {
                self.count_action("set_destination", "success");
                self.apply_mutation(value).await;
            }
            Err(err) => {
                self.count_action("set_destination", "error");
                self.alert("Error", err.summary());
            }
        }

        self.observe("set_destination", started);
        Ok(())
    }

    /// Terminal transition.
    pub async fn complete_order(&self) -> Result<(), CoreError> {
        self.ensure_open()?;
        let _lock = self.action_lock.try_lock().map_err(|_| CoreError::Busy)?;
        let _flag = FlagGuard::set(&self.loading_activity);
        let started = Instant::now();

        match self.call(self.api.complete_order(&self.order_id)).await {
            Ok(value) => {
                self.count_action("complete", "success");
                self.apply_mutation(value).await;
            }
            Err(err) => {
                self.count_action("complete", "error");
                self.alert("Error", err.summary());
            }
        }

        self.pending_activities.write().await.clear();
        self.observe("complete", started);
        Ok(())
    }

    /// Driver position ping; failures are logged and swallowed.
    pub async fn track_position(&self, position: GeoPoint) {
        if let Err(err) = self.call(self.api.track_driver(&self.driver.id, position)).await {
            debug!(order_id = %self.order_id, error = %err, "driver position ping failed");
        }
    }

    fn ensure_open(&self) -> Result<(), CoreError> {
        if self.is_closed() {
            return Err(CoreError::Closed);
        }
        Ok(())
    }

    async fn call<T>(
        &self,
        fut: impl Future<Output = Result<T, CoreError>>,
    ) -> Result<T, CoreError> {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(CoreError::Timeout(self.timeout)),
        }
    }

    /// Apply a reload response. Returns false when the response lost the
    /// generation race or arrived after teardown.
    async fn apply_loaded(&self, issue: u64, value: Value) -> bool {
        if self.is_closed() {
            return false;
        }

        loop {
            let current = self.applied_gen.load(Ordering::SeqCst);
            if issue <= current {
                return false;
            }
            if self
                .applied_gen
                .compare_exchange(current, issue, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
            {
                break;
            }
        }

        *self.doc.write().await = OrderDocument::new(value);
        let _ = self.events.send(ControllerEvent::OrderReplaced);
        true
    }

    /// Apply a mutation response. Claims a fresh generation so reloads issued
    /// earlier cannot overwrite it.
    async fn apply_mutation(&self, value: Value) {
        if self.is_closed() {
            return;
        }

        let generation = self.load_gen.fetch_add(1, Ordering::SeqCst) + 1;
        self.applied_gen.fetch_max(generation, Ordering::SeqCst);

        *self.doc.write().await = OrderDocument::new(value);
        let _ = self.events.send(ControllerEvent::OrderReplaced);
    }

    fn alert(&self, title: &str, message: String) {
        warn!(order_id = %self.order_id, message = %message, "non-fatal order error");
        let _ = self.events.send(ControllerEvent::Alert {
            title: title.to_string(),
            message,
        });
    }

    fn count_action(&self, action: &str, outcome: &str) {
        self.metrics
            .order_actions_total
            .with_label_values(&[action, outcome])
            .inc();
    }

    fn observe(&self, action: &str, started: Instant) {
        self.metrics
            .action_latency_seconds
            .with_label_values(&[action])
            .observe(started.elapsed().as_secs_f64());
    }
}
