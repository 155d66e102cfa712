use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::error::CoreError;
use crate::models::activity::Activity;
use crate::models::payload::GeoPoint;

/// Parameters for starting an order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StartParams {
    /// Bypass the dispatch precondition after the driver confirmed pickup.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub skip_dispatch: bool,
    /// Driver id to self-assign when accepting an adhoc order ping.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assign: Option<String>,
}

/// Parameters for posting an activity update.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ActivityUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activity: Option<Activity>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub skip_dispatch: bool,
}

impl ActivityUpdate {
    pub fn activity(activity: Activity) -> Self {
        Self {
            activity: Some(activity),
            skip_dispatch: false,
        }
    }

    pub fn skip_dispatch() -> Self {
        Self {
            activity: None,
            skip_dispatch: true,
        }
    }
}

/// Opaque authenticated driver identity; lifecycle managed externally.
#[derive(Debug, Clone)]
pub struct DriverContext {
    pub id: String,
}

impl DriverContext {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// Backend resource client for order CRUD and lifecycle calls. Every method
/// resolves with a fresh order representation or fails with a backend error
/// message; the schema is owned by the backend.
#[async_trait]
pub trait OrderApi: Send + Sync {
    async fn find_order(&self, id: &str) -> Result<Value, CoreError>;

    async fn start_order(&self, id: &str, params: &StartParams) -> Result<Value, CoreError>;

    async fn update_activity(&self, id: &str, params: &ActivityUpdate)
    -> Result<Value, CoreError>;

    async fn set_destination(&self, id: &str, waypoint_id: &str) -> Result<Value, CoreError>;

    async fn complete_order(&self, id: &str) -> Result<Value, CoreError>;

    /// Activities the backend offers as valid next transitions for the order
    /// at the given waypoint. An empty list means the order can only be
    /// completed.
    async fn next_activity(
        &self,
        id: &str,
        waypoint: Option<&str>,
    ) -> Result<Vec<Activity>, CoreError>;

    /// Driver position ping; fire-and-forget from the controller's view.
    async fn track_driver(&self, driver_id: &str, position: GeoPoint) -> Result<(), CoreError>;
}
