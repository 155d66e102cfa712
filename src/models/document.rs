use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::models::payload::{DestinationGroup, Entity, Waypoint};

/// Client-observed projection of the server `status` plus the adhoc flags.
/// Single authority for lifecycle classification; the document predicates and
/// the activity resolver both read from here.
#[derive(Debug, Clone, PartialEq)]
pub enum OrderState {
    /// Unassigned adhoc order offered to the driver for accept/decline.
    PingPending,
    NotStarted,
    Dispatched,
    InProgress { waypoint: Option<String> },
    Completed,
    Canceled,
}

/// Terminal server statuses; no further transitions exist past these.
pub fn is_terminal_status(status: &str) -> bool {
    matches!(status, "completed" | "canceled")
}

/// Lenient integer read: the backend sends money and counters as JSON numbers
/// or numeric strings interchangeably.
pub fn lenient_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

/// Wrapper around the backend's nested order representation. Replaced
/// wholesale on every successful operation, never field-mutated.
#[derive(Debug, Clone)]
pub struct OrderDocument {
    doc: Value,
}

impl OrderDocument {
    pub fn new(doc: Value) -> Self {
        Self { doc }
    }

    /// Dotted-path read into the nested document. Tolerates missing
    /// intermediate nodes at any depth and numeric array indices.
    pub fn get(&self, path: &str) -> Option<&Value> {
        let mut node = &self.doc;
        for segment in path.split('.') {
            node = match node {
                Value::Object(map) => map.get(segment)?,
                Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(node)
    }

    /// Like [`get`](Self::get) but substitutes `default` for absent or null
    /// nodes.
    pub fn get_or(&self, path: &str, default: Value) -> Value {
        match self.get(path) {
            Some(value) if !value.is_null() => value.clone(),
            _ => default,
        }
    }

    pub fn get_str(&self, path: &str) -> Option<&str> {
        self.get(path)?.as_str()
    }

    pub fn get_i64(&self, path: &str) -> Option<i64> {
        lenient_i64(self.get(path)?)
    }

    /// Present and non-null.
    pub fn is_filled(&self, path: &str) -> bool {
        self.get(path).is_some_and(|value| !value.is_null())
    }

    /// Deep copy of the underlying document, suitable for handing to another
    /// screen or process.
    pub fn serialize(&self) -> Value {
        self.doc.clone()
    }

    pub fn id(&self) -> &str {
        self.get_str("id").unwrap_or_default()
    }

    pub fn status(&self) -> &str {
        self.get_str("status").unwrap_or_default()
    }

    pub fn currency(&self) -> &str {
        self.get_str("meta.currency").unwrap_or("USD")
    }

    fn timestamp(&self, path: &str) -> Option<DateTime<Utc>> {
        let raw = self.get_str(path)?;
        DateTime::parse_from_rfc3339(raw)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.timestamp("created_at")
    }

    pub fn scheduled_at(&self) -> Option<DateTime<Utc>> {
        self.timestamp("scheduled_at")
    }

    pub fn dispatched_at(&self) -> Option<DateTime<Utc>> {
        self.timestamp("dispatched_at")
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.timestamp("started_at")
    }

    /// Authoritative lifecycle classification.
    pub fn state(&self) -> OrderState {
        let status = self.status();

        if status == "canceled" {
            return OrderState::Canceled;
        }
        if status == "completed" {
            return OrderState::Completed;
        }

        let adhoc = self.get("adhoc").and_then(Value::as_bool).unwrap_or(false);
        if adhoc && !self.is_filled("driver_assigned") {
            return OrderState::PingPending;
        }

        if self.is_filled("started_at") {
            return OrderState::InProgress {
                waypoint: self.current_waypoint_id().map(str::to_string),
            };
        }

        if self.is_filled("dispatched_at") || status == "dispatched" {
            return OrderState::Dispatched;
        }

        OrderState::NotStarted
    }

    pub fn is_order_ping(&self) -> bool {
        self.state() == OrderState::PingPending
    }

    pub fn is_not_started(&self) -> bool {
        matches!(self.state(), OrderState::NotStarted | OrderState::PingPending)
    }

    pub fn is_in_progress(&self) -> bool {
        matches!(self.state(), OrderState::InProgress { .. })
    }

    pub fn is_canceled(&self) -> bool {
        self.state() == OrderState::Canceled
    }

    /// Dispatch is tracked independently of the lifecycle state: a `created`
    /// order can already carry a `dispatched_at` stamp.
    pub fn is_dispatched(&self) -> bool {
        self.is_filled("dispatched_at") || self.status() == "dispatched"
    }

    pub fn current_waypoint_id(&self) -> Option<&str> {
        self.get_str("payload.current_waypoint")
    }

    fn place(&self, path: &str) -> Option<Waypoint> {
        let value = self.get(path)?;
        serde_json::from_value(value.clone()).ok()
    }

    pub fn waypoints(&self) -> Vec<Waypoint> {
        self.get("payload.waypoints")
            .and_then(|value| serde_json::from_value(value.clone()).ok())
            .unwrap_or_default()
    }

    pub fn entities(&self) -> Vec<Entity> {
        self.get("payload.entities")
            .and_then(|value| serde_json::from_value(value.clone()).ok())
            .unwrap_or_default()
    }

    pub fn is_multi_drop(&self) -> bool {
        !self.waypoints().is_empty()
    }

    /// The stop matching `payload.current_waypoint`, searched across pickup,
    /// waypoints and dropoff in route order.
    pub fn current_destination(&self) -> Option<Waypoint> {
        let current = self.current_waypoint_id()?;

        let mut places = Vec::new();
        if let Some(pickup) = self.place("payload.pickup") {
            places.push(pickup);
        }
        places.extend(self.waypoints());
        if let Some(dropoff) = self.place("payload.dropoff") {
            places.push(dropoff);
        }

        places.into_iter().find(|place| place.id == current)
    }

    /// Waypoints still awaiting a visit, in route order.
    pub fn waypoints_in_progress(&self) -> Vec<Waypoint> {
        self.waypoints()
            .into_iter()
            .filter(Waypoint::is_in_progress)
            .collect()
    }

    /// Multi-drop grouping of entities under their destination waypoint.
    /// Waypoints with no entities are dropped, as are entities without a
    /// destination reference.
    pub fn entities_by_destination(&self) -> Vec<DestinationGroup> {
        let waypoints = self.waypoints();
        if waypoints.is_empty() {
            return Vec::new();
        }

        let entities = self.entities();
        waypoints
            .into_iter()
            .filter_map(|waypoint| {
                let grouped: Vec<Entity> = entities
                    .iter()
                    .filter(|entity| entity.destination.as_deref() == Some(waypoint.id.as_str()))
                    .cloned()
                    .collect();

                if grouped.is_empty() {
                    None
                } else {
                    Some(DestinationGroup {
                        waypoint,
                        entities: grouped,
                    })
                }
            })
            .collect()
    }

    /// Navigation requires a resolvable current destination on an in-progress
    /// order.
    pub fn can_navigate(&self) -> bool {
        self.is_in_progress() && self.current_destination().is_some()
    }

    /// Destination selection is offered only on multi-drop orders that are in
    /// progress with no destination currently set.
    pub fn can_set_destination(&self) -> bool {
        self.is_multi_drop() && self.is_in_progress() && self.current_destination().is_none()
    }
}
