use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Tracking sub-statuses that take a waypoint out of the in-progress set.
pub const CLOSED_TRACKING_STATUSES: [&str; 2] = ["completed", "canceled"];

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrackingStatus {
    #[serde(default)]
    pub tracking_number: Option<String>,
    #[serde(default)]
    pub status_code: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Waypoint {
    pub id: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub location: Option<Value>,
    #[serde(default)]
    pub tracking_number: Option<TrackingStatus>,
}

impl Waypoint {
    /// Whether the stop still needs a visit: it has a tracking record and its
    /// sub-status is not completed or canceled.
    pub fn is_in_progress(&self) -> bool {
        let Some(tracking) = &self.tracking_number else {
            return false;
        };

        match &tracking.status_code {
            Some(code) => {
                let code = code.to_lowercase();
                !CLOSED_TRACKING_STATUSES.contains(&code.as_str())
            }
            None => true,
        }
    }

    /// Geocoordinates from the GeoJSON `location` node (`[lng, lat]`).
    pub fn coords(&self) -> Option<GeoPoint> {
        let coordinates = self.location.as_ref()?.get("coordinates")?.as_array()?;
        let lng = coordinates.first()?.as_f64()?;
        let lat = coordinates.get(1)?.as_f64()?;
        Some(GeoPoint { lat, lng })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// Minor-currency price; the backend sends numbers or numeric strings.
    #[serde(default)]
    pub price: Option<Value>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub meta: Option<Value>,
    #[serde(default)]
    pub tracking_number: Option<TrackingStatus>,
    /// Destination waypoint id for multi-drop grouping.
    #[serde(default)]
    pub destination: Option<String>,
}

/// Entities grouped under the waypoint they drop at.
#[derive(Debug, Clone, Serialize)]
pub struct DestinationGroup {
    pub waypoint: Waypoint,
    pub entities: Vec<Entity>,
}
