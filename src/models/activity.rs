use serde::{Deserialize, Serialize};

/// A candidate next status transition for an order, as offered by the backend.
/// Transient; the client classifies these but never invents its own.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Activity {
    /// Machine status key, e.g. `dispatched`, `driver_enroute`.
    pub code: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub details: String,
    /// Gates proof-of-delivery capture before the update may be sent.
    #[serde(default)]
    pub require_pod: bool,
}

impl Activity {
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            ..Self::default()
        }
    }
}
