use std::time::Duration;

use thiserror::Error;

/// Message prefix the backend uses to reject a start on an undispatched order.
pub const NOT_DISPATCHED_PREFIX: &str = "Order has not been dispatched";

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("backend error: {0}")]
    Backend(String),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("another action is already in flight")]
    Busy,

    #[error("order screen has been torn down")]
    Closed,

    #[error("internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Precondition failure that is recoverable via the confirm-pickup prompt.
    pub fn is_not_dispatched(&self) -> bool {
        matches!(self, CoreError::Backend(msg) if msg.starts_with(NOT_DISPATCHED_PREFIX))
    }

    /// Short human-readable summary for non-fatal alert surfaces.
    pub fn summary(&self) -> String {
        match self {
            CoreError::Backend(msg) => msg.clone(),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_dispatched_matches_prefix_only() {
        let err = CoreError::Backend("Order has not been dispatched yet".to_string());
        assert!(err.is_not_dispatched());

        let other = CoreError::Backend("Order not found".to_string());
        assert!(!other.is_not_dispatched());

        let timeout = CoreError::Timeout(Duration::from_secs(10));
        assert!(!timeout.is_not_dispatched());
    }
}
