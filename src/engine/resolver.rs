use crate::models::activity::Activity;
use crate::models::document::OrderDocument;

/// Classification of the backend's offered next activities. The backend's
/// activity graph is authoritative; this only sorts its response into the
/// branches the controller has to handle, it never adds a transition.
#[derive(Debug, Clone, PartialEq)]
pub enum NextStep {
    /// No further activities exist; the only remaining transition is
    /// completing the order.
    Complete,
    /// The offered activity would dispatch an order that has not been
    /// dispatched yet; the driver must confirm before it is sent.
    ConfirmDispatch(Activity),
    /// One or more valid transitions to pick from, in backend order.
    Choose(Vec<Activity>),
}

pub fn classify_next(order: &OrderDocument, offered: Vec<Activity>) -> NextStep {
    if offered.is_empty() {
        return NextStep::Complete;
    }

    if let [activity] = offered.as_slice() {
        if activity.code == "dispatched" && !order.is_dispatched() {
            return NextStep::ConfirmDispatch(activity.clone());
        }
    }

    NextStep::Choose(offered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn undispatched_order() -> OrderDocument {
        OrderDocument::new(json!({ "id": "order_1", "status": "created" }))
    }

    fn dispatched_order() -> OrderDocument {
        OrderDocument::new(json!({
            "id": "order_1",
            "status": "created",
            "dispatched_at": "2024-03-01T08:00:00Z"
        }))
    }

    #[test]
    fn empty_offer_means_complete() {
        assert_eq!(
            classify_next(&undispatched_order(), Vec::new()),
            NextStep::Complete
        );
    }

    #[test]
    fn dispatched_code_on_undispatched_order_needs_confirmation() {
        let step = classify_next(&undispatched_order(), vec![Activity::new("dispatched")]);
        assert!(matches!(step, NextStep::ConfirmDispatch(a) if a.code == "dispatched"));
    }

    #[test]
    fn dispatched_code_on_dispatched_order_is_a_normal_choice() {
        let step = classify_next(&dispatched_order(), vec![Activity::new("dispatched")]);
        assert!(matches!(step, NextStep::Choose(list) if list.len() == 1));
    }

    #[test]
    fn offered_transitions_pass_through_in_order() {
        let offered = vec![
            Activity::new("driver_enroute"),
            Activity::new("arrived"),
            Activity::new("delivered"),
        ];

        let step = classify_next(&dispatched_order(), offered.clone());
        let NextStep::Choose(list) = step else {
            panic!("expected a choice");
        };

        let codes: Vec<&str> = list.iter().map(|a| a.code.as_str()).collect();
        assert_eq!(codes, ["driver_enroute", "arrived", "delivered"]);

        let offered_codes: Vec<&str> = offered.iter().map(|a| a.code.as_str()).collect();
        assert_eq!(codes, offered_codes, "no transitions invented or dropped");
    }
}
