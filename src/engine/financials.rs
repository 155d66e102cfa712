use serde_json::Value;

use crate::models::document::{OrderDocument, lenient_i64};

/// Tip resolved against the entities subtotal. All amounts are integer
/// minor-currency units.
#[derive(Debug, Clone, PartialEq)]
pub enum TipAmount {
    Flat(i64),
    Percent { percent: i64, amount: i64 },
}

impl TipAmount {
    pub fn value(&self) -> i64 {
        match self {
            TipAmount::Flat(amount) => *amount,
            TipAmount::Percent { amount, .. } => *amount,
        }
    }

    /// Display form; percentage tips render as `"15% (3.00 SGD)"`.
    pub fn display(&self, currency: &str) -> String {
        match self {
            TipAmount::Flat(amount) => minor_to_display(*amount, currency),
            TipAmount::Percent { percent, amount } => {
                format!("{percent}% ({})", minor_to_display(*amount, currency))
            }
        }
    }
}

/// Minor units to a major-unit display string, e.g. `1950 SGD -> "19.50 SGD"`.
pub fn minor_to_display(amount: i64, currency: &str) -> String {
    let sign = if amount < 0 { "-" } else { "" };
    let abs = amount.abs();
    format!("{sign}{}.{:02} {currency}", abs / 100, abs % 100)
}

/// Resolve a raw tip value: strings ending in `%` are percentages of the
/// subtotal, parsed by leading-integer truncation; anything else is read as a
/// literal minor-unit amount (unreadable values count as 0).
pub fn resolve_tip(raw: &Value, subtotal: i64) -> TipAmount {
    if let Some(text) = raw.as_str() {
        if let Some(stripped) = text.trim().strip_suffix('%') {
            let digits: String = stripped
                .trim()
                .chars()
                .take_while(|c| c.is_ascii_digit())
                .collect();
            let percent = digits.parse::<i64>().unwrap_or(0);

            return TipAmount::Percent {
                percent,
                amount: percent * subtotal / 100,
            };
        }
    }

    TipAmount::Flat(lenient_i64(raw).unwrap_or(0))
}

/// Sum of entity prices; missing or unreadable prices count as 0.
pub fn entities_subtotal(order: &OrderDocument) -> i64 {
    order
        .entities()
        .iter()
        .map(|entity| {
            entity
                .price
                .as_ref()
                .and_then(lenient_i64)
                .unwrap_or_default()
        })
        .sum()
}

/// Purchase-rate amount when the order carries one, else the meta delivery fee
/// when the `delivery_free` flag is set, else 0.
pub fn delivery_subtotal(order: &OrderDocument) -> i64 {
    if order.is_filled("purchase_rate") {
        return order.get_i64("purchase_rate.amount").unwrap_or(0);
    }

    let free_flag = order
        .get("meta.delivery_free")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    if free_flag {
        return order.get_i64("meta.delivery_fee").unwrap_or(0);
    }

    0
}

pub fn tip(order: &OrderDocument) -> TipAmount {
    let raw = order.get_or("meta.tip", Value::from(0));
    resolve_tip(&raw, entities_subtotal(order))
}

pub fn delivery_tip(order: &OrderDocument) -> TipAmount {
    let raw = order.get_or("meta.delivery_tip", Value::from(0));
    resolve_tip(&raw, entities_subtotal(order))
}

pub fn grand_total(order: &OrderDocument) -> i64 {
    entities_subtotal(order)
        + delivery_subtotal(order)
        + tip(order).value()
        + delivery_tip(order).value()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn order(value: Value) -> OrderDocument {
        OrderDocument::new(value)
    }

    #[test]
    fn percentage_tip_resolves_against_subtotal() {
        let tip = resolve_tip(&json!("15%"), 2000);
        assert_eq!(
            tip,
            TipAmount::Percent {
                percent: 15,
                amount: 300
            }
        );
        assert_eq!(tip.value(), 300);
        assert_eq!(tip.display("SGD"), "15% (3.00 SGD)");
    }

    #[test]
    fn flat_tip_passes_through_unchanged() {
        let tip = resolve_tip(&json!(500), 2000);
        assert_eq!(tip, TipAmount::Flat(500));
        assert_eq!(tip.display("USD"), "5.00 USD");
    }

    #[test]
    fn fractional_percentage_truncates_to_leading_integer() {
        let tip = resolve_tip(&json!("12.5%"), 1000);
        assert_eq!(
            tip,
            TipAmount::Percent {
                percent: 12,
                amount: 120
            }
        );
    }

    #[test]
    fn unreadable_tip_counts_as_zero() {
        assert_eq!(resolve_tip(&json!("gratis"), 1000), TipAmount::Flat(0));
        assert_eq!(resolve_tip(&json!(null), 1000), TipAmount::Flat(0));
    }

    #[test]
    fn entities_subtotal_tolerates_missing_and_string_prices() {
        let doc = order(json!({
            "payload": {
                "entities": [
                    { "id": "e1", "price": 1000 },
                    { "id": "e2", "price": "500" },
                    { "id": "e3" }
                ]
            }
        }));

        assert_eq!(entities_subtotal(&doc), 1500);
    }

    #[test]
    fn delivery_subtotal_prefers_purchase_rate() {
        let doc = order(json!({
            "purchase_rate": { "amount": 450 },
            "meta": { "delivery_free": true, "delivery_fee": 300 }
        }));
        assert_eq!(delivery_subtotal(&doc), 450);
    }

    #[test]
    fn delivery_subtotal_reads_meta_fee_behind_flag() {
        let flagged = order(json!({
            "meta": { "delivery_free": true, "delivery_fee": 300 }
        }));
        assert_eq!(delivery_subtotal(&flagged), 300);

        let unflagged = order(json!({
            "meta": { "delivery_fee": 300 }
        }));
        assert_eq!(delivery_subtotal(&unflagged), 0);
    }

    #[test]
    fn grand_total_sums_all_components() {
        let doc = order(json!({
            "purchase_rate": { "amount": 300 },
            "meta": { "tip": "10%", "delivery_tip": 0, "currency": "SGD" },
            "payload": {
                "entities": [
                    { "id": "e1", "price": 1000 },
                    { "id": "e2", "price": 500 }
                ]
            }
        }));

        assert_eq!(entities_subtotal(&doc), 1500);
        assert_eq!(tip(&doc).value(), 150);
        assert_eq!(delivery_tip(&doc).value(), 0);
        assert_eq!(grand_total(&doc), 1950);
    }
}
