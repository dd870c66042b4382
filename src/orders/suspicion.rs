//! Suspicion evaluation
//!
//! Pure function, no side effects: the decision to park an order is made
//! before any stock or kitchen interaction, on already-priced lines.

use crate::db::models::OrderLine;

/// Anomaly thresholds (from [`crate::core::Config`])
#[derive(Debug, Clone, Copy)]
pub struct SuspicionConfig {
    /// Any single line above this quantity is flagged
    pub qty_threshold: i64,
    /// Any order total above this amount (cents) is flagged
    pub total_cents_ceiling: i64,
}

/// Returns the flag reason, or `None` when the order is clear
pub fn evaluate(lines: &[OrderLine], total_cents: i64, cfg: &SuspicionConfig) -> Option<String> {
    for line in lines {
        if line.quantity > cfg.qty_threshold {
            return Some(format!(
                "Quantity {} of '{}' exceeds threshold {}",
                line.quantity, line.name, cfg.qty_threshold
            ));
        }
    }
    if total_cents > cfg.total_cents_ceiling {
        return Some(format!(
            "Order total {} exceeds ceiling {}",
            total_cents, cfg.total_cents_ceiling
        ));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(name: &str, quantity: i64, price_cents: i64) -> OrderLine {
        OrderLine {
            menu_item_id: format!("menu-{name}"),
            name: name.into(),
            station: "KITCHEN".into(),
            quantity,
            price_cents,
            modifiers_cents: 0,
            modifiers: vec![],
            note: None,
            track_stock: false,
        }
    }

    const CFG: SuspicionConfig = SuspicionConfig {
        qty_threshold: 10,
        total_cents_ceiling: 50_000,
    };

    #[test]
    fn normal_order_is_clear() {
        let lines = vec![line("noodles", 2, 1200), line("tea", 4, 300)];
        assert!(evaluate(&lines, 3600, &CFG).is_none());
    }

    #[test]
    fn excessive_line_quantity_is_flagged() {
        let lines = vec![line("beer", 15, 800)];
        let reason = evaluate(&lines, 12_000, &CFG).unwrap();
        assert!(reason.contains("beer"));
    }

    #[test]
    fn excessive_total_is_flagged() {
        let lines = vec![line("wagyu", 5, 20_000)];
        assert!(evaluate(&lines, 100_000, &CFG).is_some());
    }

    #[test]
    fn threshold_boundary_is_not_flagged() {
        let lines = vec![line("beer", 10, 800)];
        assert!(evaluate(&lines, 50_000, &CFG).is_none());
    }
}
