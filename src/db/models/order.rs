//! Order models
//!
//! Orders are immutable once committed: they record what was actually
//! sent to the kitchen. Only per-item kitchen status and the order-level
//! status progress after commit; `total_cents` is recomputed whenever
//! item composition changes (cancellation).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Open,
    PendingApproval,
    Approved,
    Paid,
    Cancelled,
}

/// Per-item kitchen progression. Monotone except CANCELLED, which is
/// only reachable from NEW.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderItemStatus {
    New,
    InProgress,
    Ready,
    Served,
    Cancelled,
}

impl OrderItemStatus {
    fn rank(self) -> u8 {
        match self {
            OrderItemStatus::New => 0,
            OrderItemStatus::InProgress => 1,
            OrderItemStatus::Ready => 2,
            OrderItemStatus::Served => 3,
            OrderItemStatus::Cancelled => 4,
        }
    }

    /// Whether `next` is a legal progression from `self`
    pub fn can_advance_to(self, next: OrderItemStatus) -> bool {
        match next {
            OrderItemStatus::Cancelled => self == OrderItemStatus::New,
            _ => self != OrderItemStatus::Cancelled && next.rank() == self.rank() + 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Order {
    pub id: String,
    pub session_id: String,
    pub restaurant_id: String,
    pub table_id: String,
    pub status: OrderStatus,
    pub total_cents: i64,
    /// Idempotency linkage (client-supplied key)
    pub client_request_id: Option<String>,
    pub placed_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct OrderItem {
    pub id: String,
    pub order_id: String,
    pub menu_item_id: String,
    pub name: String,
    pub station: String,
    pub quantity: i64,
    pub price_cents: i64,
    pub modifiers_cents: i64,
    /// JSON array of [`ItemModifier`]
    pub modifiers: Option<String>,
    pub note: Option<String>,
    pub status: OrderItemStatus,
}

impl OrderItem {
    /// Line total including modifiers
    pub fn line_total_cents(&self) -> i64 {
        (self.price_cents + self.modifiers_cents) * self.quantity
    }

    pub fn parsed_modifiers(&self) -> Vec<ItemModifier> {
        self.modifiers
            .as_deref()
            .and_then(|raw| serde_json::from_str(raw).ok())
            .unwrap_or_default()
    }
}

/// A single modifier applied to an order line (e.g. "extra cheese")
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemModifier {
    pub name: String,
    pub price_cents: i64,
}

/// A priced, validated order line produced by the transaction engine.
///
/// This is the payload parked in a suspicious order and replayed on
/// approval, so it must carry everything needed to commit without
/// re-consulting the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderLine {
    pub menu_item_id: String,
    pub name: String,
    pub station: String,
    pub quantity: i64,
    pub price_cents: i64,
    pub modifiers_cents: i64,
    pub modifiers: Vec<ItemModifier>,
    pub note: Option<String>,
    pub track_stock: bool,
}

impl OrderLine {
    pub fn line_total_cents(&self) -> i64 {
        (self.price_cents + self.modifiers_cents) * self.quantity
    }
}
