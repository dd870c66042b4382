//! Cart line items
//!
//! Ephemeral lines scoped to a session (and to a device in INDIVIDUAL
//! mode). The price snapshot is taken at add time and never recomputed,
//! so the customer-facing running total stays stable even if the catalog
//! price changes mid-session.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Quantity bounds for a single cart line
pub const MIN_CART_QTY: i64 = 1;
pub const MAX_CART_QTY: i64 = 20;

/// Device scope used for the shared FAMILY cart
pub const SHARED_DEVICE: &str = "";

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct CartItem {
    pub id: String,
    pub session_id: String,
    /// Empty string = shared cart (FAMILY mode)
    pub device_id: String,
    pub menu_item_id: String,
    pub quantity: i64,
    /// Price snapshot at add time (cents)
    pub price_cents: i64,
    pub note: Option<String>,
    pub added_at: DateTime<Utc>,
}
