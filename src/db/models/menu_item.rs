//! Catalog and stock models
//!
//! The catalog collaborator surface: price, station routing, tax and
//! stock-tracking flags. Menu CRUD itself lives outside this service.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Catalog item availability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ItemStatus {
    Active,
    Disabled,
    Archived,
}

/// Catalog item (菜品)
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct MenuItem {
    pub id: String,
    pub restaurant_id: String,
    pub name: String,
    pub price_cents: i64,
    pub tax_percent: i64,
    /// Kitchen station this item routes to
    pub station: String,
    pub status: ItemStatus,
    pub track_stock: bool,
    /// Disable the item in the same transaction when stock hits zero
    pub auto_hide_when_zero: bool,
    pub max_per_order: i64,
}

impl MenuItem {
    /// Item can be ordered right now (stock not considered here)
    pub fn is_orderable(&self) -> bool {
        self.status == ItemStatus::Active
    }
}

/// Per (restaurant, item) stock counter. `quantity = NULL` means unlimited.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Stock {
    pub menu_item_id: String,
    pub restaurant_id: String,
    pub quantity: Option<i64>,
    pub updated_at: DateTime<Utc>,
}
