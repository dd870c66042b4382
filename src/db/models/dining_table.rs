//! Dining table and zone models

use serde::{Deserialize, Serialize};

/// Physical table state (桌台状态)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TableStatus {
    Free,
    Occupied,
    Reserved,
}

/// Dining table entity (桌台)
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct DiningTable {
    pub id: String,
    pub name: String,
    pub zone_id: Option<String>,
    pub capacity: i64,
    pub status: TableStatus,
    pub is_active: bool,
}

/// Floor zone (区域)
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Zone {
    pub id: String,
    pub name: String,
    pub is_active: bool,
}
