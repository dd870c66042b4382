//! Suspicious order quarantine records
//!
//! A parked, side-effect-free snapshot of an order that tripped the
//! anomaly thresholds. Approval replays it through the same transactional
//! commit as a normal placement; rejection is terminal.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::order::OrderLine;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SuspiciousStatus {
    PendingApproval,
    Approved,
    Rejected,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct SuspiciousOrder {
    pub id: String,
    pub session_id: String,
    pub restaurant_id: String,
    pub table_id: String,
    /// JSON array of [`OrderLine`]
    pub payload: String,
    pub total_cents: i64,
    pub reason: String,
    pub status: SuspiciousStatus,
    pub idempotency_key: Option<String>,
    pub resolved_by: Option<String>,
    pub resolved_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl SuspiciousOrder {
    pub fn lines(&self) -> Result<Vec<OrderLine>, serde_json::Error> {
        serde_json::from_str(&self.payload)
    }
}
