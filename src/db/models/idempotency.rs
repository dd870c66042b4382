//! Idempotency ledger records
//!
//! `key → PENDING | SUSPICIOUS | COMPLETED | CONSUMED`. The record is
//! written before any irreversible side effect begins and resolved only
//! after the commit. A crash between the two means "unknown state": the
//! client polls `orders/resume` or retries with the same key.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IdempotencyState {
    /// Placement in flight, outcome unknown
    Pending,
    /// Parked in the suspicious-order gate
    Suspicious,
    /// Resolved to a committed order
    Completed,
    /// Terminally consumed (rejected suspicious order); never replayable
    Consumed,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct IdempotencyRecord {
    pub key: String,
    pub session_id: String,
    pub state: IdempotencyState,
    pub order_id: Option<String>,
    pub suspicious_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}
