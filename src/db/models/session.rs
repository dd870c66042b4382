//! Session models
//!
//! 一次就餐从开台到关台的全部状态。会话只存哈希后的令牌；
//! 明文令牌仅在签发时返回一次。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Session lifecycle: OPEN is the only live state, CLOSED is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    Open,
    Closed,
}

/// Cart sharing mode: FAMILY shares one cart across devices,
/// INDIVIDUAL scopes cart lines to the device that added them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionMode {
    Family,
    Individual,
}

/// One seating at a table (会话)
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Session {
    pub id: String,
    pub table_id: String,
    pub restaurant_id: String,
    pub status: SessionStatus,
    pub mode: SessionMode,
    /// 4-digit table PIN. Short-lived and rate-limited, stored as-is.
    #[serde(skip_serializing)]
    pub pin: String,
    /// sha256 of the staff-facing session token
    #[serde(skip_serializing)]
    pub staff_token_hash: String,
    pub pin_failed_count: i64,
    pub pin_blocked_until: Option<DateTime<Utc>>,
    /// Advisory checkout-exclusivity marker (FAMILY mode), never authoritative
    pub checkout_held_by: Option<String>,
    pub opened_by: String,
    pub last_activity_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

/// Per-device customer credential, stored hashed with an expiry
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct CustomerToken {
    pub id: String,
    pub session_id: String,
    #[serde(skip_serializing)]
    pub token_hash: String,
    pub device_id: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}
