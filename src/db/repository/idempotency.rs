//! Idempotency Ledger Repository
//!
//! The PENDING marker is claimed with `INSERT ... ON CONFLICT DO NOTHING`
//! before any irreversible side effect; resolution to its final state
//! happens inside the same transaction that commits the side effect.
//!
//! Keys are client-chosen and therefore namespaced per session: every
//! lookup and mutation here is scoped to `(session_id, key)` so one
//! table's key can never observe or replay another table's order.

use super::RepoResult;
use crate::db::models::{IdempotencyRecord, IdempotencyState};
use chrono::{DateTime, Duration, Utc};
use sqlx::{SqliteConnection, SqlitePool};

const SELECT: &str = "SELECT key, session_id, state, order_id, suspicious_id, created_at, expires_at \
     FROM idempotency_key";

/// Claim result for a key
#[derive(Debug)]
pub enum Claim {
    /// We own the key now; proceed with placement
    Acquired,
    /// Someone already holds it; here is its current record
    Existing(IdempotencyRecord),
}

/// Try to claim `key` as PENDING within the session's namespace.
/// Expired records are treated as absent.
pub async fn claim(
    conn: &mut SqliteConnection,
    session_id: &str,
    key: &str,
    ttl_hours: i64,
) -> RepoResult<Claim> {
    let now = Utc::now();

    // Lazily drop an expired record so the key becomes claimable again
    sqlx::query(
        "DELETE FROM idempotency_key WHERE session_id = ? AND key = ? AND expires_at <= ?",
    )
    .bind(session_id)
    .bind(key)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    let result = sqlx::query(
        "INSERT INTO idempotency_key (key, session_id, state, created_at, expires_at)
         VALUES (?, ?, 'PENDING', ?, ?)
         ON CONFLICT (session_id, key) DO NOTHING",
    )
    .bind(key)
    .bind(session_id)
    .bind(now)
    .bind(now + Duration::hours(ttl_hours))
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 1 {
        return Ok(Claim::Acquired);
    }

    let existing = sqlx::query_as::<_, IdempotencyRecord>(&format!(
        "{SELECT} WHERE session_id = ? AND key = ?"
    ))
    .bind(session_id)
    .bind(key)
    .fetch_one(conn)
    .await?;
    Ok(Claim::Existing(existing))
}

pub async fn find(
    pool: &SqlitePool,
    session_id: &str,
    key: &str,
) -> RepoResult<Option<IdempotencyRecord>> {
    let record = sqlx::query_as::<_, IdempotencyRecord>(&format!(
        "{SELECT} WHERE session_id = ? AND key = ? AND expires_at > ?"
    ))
    .bind(session_id)
    .bind(key)
    .bind(Utc::now())
    .fetch_optional(pool)
    .await?;
    Ok(record)
}

pub async fn resolve(
    conn: &mut SqliteConnection,
    session_id: &str,
    key: &str,
    state: IdempotencyState,
    order_id: Option<&str>,
    suspicious_id: Option<&str>,
) -> RepoResult<()> {
    sqlx::query(
        "UPDATE idempotency_key SET state = ?, order_id = ?, suspicious_id = ?
         WHERE session_id = ? AND key = ?",
    )
    .bind(state)
    .bind(order_id)
    .bind(suspicious_id)
    .bind(session_id)
    .bind(key)
    .execute(conn)
    .await?;
    Ok(())
}

/// Release a PENDING claim after a failed placement so the client can
/// retry with the same key
pub async fn release_pending(
    conn: &mut SqliteConnection,
    session_id: &str,
    key: &str,
) -> RepoResult<()> {
    sqlx::query(
        "DELETE FROM idempotency_key WHERE session_id = ? AND key = ? AND state = 'PENDING'",
    )
    .bind(session_id)
    .bind(key)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn purge_expired(pool: &SqlitePool, now: DateTime<Utc>) -> RepoResult<u64> {
    let result = sqlx::query("DELETE FROM idempotency_key WHERE expires_at <= ?")
        .bind(now)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}
