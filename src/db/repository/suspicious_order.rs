//! Suspicious Order Repository

use super::{RepoError, RepoResult};
use crate::db::models::{SuspiciousOrder, SuspiciousStatus};
use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};

const SELECT: &str = "SELECT id, session_id, restaurant_id, table_id, payload, total_cents, \
     reason, status, idempotency_key, resolved_by, resolved_reason, created_at, resolved_at \
     FROM suspicious_order";

pub async fn insert(conn: &mut SqliteConnection, record: &SuspiciousOrder) -> RepoResult<()> {
    sqlx::query(
        "INSERT INTO suspicious_order (id, session_id, restaurant_id, table_id, payload,
             total_cents, reason, status, idempotency_key, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&record.id)
    .bind(&record.session_id)
    .bind(&record.restaurant_id)
    .bind(&record.table_id)
    .bind(&record.payload)
    .bind(record.total_cents)
    .bind(&record.reason)
    .bind(record.status)
    .bind(&record.idempotency_key)
    .bind(record.created_at)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn find_by_id(
    conn: &mut SqliteConnection,
    id: &str,
) -> RepoResult<Option<SuspiciousOrder>> {
    let record = sqlx::query_as::<_, SuspiciousOrder>(&format!("{SELECT} WHERE id = ?"))
        .bind(id)
        .fetch_optional(conn)
        .await?;
    Ok(record)
}

pub async fn find_pending(pool: &SqlitePool, restaurant_id: &str) -> RepoResult<Vec<SuspiciousOrder>> {
    let records = sqlx::query_as::<_, SuspiciousOrder>(&format!(
        "{SELECT} WHERE restaurant_id = ? AND status = 'PENDING_APPROVAL' ORDER BY created_at"
    ))
    .bind(restaurant_id)
    .fetch_all(pool)
    .await?;
    Ok(records)
}

/// Resolve a pending record; both transitions are one-way, so the UPDATE
/// is guarded on the PENDING_APPROVAL state.
pub async fn resolve(
    conn: &mut SqliteConnection,
    id: &str,
    status: SuspiciousStatus,
    resolved_by: &str,
    resolved_reason: Option<&str>,
) -> RepoResult<()> {
    let result = sqlx::query(
        "UPDATE suspicious_order
         SET status = ?, resolved_by = ?, resolved_reason = ?, resolved_at = ?
         WHERE id = ? AND status = 'PENDING_APPROVAL'",
    )
    .bind(status)
    .bind(resolved_by)
    .bind(resolved_reason)
    .bind(Utc::now())
    .bind(id)
    .execute(conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(RepoError::Validation(format!(
            "Suspicious order {id} is already resolved"
        )));
    }
    Ok(())
}
