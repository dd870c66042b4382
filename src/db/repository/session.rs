//! Session Repository

use super::{RepoError, RepoResult};
use crate::db::models::{CustomerToken, Session};
use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};

const SELECT_SESSION: &str = "SELECT id, table_id, restaurant_id, status, mode, pin, \
     staff_token_hash, pin_failed_count, pin_blocked_until, checkout_held_by, \
     opened_by, last_activity_at, created_at, closed_at FROM session";

pub async fn insert(conn: &mut SqliteConnection, session: &Session) -> RepoResult<()> {
    let result = sqlx::query(
        "INSERT INTO session (id, table_id, restaurant_id, status, mode, pin,
             staff_token_hash, pin_failed_count, pin_blocked_until, checkout_held_by,
             opened_by, last_activity_at, created_at, closed_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&session.id)
    .bind(&session.table_id)
    .bind(&session.restaurant_id)
    .bind(session.status)
    .bind(session.mode)
    .bind(&session.pin)
    .bind(&session.staff_token_hash)
    .bind(session.pin_failed_count)
    .bind(session.pin_blocked_until)
    .bind(&session.checkout_held_by)
    .bind(&session.opened_by)
    .bind(session.last_activity_at)
    .bind(session.created_at)
    .bind(session.closed_at)
    .execute(conn)
    .await;

    match result {
        Ok(_) => Ok(()),
        // idx_session_open_table: one OPEN session per table
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Err(RepoError::Duplicate(
            format!("Table {} already has an open session", session.table_id),
        )),
        Err(e) => Err(e.into()),
    }
}

pub async fn find_by_id(conn: &mut SqliteConnection, id: &str) -> RepoResult<Option<Session>> {
    let session = sqlx::query_as::<_, Session>(&format!("{SELECT_SESSION} WHERE id = ?"))
        .bind(id)
        .fetch_optional(conn)
        .await?;
    Ok(session)
}

pub async fn find_open_by_table(
    conn: &mut SqliteConnection,
    table_id: &str,
) -> RepoResult<Option<Session>> {
    let session = sqlx::query_as::<_, Session>(&format!(
        "{SELECT_SESSION} WHERE table_id = ? AND status = 'OPEN'"
    ))
    .bind(table_id)
    .fetch_optional(conn)
    .await?;
    Ok(session)
}

/// OPEN sessions whose last activity predates `cutoff` (idle sweep)
pub async fn find_idle_open(pool: &SqlitePool, cutoff: DateTime<Utc>) -> RepoResult<Vec<Session>> {
    let sessions = sqlx::query_as::<_, Session>(&format!(
        "{SELECT_SESSION} WHERE status = 'OPEN' AND last_activity_at < ?"
    ))
    .bind(cutoff)
    .fetch_all(pool)
    .await?;
    Ok(sessions)
}

pub async fn touch_activity(conn: &mut SqliteConnection, id: &str) -> RepoResult<()> {
    sqlx::query("UPDATE session SET last_activity_at = ? WHERE id = ?")
        .bind(Utc::now())
        .bind(id)
        .execute(conn)
        .await?;
    Ok(())
}

pub async fn set_table(conn: &mut SqliteConnection, id: &str, table_id: &str) -> RepoResult<()> {
    sqlx::query("UPDATE session SET table_id = ? WHERE id = ?")
        .bind(table_id)
        .bind(id)
        .execute(conn)
        .await?;
    Ok(())
}

/// Close a session; only succeeds while it is still OPEN
pub async fn close(conn: &mut SqliteConnection, id: &str) -> RepoResult<bool> {
    let result =
        sqlx::query("UPDATE session SET status = 'CLOSED', closed_at = ? WHERE id = ? AND status = 'OPEN'")
            .bind(Utc::now())
            .bind(id)
            .execute(conn)
            .await?;
    Ok(result.rows_affected() == 1)
}

/// Orders on this session in a state that blocks closing
pub async fn count_unsettled_orders(conn: &mut SqliteConnection, id: &str) -> RepoResult<i64> {
    let count = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM customer_order
         WHERE session_id = ? AND status NOT IN ('PAID', 'CANCELLED')",
    )
    .bind(id)
    .fetch_one(conn)
    .await?;
    Ok(count)
}

// ========== PIN attempt bookkeeping ==========

pub async fn record_pin_attempt(
    conn: &mut SqliteConnection,
    session_id: &str,
    success: bool,
) -> RepoResult<()> {
    sqlx::query("INSERT INTO pin_attempt (session_id, success, attempted_at) VALUES (?, ?, ?)")
        .bind(session_id)
        .bind(success)
        .bind(Utc::now())
        .execute(conn)
        .await?;
    Ok(())
}

pub async fn set_pin_failures(
    conn: &mut SqliteConnection,
    session_id: &str,
    count: i64,
    blocked_until: Option<DateTime<Utc>>,
) -> RepoResult<()> {
    sqlx::query("UPDATE session SET pin_failed_count = ?, pin_blocked_until = ? WHERE id = ?")
        .bind(count)
        .bind(blocked_until)
        .bind(session_id)
        .execute(conn)
        .await?;
    Ok(())
}

// ========== Checkout exclusivity (advisory) ==========

/// Take the advisory checkout marker if nobody else holds it.
/// Stock decrement remains the authoritative mechanism.
pub async fn try_hold_checkout(
    conn: &mut SqliteConnection,
    session_id: &str,
    device_id: &str,
) -> RepoResult<bool> {
    let result = sqlx::query(
        "UPDATE session SET checkout_held_by = ?
         WHERE id = ? AND (checkout_held_by IS NULL OR checkout_held_by = ?)",
    )
    .bind(device_id)
    .bind(session_id)
    .bind(device_id)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn release_checkout(conn: &mut SqliteConnection, session_id: &str) -> RepoResult<()> {
    sqlx::query("UPDATE session SET checkout_held_by = NULL WHERE id = ?")
        .bind(session_id)
        .execute(conn)
        .await?;
    Ok(())
}

// ========== Customer tokens ==========

pub async fn insert_customer_token(
    conn: &mut SqliteConnection,
    token: &CustomerToken,
) -> RepoResult<()> {
    sqlx::query(
        "INSERT INTO customer_token (id, session_id, token_hash, device_id, expires_at, created_at)
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(&token.id)
    .bind(&token.session_id)
    .bind(&token.token_hash)
    .bind(&token.device_id)
    .bind(token.expires_at)
    .bind(token.created_at)
    .execute(conn)
    .await?;
    Ok(())
}

/// Look up a live customer token by hash. Expired tokens never match.
pub async fn find_customer_token(
    conn: &mut SqliteConnection,
    session_id: &str,
    token_hash: &str,
) -> RepoResult<Option<CustomerToken>> {
    let token = sqlx::query_as::<_, CustomerToken>(
        "SELECT id, session_id, token_hash, device_id, expires_at, created_at
         FROM customer_token
         WHERE session_id = ? AND token_hash = ? AND expires_at > ?",
    )
    .bind(session_id)
    .bind(token_hash)
    .bind(Utc::now())
    .fetch_optional(conn)
    .await?;
    Ok(token)
}

pub async fn purge_expired_tokens(pool: &SqlitePool) -> RepoResult<u64> {
    let result = sqlx::query("DELETE FROM customer_token WHERE expires_at <= ?")
        .bind(Utc::now())
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

// ========== Table moves ==========

pub async fn record_table_move(
    conn: &mut SqliteConnection,
    session_id: &str,
    from_table: &str,
    to_table: &str,
    moved_by: &str,
) -> RepoResult<()> {
    sqlx::query(
        "INSERT INTO table_move (session_id, from_table_id, to_table_id, moved_by, moved_at)
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(session_id)
    .bind(from_table)
    .bind(to_table)
    .bind(moved_by)
    .bind(Utc::now())
    .execute(conn)
    .await?;
    Ok(())
}
