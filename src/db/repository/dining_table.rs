//! Dining Table Repository

use super::{RepoError, RepoResult};
use crate::db::models::{DiningTable, TableStatus, Zone};
use sqlx::{SqliteConnection, SqlitePool};

pub async fn find_all(pool: &SqlitePool) -> RepoResult<Vec<DiningTable>> {
    let tables = sqlx::query_as::<_, DiningTable>(
        "SELECT id, name, zone_id, capacity, status, is_active
         FROM dining_table WHERE is_active = 1 ORDER BY name",
    )
    .fetch_all(pool)
    .await?;
    Ok(tables)
}

pub async fn find_by_id(
    conn: &mut SqliteConnection,
    id: &str,
) -> RepoResult<Option<DiningTable>> {
    let table = sqlx::query_as::<_, DiningTable>(
        "SELECT id, name, zone_id, capacity, status, is_active FROM dining_table WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(conn)
    .await?;
    Ok(table)
}

pub async fn create(pool: &SqlitePool, data: DiningTable) -> RepoResult<DiningTable> {
    sqlx::query(
        "INSERT INTO dining_table (id, name, zone_id, capacity, status, is_active)
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(&data.id)
    .bind(&data.name)
    .bind(&data.zone_id)
    .bind(data.capacity)
    .bind(data.status)
    .bind(data.is_active)
    .execute(pool)
    .await?;
    Ok(data)
}

/// Transition a table to a new status only if it currently has the
/// expected one. Returns false when the guard does not hold, which is
/// how open/shift detect a lost race for the same table.
pub async fn transition_status(
    conn: &mut SqliteConnection,
    id: &str,
    expected: TableStatus,
    next: TableStatus,
) -> RepoResult<bool> {
    let result = sqlx::query("UPDATE dining_table SET status = ? WHERE id = ? AND status = ?")
        .bind(next)
        .bind(id)
        .bind(expected)
        .execute(conn)
        .await?;
    Ok(result.rows_affected() == 1)
}

/// Unconditionally free a table (close / idle sweep)
pub async fn set_free(conn: &mut SqliteConnection, id: &str) -> RepoResult<()> {
    let result = sqlx::query("UPDATE dining_table SET status = 'FREE' WHERE id = ?")
        .bind(id)
        .execute(conn)
        .await?;
    if result.rows_affected() == 0 {
        return Err(RepoError::NotFound(format!("Table {id} not found")));
    }
    Ok(())
}

pub async fn find_zones(pool: &SqlitePool) -> RepoResult<Vec<Zone>> {
    let zones = sqlx::query_as::<_, Zone>(
        "SELECT id, name, is_active FROM zone WHERE is_active = 1 ORDER BY name",
    )
    .fetch_all(pool)
    .await?;
    Ok(zones)
}
