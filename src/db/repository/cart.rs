//! Cart Repository
//!
//! Line items are unique per (session, device scope, menu item): adding
//! an item that is already in the cart replaces its quantity rather than
//! creating a second line.

use super::{RepoError, RepoResult};
use crate::db::models::cart::{MAX_CART_QTY, MIN_CART_QTY};
use crate::db::models::CartItem;
use chrono::Utc;
use sqlx::SqliteConnection;
use uuid::Uuid;

pub async fn find_by_scope(
    conn: &mut SqliteConnection,
    session_id: &str,
    device_id: &str,
) -> RepoResult<Vec<CartItem>> {
    let items = sqlx::query_as::<_, CartItem>(
        "SELECT id, session_id, device_id, menu_item_id, quantity, price_cents, note, added_at
         FROM cart_item WHERE session_id = ? AND device_id = ? ORDER BY added_at",
    )
    .bind(session_id)
    .bind(device_id)
    .fetch_all(conn)
    .await?;
    Ok(items)
}

/// Insert or replace a cart line (price snapshot taken by the caller)
pub async fn upsert(
    conn: &mut SqliteConnection,
    session_id: &str,
    device_id: &str,
    menu_item_id: &str,
    quantity: i64,
    price_cents: i64,
    note: Option<String>,
) -> RepoResult<CartItem> {
    if !(MIN_CART_QTY..=MAX_CART_QTY).contains(&quantity) {
        return Err(RepoError::Validation(format!(
            "Quantity must be between {MIN_CART_QTY} and {MAX_CART_QTY}"
        )));
    }

    let now = Utc::now();
    let id = Uuid::new_v4().to_string();
    sqlx::query(
        "INSERT INTO cart_item (id, session_id, device_id, menu_item_id, quantity, price_cents, note, added_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT (session_id, device_id, menu_item_id)
         DO UPDATE SET quantity = excluded.quantity, note = excluded.note",
    )
    .bind(&id)
    .bind(session_id)
    .bind(device_id)
    .bind(menu_item_id)
    .bind(quantity)
    .bind(price_cents)
    .bind(&note)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    let item = sqlx::query_as::<_, CartItem>(
        "SELECT id, session_id, device_id, menu_item_id, quantity, price_cents, note, added_at
         FROM cart_item WHERE session_id = ? AND device_id = ? AND menu_item_id = ?",
    )
    .bind(session_id)
    .bind(device_id)
    .bind(menu_item_id)
    .fetch_one(conn)
    .await?;
    Ok(item)
}

pub async fn remove(
    conn: &mut SqliteConnection,
    session_id: &str,
    device_id: &str,
    menu_item_id: &str,
) -> RepoResult<bool> {
    let result = sqlx::query(
        "DELETE FROM cart_item WHERE session_id = ? AND device_id = ? AND menu_item_id = ?",
    )
    .bind(session_id)
    .bind(device_id)
    .bind(menu_item_id)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Clear one device scope's cart inside the order transaction
pub async fn clear_scope(
    conn: &mut SqliteConnection,
    session_id: &str,
    device_id: &str,
) -> RepoResult<u64> {
    let result = sqlx::query("DELETE FROM cart_item WHERE session_id = ? AND device_id = ?")
        .bind(session_id)
        .bind(device_id)
        .execute(conn)
        .await?;
    Ok(result.rows_affected())
}
