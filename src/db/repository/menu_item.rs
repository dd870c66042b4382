//! Catalog & Stock Repository
//!
//! The stock decrement is a conditional UPDATE: it only fires when the
//! remaining quantity covers the request, so a counter can never go
//! negative regardless of how many placements race on it.

use super::RepoResult;
use crate::db::models::{MenuItem, Stock};
use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};

const SELECT_ITEM: &str = "SELECT id, restaurant_id, name, price_cents, tax_percent, station, \
     status, track_stock, auto_hide_when_zero, max_per_order FROM menu_item";

pub async fn find_by_id(conn: &mut SqliteConnection, id: &str) -> RepoResult<Option<MenuItem>> {
    let item = sqlx::query_as::<_, MenuItem>(&format!("{SELECT_ITEM} WHERE id = ?"))
        .bind(id)
        .fetch_optional(conn)
        .await?;
    Ok(item)
}

pub async fn find_active(pool: &SqlitePool, restaurant_id: &str) -> RepoResult<Vec<MenuItem>> {
    let items = sqlx::query_as::<_, MenuItem>(&format!(
        "{SELECT_ITEM} WHERE restaurant_id = ? AND status = 'ACTIVE' ORDER BY name"
    ))
    .bind(restaurant_id)
    .fetch_all(pool)
    .await?;
    Ok(items)
}

pub async fn insert(pool: &SqlitePool, item: &MenuItem) -> RepoResult<()> {
    sqlx::query(
        "INSERT INTO menu_item (id, restaurant_id, name, price_cents, tax_percent, station,
             status, track_stock, auto_hide_when_zero, max_per_order)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&item.id)
    .bind(&item.restaurant_id)
    .bind(&item.name)
    .bind(item.price_cents)
    .bind(item.tax_percent)
    .bind(&item.station)
    .bind(item.status)
    .bind(item.track_stock)
    .bind(item.auto_hide_when_zero)
    .bind(item.max_per_order)
    .execute(pool)
    .await?;
    Ok(())
}

/// Disable a catalog item (stock hit zero with auto_hide_when_zero)
pub async fn disable(conn: &mut SqliteConnection, id: &str) -> RepoResult<()> {
    sqlx::query("UPDATE menu_item SET status = 'DISABLED' WHERE id = ?")
        .bind(id)
        .execute(conn)
        .await?;
    Ok(())
}

// ========== Stock ==========

pub async fn find_stock(conn: &mut SqliteConnection, menu_item_id: &str) -> RepoResult<Option<Stock>> {
    let stock = sqlx::query_as::<_, Stock>(
        "SELECT menu_item_id, restaurant_id, quantity, updated_at FROM stock WHERE menu_item_id = ?",
    )
    .bind(menu_item_id)
    .fetch_optional(conn)
    .await?;
    Ok(stock)
}

pub async fn set_stock(
    pool: &SqlitePool,
    restaurant_id: &str,
    menu_item_id: &str,
    quantity: Option<i64>,
) -> RepoResult<()> {
    sqlx::query(
        "INSERT INTO stock (menu_item_id, restaurant_id, quantity, updated_at)
         VALUES (?, ?, ?, ?)
         ON CONFLICT (menu_item_id) DO UPDATE SET quantity = excluded.quantity, updated_at = excluded.updated_at",
    )
    .bind(menu_item_id)
    .bind(restaurant_id)
    .bind(quantity)
    .bind(Utc::now())
    .execute(pool)
    .await?;
    Ok(())
}

/// Outcome of a conditional stock decrement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecrementOutcome {
    /// No stock row or NULL quantity: item is not stock-limited
    Unlimited,
    /// Decrement applied, this many units remain
    Remaining(i64),
    /// Remaining quantity does not cover the request; nothing changed
    Insufficient,
}

/// Atomically decrement stock if the remaining quantity covers `qty`.
/// A missing stock row or NULL quantity counts as unlimited.
pub async fn decrement_if_available(
    conn: &mut SqliteConnection,
    menu_item_id: &str,
    qty: i64,
) -> RepoResult<DecrementOutcome> {
    let stock = find_stock(&mut *conn, menu_item_id).await?;
    let Some(stock) = stock else {
        return Ok(DecrementOutcome::Unlimited);
    };
    if stock.quantity.is_none() {
        return Ok(DecrementOutcome::Unlimited);
    }

    let result = sqlx::query(
        "UPDATE stock SET quantity = quantity - ?, updated_at = ?
         WHERE menu_item_id = ? AND quantity >= ?",
    )
    .bind(qty)
    .bind(Utc::now())
    .bind(menu_item_id)
    .bind(qty)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Ok(DecrementOutcome::Insufficient);
    }

    let remaining = sqlx::query_scalar::<_, Option<i64>>(
        "SELECT quantity FROM stock WHERE menu_item_id = ?",
    )
    .bind(menu_item_id)
    .fetch_one(conn)
    .await?;
    Ok(DecrementOutcome::Remaining(remaining.unwrap_or(0)))
}
