//! Order Repository
//!
//! Orders are only ever inserted by the transaction engine. After commit
//! the mutable surface is per-item kitchen status, order-level status,
//! and the total recomputation that follows an item cancellation.

use super::{RepoError, RepoResult};
use crate::db::models::{Order, OrderItem, OrderItemStatus, OrderStatus};
use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};

const SELECT_ORDER: &str = "SELECT id, session_id, restaurant_id, table_id, status, total_cents, \
     client_request_id, placed_by, created_at, updated_at FROM customer_order";

const SELECT_ITEM: &str = "SELECT id, order_id, menu_item_id, name, station, quantity, \
     price_cents, modifiers_cents, modifiers, note, status FROM order_item";

pub async fn insert(conn: &mut SqliteConnection, order: &Order) -> RepoResult<()> {
    sqlx::query(
        "INSERT INTO customer_order (id, session_id, restaurant_id, table_id, status,
             total_cents, client_request_id, placed_by, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&order.id)
    .bind(&order.session_id)
    .bind(&order.restaurant_id)
    .bind(&order.table_id)
    .bind(order.status)
    .bind(order.total_cents)
    .bind(&order.client_request_id)
    .bind(&order.placed_by)
    .bind(order.created_at)
    .bind(order.updated_at)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn insert_item(conn: &mut SqliteConnection, item: &OrderItem) -> RepoResult<()> {
    sqlx::query(
        "INSERT INTO order_item (id, order_id, menu_item_id, name, station, quantity,
             price_cents, modifiers_cents, modifiers, note, status)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&item.id)
    .bind(&item.order_id)
    .bind(&item.menu_item_id)
    .bind(&item.name)
    .bind(&item.station)
    .bind(item.quantity)
    .bind(item.price_cents)
    .bind(item.modifiers_cents)
    .bind(&item.modifiers)
    .bind(&item.note)
    .bind(item.status)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn find_by_id(conn: &mut SqliteConnection, id: &str) -> RepoResult<Option<Order>> {
    let order = sqlx::query_as::<_, Order>(&format!("{SELECT_ORDER} WHERE id = ?"))
        .bind(id)
        .fetch_optional(conn)
        .await?;
    Ok(order)
}

pub async fn find_items(conn: &mut SqliteConnection, order_id: &str) -> RepoResult<Vec<OrderItem>> {
    let items = sqlx::query_as::<_, OrderItem>(&format!(
        "{SELECT_ITEM} WHERE order_id = ? ORDER BY name"
    ))
    .bind(order_id)
    .fetch_all(conn)
    .await?;
    Ok(items)
}

pub async fn find_by_session(pool: &SqlitePool, session_id: &str) -> RepoResult<Vec<Order>> {
    let orders = sqlx::query_as::<_, Order>(&format!(
        "{SELECT_ORDER} WHERE session_id = ? ORDER BY created_at"
    ))
    .bind(session_id)
    .fetch_all(pool)
    .await?;
    Ok(orders)
}

pub async fn set_status(
    conn: &mut SqliteConnection,
    id: &str,
    status: OrderStatus,
) -> RepoResult<()> {
    let result = sqlx::query("UPDATE customer_order SET status = ?, updated_at = ? WHERE id = ?")
        .bind(status)
        .bind(Utc::now())
        .bind(id)
        .execute(conn)
        .await?;
    if result.rows_affected() == 0 {
        return Err(RepoError::NotFound(format!("Order {id} not found")));
    }
    Ok(())
}

/// Advance one item's kitchen status, enforcing the monotone progression,
/// then recompute the order total from non-cancelled items.
pub async fn advance_item_status(
    conn: &mut SqliteConnection,
    order_id: &str,
    item_id: &str,
    next: OrderItemStatus,
) -> RepoResult<OrderItem> {
    let item = sqlx::query_as::<_, OrderItem>(&format!(
        "{SELECT_ITEM} WHERE id = ? AND order_id = ?"
    ))
    .bind(item_id)
    .bind(order_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| RepoError::NotFound(format!("Order item {item_id} not found")))?;

    if !item.status.can_advance_to(next) {
        return Err(RepoError::Validation(format!(
            "Illegal item status transition {:?} -> {:?}",
            item.status, next
        )));
    }

    sqlx::query("UPDATE order_item SET status = ? WHERE id = ?")
        .bind(next)
        .bind(item_id)
        .execute(&mut *conn)
        .await?;

    if next == OrderItemStatus::Cancelled {
        recompute_total(&mut *conn, order_id).await?;
    }

    let updated = sqlx::query_as::<_, OrderItem>(&format!("{SELECT_ITEM} WHERE id = ?"))
        .bind(item_id)
        .fetch_one(conn)
        .await?;
    Ok(updated)
}

/// Recompute `total_cents` from the surviving items after a cancellation
pub async fn recompute_total(conn: &mut SqliteConnection, order_id: &str) -> RepoResult<i64> {
    let total = sqlx::query_scalar::<_, i64>(
        "SELECT COALESCE(SUM((price_cents + modifiers_cents) * quantity), 0)
         FROM order_item WHERE order_id = ? AND status != 'CANCELLED'",
    )
    .bind(order_id)
    .fetch_one(&mut *conn)
    .await?;

    sqlx::query("UPDATE customer_order SET total_cents = ?, updated_at = ? WHERE id = ?")
        .bind(total)
        .bind(Utc::now())
        .bind(order_id)
        .execute(conn)
        .await?;
    Ok(total)
}
