//! Cart API Handlers

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::auth::SessionContext;
use crate::core::error::{ok, AppError, AppResponse, AppResult};
use crate::core::ServerState;
use crate::db::models::CartItem;
use crate::db::repository::{cart as cart_repo, menu_item as menu_repo};
use crate::orders::Placement;

#[derive(Debug, Serialize)]
pub struct CartView {
    pub items: Vec<CartItem>,
    /// 基于加入时价格快照的参考合计；下单时以实时菜单价重新计价
    pub snapshot_total_cents: i64,
}

/// GET /api/cart - 查看当前范围的购物车
pub async fn view(
    ctx: SessionContext,
    State(state): State<ServerState>,
) -> AppResult<Json<AppResponse<CartView>>> {
    let mut conn = state.db.pool.acquire().await?;
    let items = cart_repo::find_by_scope(&mut conn, &ctx.session.id, &ctx.cart_scope()).await?;
    let snapshot_total_cents = items.iter().map(|i| i.price_cents * i.quantity).sum();
    Ok(ok(CartView {
        items,
        snapshot_total_cents,
    }))
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpsertCartItemRequest {
    #[validate(length(min = 1))]
    pub menu_item_id: String,
    #[validate(range(min = 1, max = 20))]
    pub quantity: i64,
    pub note: Option<String>,
}

/// PUT /api/cart/items - 添加或更新一行 (同菜品覆盖数量)
pub async fn upsert_item(
    ctx: SessionContext,
    State(state): State<ServerState>,
    Json(payload): Json<UpsertCartItemRequest>,
) -> AppResult<Json<AppResponse<CartItem>>> {
    payload.validate()?;

    let mut conn = state.db.pool.acquire().await?;
    let item = menu_repo::find_by_id(&mut conn, &payload.menu_item_id)
        .await?
        .ok_or_else(|| {
            AppError::ItemUnavailable(format!("Item {} not found", payload.menu_item_id))
        })?;
    if !item.is_orderable() {
        return Err(AppError::ItemUnavailable(format!(
            "'{}' is not available",
            item.name
        )));
    }

    let line = cart_repo::upsert(
        &mut conn,
        &ctx.session.id,
        &ctx.cart_scope(),
        &payload.menu_item_id,
        payload.quantity,
        item.price_cents,
        payload.note,
    )
    .await?;
    Ok(ok(line))
}

/// DELETE /api/cart/items/{menu_item_id} - 移除一行
pub async fn remove_item(
    ctx: SessionContext,
    State(state): State<ServerState>,
    Path(menu_item_id): Path<String>,
) -> AppResult<Json<AppResponse<bool>>> {
    let mut conn = state.db.pool.acquire().await?;
    let removed =
        cart_repo::remove(&mut conn, &ctx.session.id, &ctx.cart_scope(), &menu_item_id).await?;
    Ok(ok(removed))
}

#[derive(Debug, Deserialize)]
pub struct CheckoutRequest {
    pub idempotency_key: Option<String>,
}

/// POST /api/cart/checkout - 将购物车提交为订单
pub async fn checkout(
    ctx: SessionContext,
    State(state): State<ServerState>,
    Json(payload): Json<CheckoutRequest>,
) -> AppResult<Json<AppResponse<Placement>>> {
    let placed_by = match &ctx.device_id {
        Some(device) => format!("device:{device}"),
        None => format!("session:{}", ctx.session.id),
    };
    let placement = state
        .orders
        .place_from_cart(
            &ctx.session.id,
            &ctx.cart_scope(),
            &placed_by,
            payload.idempotency_key.as_deref(),
        )
        .await?;
    Ok(ok(placement))
}
