//! Order API Handlers

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::auth::{AuthContext, SessionContext};
use crate::core::error::{ok, AppError, AppResponse, AppResult};
use crate::core::ServerState;
use crate::db::models::{ItemModifier, Order, OrderItemStatus};
use crate::db::repository::order as order_repo;
use crate::orders::{ItemRequest, OrderView, Placement, ResumeStatus};

// Serialize is required by the length validation on `items`
#[derive(Debug, Serialize, Deserialize)]
pub struct OrderItemPayload {
    pub menu_item_id: String,
    pub quantity: i64,
    pub note: Option<String>,
    #[serde(default)]
    pub modifiers: Vec<ItemModifier>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct PlaceOrderRequest {
    #[validate(length(min = 1))]
    pub session_id: String,
    #[validate(length(min = 1))]
    pub items: Vec<OrderItemPayload>,
    pub idempotency_key: Option<String>,
}

/// POST /api/orders - 员工代客直接下单，绕过购物车
pub async fn place_direct(
    auth: AuthContext,
    State(state): State<ServerState>,
    Json(payload): Json<PlaceOrderRequest>,
) -> AppResult<Json<AppResponse<Placement>>> {
    payload.validate()?;
    let items: Vec<ItemRequest> = payload
        .items
        .into_iter()
        .map(|i| ItemRequest {
            menu_item_id: i.menu_item_id,
            quantity: i.quantity,
            note: i.note,
            modifiers: i.modifiers,
        })
        .collect();
    let placement = state
        .orders
        .place_direct(
            &payload.session_id,
            items,
            &format!("staff:{}", auth.staff_id),
            payload.idempotency_key.as_deref(),
        )
        .await?;
    Ok(ok(placement))
}

/// GET /api/orders/{id} - 订单详情 (员工端)
pub async fn get_by_id(
    _auth: AuthContext,
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> AppResult<Json<AppResponse<OrderView>>> {
    let mut conn = state.db.pool.acquire().await?;
    let order = order_repo::find_by_id(&mut conn, &id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Order {id} not found")))?;
    let items = order_repo::find_items(&mut conn, &id).await?;
    Ok(ok(OrderView { order, items }))
}

/// GET /api/sessions/{session_id}/orders - 会话订单列表 (员工端)
pub async fn list_by_session(
    _auth: AuthContext,
    State(state): State<ServerState>,
    Path(session_id): Path<String>,
) -> AppResult<Json<AppResponse<Vec<Order>>>> {
    let orders = order_repo::find_by_session(&state.db.pool, &session_id).await?;
    Ok(ok(orders))
}

/// GET /api/orders/mine - 顾客查看本会话订单
pub async fn list_mine(
    ctx: SessionContext,
    State(state): State<ServerState>,
) -> AppResult<Json<AppResponse<Vec<Order>>>> {
    let orders = order_repo::find_by_session(&state.db.pool, &ctx.session.id).await?;
    Ok(ok(orders))
}

#[derive(Debug, Deserialize)]
pub struct AdvanceItemRequest {
    pub status: OrderItemStatus,
}

/// POST /api/orders/{id}/items/{item_id}/status - 条目状态流转 (员工端)
pub async fn advance_item(
    _auth: AuthContext,
    State(state): State<ServerState>,
    Path((id, item_id)): Path<(String, String)>,
    Json(payload): Json<AdvanceItemRequest>,
) -> AppResult<Json<AppResponse<crate::db::models::OrderItem>>> {
    let item = state.orders.advance_item(&id, &item_id, payload.status).await?;
    Ok(ok(item))
}

/// POST /api/orders/{id}/settle - 订单结算 (员工端)
pub async fn settle(
    auth: AuthContext,
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> AppResult<Json<AppResponse<Order>>> {
    let order = state
        .orders
        .settle(&id, &format!("staff:{}", auth.staff_id))
        .await?;
    Ok(ok(order))
}

#[derive(Debug, Deserialize, Validate)]
pub struct ResumeRequest {
    #[validate(length(min = 1))]
    pub idempotency_key: String,
}

/// POST /api/orders/resume - 断线后查询幂等键的落点（仅限本会话的键）
pub async fn resume(
    ctx: SessionContext,
    State(state): State<ServerState>,
    Json(payload): Json<ResumeRequest>,
) -> AppResult<Json<AppResponse<ResumeStatus>>> {
    payload.validate()?;
    let status = state
        .orders
        .resume(&ctx.session.id, &payload.idempotency_key)
        .await?;
    Ok(ok(status))
}
