//! Manager API Handlers

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;
use validator::Validate;

use crate::auth::AuthContext;
use crate::core::error::{ok, AppResponse, AppResult};
use crate::core::ServerState;
use crate::db::models::SuspiciousOrder;
use crate::db::repository::suspicious_order as suspicious_repo;
use crate::orders::OrderView;

/// GET /api/manager/suspicious - 待审批列表
pub async fn list_pending(
    auth: AuthContext,
    State(state): State<ServerState>,
) -> AppResult<Json<AppResponse<Vec<SuspiciousOrder>>>> {
    auth.require_manager()?;
    let pending = suspicious_repo::find_pending(&state.db.pool, &auth.restaurant_id).await?;
    Ok(ok(pending))
}

/// POST /api/manager/suspicious/{id}/approve - 批准并提交订单
///
/// 库存在批准时重新校验；审批期间售罄则批准失败。
pub async fn approve(
    auth: AuthContext,
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> AppResult<Json<AppResponse<OrderView>>> {
    auth.require_manager()?;
    let order = state.orders.approve_suspicious(&id, &auth.staff_id).await?;
    Ok(ok(order))
}

#[derive(Debug, Deserialize, Validate)]
pub struct RejectRequest {
    #[validate(length(min = 1, max = 500))]
    pub reason: String,
}

/// POST /api/manager/suspicious/{id}/reject - 驳回 (终态)
pub async fn reject(
    auth: AuthContext,
    State(state): State<ServerState>,
    Path(id): Path<String>,
    Json(payload): Json<RejectRequest>,
) -> AppResult<Json<AppResponse<()>>> {
    auth.require_manager()?;
    payload.validate()?;
    state
        .orders
        .reject_suspicious(&id, &auth.staff_id, &payload.reason)
        .await?;
    Ok(ok(()))
}
