//! Menu API Handlers

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;

use crate::auth::AuthContext;
use crate::core::error::{ok, AppResponse, AppResult};
use crate::core::ServerState;
use crate::db::models::MenuItem;
use crate::db::repository::menu_item as menu_repo;

/// GET /api/menu - 可点菜单 (公共，顾客扫码后拉取)
pub async fn list_active(
    State(state): State<ServerState>,
) -> AppResult<Json<AppResponse<Vec<MenuItem>>>> {
    let items = menu_repo::find_active(&state.db.pool, &state.config.restaurant_id).await?;
    Ok(ok(items))
}

#[derive(Debug, Deserialize)]
pub struct SetStockRequest {
    /// None = 不限量
    pub quantity: Option<i64>,
}

/// PUT /api/menu/{id}/stock - 设置库存 (员工端)
pub async fn set_stock(
    _auth: AuthContext,
    State(state): State<ServerState>,
    Path(id): Path<String>,
    Json(payload): Json<SetStockRequest>,
) -> AppResult<Json<AppResponse<()>>> {
    menu_repo::set_stock(
        &state.db.pool,
        &state.config.restaurant_id,
        &id,
        payload.quantity,
    )
    .await?;
    Ok(ok(()))
}
