//! Dining Table API Handlers

use axum::{extract::State, Json};

use crate::auth::AuthContext;
use crate::core::error::{ok, AppResponse, AppResult};
use crate::core::ServerState;
use crate::db::models::{DiningTable, Zone};
use crate::db::repository::dining_table as table_repo;

/// GET /api/tables - 获取所有激活桌台 (员工端)
pub async fn list(
    _auth: AuthContext,
    State(state): State<ServerState>,
) -> AppResult<Json<AppResponse<Vec<DiningTable>>>> {
    let tables = table_repo::find_all(&state.db.pool).await?;
    Ok(ok(tables))
}

/// GET /api/zones - 获取所有区域 (员工端)
pub async fn list_zones(
    _auth: AuthContext,
    State(state): State<ServerState>,
) -> AppResult<Json<AppResponse<Vec<Zone>>>> {
    let zones = table_repo::find_zones(&state.db.pool).await?;
    Ok(ok(zones))
}
