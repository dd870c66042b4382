//! Session API Handlers

use axum::{
    extract::{Path, State},
    http::HeaderMap,
    Json,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::api::client_ip;
use crate::auth::{AuthContext, SessionContext};
use crate::core::error::{ok, AppResponse, AppResult};
use crate::core::ServerState;
use crate::db::models::SessionMode;
use crate::sessions::{JoinedSession, OpenedSession};

#[derive(Debug, Deserialize, Validate)]
pub struct OpenSessionRequest {
    #[validate(length(min = 1))]
    pub table_id: String,
    pub mode: SessionMode,
}

/// POST /api/sessions - 开台 (员工端)
pub async fn open(
    auth: AuthContext,
    State(state): State<ServerState>,
    Json(payload): Json<OpenSessionRequest>,
) -> AppResult<Json<AppResponse<OpenedSession>>> {
    payload.validate()?;
    let opened = state
        .sessions
        .open(&payload.table_id, payload.mode, &auth.staff_id)
        .await?;
    Ok(ok(opened))
}

#[derive(Debug, Deserialize, Validate)]
pub struct ShiftTableRequest {
    #[validate(length(min = 1))]
    pub to_table_id: String,
}

/// POST /api/sessions/{id}/shift - 换桌 (员工端)
pub async fn shift(
    auth: AuthContext,
    State(state): State<ServerState>,
    Path(id): Path<String>,
    Json(payload): Json<ShiftTableRequest>,
) -> AppResult<Json<AppResponse<()>>> {
    payload.validate()?;
    state
        .sessions
        .shift_table(&id, &payload.to_table_id, &auth.staff_id)
        .await?;
    Ok(ok(()))
}

/// POST /api/sessions/{id}/close - 关台 (员工端)
pub async fn close(
    auth: AuthContext,
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> AppResult<Json<AppResponse<()>>> {
    state.sessions.close(&id, &auth.staff_id).await?;
    Ok(ok(()))
}

#[derive(Debug, Deserialize, Validate)]
pub struct JoinSessionRequest {
    #[validate(length(min = 1))]
    pub table_id: String,
    #[validate(length(equal = 4))]
    pub pin: String,
    pub device_id: Option<String>,
}

/// POST /api/sessions/join - 顾客入席 (PIN 验证，无需认证)
pub async fn join(
    State(state): State<ServerState>,
    headers: HeaderMap,
    Json(payload): Json<JoinSessionRequest>,
) -> AppResult<Json<AppResponse<JoinedSession>>> {
    payload.validate()?;
    let ip = client_ip(&headers);
    let joined = state
        .sessions
        .join(
            &payload.table_id,
            &payload.pin,
            payload.device_id.as_deref(),
            &ip,
        )
        .await?;
    Ok(ok(joined))
}

#[derive(Debug, Serialize)]
pub struct CurrentSessionResponse {
    pub session_id: String,
    pub table_id: String,
    pub mode: SessionMode,
}

/// GET /api/sessions/current - 顾客查询自己的会话
pub async fn current(ctx: SessionContext) -> AppResult<Json<AppResponse<CurrentSessionResponse>>> {
    Ok(ok(CurrentSessionResponse {
        session_id: ctx.session.id.clone(),
        table_id: ctx.session.table_id.clone(),
        mode: ctx.session.mode,
    }))
}
