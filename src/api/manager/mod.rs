//! Manager API 模块
//!
//! 可疑订单审批，所有端点要求 MANAGER 角色。

mod handler;

use axum::{
    routing::{get, post},
    Router,
};

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new()
        .route("/api/manager/suspicious", get(handler::list_pending))
        .route(
            "/api/manager/suspicious/{id}/approve",
            post(handler::approve),
        )
        .route("/api/manager/suspicious/{id}/reject", post(handler::reject))
}
