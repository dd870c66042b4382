//! Session API 模块
//!
//! 员工端负责开台/换桌/关台；顾客端通过桌台 PIN 入席。

mod handler;

use axum::{
    routing::{get, post},
    Router,
};

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new()
        // 员工端
        .route("/api/sessions", post(handler::open))
        .route("/api/sessions/{id}/shift", post(handler::shift))
        .route("/api/sessions/{id}/close", post(handler::close))
        // 顾客端：join 与 resume 语义相同，都重跑 PIN 验证并签发
        // 新设备令牌，不触碰购物车和订单
        .route("/api/sessions/join", post(handler::join))
        .route("/api/sessions/resume", post(handler::join))
        .route("/api/sessions/current", get(handler::current))
}
