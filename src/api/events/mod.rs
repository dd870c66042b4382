//! Event Stream API 模块 (SSE)
//!
//! 三个独立的事件域：
//!
//! | 路径 | 订阅者 | 认证 |
//! |------|--------|------|
//! | /api/events/kitchen | 厨房出票屏 (按 station 过滤) | 员工 JWT |
//! | /api/events/waiter | 服务员终端 | 员工 JWT |
//! | /api/events/customer | 顾客设备 (本会话) | 会话令牌 |

mod handler;

use axum::{routing::get, Router};

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new()
        .route("/api/events/kitchen", get(handler::kitchen_stream))
        .route("/api/events/waiter", get(handler::waiter_stream))
        .route("/api/events/customer", get(handler::customer_stream))
}
