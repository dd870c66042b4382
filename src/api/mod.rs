//! API 路由模块
//!
//! # 结构
//!
//! - [`health`] - 健康检查
//! - [`tables`] - 桌台与区域查询
//! - [`sessions`] - 会话生命周期 (开台/入席/换桌/关台)
//! - [`menu`] - 菜单查询与库存设置
//! - [`carts`] - 顾客购物车
//! - [`orders`] - 下单、恢复、结算与条目状态流转
//! - [`manager`] - 可疑订单审批
//! - [`events`] - 厨房/服务员/顾客事件流 (SSE)

pub mod carts;
pub mod events;
pub mod health;
pub mod manager;
pub mod menu;
pub mod orders;
pub mod sessions;
pub mod tables;

use std::time::Duration;

use axum::error_handling::HandleErrorLayer;
use axum::http::{HeaderMap, StatusCode};
use axum::{BoxError, Router};
use tower::timeout::TimeoutLayer;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::core::ServerState;

/// 请求超时；SSE 路由不在此层之下
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// 组装完整路由树
pub fn create_router(state: ServerState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(health::router())
        .merge(tables::router())
        .merge(sessions::router())
        .merge(menu::router())
        .merge(carts::router())
        .merge(orders::router())
        .merge(manager::router())
        .layer(
            ServiceBuilder::new()
                .layer(HandleErrorLayer::new(|_: BoxError| async {
                    StatusCode::REQUEST_TIMEOUT
                }))
                .layer(TimeoutLayer::new(REQUEST_TIMEOUT)),
        )
        // 事件流是长连接，不能套请求超时
        .merge(events::router())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// 从代理头提取客户端 IP，仅用于限流分桶
pub(crate) fn client_ip(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|h| h.to_str().ok())
                .map(str::to_string)
        })
        .unwrap_or_else(|| "local".to_string())
}
