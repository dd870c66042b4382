//! Cart API 模块
//!
//! 所有端点都要求顾客会话上下文；INDIVIDUAL 模式按设备隔离，
//! FAMILY 模式共享一个购物车。

mod handler;

use axum::{
    routing::{delete, get, post, put},
    Router,
};

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new()
        .route("/api/cart", get(handler::view))
        .route("/api/cart/items", put(handler::upsert_item))
        .route("/api/cart/items/{menu_item_id}", delete(handler::remove_item))
        .route("/api/cart/checkout", post(handler::checkout))
}
