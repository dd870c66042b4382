//! Order API 模块

mod handler;

use axum::{
    routing::{get, post},
    Router,
};

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new()
        // 员工端
        .route("/api/orders", post(handler::place_direct))
        .route("/api/orders/{id}", get(handler::get_by_id))
        .route(
            "/api/orders/{id}/items/{item_id}/status",
            post(handler::advance_item),
        )
        .route("/api/orders/{id}/settle", post(handler::settle))
        .route(
            "/api/sessions/{session_id}/orders",
            get(handler::list_by_session),
        )
        // 顾客端
        .route("/api/orders/mine", get(handler::list_mine))
        .route("/api/orders/resume", post(handler::resume))
}
