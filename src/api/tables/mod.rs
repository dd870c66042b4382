//! Dining Table API 模块

mod handler;

use axum::{routing::get, Router};

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new()
        .route("/api/tables", get(handler::list))
        .route("/api/zones", get(handler::list_zones))
}
