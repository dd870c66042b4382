//! Menu API 模块
//!
//! 菜单 CRUD 在别处维护；本节点只提供可点菜单查询和库存设置。

mod handler;

use axum::{
    routing::{get, put},
    Router,
};

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new()
        .route("/api/menu", get(handler::list_active))
        .route("/api/menu/{id}/stock", put(handler::set_stock))
}
