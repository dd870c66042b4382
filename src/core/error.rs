//! 统一错误处理
//!
//! 提供应用级错误类型和响应结构：
//! - [`AppError`] - 应用错误枚举
//! - [`AppResponse`] - API 响应结构
//!
//! # 错误码规范
//!
//! | 前缀 | 分类 | 示例 |
//! |------|------|------|
//! | E1xxx | 业务状态冲突 | E1101 桌台不可用 |
//! | E2xxx | 权限错误 | E2001 无权限 |
//! | E3xxx | 认证令牌错误 | E3002 无效令牌 |
//! | E9xxx | 系统错误 | E9002 数据库错误 |
//!
//! 订单相关错误额外携带 `retry_same_key`，告诉客户端使用同一个
//! 幂等键重试是否安全。

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::error;

use crate::db::repository::RepoError;

/// API 统一响应结构
///
/// ```json
/// {
///   "code": "E0000",
///   "message": "Success",
///   "data": { ... }
/// }
/// ```
#[derive(Debug, Serialize)]
pub struct AppResponse<T> {
    /// 错误码 (E0000 表示成功)
    pub code: String,
    /// 消息
    pub message: String,
    /// 响应数据
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    /// 使用同一幂等键重试是否安全 (仅订单错误)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_same_key: Option<bool>,
    /// 限流/锁定时的重试等待秒数
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_secs: Option<u64>,
}

/// 应用错误枚举
///
/// 覆盖会话、下单、限流三条主线的全部失败语义。
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    // ========== 认证错误 (401/403) ==========
    #[error("Authentication required")]
    Unauthorized,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token expired")]
    TokenExpired,

    #[error("Permission denied: {0}")]
    Forbidden(String),

    // ========== 通用业务错误 (4xx) ==========
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    // ========== 会话/桌台状态冲突 ==========
    #[error("Table unavailable: {0}")]
    TableUnavailable(String),

    #[error("Session is closed")]
    SessionClosed,

    // ========== 下单错误 ==========
    #[error("Item unavailable: {0}")]
    ItemUnavailable(String),

    #[error("Cart is empty")]
    EmptyCart,

    #[error("Insufficient stock: {0}")]
    InsufficientStock(String),

    #[error("Request with this idempotency key is still in flight")]
    RequestInFlight,

    // ========== 限流/锁定 ==========
    #[error("PIN entry blocked, try again in {minutes_left} minute(s)")]
    PinBlocked { minutes_left: i64 },

    #[error("Too many attempts, try again later")]
    RateLimited { retry_after_secs: u64 },

    // ========== 系统错误 (5xx) ==========
    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    /// 该错误是否允许客户端用同一个幂等键重试
    ///
    /// 状态冲突类错误重试前必须换新请求（换新键）；
    /// 瞬态错误用同一个键重试是安全的。
    pub fn retry_same_key(&self) -> Option<bool> {
        match self {
            AppError::InsufficientStock(_)
            | AppError::Database(_)
            | AppError::Internal(_) => Some(true),
            AppError::SessionClosed
            | AppError::ItemUnavailable(_)
            | AppError::TableUnavailable(_)
            | AppError::EmptyCart
            | AppError::Validation(_)
            | AppError::RequestInFlight => Some(false),
            _ => None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let retry_same_key = self.retry_same_key();
        let mut retry_after_secs = None;

        let (status, code, message) = match &self {
            AppError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "E3001",
                "Please login first".to_string(),
            ),
            AppError::InvalidToken => {
                (StatusCode::UNAUTHORIZED, "E3002", "Invalid token".to_string())
            }
            AppError::TokenExpired => {
                (StatusCode::UNAUTHORIZED, "E3003", "Token expired".to_string())
            }
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, "E2001", msg.clone()),

            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "E0003", msg.clone()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "E0004", msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "E0002", msg.clone()),

            AppError::TableUnavailable(msg) => (StatusCode::CONFLICT, "E1101", msg.clone()),
            AppError::SessionClosed => {
                (StatusCode::CONFLICT, "E1102", self.to_string())
            }
            AppError::ItemUnavailable(msg) => (StatusCode::CONFLICT, "E1103", msg.clone()),
            AppError::EmptyCart => (StatusCode::BAD_REQUEST, "E1104", self.to_string()),

            AppError::InsufficientStock(msg) => (StatusCode::CONFLICT, "E1201", msg.clone()),
            AppError::RequestInFlight => (StatusCode::CONFLICT, "E1401", self.to_string()),

            AppError::PinBlocked { minutes_left } => {
                retry_after_secs = Some((*minutes_left).max(0) as u64 * 60);
                (StatusCode::TOO_MANY_REQUESTS, "E1301", self.to_string())
            }
            AppError::RateLimited {
                retry_after_secs: secs,
            } => {
                retry_after_secs = Some(*secs);
                (StatusCode::TOO_MANY_REQUESTS, "E1302", self.to_string())
            }

            AppError::Database(msg) => {
                error!(target: "database", error = %msg, "Database error occurred");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "E9002",
                    "Database error".to_string(),
                )
            }
            AppError::Internal(msg) => {
                error!(target: "internal", error = %msg, "Internal error occurred");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "E9001",
                    "Internal server error".to_string(),
                )
            }
        };

        let body = Json(AppResponse::<()> {
            code: code.to_string(),
            message,
            data: None,
            retry_same_key,
            retry_after_secs,
        });

        (status, body).into_response()
    }
}

impl From<RepoError> for AppError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::NotFound(msg) => AppError::NotFound(msg),
            RepoError::Duplicate(msg) => AppError::Conflict(msg),
            RepoError::Validation(msg) => AppError::Validation(msg),
            RepoError::Database(msg) => AppError::Database(msg),
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Database(err.to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::Validation(err.to_string())
    }
}

/// 处理器的 Result 类型别名
pub type AppResult<T> = std::result::Result<T, AppError>;

/// Create a successful response
pub fn ok<T: Serialize>(data: T) -> Json<AppResponse<T>> {
    Json(AppResponse {
        code: "E0000".to_string(),
        message: "Success".to_string(),
        data: Some(data),
        retry_same_key: None,
        retry_after_secs: None,
    })
}
