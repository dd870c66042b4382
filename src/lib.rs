//! Tableside - 餐厅桌台会话与下单引擎
//!
//! # 架构概述
//!
//! 单店边缘节点，提供以下核心功能：
//!
//! - **会话** (`sessions`): 开台、PIN 入席、换桌、关台
//! - **下单** (`orders`): 单事务核心的计价、库存与可疑订单门禁
//! - **事件** (`events`): 提交后厨房/服务员/顾客三域扇出
//! - **认证** (`auth`): 员工 JWT + 顾客不透明令牌双轨
//! - **HTTP API** (`api`): RESTful API 接口
//!
//! # 模块结构
//!
//! ```text
//! src/
//! ├── core/          # 配置、状态、错误、后台任务
//! ├── auth/          # JWT、PIN 守卫、令牌、限流
//! ├── sessions/      # 会话生命周期
//! ├── orders/        # 下单事务引擎
//! ├── events/        # 事件分发器
//! ├── api/           # HTTP 路由和处理器
//! ├── db/            # 模型、仓储、迁移
//! └── utils/         # 日志等工具
//! ```

pub mod api;
pub mod auth;
pub mod core;
pub mod db;
pub mod events;
pub mod orders;
pub mod sessions;
pub mod utils;

// Re-export 公共类型
pub use auth::{AuthContext, JwtService, SessionContext};
pub use core::{AppError, AppResult, Config, Server, ServerState};
pub use events::EventDispatcher;
pub use orders::{OrderEngine, Placement};
pub use sessions::SessionManager;

// Re-export logger functions
pub use utils::logger::{init_logger, init_logger_with_file};

/// 设置运行环境 (dotenv、工作目录、日志)
pub fn setup_environment() -> std::io::Result<()> {
    dotenv::dotenv().ok();

    let config = Config::from_env();
    config.ensure_work_dir_structure()?;

    let log_dir = config.log_dir();
    init_logger_with_file(None, log_dir.to_str());
    Ok(())
}
