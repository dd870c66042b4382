//! 服务器状态 - 持有所有服务的单例引用
//!
//! ServerState 是节点的核心数据结构，持有配置、数据库连接池和各
//! 服务的共享引用。使用 Arc 实现浅拷贝，克隆成本极低。
//!
//! # 服务组件
//!
//! | 字段 | 类型 | 说明 |
//! |------|------|------|
//! | config | Config | 配置项 (不可变) |
//! | db | DbService | SQLite 连接池 |
//! | jwt_service | Arc<JwtService> | 员工 JWT 验证 |
//! | dispatcher | Arc<EventDispatcher> | 提交后事件扇出 |
//! | pin_limiter | Arc<IpRateLimiter> | IP 级 PIN 限流 |
//! | sessions | Arc<SessionManager> | 会话生命周期 |
//! | orders | Arc<OrderEngine> | 下单事务引擎 |

use std::sync::Arc;
use std::time::Duration;

use crate::auth::{IpRateLimiter, JwtService};
use crate::core::error::{AppError, AppResult};
use crate::core::tasks::BackgroundTasks;
use crate::core::Config;
use crate::db::repository::{idempotency, session as session_repo};
use crate::db::DbService;
use crate::events::EventDispatcher;
use crate::orders::OrderEngine;
use crate::sessions::SessionManager;

/// 服务器状态
#[derive(Clone)]
pub struct ServerState {
    /// 服务器配置
    pub config: Config,
    /// SQLite 连接池
    pub db: DbService,
    /// 员工 JWT 服务
    pub jwt_service: Arc<JwtService>,
    /// 提交后事件分发器
    pub dispatcher: Arc<EventDispatcher>,
    /// IP 级 PIN 尝试限流器
    pub pin_limiter: Arc<IpRateLimiter>,
    /// 会话生命周期管理
    pub sessions: Arc<SessionManager>,
    /// 下单事务引擎
    pub orders: Arc<OrderEngine>,
}

impl ServerState {
    /// 初始化服务器状态
    ///
    /// 按顺序初始化：
    /// 1. 工作目录结构
    /// 2. 数据库 (work_dir/database/tableside.db，WAL + 迁移)
    /// 3. 各服务 (JWT、分发器、限流器、会话管理、订单引擎)
    pub async fn initialize(config: &Config) -> AppResult<Self> {
        config
            .ensure_work_dir_structure()
            .map_err(|e| AppError::Internal(format!("Failed to create work directories: {e}")))?;

        let db_path = config.database_dir().join("tableside.db");
        let db = DbService::new(&db_path.to_string_lossy()).await?;

        let jwt_service = Arc::new(JwtService::new(config.jwt.clone()));
        let dispatcher = EventDispatcher::new();
        let pin_limiter = Arc::new(IpRateLimiter::new(config.ip_pin_attempts_per_hour));

        let sessions = Arc::new(SessionManager::new(
            db.pool.clone(),
            config.clone(),
            dispatcher.clone(),
            pin_limiter.clone(),
        ));
        let orders = Arc::new(OrderEngine::new(db.pool.clone(), dispatcher.clone(), config));

        Ok(Self {
            config: config.clone(),
            db,
            jwt_service,
            dispatcher,
            pin_limiter,
            sessions,
            orders,
        })
    }

    /// 启动后台任务
    ///
    /// 必须在 `Server::run()` 进入服务循环之前调用。
    ///
    /// 注册的任务：
    /// - 空闲会话清扫 (每分钟)
    /// - 过期幂等键清理 (每小时)
    /// - 过期顾客令牌清理 (每小时)
    /// - 限流窗口回收 (每十分钟)
    pub fn start_background_tasks(&self) -> BackgroundTasks {
        let mut tasks = BackgroundTasks::new();

        let sessions = self.sessions.clone();
        tasks.spawn_periodic("idle_session_sweep", Duration::from_secs(60), move || {
            let sessions = sessions.clone();
            async move {
                match sessions.sweep_idle().await {
                    Ok(0) => {}
                    Ok(n) => tracing::info!(closed = n, "Idle session sweep"),
                    Err(e) => tracing::error!(error = %e, "Idle session sweep failed"),
                }
            }
        });

        let pool = self.db.pool.clone();
        tasks.spawn_periodic("idempotency_purge", Duration::from_secs(3600), move || {
            let pool = pool.clone();
            async move {
                match idempotency::purge_expired(&pool, chrono::Utc::now()).await {
                    Ok(0) => {}
                    Ok(n) => tracing::debug!(purged = n, "Expired idempotency keys purged"),
                    Err(e) => tracing::error!(error = %e, "Idempotency purge failed"),
                }
            }
        });

        let pool = self.db.pool.clone();
        tasks.spawn_periodic("customer_token_purge", Duration::from_secs(3600), move || {
            let pool = pool.clone();
            async move {
                match session_repo::purge_expired_tokens(&pool).await {
                    Ok(0) => {}
                    Ok(n) => tracing::debug!(purged = n, "Expired customer tokens purged"),
                    Err(e) => tracing::error!(error = %e, "Customer token purge failed"),
                }
            }
        });

        let limiter = self.pin_limiter.clone();
        tasks.spawn_periodic("rate_limit_evict", Duration::from_secs(600), move || {
            let limiter = limiter.clone();
            async move { limiter.evict_stale() }
        });

        tasks.log_summary();
        tasks
    }
}
