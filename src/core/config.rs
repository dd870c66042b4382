//! 服务器配置 - 边缘节点的所有配置项
//!
//! # 环境变量
//!
//! 所有配置项都可以通过环境变量覆盖：
//!
//! | 环境变量 | 默认值 | 说明 |
//! |----------|--------|------|
//! | WORK_DIR | /var/lib/tableside | 工作目录 (数据库、日志) |
//! | HTTP_PORT | 3000 | HTTP 服务端口 |
//! | RESTAURANT_ID | default | 本节点所属门店 ID |
//! | SUSPICIOUS_QTY_THRESHOLD | 10 | 单行数量超过即标记可疑 |
//! | SUSPICIOUS_TOTAL_CENTS | 50000 | 订单总额超过即标记可疑 (分) |
//! | PIN_MAX_FAILURES | 5 | 连续失败次数上限 |
//! | PIN_BLOCK_MINUTES | 15 | PIN 锁定时长 (分钟) |
//! | IP_PIN_ATTEMPTS_PER_HOUR | 50 | 单 IP 每小时 PIN 尝试上限 |
//! | SESSION_IDLE_MINUTES | 120 | 会话空闲超时 (分钟) |
//! | CUSTOMER_TOKEN_HOURS | 8 | 顾客令牌有效期 (小时) |
//! | IDEMPOTENCY_TTL_HOURS | 24 | 幂等键有效期 (小时) |
//!
//! # 示例
//!
//! ```ignore
//! WORK_DIR=/data/tableside HTTP_PORT=8080 cargo run
//! ```

use std::path::PathBuf;

use crate::auth::JwtConfig;

/// 服务器配置
#[derive(Debug, Clone)]
pub struct Config {
    /// 工作目录，存储数据库、日志等文件
    pub work_dir: String,
    /// HTTP API 服务端口
    pub http_port: u16,
    /// 本节点所属门店 ID
    pub restaurant_id: String,
    /// JWT 认证配置 (员工端)
    pub jwt: JwtConfig,
    /// 运行环境: development | staging | production
    pub environment: String,

    // === 可疑订单阈值 ===
    /// 单行数量阈值，超过即进入审批流
    pub suspicious_qty_threshold: i64,
    /// 订单总额阈值 (分)，超过即进入审批流
    pub suspicious_total_cents: i64,

    // === PIN 限流 ===
    /// 连续失败次数上限
    pub pin_max_failures: i64,
    /// 锁定时长 (分钟)
    pub pin_block_minutes: i64,
    /// 单 IP 每小时 PIN 尝试上限
    pub ip_pin_attempts_per_hour: u32,

    // === 生命周期 ===
    /// 会话空闲超时 (分钟)，后台任务强制关闭
    pub session_idle_minutes: i64,
    /// 顾客令牌有效期 (小时)
    pub customer_token_hours: i64,
    /// 幂等键有效期 (小时)
    pub idempotency_ttl_hours: i64,
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// 从环境变量加载配置
    ///
    /// 如果环境变量未设置，使用默认值
    pub fn from_env() -> Self {
        Self {
            work_dir: std::env::var("WORK_DIR").unwrap_or_else(|_| "/var/lib/tableside".into()),
            http_port: env_parse("HTTP_PORT", 3000),
            restaurant_id: std::env::var("RESTAURANT_ID").unwrap_or_else(|_| "default".into()),
            jwt: JwtConfig::default(),
            environment: std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".into()),

            suspicious_qty_threshold: env_parse("SUSPICIOUS_QTY_THRESHOLD", 10),
            suspicious_total_cents: env_parse("SUSPICIOUS_TOTAL_CENTS", 50_000),

            pin_max_failures: env_parse("PIN_MAX_FAILURES", 5),
            pin_block_minutes: env_parse("PIN_BLOCK_MINUTES", 15),
            ip_pin_attempts_per_hour: env_parse("IP_PIN_ATTEMPTS_PER_HOUR", 50),

            session_idle_minutes: env_parse("SESSION_IDLE_MINUTES", 120),
            customer_token_hours: env_parse("CUSTOMER_TOKEN_HOURS", 8),
            idempotency_ttl_hours: env_parse("IDEMPOTENCY_TTL_HOURS", 24),
        }
    }

    /// 使用自定义值覆盖部分配置
    ///
    /// 常用于测试场景
    pub fn with_overrides(work_dir: impl Into<String>, http_port: u16) -> Self {
        let mut config = Self::from_env();
        config.work_dir = work_dir.into();
        config.http_port = http_port;
        config
    }

    /// 数据库目录 (work_dir/database)
    pub fn database_dir(&self) -> PathBuf {
        PathBuf::from(&self.work_dir).join("database")
    }

    /// 日志目录 (work_dir/logs)
    pub fn log_dir(&self) -> PathBuf {
        PathBuf::from(&self.work_dir).join("logs")
    }

    /// 确保工作目录结构存在
    pub fn ensure_work_dir_structure(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(self.database_dir())?;
        std::fs::create_dir_all(self.log_dir())?;
        Ok(())
    }

    /// 是否生产环境
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// 是否开发环境
    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}
