//! 认证授权模块
//!
//! 顾客侧与员工侧走两套互不相通的凭证：
//! - 顾客：PIN 验证后签发的不透明令牌 ([`tokens`])，带锁定计数
//!   ([`pin_guard`]) 和 IP 限流 ([`rate_limit`])
//! - 员工：JWT ([`jwt`])，携带角色和门店
//!
//! 两侧都通过显式上下文对象 ([`AuthContext`] / [`SessionContext`])
//! 进入业务层，不做请求对象增强。

pub mod context;
pub mod jwt;
pub mod pin_guard;
pub mod rate_limit;
pub mod tokens;

pub use context::{AuthContext, SessionContext};
pub use jwt::{Claims, JwtConfig, JwtError, JwtService};
pub use pin_guard::VerifyResult;
pub use rate_limit::IpRateLimiter;
