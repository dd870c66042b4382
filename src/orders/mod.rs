//! 下单模块
//!
//! [`engine`] 是唯一的事务核心；[`suspicion`] 是纯判定函数。

pub mod engine;
pub mod suspicion;

pub use engine::{ItemRequest, OrderEngine, OrderView, Placement, ResumeStatus};
pub use suspicion::SuspicionConfig;
