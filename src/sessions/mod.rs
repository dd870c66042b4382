//! 会话模块

pub mod manager;

pub use manager::{JoinedSession, OpenedSession, SessionManager};
