//! Repository Module
//!
//! CRUD and transactional operations as free functions over the SQLite
//! pool. Functions that must run inside an order transaction take
//! `&mut SqliteConnection` so the caller controls commit/rollback.

pub mod audit;
pub mod cart;
pub mod dining_table;
pub mod idempotency;
pub mod menu_item;
pub mod order;
pub mod session;
pub mod suspicious_order;

use thiserror::Error;

/// Repository error types
#[derive(Debug, Error)]
pub enum RepoError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Duplicate: {0}")]
    Duplicate(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

impl From<sqlx::Error> for RepoError {
    fn from(err: sqlx::Error) -> Self {
        RepoError::Database(err.to_string())
    }
}

/// Result type for repository operations
pub type RepoResult<T> = Result<T, RepoError>;
