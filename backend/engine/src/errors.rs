//! Application-wide error types.
//!
//! Guard failures (`NotFound`, `Unauthorized`, `AlreadyCompleted`, ...) are
//! terminal and surface verbatim to the caller. Only [`EngineError::Database`]
//! and [`EngineError::Conflict`] are eligible for automatic retry (see
//! [`crate::db::with_retry`]).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("record not found")]
    NotFound,

    #[error("requester is not the owner of this record")]
    Unauthorized,

    #[error("event is already completed")]
    AlreadyCompleted,

    #[error("voucher has already been used")]
    AlreadyUsed,

    #[error("voucher has expired")]
    Expired,

    #[error("insufficient points balance")]
    InsufficientPoints,

    #[error("validation error: {0}")]
    Validation(String),

    #[error("concurrent modification detected; retry the operation")]
    Conflict,

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("domain error: {0}")]
    Domain(#[from] donor_core::types::DomainError),

    #[error("configuration error: {0}")]
    Config(String),
}

impl EngineError {
    /// Whether a bounded automatic retry of the whole operation is safe and
    /// potentially useful. Everything else must propagate immediately.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Database(_) | Self::Conflict)
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
