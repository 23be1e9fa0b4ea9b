//! Error types for banyad

use thiserror::Error;

/// Core error type for booking operations.
///
/// Storage-layer failures are translated into `StorageUnavailable` at the
/// engine boundary; callers never see raw database errors.
#[derive(Debug, Error)]
pub enum BanyaError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Gender must be on record before booking")]
    GenderNotSet,

    #[error("Not enough free cabins ({available} available)")]
    InsufficientCapacity { available: usize },

    #[error("Booking not found")]
    NotFound,

    #[error("Booking belongs to another user")]
    NotOwner,

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl BanyaError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::StorageUnavailable(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, BanyaError>;
