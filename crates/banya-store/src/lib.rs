//! Persistence layer for banyad
//!
//! Provides:
//! - Users (profile + gender)
//! - Bookings with a `UNIQUE(slot, cabin)` backstop constraint
//! - The operating-day singleton
//! - Audit log (append-only)
//!
//! The `Store` trait is the abstract repository the engine is written
//! against; `SqliteStore` is its production adapter.

mod audit;
mod sqlite;
mod traits;

pub use audit::*;
pub use sqlite::*;
pub use traits::*;

use thiserror::Error;

/// Store errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),

    /// A uniqueness constraint rejected a write. For bookings this means the
    /// `(slot, cabin)` pair was taken by a concurrent writer.
    #[error("Conflicting write: {0}")]
    Conflict(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Not found: {0}")]
    NotFound(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        match &e {
            rusqlite::Error::SqliteFailure(err, _)
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                StoreError::Conflict(e.to_string())
            }
            _ => StoreError::Database(e.to_string()),
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
