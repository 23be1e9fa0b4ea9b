//! Shared utilities for banyad
//!
//! This crate provides:
//! - ID types (UserId, BookingId, ClientId)
//! - The `Slot` minute-precision booking time and `now()` wrapper
//! - Error types
//! - Rate limiting helpers
//! - Default paths for socket and data directories

mod error;
mod ids;
mod paths;
mod rate_limit;
mod time;

pub use error::*;
pub use ids::*;
pub use paths::*;
pub use rate_limit::*;
pub use time::*;
