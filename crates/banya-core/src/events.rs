//! Core events emitted by the engine's maintenance sweep

use chrono::NaiveDate;

/// Events produced by `BookingEngine::maintain`, for the service loop to
/// broadcast to subscribed clients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreEvent {
    /// The operating day rolled over; all bookings were cleared.
    DayReset { day: NaiveDate },

    /// The expiry sweep removed time-passed bookings.
    BookingsExpired { count: usize },
}
