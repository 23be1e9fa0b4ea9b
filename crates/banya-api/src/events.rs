//! Events broadcast by banyad to subscribed clients

use banya_util::{BookingId, Slot, UserId};
use chrono::{DateTime, Local, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::CabinNumber;

/// Event wrapper with timestamp
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub timestamp: DateTime<Local>,
    pub payload: EventPayload,
}

impl Event {
    pub fn new(payload: EventPayload) -> Self {
        Self {
            timestamp: banya_util::now(),
            payload,
        }
    }
}

/// Event payloads
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventPayload {
    /// A booking was committed.
    BookingCreated {
        user_id: UserId,
        slot: Slot,
        cabins: Vec<CabinNumber>,
    },

    /// A booking was cancelled by its owner.
    BookingCancelled {
        booking_id: BookingId,
        slot: Slot,
        cabin: CabinNumber,
    },

    /// The expiry sweep removed time-passed bookings.
    BookingsExpired { count: usize },

    /// The operating day rolled over; all bookings were cleared.
    DayReset { day: NaiveDate },

    /// Service is shutting down.
    ServiceShuttingDown,
}
