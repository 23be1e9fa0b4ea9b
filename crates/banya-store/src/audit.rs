//! Audit event types

use banya_api::CabinNumber;
use banya_util::{BookingId, Slot, UserId};
use chrono::{DateTime, Local, NaiveDate};
use serde::{Deserialize, Serialize};

/// Types of audit events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuditEventType {
    /// Service started
    ServiceStarted,

    /// Service stopped
    ServiceStopped,

    /// User registered or re-registered
    UserRegistered { user_id: UserId },

    /// Booking committed
    BookingCreated {
        user_id: UserId,
        slot: Slot,
        cabins: Vec<CabinNumber>,
    },

    /// Booking cancelled by its owner
    BookingCancelled {
        booking_id: BookingId,
        user_id: UserId,
    },

    /// Booking request denied for lack of capacity
    BookingDenied {
        user_id: UserId,
        slot: Slot,
        requested: usize,
        available: usize,
    },

    /// Expiry sweep removed time-passed bookings
    BookingsExpired { count: usize },

    /// Operating day rolled over, clearing all bookings
    DayReset { day: NaiveDate },
}

/// Full audit event with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Unique event ID
    pub id: i64,

    /// Event timestamp
    pub timestamp: DateTime<Local>,

    /// Event type and details
    pub event: AuditEventType,
}

impl AuditEvent {
    pub fn new(event: AuditEventType) -> Self {
        Self {
            id: 0, // Will be set by store
            timestamp: banya_util::now(),
            event,
        }
    }
}
