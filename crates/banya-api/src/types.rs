//! Shared types for the banyad API

use banya_util::{BookingId, Slot};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Gender of a user, fixed at onboarding.
///
/// Co-occupancy policy: two cabins at the same slot may only be held by
/// users of the same gender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Number of a physical cabin, drawn from the facility's fixed ordered set.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct CabinNumber(u8);

impl CabinNumber {
    pub fn new(n: u8) -> Self {
        Self(n)
    }

    pub fn as_u8(&self) -> u8 {
        self.0
    }
}

impl fmt::Display for CabinNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One booking as presented to its owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingView {
    pub booking_id: BookingId,
    pub slot: Slot,
    pub cabin: CabinNumber,
}

/// One row of the facility-wide schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleRow {
    pub slot: Slot,
    pub cabin: CabinNumber,
    pub gender: Gender,
    pub display_name: String,
}

/// Service health report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub store_healthy: bool,
    pub active_dialogs: usize,
}

/// Booking dialogue input, decoded once at the transport boundary.
///
/// Replaces string-matched callback payloads ("cancel_<id>" and friends)
/// with a closed set of actions the dispatcher matches exhaustively.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DialogAction {
    /// Begin (or restart) the booking dialogue.
    Start,
    /// Propose a time slot.
    ChooseSlot { slot: Slot },
    /// Confirm how many cabins to book at the proposed slot.
    ConfirmCabins { count: u8 },
    /// Abandon the dialogue.
    Abort,
}

/// Where the booking dialogue stands after an action was applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum DialogReply {
    /// Waiting for the user to name a slot.
    SlotNeeded,
    /// Slot was free; waiting for a cabin count up to `available`.
    CabinCountNeeded { slot: Slot, available: usize },
    /// Proposed slot had no free cabin for this user; still waiting for a slot.
    SlotUnavailable { slot: Slot },
    /// Dialogue committed; cabins were assigned.
    Booked { cabins: Vec<CabinNumber> },
    /// Dialogue was abandoned.
    Aborted,
    /// Action arrived with no dialogue in progress.
    NotInDialog,
}
