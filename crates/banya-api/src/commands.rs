//! Command types for the banyad protocol

use banya_util::{BookingId, ClientId, Slot, UserId};
use serde::{Deserialize, Serialize};

use crate::{
    BookingView, CabinNumber, DialogAction, DialogReply, Gender, HealthStatus, ScheduleRow,
    API_VERSION,
};

/// Request wrapper with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    /// Request ID for correlation
    pub request_id: u64,
    /// API version
    pub api_version: u32,
    /// The command
    pub command: Command,
}

impl Request {
    pub fn new(request_id: u64, command: Command) -> Self {
        Self {
            request_id,
            api_version: API_VERSION,
            command,
        }
    }
}

/// Response wrapper
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    /// Corresponding request ID
    pub request_id: u64,
    /// API version
    pub api_version: u32,
    /// Response payload or error
    pub result: ResponseResult,
}

impl Response {
    pub fn success(request_id: u64, payload: ResponsePayload) -> Self {
        Self {
            request_id,
            api_version: API_VERSION,
            result: ResponseResult::Ok(payload),
        }
    }

    pub fn error(request_id: u64, error: ErrorInfo) -> Self {
        Self {
            request_id,
            api_version: API_VERSION,
            result: ResponseResult::Err(error),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseResult {
    Ok(ResponsePayload),
    Err(ErrorInfo),
}

/// Error information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub code: ErrorCode,
    pub message: String,
    /// For `InsufficientCapacity`: how many cabins actually remain, so the
    /// caller can retry with a smaller request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub available: Option<usize>,
}

impl ErrorInfo {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            available: None,
        }
    }

    pub fn with_available(mut self, available: usize) -> Self {
        self.available = Some(available);
        self
    }
}

/// Error codes for the protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    InvalidRequest,
    Validation,
    GenderNotSet,
    InsufficientCapacity,
    NotFound,
    NotOwner,
    StorageUnavailable,
    RateLimited,
    InternalError,
}

/// All possible commands from clients.
///
/// Caller identity is the opaque `user_id` carried in each command; there is
/// no further authentication at this boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    /// Create or update a user profile (idempotent upsert).
    RegisterUser {
        user_id: UserId,
        display_name: String,
        gender: Gender,
    },

    /// How many cabins could be granted at `slot` to a user of `gender`.
    CheckAvailability { slot: Slot, gender: Gender },

    /// Reserve `cabins` cabins at `slot`.
    CreateBooking {
        user_id: UserId,
        slot: Slot,
        cabins: u8,
    },

    /// Cancel an owned booking.
    CancelBooking {
        user_id: UserId,
        booking_id: BookingId,
    },

    /// List the caller's bookings for today, ordered by slot.
    ListUserBookings { user_id: UserId },

    /// List today's full schedule, ordered by slot then cabin.
    ListSchedule,

    /// Drive the interactive booking dialogue.
    Dialog {
        user_id: UserId,
        action: DialogAction,
    },

    /// Get health status
    GetHealth,

    /// Subscribe to events (returns immediately, events stream separately)
    SubscribeEvents,

    /// Unsubscribe from events
    UnsubscribeEvents,

    /// Ping for keepalive
    Ping,
}

impl Command {
    /// The user a command acts on behalf of, when it names one.
    ///
    /// Used by the dispatcher to abort that user's in-flight dialogue when a
    /// menu command interrupts it.
    pub fn actor(&self) -> Option<&UserId> {
        match self {
            Command::RegisterUser { user_id, .. }
            | Command::CreateBooking { user_id, .. }
            | Command::CancelBooking { user_id, .. }
            | Command::ListUserBookings { user_id }
            | Command::Dialog { user_id, .. } => Some(user_id),
            Command::CheckAvailability { .. }
            | Command::ListSchedule
            | Command::GetHealth
            | Command::SubscribeEvents
            | Command::UnsubscribeEvents
            | Command::Ping => None,
        }
    }
}

/// Response payloads
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponsePayload {
    Registered,
    Availability { cabins: usize },
    Booked { cabins: Vec<CabinNumber> },
    Cancelled,
    UserBookings(Vec<BookingView>),
    Schedule(Vec<ScheduleRow>),
    Dialog(DialogReply),
    Health(HealthStatus),
    Subscribed { client_id: ClientId },
    Unsubscribed,
    Pong,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_serialization() {
        let req = Request::new(
            1,
            Command::CheckAvailability {
                slot: "14:30".parse().unwrap(),
                gender: Gender::Male,
            },
        );
        let json = serde_json::to_string(&req).unwrap();
        let parsed: Request = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.request_id, 1);
        assert!(matches!(parsed.command, Command::CheckAvailability { .. }));
    }

    #[test]
    fn response_serialization() {
        let resp = Response::success(
            7,
            ResponsePayload::Booked {
                cabins: vec![CabinNumber::new(1), CabinNumber::new(2)],
            },
        );

        let json = serde_json::to_string(&resp).unwrap();
        let parsed: Response = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.request_id, 7);
        match parsed.result {
            ResponseResult::Ok(ResponsePayload::Booked { cabins }) => {
                assert_eq!(cabins.len(), 2);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn error_carries_available_count() {
        let err = ErrorInfo::new(ErrorCode::InsufficientCapacity, "slot is full")
            .with_available(0);
        let json = serde_json::to_string(&err).unwrap();
        assert!(json.contains("\"available\":0"));

        let plain = ErrorInfo::new(ErrorCode::NotFound, "no such booking");
        let json = serde_json::to_string(&plain).unwrap();
        assert!(!json.contains("available"));
    }

    #[test]
    fn actor_is_present_for_user_commands() {
        let cmd = Command::ListUserBookings {
            user_id: UserId::new("u1"),
        };
        assert_eq!(cmd.actor().unwrap().as_str(), "u1");
        assert!(Command::ListSchedule.actor().is_none());
    }
}
