//! Store trait definitions

use banya_api::{CabinNumber, Gender};
use banya_util::{BookingId, Slot, UserId};
use chrono::{DateTime, Local, NaiveDate};

use crate::{AuditEvent, StoreResult};

/// A registered user.
///
/// `gender` stays unset until onboarding completes; no booking is accepted
/// for a user without it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub user_id: UserId,
    pub display_name: String,
    pub gender: Option<Gender>,
}

/// One persisted booking row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingRecord {
    pub booking_id: BookingId,
    pub user_id: UserId,
    pub slot: Slot,
    pub cabin: CabinNumber,
    pub created_at: DateTime<Local>,
}

/// Occupancy of one cabin at a slot, joined with the owner's gender.
/// Input snapshot for the availability rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OccupantRecord {
    pub cabin: CabinNumber,
    pub user_id: UserId,
    pub gender: Gender,
}

/// One row of the facility-wide schedule, joined with the owner's profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleEntry {
    pub slot: Slot,
    pub cabin: CabinNumber,
    pub gender: Gender,
    pub display_name: String,
}

/// Main store trait.
///
/// Implementations must serialize writes: the engine's read-check-write for
/// a slot is protected by the `UNIQUE(slot, cabin)` constraint, and every
/// multi-row mutation must be transactional (all-or-nothing).
pub trait Store: Send + Sync {
    // Users

    /// Insert or update a user profile. Overwrites gender when it differs.
    fn upsert_user(&self, user: &UserRecord) -> StoreResult<()>;

    /// Fetch a user profile.
    fn get_user(&self, user_id: &UserId) -> StoreResult<Option<UserRecord>>;

    // Operating day

    /// The date all live bookings are scoped to.
    fn operating_day(&self) -> StoreResult<NaiveDate>;

    /// If the stored day is behind `today`, delete every booking and advance
    /// the day in one transaction. Returns whether a reset happened.
    fn reset_day(&self, today: NaiveDate) -> StoreResult<bool>;

    /// Delete every booking whose slot is strictly before `cutoff`.
    /// Returns the number of rows removed.
    fn expire_before(&self, cutoff: Slot) -> StoreResult<usize>;

    // Bookings

    /// Insert one booking row per cabin in a single transaction.
    ///
    /// Fails with `StoreError::Conflict` (and inserts nothing) when any
    /// `(slot, cabin)` pair is already taken.
    fn insert_bookings(
        &self,
        user_id: &UserId,
        slot: Slot,
        cabins: &[CabinNumber],
        created_at: DateTime<Local>,
    ) -> StoreResult<Vec<BookingId>>;

    /// Fetch a booking by id.
    fn get_booking(&self, booking_id: BookingId) -> StoreResult<Option<BookingRecord>>;

    /// Delete a booking by id.
    fn delete_booking(&self, booking_id: BookingId) -> StoreResult<()>;

    /// All live bookings at `slot`, with owner genders.
    fn occupants_at(&self, slot: Slot) -> StoreResult<Vec<OccupantRecord>>;

    /// All live bookings owned by `user_id`, ordered by slot then cabin.
    fn bookings_for_user(&self, user_id: &UserId) -> StoreResult<Vec<BookingRecord>>;

    /// Today's full schedule, ordered by slot then cabin.
    fn schedule(&self) -> StoreResult<Vec<ScheduleEntry>>;

    // Audit log

    /// Append an audit event
    fn append_audit(&self, event: AuditEvent) -> StoreResult<()>;

    /// Get recent audit events
    fn recent_audits(&self, limit: usize) -> StoreResult<Vec<AuditEvent>>;

    // Health

    /// Check if store is healthy
    fn is_healthy(&self) -> bool;
}
