//! The booking engine

use banya_api::{BookingView, CabinNumber, Gender, ScheduleRow};
use banya_config::FacilityConfig;
use banya_store::{AuditEvent, AuditEventType, BookingRecord, Store, StoreError, UserRecord};
use banya_util::{BanyaError, BookingId, Result, Slot, UserId};
use chrono::{DateTime, Local};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::{
    available_cabins, ensure_current_day, expire_passed_bookings, free_cabins, CoreEvent,
};

/// How many times an insert is attempted when the slot race is lost.
/// One retry re-reads occupancy; after that the caller gets the fresh count.
const MAX_INSERT_ATTEMPTS: u32 = 2;

/// The booking engine.
///
/// Holds no booking state of its own: every decision re-reads current state
/// through the injected store, so concurrent front ends never act on stale
/// snapshots. All methods take `&self`; serialization happens at the store.
pub struct BookingEngine {
    facility: FacilityConfig,
    store: Arc<dyn Store>,
}

fn storage(e: StoreError) -> BanyaError {
    BanyaError::storage(e.to_string())
}

impl BookingEngine {
    pub fn new(facility: FacilityConfig, store: Arc<dyn Store>) -> Self {
        info!(
            cabins = facility.cabins.len(),
            "Booking engine initialized"
        );

        Self { facility, store }
    }

    pub fn facility(&self) -> &FacilityConfig {
        &self.facility
    }

    /// Create or update a user profile. Idempotent; re-registration may
    /// overwrite a previously recorded gender.
    pub fn register_user(
        &self,
        user_id: &UserId,
        display_name: &str,
        gender: Gender,
    ) -> Result<()> {
        self.store
            .upsert_user(&UserRecord {
                user_id: user_id.clone(),
                display_name: display_name.to_string(),
                gender: Some(gender),
            })
            .map_err(storage)?;

        let _ = self.store.append_audit(AuditEvent::new(
            AuditEventType::UserRegistered {
                user_id: user_id.clone(),
            },
        ));

        info!(user_id = %user_id, gender = %gender, "User registered");
        Ok(())
    }

    /// Run day rollover and slot expiry, returning what happened for the
    /// service loop to broadcast. Also invoked internally before every
    /// operation that depends on today's state.
    pub fn maintain(&self, now: DateTime<Local>) -> Result<Vec<CoreEvent>> {
        let mut events = Vec::new();

        if let Some(day) = ensure_current_day(self.store.as_ref(), now.date_naive())? {
            let _ = self
                .store
                .append_audit(AuditEvent::new(AuditEventType::DayReset { day }));
            events.push(CoreEvent::DayReset { day });
        }

        let expired = expire_passed_bookings(self.store.as_ref(), &now)?;
        if expired > 0 {
            let _ = self.store.append_audit(AuditEvent::new(
                AuditEventType::BookingsExpired { count: expired },
            ));
            events.push(CoreEvent::BookingsExpired { count: expired });
        }

        Ok(events)
    }

    /// How many cabins could be granted at `slot` to a user of `gender`.
    pub fn check_availability(
        &self,
        slot: Slot,
        gender: Gender,
        now: DateTime<Local>,
    ) -> Result<usize> {
        self.maintain(now)?;

        let occupants = self.store.occupants_at(slot).map_err(storage)?;
        Ok(available_cabins(&self.facility.cabins, &occupants, gender))
    }

    /// Availability for a registered user, resolving their recorded gender
    /// first. A user without a gender on record never gets a nonzero
    /// result; the pure availability rule itself stays gender-input only.
    pub fn check_availability_for_user(
        &self,
        user_id: &UserId,
        slot: Slot,
        now: DateTime<Local>,
    ) -> Result<usize> {
        let user = self
            .store
            .get_user(user_id)
            .map_err(storage)?
            .ok_or_else(|| BanyaError::validation("user is not registered"))?;
        let gender = user.gender.ok_or(BanyaError::GenderNotSet)?;

        self.check_availability(slot, gender, now)
    }

    /// Reserve `requested` cabins at `slot` for `user_id`.
    ///
    /// Assignment is deterministic: the lowest-numbered free cabins win, so
    /// the same occupancy always yields the same cabin identities.
    pub fn create_booking(
        &self,
        user_id: &UserId,
        slot: Slot,
        requested: usize,
        now: DateTime<Local>,
    ) -> Result<Vec<CabinNumber>> {
        let total = self.facility.cabins.len();
        if requested == 0 || requested > total {
            return Err(BanyaError::validation(format!(
                "cabin count must be between 1 and {}",
                total
            )));
        }

        let user = self
            .store
            .get_user(user_id)
            .map_err(storage)?
            .ok_or_else(|| BanyaError::validation("user is not registered"))?;
        let gender = user.gender.ok_or(BanyaError::GenderNotSet)?;

        self.maintain(now)?;

        if slot < Slot::of(&now) {
            return Err(BanyaError::validation(format!(
                "slot {} has already passed",
                slot
            )));
        }

        // Re-check-then-insert: availability is evaluated at the instant of
        // commit, and UNIQUE(slot, cabin) is the backstop when a concurrent
        // writer takes a cabin between the read and the insert.
        let mut attempts = 0;
        loop {
            let occupants = self.store.occupants_at(slot).map_err(storage)?;
            let available = available_cabins(&self.facility.cabins, &occupants, gender);
            if available < requested {
                let _ = self.store.append_audit(AuditEvent::new(
                    AuditEventType::BookingDenied {
                        user_id: user_id.clone(),
                        slot,
                        requested,
                        available,
                    },
                ));
                return Err(BanyaError::InsufficientCapacity { available });
            }

            let assigned: Vec<CabinNumber> = free_cabins(&self.facility.cabins, &occupants)
                .into_iter()
                .take(requested)
                .collect();

            match self.store.insert_bookings(user_id, slot, &assigned, now) {
                Ok(booking_ids) => {
                    let _ = self.store.append_audit(AuditEvent::new(
                        AuditEventType::BookingCreated {
                            user_id: user_id.clone(),
                            slot,
                            cabins: assigned.clone(),
                        },
                    ));
                    info!(
                        user_id = %user_id,
                        slot = %slot,
                        cabins = ?assigned,
                        booking_ids = ?booking_ids,
                        "Booking created"
                    );
                    return Ok(assigned);
                }
                Err(StoreError::Conflict(_)) => {
                    attempts += 1;
                    if attempts >= MAX_INSERT_ATTEMPTS {
                        let occupants = self.store.occupants_at(slot).map_err(storage)?;
                        let available =
                            available_cabins(&self.facility.cabins, &occupants, gender);
                        warn!(user_id = %user_id, slot = %slot, "Slot race lost twice");
                        return Err(BanyaError::InsufficientCapacity { available });
                    }
                    debug!(user_id = %user_id, slot = %slot, "Slot race lost, retrying");
                }
                Err(e) => return Err(storage(e)),
            }
        }
    }

    /// Cancel a booking owned by `user_id`. The ownership check happens
    /// here, never trusted from presentation-layer state. Returns the
    /// removed booking.
    pub fn cancel_booking(
        &self,
        user_id: &UserId,
        booking_id: BookingId,
    ) -> Result<BookingRecord> {
        let booking = self
            .store
            .get_booking(booking_id)
            .map_err(storage)?
            .ok_or(BanyaError::NotFound)?;

        if booking.user_id != *user_id {
            warn!(booking_id = %booking_id, user_id = %user_id, "Cancel denied: not the owner");
            return Err(BanyaError::NotOwner);
        }

        match self.store.delete_booking(booking_id) {
            Ok(()) => {}
            // Expired or cancelled concurrently; indistinguishable from
            // never-existed for the caller.
            Err(StoreError::NotFound(_)) => return Err(BanyaError::NotFound),
            Err(e) => return Err(storage(e)),
        }

        let _ = self.store.append_audit(AuditEvent::new(
            AuditEventType::BookingCancelled {
                booking_id,
                user_id: user_id.clone(),
            },
        ));

        info!(booking_id = %booking_id, user_id = %user_id, "Booking cancelled");
        Ok(booking)
    }

    /// The caller's bookings for today, ordered by slot.
    pub fn list_bookings_for_user(
        &self,
        user_id: &UserId,
        now: DateTime<Local>,
    ) -> Result<Vec<BookingView>> {
        self.maintain(now)?;

        let bookings = self.store.bookings_for_user(user_id).map_err(storage)?;
        Ok(bookings
            .into_iter()
            .map(|b| BookingView {
                booking_id: b.booking_id,
                slot: b.slot,
                cabin: b.cabin,
            })
            .collect())
    }

    /// Today's full schedule, ordered by slot then cabin.
    pub fn list_all_bookings(&self, now: DateTime<Local>) -> Result<Vec<ScheduleRow>> {
        self.maintain(now)?;

        let entries = self.store.schedule().map_err(storage)?;
        Ok(entries
            .into_iter()
            .map(|e| ScheduleRow {
                slot: e.slot,
                cabin: e.cabin,
                gender: e.gender,
                display_name: e.display_name,
            })
            .collect())
    }
}
