//! Day rollover and slot expiry
//!
//! All bookings live within a single operating day. When the wall-clock date
//! moves past the stored day the whole booking table is cleared (a hard
//! reset, not a rolling window), and bookings whose slot has passed are
//! swept continuously during the day.
//!
//! These run before every read that depends on "today's" state, so callers
//! never observe bookings from a previous day or a passed slot.

use banya_store::Store;
use banya_util::{BanyaError, Result, Slot};
use chrono::{DateTime, Local, NaiveDate};
use tracing::info;

/// Advance the operating day if the stored one is stale, clearing every
/// booking in the same transaction. Returns the new day when a reset
/// happened. Calling again on the same date is a no-op.
pub fn ensure_current_day(store: &dyn Store, today: NaiveDate) -> Result<Option<NaiveDate>> {
    let reset = store
        .reset_day(today)
        .map_err(|e| BanyaError::storage(e.to_string()))?;

    if reset {
        info!(day = %today, "Operating day rolled over, bookings cleared");
        Ok(Some(today))
    } else {
        Ok(None)
    }
}

/// Remove every booking whose slot is strictly before `now`'s time-of-day.
/// Returns the number removed; the count is logged, never surfaced as an
/// error to the caller.
pub fn expire_passed_bookings(store: &dyn Store, now: &DateTime<Local>) -> Result<usize> {
    let cutoff = Slot::of(now);
    let removed = store
        .expire_before(cutoff)
        .map_err(|e| BanyaError::storage(e.to_string()))?;

    if removed > 0 {
        info!(cutoff = %cutoff, removed, "Expired passed bookings");
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use banya_api::{CabinNumber, Gender};
    use banya_store::{SqliteStore, UserRecord};
    use banya_util::UserId;
    use chrono::TimeZone;

    fn store_with_booking(slot: &str) -> SqliteStore {
        let store = SqliteStore::in_memory().unwrap();
        let user_id = UserId::new("u1");
        store
            .upsert_user(&UserRecord {
                user_id: user_id.clone(),
                display_name: "U1".into(),
                gender: Some(Gender::Male),
            })
            .unwrap();
        store
            .insert_bookings(
                &user_id,
                slot.parse().unwrap(),
                &[CabinNumber::new(1)],
                banya_util::now(),
            )
            .unwrap();
        store
    }

    #[test]
    fn rollover_clears_bookings_once() {
        let store = store_with_booking("10:00");
        let day = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();

        let first = ensure_current_day(&store, day).unwrap();
        assert_eq!(first, Some(day));
        assert!(store.occupants_at("10:00".parse().unwrap()).unwrap().is_empty());

        // Second call on the same date does nothing
        let second = ensure_current_day(&store, day).unwrap();
        assert_eq!(second, None);
    }

    #[test]
    fn expiry_removes_only_passed_slots() {
        let store = store_with_booking("08:00");

        // 08:00 sharp: the slot has not passed yet
        let at_0800 = Local.with_ymd_and_hms(2026, 3, 2, 8, 0, 30).unwrap();
        assert_eq!(expire_passed_bookings(&store, &at_0800).unwrap(), 0);

        // One minute later it has
        let at_0801 = Local.with_ymd_and_hms(2026, 3, 2, 8, 1, 0).unwrap();
        assert_eq!(expire_passed_bookings(&store, &at_0801).unwrap(), 1);
        assert!(store.occupants_at("08:00".parse().unwrap()).unwrap().is_empty());
    }
}
