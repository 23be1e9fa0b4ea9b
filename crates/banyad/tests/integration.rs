//! Integration tests for banyad
//!
//! These drive the booking engine end-to-end against a real SQLite store,
//! including concurrent writers racing for the same slot.

use banya_api::{CabinNumber, Gender};
use banya_config::FacilityConfig;
use banya_core::BookingEngine;
use banya_store::{
    AuditEvent, BookingRecord, OccupantRecord, ScheduleEntry, SqliteStore, Store, StoreError,
    StoreResult, UserRecord,
};
use banya_util::{BanyaError, BookingId, Slot, UserId};
use chrono::{DateTime, Local, NaiveDate, TimeZone};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

fn slot(s: &str) -> Slot {
    s.parse().unwrap()
}

fn morning() -> DateTime<Local> {
    Local.with_ymd_and_hms(2026, 3, 2, 8, 0, 0).unwrap()
}

fn make_engine() -> Arc<BookingEngine> {
    let store = Arc::new(SqliteStore::in_memory().unwrap());
    Arc::new(BookingEngine::new(FacilityConfig::default(), store))
}

fn register(engine: &BookingEngine, id: &str, gender: Gender) -> UserId {
    let user_id = UserId::new(id);
    engine.register_user(&user_id, id, gender).unwrap();
    user_id
}

#[test]
fn booking_flow_round_trip() {
    let engine = make_engine();
    let user = register(&engine, "lena", Gender::Female);
    let now = morning();

    assert_eq!(
        engine
            .check_availability(slot("14:30"), Gender::Female, now)
            .unwrap(),
        2
    );

    let cabins = engine.create_booking(&user, slot("14:30"), 1, now).unwrap();
    assert_eq!(cabins, vec![CabinNumber::new(1)]);

    let schedule = engine.list_all_bookings(now).unwrap();
    assert_eq!(schedule.len(), 1);
    assert_eq!(schedule[0].display_name, "lena");

    let mine = engine.list_bookings_for_user(&user, now).unwrap();
    assert_eq!(mine.len(), 1);

    engine.cancel_booking(&user, mine[0].booking_id).unwrap();
    assert!(engine.list_all_bookings(now).unwrap().is_empty());
    assert_eq!(
        engine
            .check_availability(slot("14:30"), Gender::Male, now)
            .unwrap(),
        2
    );
}

#[test]
fn concurrent_bookings_fill_both_cabins() {
    let engine = make_engine();
    let a = register(&engine, "a", Gender::Male);
    let b = register(&engine, "b", Gender::Male);
    let now = morning();

    let handles: Vec<_> = [a, b]
        .into_iter()
        .map(|user| {
            let engine = engine.clone();
            thread::spawn(move || engine.create_booking(&user, slot("09:00"), 1, now))
        })
        .collect();

    let mut assigned = BTreeSet::new();
    for handle in handles {
        let cabins = handle.join().unwrap().unwrap();
        assert_eq!(cabins.len(), 1);
        assigned.insert(cabins[0].as_u8());
    }

    // Order undefined, but the set of assigned cabins must be exactly {1, 2}
    assert_eq!(assigned.into_iter().collect::<Vec<_>>(), vec![1, 2]);
}

#[test]
fn concurrent_overdemand_never_overruns_capacity() {
    let engine = make_engine();
    let users: Vec<UserId> = (0..6)
        .map(|i| register(&engine, &format!("user-{}", i), Gender::Male))
        .collect();
    let now = morning();

    let handles: Vec<_> = users
        .into_iter()
        .map(|user| {
            let engine = engine.clone();
            thread::spawn(move || engine.create_booking(&user, slot("10:00"), 1, now))
        })
        .collect();

    let mut won = 0;
    for handle in handles {
        match handle.join().unwrap() {
            Ok(cabins) => {
                assert_eq!(cabins.len(), 1);
                won += 1;
            }
            Err(BanyaError::InsufficientCapacity { available }) => {
                assert!(available < 1);
            }
            Err(other) => panic!("unexpected error: {:?}", other),
        }
    }

    assert_eq!(won, 2);
    assert_eq!(engine.list_all_bookings(now).unwrap().len(), 2);
}

#[test]
fn concurrent_mixed_genders_never_share_a_slot() {
    let engine = make_engine();
    let mut users = Vec::new();
    for i in 0..3 {
        users.push(register(&engine, &format!("m-{}", i), Gender::Male));
    }
    for i in 0..3 {
        users.push(register(&engine, &format!("f-{}", i), Gender::Female));
    }
    let now = morning();

    let handles: Vec<_> = users
        .into_iter()
        .map(|user| {
            let engine = engine.clone();
            thread::spawn(move || engine.create_booking(&user, slot("11:00"), 1, now))
        })
        .collect();
    for handle in handles {
        // Losers fail with InsufficientCapacity; nothing else is acceptable
        match handle.join().unwrap() {
            Ok(_) => {}
            Err(BanyaError::InsufficientCapacity { .. }) => {}
            Err(other) => panic!("unexpected error: {:?}", other),
        }
    }

    let schedule = engine.list_all_bookings(now).unwrap();
    assert_eq!(schedule.len(), 2);
    assert_eq!(schedule[0].gender, schedule[1].gender);
}

#[test]
fn cancel_requires_ownership() {
    let engine = make_engine();
    let owner = register(&engine, "owner", Gender::Male);
    let intruder = register(&engine, "intruder", Gender::Male);
    let now = morning();

    engine.create_booking(&owner, slot("12:00"), 1, now).unwrap();
    let booking_id = engine.list_bookings_for_user(&owner, now).unwrap()[0].booking_id;

    let err = engine.cancel_booking(&intruder, booking_id).unwrap_err();
    assert!(matches!(err, BanyaError::NotOwner));
    assert_eq!(engine.list_bookings_for_user(&owner, now).unwrap().len(), 1);
}

#[test]
fn passed_bookings_disappear_without_cancel() {
    let engine = make_engine();
    let user = register(&engine, "early-bird", Gender::Female);

    let before = Local.with_ymd_and_hms(2026, 3, 2, 7, 45, 0).unwrap();
    engine.create_booking(&user, slot("08:00"), 1, before).unwrap();
    assert_eq!(engine.list_all_bookings(before).unwrap().len(), 1);

    let after = Local.with_ymd_and_hms(2026, 3, 2, 8, 5, 0).unwrap();
    assert!(engine.list_all_bookings(after).unwrap().is_empty());
}

#[test]
fn day_rollover_clears_everything_once() {
    let store = Arc::new(SqliteStore::in_memory().unwrap());
    let engine = BookingEngine::new(FacilityConfig::default(), store.clone());
    let user = UserId::new("night-owl");
    engine.register_user(&user, "Owl", Gender::Male).unwrap();

    let day1 = Local.with_ymd_and_hms(2026, 3, 2, 21, 0, 0).unwrap();
    engine.create_booking(&user, slot("23:00"), 2, day1).unwrap();

    let day2 = Local.with_ymd_and_hms(2026, 3, 3, 7, 0, 0).unwrap();
    let events = engine.maintain(day2).unwrap();
    assert_eq!(events.len(), 1);

    assert_eq!(
        store.operating_day().unwrap(),
        NaiveDate::from_ymd_opt(2026, 3, 3).unwrap()
    );
    assert!(engine.list_all_bookings(day2).unwrap().is_empty());

    // Running the sweep again on the same date is a no-op
    assert!(engine.maintain(day2).unwrap().is_empty());
}

/// Store wrapper that fails a configured number of insert attempts before
/// any row is written, mimicking transient storage unavailability.
struct FlakyStore {
    inner: SqliteStore,
    failing_inserts: AtomicUsize,
}

impl FlakyStore {
    fn new(failing_inserts: usize) -> Self {
        Self {
            inner: SqliteStore::in_memory().unwrap(),
            failing_inserts: AtomicUsize::new(failing_inserts),
        }
    }
}

impl Store for FlakyStore {
    fn upsert_user(&self, user: &UserRecord) -> StoreResult<()> {
        self.inner.upsert_user(user)
    }

    fn get_user(&self, user_id: &UserId) -> StoreResult<Option<UserRecord>> {
        self.inner.get_user(user_id)
    }

    fn operating_day(&self) -> StoreResult<NaiveDate> {
        self.inner.operating_day()
    }

    fn reset_day(&self, today: NaiveDate) -> StoreResult<bool> {
        self.inner.reset_day(today)
    }

    fn expire_before(&self, cutoff: Slot) -> StoreResult<usize> {
        self.inner.expire_before(cutoff)
    }

    fn insert_bookings(
        &self,
        user_id: &UserId,
        slot: Slot,
        cabins: &[CabinNumber],
        created_at: DateTime<Local>,
    ) -> StoreResult<Vec<BookingId>> {
        let remaining = self.failing_inserts.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failing_inserts.store(remaining - 1, Ordering::SeqCst);
            return Err(StoreError::Database("injected transient failure".into()));
        }
        self.inner.insert_bookings(user_id, slot, cabins, created_at)
    }

    fn get_booking(&self, booking_id: BookingId) -> StoreResult<Option<BookingRecord>> {
        self.inner.get_booking(booking_id)
    }

    fn delete_booking(&self, booking_id: BookingId) -> StoreResult<()> {
        self.inner.delete_booking(booking_id)
    }

    fn occupants_at(&self, slot: Slot) -> StoreResult<Vec<OccupantRecord>> {
        self.inner.occupants_at(slot)
    }

    fn bookings_for_user(&self, user_id: &UserId) -> StoreResult<Vec<BookingRecord>> {
        self.inner.bookings_for_user(user_id)
    }

    fn schedule(&self) -> StoreResult<Vec<ScheduleEntry>> {
        self.inner.schedule()
    }

    fn append_audit(&self, event: AuditEvent) -> StoreResult<()> {
        self.inner.append_audit(event)
    }

    fn recent_audits(&self, limit: usize) -> StoreResult<Vec<AuditEvent>> {
        self.inner.recent_audits(limit)
    }

    fn is_healthy(&self) -> bool {
        self.inner.is_healthy()
    }
}

#[test]
fn retrying_after_storage_failure_never_double_books() {
    let store = Arc::new(FlakyStore::new(1));
    let engine = BookingEngine::new(FacilityConfig::default(), store);
    let user = UserId::new("persistent");
    engine.register_user(&user, "P", Gender::Male).unwrap();
    let now = morning();

    // First attempt hits the injected failure; nothing was written
    let err = engine.create_booking(&user, slot("15:00"), 1, now).unwrap_err();
    assert!(matches!(err, BanyaError::StorageUnavailable(_)));
    assert!(engine.list_bookings_for_user(&user, now).unwrap().is_empty());

    // The caller retries the same logical request; exactly one booking results
    let cabins = engine.create_booking(&user, slot("15:00"), 1, now).unwrap();
    assert_eq!(cabins, vec![CabinNumber::new(1)]);
    assert_eq!(engine.list_bookings_for_user(&user, now).unwrap().len(), 1);
}
