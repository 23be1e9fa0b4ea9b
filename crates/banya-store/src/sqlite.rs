//! SQLite-based store implementation

use banya_api::{CabinNumber, Gender};
use banya_util::{BookingId, Slot, UserId};
use chrono::{DateTime, Local, NaiveDate};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, warn};

use crate::{
    AuditEvent, BookingRecord, OccupantRecord, ScheduleEntry, Store, StoreError, StoreResult,
    UserRecord,
};

const DATE_FMT: &str = "%Y-%m-%d";

/// Sentinel the operating day is seeded with; any real date is ahead of it,
/// so the first maintenance sweep normalizes it to today.
const DAY_ZERO: &str = "1970-01-01";

/// Upper bound on how long a call may wait for a busy database before the
/// operation fails (surfaced to callers as storage unavailability).
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// SQLite-based store
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create a store at the given path
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    /// Create an in-memory store (for testing)
    pub fn in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> StoreResult<Self> {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();

        conn.execute_batch(
            r#"
            -- User profiles; gender stays NULL until onboarding completes
            CREATE TABLE IF NOT EXISTS users (
                user_id TEXT PRIMARY KEY,
                display_name TEXT NOT NULL,
                gender TEXT
            );

            -- Live bookings, scoped to the operating day.
            -- UNIQUE(slot, cabin) is the backstop against double-booking.
            CREATE TABLE IF NOT EXISTS bookings (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id TEXT NOT NULL REFERENCES users(user_id),
                slot TEXT NOT NULL,
                cabin INTEGER NOT NULL,
                created_at TEXT NOT NULL,
                UNIQUE (slot, cabin)
            );

            -- Operating day (single row)
            CREATE TABLE IF NOT EXISTS operating_day (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                day TEXT NOT NULL
            );

            -- Audit log (append-only)
            CREATE TABLE IF NOT EXISTS audit_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TEXT NOT NULL,
                event_json TEXT NOT NULL
            );

            -- Indexes
            CREATE INDEX IF NOT EXISTS idx_bookings_slot ON bookings(slot);
            CREATE INDEX IF NOT EXISTS idx_bookings_user ON bookings(user_id);
            CREATE INDEX IF NOT EXISTS idx_audit_timestamp ON audit_log(timestamp);
            "#,
        )?;

        conn.execute(
            "INSERT OR IGNORE INTO operating_day (id, day) VALUES (1, ?)",
            [DAY_ZERO],
        )?;

        debug!("Store schema initialized");
        Ok(())
    }
}

fn gender_from_sql(value: &str) -> StoreResult<Gender> {
    match value {
        "male" => Ok(Gender::Male),
        "female" => Ok(Gender::Female),
        other => Err(StoreError::Database(format!(
            "unknown gender value '{}'",
            other
        ))),
    }
}

fn slot_from_sql(value: &str) -> StoreResult<Slot> {
    value
        .parse()
        .map_err(|e| StoreError::Database(format!("bad slot in storage: {}", e)))
}

fn timestamp_from_sql(value: &str) -> DateTime<Local> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Local))
        .unwrap_or_else(|_| banya_util::now())
}

impl Store for SqliteStore {
    fn upsert_user(&self, user: &UserRecord) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();

        conn.execute(
            r#"
            INSERT INTO users (user_id, display_name, gender)
            VALUES (?, ?, ?)
            ON CONFLICT(user_id)
            DO UPDATE SET display_name = excluded.display_name,
                          gender = excluded.gender
            "#,
            params![
                user.user_id.as_str(),
                user.display_name,
                user.gender.map(|g| g.as_str()),
            ],
        )?;

        debug!(user_id = %user.user_id, "User upserted");
        Ok(())
    }

    fn get_user(&self, user_id: &UserId) -> StoreResult<Option<UserRecord>> {
        let conn = self.conn.lock().unwrap();

        let row: Option<(String, Option<String>)> = conn
            .query_row(
                "SELECT display_name, gender FROM users WHERE user_id = ?",
                [user_id.as_str()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        match row {
            Some((display_name, gender)) => {
                let gender = match gender {
                    Some(g) => Some(gender_from_sql(&g)?),
                    None => None,
                };
                Ok(Some(UserRecord {
                    user_id: user_id.clone(),
                    display_name,
                    gender,
                }))
            }
            None => Ok(None),
        }
    }

    fn operating_day(&self) -> StoreResult<NaiveDate> {
        let conn = self.conn.lock().unwrap();

        let day: String =
            conn.query_row("SELECT day FROM operating_day WHERE id = 1", [], |row| {
                row.get(0)
            })?;

        NaiveDate::parse_from_str(&day, DATE_FMT)
            .map_err(|e| StoreError::Database(format!("bad operating day '{}': {}", day, e)))
    }

    fn reset_day(&self, today: NaiveDate) -> StoreResult<bool> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        let stored: String =
            tx.query_row("SELECT day FROM operating_day WHERE id = 1", [], |row| {
                row.get(0)
            })?;
        let stored = NaiveDate::parse_from_str(&stored, DATE_FMT)
            .map_err(|e| StoreError::Database(format!("bad operating day '{}': {}", stored, e)))?;

        if stored >= today {
            return Ok(false);
        }

        let removed = tx.execute("DELETE FROM bookings", [])?;
        tx.execute(
            "UPDATE operating_day SET day = ? WHERE id = 1",
            [today.format(DATE_FMT).to_string()],
        )?;
        tx.commit()?;

        debug!(
            stale_day = %stored,
            new_day = %today,
            removed_bookings = removed,
            "Operating day advanced"
        );
        Ok(true)
    }

    fn expire_before(&self, cutoff: Slot) -> StoreResult<usize> {
        let conn = self.conn.lock().unwrap();

        // Slots are zero-padded HH:MM text, so `<` compares clock order.
        let removed = conn.execute(
            "DELETE FROM bookings WHERE slot < ?",
            [cutoff.to_string()],
        )?;

        if removed > 0 {
            debug!(cutoff = %cutoff, removed, "Passed bookings expired");
        }
        Ok(removed)
    }

    fn insert_bookings(
        &self,
        user_id: &UserId,
        slot: Slot,
        cabins: &[CabinNumber],
        created_at: DateTime<Local>,
    ) -> StoreResult<Vec<BookingId>> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        let mut ids = Vec::with_capacity(cabins.len());
        for cabin in cabins {
            tx.execute(
                "INSERT INTO bookings (user_id, slot, cabin, created_at) VALUES (?, ?, ?, ?)",
                params![
                    user_id.as_str(),
                    slot.to_string(),
                    cabin.as_u8(),
                    created_at.to_rfc3339(),
                ],
            )?;
            ids.push(BookingId::new(tx.last_insert_rowid()));
        }
        tx.commit()?;

        debug!(user_id = %user_id, slot = %slot, count = ids.len(), "Bookings inserted");
        Ok(ids)
    }

    fn get_booking(&self, booking_id: BookingId) -> StoreResult<Option<BookingRecord>> {
        let conn = self.conn.lock().unwrap();

        let row: Option<(String, String, u8, String)> = conn
            .query_row(
                "SELECT user_id, slot, cabin, created_at FROM bookings WHERE id = ?",
                [booking_id.as_i64()],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )
            .optional()?;

        match row {
            Some((user_id, slot, cabin, created_at)) => Ok(Some(BookingRecord {
                booking_id,
                user_id: UserId::new(user_id),
                slot: slot_from_sql(&slot)?,
                cabin: CabinNumber::new(cabin),
                created_at: timestamp_from_sql(&created_at),
            })),
            None => Ok(None),
        }
    }

    fn delete_booking(&self, booking_id: BookingId) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();

        let removed = conn.execute(
            "DELETE FROM bookings WHERE id = ?",
            [booking_id.as_i64()],
        )?;
        if removed == 0 {
            return Err(StoreError::NotFound(format!("booking {}", booking_id)));
        }

        debug!(booking_id = %booking_id, "Booking deleted");
        Ok(())
    }

    fn occupants_at(&self, slot: Slot) -> StoreResult<Vec<OccupantRecord>> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn.prepare(
            r#"
            SELECT b.cabin, b.user_id, u.gender
            FROM bookings b
            JOIN users u ON u.user_id = b.user_id
            WHERE b.slot = ?
            ORDER BY b.cabin
            "#,
        )?;

        let rows = stmt.query_map([slot.to_string()], |row| {
            let cabin: u8 = row.get(0)?;
            let user_id: String = row.get(1)?;
            let gender: Option<String> = row.get(2)?;
            Ok((cabin, user_id, gender))
        })?;

        let mut occupants = Vec::new();
        for row in rows {
            let (cabin, user_id, gender) = row?;
            let gender = gender.ok_or_else(|| {
                StoreError::Database(format!("booking owner '{}' has no gender", user_id))
            })?;
            occupants.push(OccupantRecord {
                cabin: CabinNumber::new(cabin),
                user_id: UserId::new(user_id),
                gender: gender_from_sql(&gender)?,
            });
        }

        Ok(occupants)
    }

    fn bookings_for_user(&self, user_id: &UserId) -> StoreResult<Vec<BookingRecord>> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn.prepare(
            r#"
            SELECT id, slot, cabin, created_at
            FROM bookings
            WHERE user_id = ?
            ORDER BY slot, cabin
            "#,
        )?;

        let rows = stmt.query_map([user_id.as_str()], |row| {
            let id: i64 = row.get(0)?;
            let slot: String = row.get(1)?;
            let cabin: u8 = row.get(2)?;
            let created_at: String = row.get(3)?;
            Ok((id, slot, cabin, created_at))
        })?;

        let mut bookings = Vec::new();
        for row in rows {
            let (id, slot, cabin, created_at) = row?;
            bookings.push(BookingRecord {
                booking_id: BookingId::new(id),
                user_id: user_id.clone(),
                slot: slot_from_sql(&slot)?,
                cabin: CabinNumber::new(cabin),
                created_at: timestamp_from_sql(&created_at),
            });
        }

        Ok(bookings)
    }

    fn schedule(&self) -> StoreResult<Vec<ScheduleEntry>> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn.prepare(
            r#"
            SELECT b.slot, b.cabin, u.gender, u.display_name
            FROM bookings b
            JOIN users u ON u.user_id = b.user_id
            ORDER BY b.slot, b.cabin
            "#,
        )?;

        let rows = stmt.query_map([], |row| {
            let slot: String = row.get(0)?;
            let cabin: u8 = row.get(1)?;
            let gender: Option<String> = row.get(2)?;
            let display_name: String = row.get(3)?;
            Ok((slot, cabin, gender, display_name))
        })?;

        let mut entries = Vec::new();
        for row in rows {
            let (slot, cabin, gender, display_name) = row?;
            let gender = gender.ok_or_else(|| {
                StoreError::Database("schedule row owner has no gender".to_string())
            })?;
            entries.push(ScheduleEntry {
                slot: slot_from_sql(&slot)?,
                cabin: CabinNumber::new(cabin),
                gender: gender_from_sql(&gender)?,
                display_name,
            });
        }

        Ok(entries)
    }

    fn append_audit(&self, mut event: AuditEvent) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();
        let event_json = serde_json::to_string(&event.event)?;

        conn.execute(
            "INSERT INTO audit_log (timestamp, event_json) VALUES (?, ?)",
            params![event.timestamp.to_rfc3339(), event_json],
        )?;

        event.id = conn.last_insert_rowid();
        debug!(event_id = event.id, "Audit event appended");

        Ok(())
    }

    fn recent_audits(&self, limit: usize) -> StoreResult<Vec<AuditEvent>> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn.prepare(
            "SELECT id, timestamp, event_json FROM audit_log ORDER BY id DESC LIMIT ?",
        )?;

        let rows = stmt.query_map([limit], |row| {
            let id: i64 = row.get(0)?;
            let timestamp: String = row.get(1)?;
            let event_json: String = row.get(2)?;
            Ok((id, timestamp, event_json))
        })?;

        let mut events = Vec::new();
        for row in rows {
            let (id, timestamp, event_json) = row?;
            let event: crate::AuditEventType = serde_json::from_str(&event_json)?;

            events.push(AuditEvent {
                id,
                timestamp: timestamp_from_sql(&timestamp),
                event,
            });
        }

        Ok(events)
    }

    fn is_healthy(&self) -> bool {
        match self.conn.lock() {
            Ok(conn) => conn.query_row("SELECT 1", [], |_| Ok(())).is_ok(),
            Err(_) => {
                warn!("Store lock poisoned");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AuditEventType;

    fn register(store: &SqliteStore, id: &str, gender: Option<Gender>) -> UserId {
        let user_id = UserId::new(id);
        store
            .upsert_user(&UserRecord {
                user_id: user_id.clone(),
                display_name: id.to_uppercase(),
                gender,
            })
            .unwrap();
        user_id
    }

    fn slot(s: &str) -> Slot {
        s.parse().unwrap()
    }

    #[test]
    fn test_in_memory_store() {
        let store = SqliteStore::in_memory().unwrap();
        assert!(store.is_healthy());
    }

    #[test]
    fn test_user_upsert_and_gender_overwrite() {
        let store = SqliteStore::in_memory().unwrap();
        let user_id = register(&store, "anna", None);

        let user = store.get_user(&user_id).unwrap().unwrap();
        assert_eq!(user.gender, None);

        register(&store, "anna", Some(Gender::Female));
        let user = store.get_user(&user_id).unwrap().unwrap();
        assert_eq!(user.gender, Some(Gender::Female));

        // Overwrite is allowed
        register(&store, "anna", Some(Gender::Male));
        let user = store.get_user(&user_id).unwrap().unwrap();
        assert_eq!(user.gender, Some(Gender::Male));

        assert!(store.get_user(&UserId::new("nobody")).unwrap().is_none());
    }

    #[test]
    fn test_insert_and_get_booking() {
        let store = SqliteStore::in_memory().unwrap();
        let user_id = register(&store, "boris", Some(Gender::Male));
        let now = banya_util::now();

        let ids = store
            .insert_bookings(&user_id, slot("14:30"), &[CabinNumber::new(1)], now)
            .unwrap();
        assert_eq!(ids.len(), 1);

        let booking = store.get_booking(ids[0]).unwrap().unwrap();
        assert_eq!(booking.user_id, user_id);
        assert_eq!(booking.slot, slot("14:30"));
        assert_eq!(booking.cabin, CabinNumber::new(1));

        assert!(store.get_booking(BookingId::new(9999)).unwrap().is_none());
    }

    #[test]
    fn test_duplicate_slot_cabin_is_conflict() {
        let store = SqliteStore::in_memory().unwrap();
        let a = register(&store, "a", Some(Gender::Male));
        let b = register(&store, "b", Some(Gender::Male));
        let now = banya_util::now();

        store
            .insert_bookings(&a, slot("09:00"), &[CabinNumber::new(1)], now)
            .unwrap();

        let result = store.insert_bookings(&b, slot("09:00"), &[CabinNumber::new(1)], now);
        assert!(matches!(result, Err(StoreError::Conflict(_))));
    }

    #[test]
    fn test_multi_cabin_insert_is_atomic() {
        let store = SqliteStore::in_memory().unwrap();
        let a = register(&store, "a", Some(Gender::Male));
        let b = register(&store, "b", Some(Gender::Male));
        let now = banya_util::now();

        store
            .insert_bookings(&a, slot("09:00"), &[CabinNumber::new(2)], now)
            .unwrap();

        // Cabin 1 is free but cabin 2 is taken; nothing may be written.
        let result = store.insert_bookings(
            &b,
            slot("09:00"),
            &[CabinNumber::new(1), CabinNumber::new(2)],
            now,
        );
        assert!(matches!(result, Err(StoreError::Conflict(_))));

        let occupants = store.occupants_at(slot("09:00")).unwrap();
        assert_eq!(occupants.len(), 1);
        assert_eq!(occupants[0].user_id, a);
    }

    #[test]
    fn test_occupants_include_gender() {
        let store = SqliteStore::in_memory().unwrap();
        let a = register(&store, "a", Some(Gender::Female));
        let now = banya_util::now();

        store
            .insert_bookings(&a, slot("10:00"), &[CabinNumber::new(1)], now)
            .unwrap();

        let occupants = store.occupants_at(slot("10:00")).unwrap();
        assert_eq!(occupants.len(), 1);
        assert_eq!(occupants[0].gender, Gender::Female);
        assert!(store.occupants_at(slot("10:30")).unwrap().is_empty());
    }

    #[test]
    fn test_delete_booking() {
        let store = SqliteStore::in_memory().unwrap();
        let a = register(&store, "a", Some(Gender::Male));
        let now = banya_util::now();

        let ids = store
            .insert_bookings(&a, slot("11:00"), &[CabinNumber::new(1)], now)
            .unwrap();

        store.delete_booking(ids[0]).unwrap();
        assert!(store.get_booking(ids[0]).unwrap().is_none());

        assert!(matches!(
            store.delete_booking(ids[0]),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn test_reset_day() {
        let store = SqliteStore::in_memory().unwrap();
        let a = register(&store, "a", Some(Gender::Male));
        let now = banya_util::now();

        let today = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();

        // Seeded day is behind any real date
        assert!(store.reset_day(today).unwrap());
        assert_eq!(store.operating_day().unwrap(), today);

        // Same date twice is a no-op
        assert!(!store.reset_day(today).unwrap());

        store
            .insert_bookings(&a, slot("08:00"), &[CabinNumber::new(1)], now)
            .unwrap();

        let tomorrow = today.succ_opt().unwrap();
        assert!(store.reset_day(tomorrow).unwrap());
        assert_eq!(store.operating_day().unwrap(), tomorrow);
        assert!(store.occupants_at(slot("08:00")).unwrap().is_empty());
    }

    #[test]
    fn test_expire_before() {
        let store = SqliteStore::in_memory().unwrap();
        let a = register(&store, "a", Some(Gender::Male));
        let now = banya_util::now();

        store
            .insert_bookings(&a, slot("08:00"), &[CabinNumber::new(1)], now)
            .unwrap();
        store
            .insert_bookings(&a, slot("09:30"), &[CabinNumber::new(1)], now)
            .unwrap();

        let removed = store.expire_before(slot("09:00")).unwrap();
        assert_eq!(removed, 1);

        let remaining = store.bookings_for_user(&a).unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].slot, slot("09:30"));

        // Cutoff equal to a slot does not remove it ("strictly before")
        assert_eq!(store.expire_before(slot("09:30")).unwrap(), 0);
    }

    #[test]
    fn test_schedule_is_ordered() {
        let store = SqliteStore::in_memory().unwrap();
        let a = register(&store, "a", Some(Gender::Male));
        let b = register(&store, "b", Some(Gender::Male));
        let now = banya_util::now();

        store
            .insert_bookings(&b, slot("12:00"), &[CabinNumber::new(2)], now)
            .unwrap();
        store
            .insert_bookings(&a, slot("09:00"), &[CabinNumber::new(1)], now)
            .unwrap();
        store
            .insert_bookings(&a, slot("12:00"), &[CabinNumber::new(1)], now)
            .unwrap();

        let schedule = store.schedule().unwrap();
        let order: Vec<(String, u8)> = schedule
            .iter()
            .map(|e| (e.slot.to_string(), e.cabin.as_u8()))
            .collect();
        assert_eq!(
            order,
            vec![
                ("09:00".to_string(), 1),
                ("12:00".to_string(), 1),
                ("12:00".to_string(), 2),
            ]
        );
    }

    #[test]
    fn test_file_backed_store_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("banyad.db");

        {
            let store = SqliteStore::open(&path).unwrap();
            register(&store, "anna", Some(Gender::Female));
        }

        let store = SqliteStore::open(&path).unwrap();
        let user = store.get_user(&UserId::new("anna")).unwrap().unwrap();
        assert_eq!(user.gender, Some(Gender::Female));
    }

    #[test]
    fn test_audit_log() {
        let store = SqliteStore::in_memory().unwrap();

        let event = AuditEvent::new(AuditEventType::ServiceStarted);
        store.append_audit(event).unwrap();

        let events = store.recent_audits(10).unwrap();
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0].event, AuditEventType::ServiceStarted));
    }
}
