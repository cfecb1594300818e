//! `SQLite`-backed tracker store.
//!
//! Every operation runs under one connection lock, and operations that touch
//! more than one row or table run inside a transaction.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::model::{
    now, EmergencyContact, Location, NewContact, NewLocation, NewTracker, Tracker, TrackerChanges,
    TrackerStatus,
};
use crate::stats::TrackerStats;

use super::{location_changes, migrations, TrackerStore};

const TRACKER_COLUMNS: &str = "id, tracker_id, name, group_name, status, last_location, \
     latitude, longitude, battery_level, last_update, is_active";

const CONTACT_COLUMNS: &str = "id, name, phone, contact_type, is_active";

const LOCATION_COLUMNS: &str = "id, tracker_id, latitude, longitude, location_name, timestamp";

/// Persistent storage for trackers, contacts and location samples.
#[derive(Debug)]
pub struct SqliteStore {
    /// Path to the database file.
    path: PathBuf,
    /// Database connection.
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create a store database at the given path.
    ///
    /// Creates the parent directories and database file if they don't exist,
    /// and brings the schema up to date.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or schema initialization fails.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        debug!("Opening database at {}", path.display());
        let conn = Connection::open(&path).map_err(|source| Error::DatabaseOpen {
            path: path.clone(),
            source,
        })?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        migrations::initialize_schema(&conn)?;

        info!("Database opened successfully at {}", path.display());
        Ok(Self {
            path,
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory database, mostly for tests.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|source| Error::DatabaseOpen {
            path: PathBuf::from(":memory:"),
            source,
        })?;

        migrations::initialize_schema(&conn)?;

        Ok(Self {
            path: PathBuf::from(":memory:"),
            conn: Mutex::new(conn),
        })
    }

    /// Get the path to the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::internal("database connection lock poisoned"))
    }
}

fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(row: &Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn parse_enum<T: std::str::FromStr>(row: &Row, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    raw.parse().map_err(|_| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            Type::Text,
            format!("unexpected value: {raw}").into(),
        )
    })
}

fn row_to_tracker(row: &Row) -> rusqlite::Result<Tracker> {
    Ok(Tracker {
        id: row.get(0)?,
        tracker_id: row.get(1)?,
        name: row.get(2)?,
        group: row.get(3)?,
        status: parse_enum(row, 4)?,
        last_location: row.get(5)?,
        latitude: row.get(6)?,
        longitude: row.get(7)?,
        battery_level: row.get(8)?,
        last_update: parse_timestamp(row, 9)?,
        is_active: row.get(10)?,
    })
}

fn row_to_contact(row: &Row) -> rusqlite::Result<EmergencyContact> {
    Ok(EmergencyContact {
        id: row.get(0)?,
        name: row.get(1)?,
        phone: row.get(2)?,
        contact_type: parse_enum(row, 3)?,
        is_active: row.get(4)?,
    })
}

fn row_to_location(row: &Row) -> rusqlite::Result<Location> {
    Ok(Location {
        id: row.get(0)?,
        tracker_id: row.get(1)?,
        latitude: row.get(2)?,
        longitude: row.get(3)?,
        location_name: row.get(4)?,
        timestamp: parse_timestamp(row, 5)?,
    })
}

fn select_tracker(conn: &Connection, id: i64) -> Result<Option<Tracker>> {
    let tracker = conn
        .query_row(
            &format!("SELECT {TRACKER_COLUMNS} FROM trackers WHERE id = ?1"),
            [id],
            row_to_tracker,
        )
        .optional()?;
    Ok(tracker)
}

fn select_tracker_by_external_id(conn: &Connection, tracker_id: &str) -> Result<Option<Tracker>> {
    let tracker = conn
        .query_row(
            &format!(
                "SELECT {TRACKER_COLUMNS} FROM trackers \
                 WHERE tracker_id = ?1 ORDER BY id ASC LIMIT 1"
            ),
            [tracker_id],
            row_to_tracker,
        )
        .optional()?;
    Ok(tracker)
}

/// Read, merge and write back one tracker.
fn apply_changes(conn: &Connection, id: i64, changes: TrackerChanges) -> Result<Tracker> {
    let mut tracker = select_tracker(conn, id)?.ok_or_else(|| Error::not_found("tracker", id))?;
    changes.apply_to(&mut tracker, now());

    conn.execute(
        r"
        UPDATE trackers SET tracker_id = ?1, name = ?2, group_name = ?3, status = ?4,
            last_location = ?5, latitude = ?6, longitude = ?7, battery_level = ?8,
            last_update = ?9, is_active = ?10
        WHERE id = ?11
        ",
        params![
            tracker.tracker_id,
            tracker.name,
            tracker.group,
            tracker.status.as_str(),
            tracker.last_location,
            tracker.latitude,
            tracker.longitude,
            tracker.battery_level,
            format_timestamp(&tracker.last_update),
            tracker.is_active,
            id,
        ],
    )?;
    Ok(tracker)
}

fn insert_location(conn: &Connection, location: NewLocation) -> Result<Location> {
    let mut location = location.into_location(0, now());
    conn.execute(
        r"
        INSERT INTO locations (tracker_id, latitude, longitude, location_name, timestamp)
        VALUES (?1, ?2, ?3, ?4, ?5)
        ",
        params![
            location.tracker_id,
            location.latitude,
            location.longitude,
            location.location_name,
            format_timestamp(&location.timestamp),
        ],
    )?;
    location.id = conn.last_insert_rowid();
    Ok(location)
}

fn to_count(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

impl TrackerStore for SqliteStore {
    fn backend_name(&self) -> &'static str {
        "sqlite"
    }

    fn get_tracker(&self, id: i64) -> Result<Option<Tracker>> {
        let conn = self.lock()?;
        select_tracker(&conn, id)
    }

    fn get_tracker_by_external_id(&self, tracker_id: &str) -> Result<Option<Tracker>> {
        let conn = self.lock()?;
        select_tracker_by_external_id(&conn, tracker_id)
    }

    fn list_active_trackers(&self) -> Result<Vec<Tracker>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {TRACKER_COLUMNS} FROM trackers WHERE is_active = 1 ORDER BY id ASC"
        ))?;
        let trackers = stmt
            .query_map([], row_to_tracker)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(trackers)
    }

    fn create_tracker(&self, tracker: NewTracker) -> Result<Tracker> {
        let conn = self.lock()?;
        let mut tracker = tracker.into_tracker(0, now());
        conn.execute(
            r"
            INSERT INTO trackers (tracker_id, name, group_name, status, last_location,
                latitude, longitude, battery_level, last_update, is_active)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            ",
            params![
                tracker.tracker_id,
                tracker.name,
                tracker.group,
                tracker.status.as_str(),
                tracker.last_location,
                tracker.latitude,
                tracker.longitude,
                tracker.battery_level,
                format_timestamp(&tracker.last_update),
                tracker.is_active,
            ],
        )?;
        tracker.id = conn.last_insert_rowid();
        debug!("Inserted tracker with id {}", tracker.id);
        Ok(tracker)
    }

    fn update_tracker(&self, id: i64, changes: TrackerChanges) -> Result<Tracker> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let tracker = apply_changes(&tx, id, changes)?;
        tx.commit()?;
        debug!("Updated tracker {}", id);
        Ok(tracker)
    }

    fn delete_tracker(&self, id: i64) -> Result<()> {
        let affected = self
            .lock()?
            .execute("UPDATE trackers SET is_active = 0 WHERE id = ?1", [id])?;
        if affected == 0 {
            return Err(Error::not_found("tracker", id));
        }
        debug!("Deactivated tracker {}", id);
        Ok(())
    }

    fn list_active_contacts(&self) -> Result<Vec<EmergencyContact>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {CONTACT_COLUMNS} FROM emergency_contacts WHERE is_active = 1 ORDER BY id ASC"
        ))?;
        let contacts = stmt
            .query_map([], row_to_contact)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(contacts)
    }

    fn create_contact(&self, contact: NewContact) -> Result<EmergencyContact> {
        let conn = self.lock()?;
        let mut contact = contact.into_contact(0);
        conn.execute(
            r"
            INSERT INTO emergency_contacts (name, phone, contact_type, is_active)
            VALUES (?1, ?2, ?3, ?4)
            ",
            params![
                contact.name,
                contact.phone,
                contact.contact_type.as_str(),
                contact.is_active,
            ],
        )?;
        contact.id = conn.last_insert_rowid();
        debug!("Inserted emergency contact with id {}", contact.id);
        Ok(contact)
    }

    fn location_history(&self, tracker_id: &str, limit: usize) -> Result<Vec<Location>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            r"
            SELECT {LOCATION_COLUMNS} FROM locations WHERE tracker_id = ?1
            ORDER BY timestamp DESC, id DESC LIMIT ?2
            "
        ))?;

        let limit_i64 = i64::try_from(limit).unwrap_or(i64::MAX);
        let history = stmt
            .query_map(params![tracker_id, limit_i64], row_to_location)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(history)
    }

    fn add_location(&self, location: NewLocation) -> Result<Location> {
        let conn = self.lock()?;
        let location = insert_location(&conn, location)?;
        debug!("Inserted location with id {}", location.id);
        Ok(location)
    }

    fn stats(&self) -> Result<TrackerStats> {
        let stats = self.lock()?.query_row(
            r"
            SELECT COUNT(*),
                COALESCE(SUM(CASE WHEN status = 'safe' THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN status = 'alert' THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN status = 'emergency' THEN 1 ELSE 0 END), 0)
            FROM trackers WHERE is_active = 1
            ",
            [],
            |row| {
                Ok(TrackerStats {
                    active_trackers: to_count(row.get(0)?),
                    safe_locations: to_count(row.get(1)?),
                    alerts: to_count(row.get(2)?),
                    emergencies: to_count(row.get(3)?),
                })
            },
        )?;
        Ok(stats)
    }

    fn update_tracker_location(&self, location: NewLocation) -> Result<(Tracker, Location)> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let id = select_tracker_by_external_id(&tx, &location.tracker_id)?
            .ok_or_else(|| Error::not_found("tracker", &location.tracker_id))?
            .id;
        let tracker = apply_changes(&tx, id, location_changes(&location))?;
        let sample = insert_location(&tx, location)?;
        tx.commit()?;
        debug!("Moved tracker {} to ({}, {})", id, sample.latitude, sample.longitude);
        Ok((tracker, sample))
    }

    fn trigger_sos(&self, tracker_id: &str) -> Result<Tracker> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let id = select_tracker_by_external_id(&tx, tracker_id)?
            .ok_or_else(|| Error::not_found("tracker", tracker_id))?
            .id;
        let tracker = apply_changes(&tx, id, TrackerChanges::status(TrackerStatus::Emergency))?;
        tx.commit()?;
        Ok(tracker)
    }

    fn is_empty(&self) -> Result<bool> {
        let count: i64 = self.lock()?.query_row(
            "SELECT (SELECT COUNT(*) FROM trackers) + (SELECT COUNT(*) FROM emergency_contacts)",
            [],
            |row| row.get(0),
        )?;
        Ok(count == 0)
    }
}
