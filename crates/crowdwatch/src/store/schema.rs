//! `SQLite` schema definitions for crowdwatch.
//!
//! `AUTOINCREMENT` keeps ids from being reused. `tracker_id` is indexed but not
//! unique.

/// SQL statement to create the trackers table.
pub const CREATE_TRACKERS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS trackers (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    tracker_id TEXT NOT NULL,
    name TEXT NOT NULL,
    group_name TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'safe',
    last_location TEXT NOT NULL,
    latitude REAL NOT NULL,
    longitude REAL NOT NULL,
    battery_level INTEGER NOT NULL DEFAULT 100,
    last_update TEXT NOT NULL,
    is_active INTEGER NOT NULL DEFAULT 1
)
";

/// SQL statement to create an index on the external tracker id.
pub const CREATE_TRACKER_ID_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_trackers_tracker_id ON trackers(tracker_id)
";

/// SQL statement to create an index on the active flag for listings and stats.
pub const CREATE_ACTIVE_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_trackers_active ON trackers(is_active)
";

/// SQL statement to create the emergency contacts table.
pub const CREATE_CONTACTS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS emergency_contacts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    phone TEXT NOT NULL,
    contact_type TEXT NOT NULL,
    is_active INTEGER NOT NULL DEFAULT 1
)
";

/// SQL statement to create the location history table.
pub const CREATE_LOCATIONS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS locations (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    tracker_id TEXT NOT NULL,
    latitude REAL NOT NULL,
    longitude REAL NOT NULL,
    location_name TEXT,
    timestamp TEXT NOT NULL
)
";

/// SQL statement to create an index for per-tracker history queries.
///
/// Matches the history ordering, newest first with ties broken by id.
pub const CREATE_LOCATIONS_HISTORY_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_locations_history
    ON locations(tracker_id, timestamp DESC, id DESC)
";

/// SQL statement to create the metadata table for storing key-value pairs.
pub const CREATE_METADATA_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS metadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
)
";

/// All schema creation statements in order.
pub const SCHEMA_STATEMENTS: &[&str] = &[
    CREATE_TRACKERS_TABLE,
    CREATE_TRACKER_ID_INDEX,
    CREATE_ACTIVE_INDEX,
    CREATE_CONTACTS_TABLE,
    CREATE_LOCATIONS_TABLE,
    CREATE_LOCATIONS_HISTORY_INDEX,
    CREATE_METADATA_TABLE,
];
