//! Storage layer for crowdwatch.
//!
//! [`TrackerStore`] is the storage capability the dispatcher talks to. Two
//! interchangeable backends implement it: [`MemoryStore`] keeps everything for
//! the lifetime of the process, [`SqliteStore`] persists to a `SQLite` file.
//! The backend is picked once at startup by [`open_store`].

pub mod memory;
pub mod migrations;
pub mod schema;
pub mod sqlite;

use tracing::info;

use crate::config::{Backend, Config};
use crate::error::Result;
use crate::model::{
    EmergencyContact, Location, NewContact, NewLocation, NewTracker, Tracker, TrackerChanges,
};
use crate::stats::TrackerStats;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Number of location samples returned when the caller gives no limit.
pub const DEFAULT_HISTORY_LIMIT: usize = 10;

/// Keyed storage for trackers, emergency contacts and location history.
///
/// Every method is atomic with respect to the records it touches. Callers only
/// ever receive owned copies of records.
pub trait TrackerStore: Send + Sync + std::fmt::Debug {
    /// Short name of the backend (for logging/debugging).
    fn backend_name(&self) -> &'static str;

    /// Get a tracker by its internal id, active or not.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    fn get_tracker(&self, id: i64) -> Result<Option<Tracker>>;

    /// Get the first-created tracker carrying the external id, active or not.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    fn get_tracker_by_external_id(&self, tracker_id: &str) -> Result<Option<Tracker>>;

    /// List trackers with `is_active` set, in creation order.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    fn list_active_trackers(&self) -> Result<Vec<Tracker>>;

    /// Store a new tracker, assigning its id and `last_update`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    fn create_tracker(&self, tracker: NewTracker) -> Result<Tracker>;

    /// Merge `changes` into an existing tracker and refresh `last_update`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`](crate::Error::NotFound) if `id` is unknown.
    fn update_tracker(&self, id: i64, changes: TrackerChanges) -> Result<Tracker>;

    /// Soft-delete a tracker by clearing `is_active`. Deleting twice succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`](crate::Error::NotFound) if `id` is unknown.
    fn delete_tracker(&self, id: i64) -> Result<()>;

    /// List contacts with `is_active` set.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    fn list_active_contacts(&self) -> Result<Vec<EmergencyContact>>;

    /// Store a new emergency contact.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    fn create_contact(&self, contact: NewContact) -> Result<EmergencyContact>;

    /// Location samples for an external tracker id, newest first, at most `limit`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    fn location_history(&self, tracker_id: &str, limit: usize) -> Result<Vec<Location>>;

    /// Append a location sample stamped with the current time.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    fn add_location(&self, location: NewLocation) -> Result<Location>;

    /// Count active trackers per status from one consistent read.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    fn stats(&self) -> Result<TrackerStats>;

    /// Move a tracker: update its coordinates and place, and append a history
    /// sample, both or neither.
    ///
    /// `lastLocation` keeps its previous value when `location.location_name`
    /// is absent or empty.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`](crate::Error::NotFound) if no tracker has the external id.
    fn update_tracker_location(&self, location: NewLocation) -> Result<(Tracker, Location)>;

    /// Force the tracker with the external id into the emergency state.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`](crate::Error::NotFound) if no tracker has the external id.
    fn trigger_sos(&self, tracker_id: &str) -> Result<Tracker>;

    /// Check whether the store holds no trackers and no contacts at all.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    fn is_empty(&self) -> Result<bool>;
}

/// Changes applied by [`TrackerStore::update_tracker_location`].
pub(crate) fn location_changes(location: &NewLocation) -> TrackerChanges {
    TrackerChanges {
        latitude: Some(location.latitude),
        longitude: Some(location.longitude),
        last_location: location
            .location_name
            .clone()
            .filter(|name| !name.is_empty()),
        ..TrackerChanges::default()
    }
}

/// Open the backend selected by the configuration.
///
/// # Errors
///
/// Returns an error if the `SQLite` database cannot be opened or migrated.
pub fn open_store(config: &Config) -> Result<Box<dyn TrackerStore>> {
    let store: Box<dyn TrackerStore> = match config.storage.backend {
        Backend::Memory => Box::new(MemoryStore::new()),
        Backend::Sqlite => Box::new(SqliteStore::open(config.database_path())?),
    };
    info!("Using {} tracker store", store.backend_name());
    Ok(store)
}
