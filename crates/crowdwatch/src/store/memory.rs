//! In-memory tracker store.
//!
//! Records live in arena tables keyed by id for the lifetime of the process.
//! Deleted trackers stay in the table with `is_active` cleared, so ids are
//! stable and never handed out twice.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Mutex, MutexGuard};

use tracing::debug;

use crate::error::{Error, Result};
use crate::model::{
    now, EmergencyContact, Location, NewContact, NewLocation, NewTracker, Tracker, TrackerChanges,
    TrackerStatus,
};
use crate::stats::TrackerStats;

use super::{location_changes, TrackerStore};

/// Process-lifetime storage for trackers, contacts and location samples.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

#[derive(Debug, Default)]
struct Tables {
    trackers: BTreeMap<i64, Tracker>,
    /// External tracker id to every internal id carrying it.
    by_external_id: HashMap<String, BTreeSet<i64>>,
    contacts: BTreeMap<i64, EmergencyContact>,
    locations: BTreeMap<i64, Location>,
    last_tracker_id: i64,
    last_contact_id: i64,
    last_location_id: i64,
}

impl Tables {
    fn next_id(counter: &mut i64) -> i64 {
        *counter += 1;
        *counter
    }

    fn index(&mut self, tracker_id: &str, id: i64) {
        self.by_external_id
            .entry(tracker_id.to_string())
            .or_default()
            .insert(id);
    }

    fn unindex(&mut self, tracker_id: &str, id: i64) {
        if let Some(ids) = self.by_external_id.get_mut(tracker_id) {
            ids.remove(&id);
            if ids.is_empty() {
                self.by_external_id.remove(tracker_id);
            }
        }
    }

    fn find_by_external_id(&self, tracker_id: &str) -> Option<i64> {
        self.by_external_id
            .get(tracker_id)
            .and_then(|ids| ids.first().copied())
    }

    fn update(&mut self, id: i64, changes: TrackerChanges) -> Result<Tracker> {
        let Some(tracker) = self.trackers.get_mut(&id) else {
            return Err(Error::not_found("tracker", id));
        };
        let old_external_id = tracker.tracker_id.clone();
        changes.apply_to(tracker, now());
        let updated = tracker.clone();

        if updated.tracker_id != old_external_id {
            self.unindex(&old_external_id, id);
            self.index(&updated.tracker_id, id);
        }
        Ok(updated)
    }

    fn insert_location(&mut self, location: NewLocation) -> Location {
        let id = Self::next_id(&mut self.last_location_id);
        let location = location.into_location(id, now());
        self.locations.insert(id, location.clone());
        location
    }
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>> {
        self.tables
            .lock()
            .map_err(|_| Error::internal("memory store lock poisoned"))
    }
}

impl TrackerStore for MemoryStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    fn get_tracker(&self, id: i64) -> Result<Option<Tracker>> {
        Ok(self.lock()?.trackers.get(&id).cloned())
    }

    fn get_tracker_by_external_id(&self, tracker_id: &str) -> Result<Option<Tracker>> {
        let tables = self.lock()?;
        Ok(tables
            .find_by_external_id(tracker_id)
            .and_then(|id| tables.trackers.get(&id).cloned()))
    }

    fn list_active_trackers(&self) -> Result<Vec<Tracker>> {
        Ok(self
            .lock()?
            .trackers
            .values()
            .filter(|tracker| tracker.is_active)
            .cloned()
            .collect())
    }

    fn create_tracker(&self, tracker: NewTracker) -> Result<Tracker> {
        let mut tables = self.lock()?;
        let id = Tables::next_id(&mut tables.last_tracker_id);
        let tracker = tracker.into_tracker(id, now());
        tables.index(&tracker.tracker_id, id);
        tables.trackers.insert(id, tracker.clone());
        debug!("Created tracker {} ({})", id, tracker.tracker_id);
        Ok(tracker)
    }

    fn update_tracker(&self, id: i64, changes: TrackerChanges) -> Result<Tracker> {
        let updated = self.lock()?.update(id, changes)?;
        debug!("Updated tracker {}", id);
        Ok(updated)
    }

    fn delete_tracker(&self, id: i64) -> Result<()> {
        let mut tables = self.lock()?;
        let tracker = tables
            .trackers
            .get_mut(&id)
            .ok_or_else(|| Error::not_found("tracker", id))?;
        tracker.is_active = false;
        debug!("Deactivated tracker {}", id);
        Ok(())
    }

    fn list_active_contacts(&self) -> Result<Vec<EmergencyContact>> {
        Ok(self
            .lock()?
            .contacts
            .values()
            .filter(|contact| contact.is_active)
            .cloned()
            .collect())
    }

    fn create_contact(&self, contact: NewContact) -> Result<EmergencyContact> {
        let mut tables = self.lock()?;
        let id = Tables::next_id(&mut tables.last_contact_id);
        let contact = contact.into_contact(id);
        tables.contacts.insert(id, contact.clone());
        debug!("Created emergency contact {}", id);
        Ok(contact)
    }

    fn location_history(&self, tracker_id: &str, limit: usize) -> Result<Vec<Location>> {
        let tables = self.lock()?;
        let mut history: Vec<Location> = tables
            .locations
            .values()
            .filter(|location| location.tracker_id == tracker_id)
            .cloned()
            .collect();
        history.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id)));
        history.truncate(limit);
        Ok(history)
    }

    fn add_location(&self, location: NewLocation) -> Result<Location> {
        let location = self.lock()?.insert_location(location);
        debug!("Recorded location {} for {}", location.id, location.tracker_id);
        Ok(location)
    }

    fn stats(&self) -> Result<TrackerStats> {
        Ok(TrackerStats::from_trackers(self.lock()?.trackers.values()))
    }

    fn update_tracker_location(&self, location: NewLocation) -> Result<(Tracker, Location)> {
        let mut tables = self.lock()?;
        let id = tables
            .find_by_external_id(&location.tracker_id)
            .ok_or_else(|| Error::not_found("tracker", &location.tracker_id))?;
        let tracker = tables.update(id, location_changes(&location))?;
        let sample = tables.insert_location(location);
        debug!("Moved tracker {} to ({}, {})", id, sample.latitude, sample.longitude);
        Ok((tracker, sample))
    }

    fn trigger_sos(&self, tracker_id: &str) -> Result<Tracker> {
        let mut tables = self.lock()?;
        let id = tables
            .find_by_external_id(tracker_id)
            .ok_or_else(|| Error::not_found("tracker", tracker_id))?;
        tables.update(id, TrackerChanges::status(TrackerStatus::Emergency))
    }

    fn is_empty(&self) -> Result<bool> {
        let tables = self.lock()?;
        Ok(tables.trackers.is_empty() && tables.contacts.is_empty())
    }
}
