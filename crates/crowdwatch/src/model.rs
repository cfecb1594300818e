//! Record types for crowdwatch.
//!
//! Defines the three record sets kept by the store (trackers, emergency
//! contacts and location samples), together with the insert and partial-update
//! shapes accepted from callers. Wire names are camelCase to match what the
//! dashboard consumes.

use std::str::FromStr;

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Current time at the precision every backend can store.
///
/// Truncated to microseconds so a record read back from `SQLite` compares
/// equal to the one returned when it was written.
#[must_use]
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Safety status reported for a tracker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackerStatus {
    /// Nothing to report.
    #[default]
    Safe,
    /// Needs attention from an operator.
    Alert,
    /// SOS raised or incident in progress.
    Emergency,
}

impl TrackerStatus {
    /// Every status, in severity order.
    pub const ALL: [Self; 3] = [Self::Safe, Self::Alert, Self::Emergency];

    /// The lowercase wire name of this status.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Safe => "safe",
            Self::Alert => "alert",
            Self::Emergency => "emergency",
        }
    }
}

impl std::fmt::Display for TrackerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TrackerStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "safe" => Ok(Self::Safe),
            "alert" => Ok(Self::Alert),
            "emergency" => Ok(Self::Emergency),
            other => Err(Error::validation(format!("unknown tracker status: {other}"))),
        }
    }
}

/// Kind of calling point an emergency contact represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContactType {
    /// Public emergency services.
    Emergency,
    /// Event security command.
    Security,
    /// Medical triage team.
    Medical,
}

impl ContactType {
    /// The lowercase wire name of this contact type.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Emergency => "emergency",
            Self::Security => "security",
            Self::Medical => "medical",
        }
    }
}

impl std::fmt::Display for ContactType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContactType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "emergency" => Ok(Self::Emergency),
            "security" => Ok(Self::Security),
            "medical" => Ok(Self::Medical),
            other => Err(Error::validation(format!("unknown contact type: {other}"))),
        }
    }
}

/// A wearable tracker carried by one attendee.
///
/// Deleting a tracker only clears `is_active`; the record keeps its `id`
/// and stays reachable through [`get_tracker`](crate::TrackerStore::get_tracker).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tracker {
    /// Store-assigned identity, never reused.
    pub id: i64,
    /// External identifier printed on the device, e.g. `TK-1234`.
    pub tracker_id: String,
    /// Name of the person carrying the tracker.
    pub name: String,
    /// Free-text group (family, tour party, ...).
    pub group: String,
    /// Current safety status.
    pub status: TrackerStatus,
    /// Description of the last known place.
    pub last_location: String,
    /// Last known latitude.
    pub latitude: f64,
    /// Last known longitude.
    pub longitude: f64,
    /// Battery percentage. Not clamped.
    pub battery_level: i32,
    /// Refreshed on every create and update.
    pub last_update: DateTime<Utc>,
    /// Cleared by delete.
    pub is_active: bool,
}

/// Fields accepted when creating a tracker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTracker {
    /// External identifier.
    pub tracker_id: String,
    /// Name of the person carrying the tracker.
    pub name: String,
    /// Free-text group.
    pub group: String,
    /// Defaults to [`TrackerStatus::Safe`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TrackerStatus>,
    /// Description of the last known place.
    pub last_location: String,
    /// Latitude.
    pub latitude: f64,
    /// Longitude.
    pub longitude: f64,
    /// Defaults to 100.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub battery_level: Option<i32>,
    /// Defaults to `true`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
}

impl NewTracker {
    /// Default battery level for a freshly registered tracker.
    pub const DEFAULT_BATTERY_LEVEL: i32 = 100;

    /// Create an insert shape with every optional field left to its default.
    #[must_use]
    pub fn new(
        tracker_id: impl Into<String>,
        name: impl Into<String>,
        group: impl Into<String>,
        last_location: impl Into<String>,
        latitude: f64,
        longitude: f64,
    ) -> Self {
        Self {
            tracker_id: tracker_id.into(),
            name: name.into(),
            group: group.into(),
            status: None,
            last_location: last_location.into(),
            latitude,
            longitude,
            battery_level: None,
            is_active: None,
        }
    }

    /// Set the initial status.
    #[must_use]
    pub fn with_status(mut self, status: TrackerStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Set the initial battery level.
    #[must_use]
    pub fn with_battery_level(mut self, battery_level: i32) -> Self {
        self.battery_level = Some(battery_level);
        self
    }

    /// Check the constraints the store relies on.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if `tracker_id` is blank.
    pub fn validate(&self) -> Result<()> {
        if self.tracker_id.trim().is_empty() {
            return Err(Error::validation("trackerId must not be empty"));
        }
        Ok(())
    }

    /// Materialize the full record, applying defaults for omitted fields.
    #[must_use]
    pub fn into_tracker(self, id: i64, last_update: DateTime<Utc>) -> Tracker {
        Tracker {
            id,
            tracker_id: self.tracker_id,
            name: self.name,
            group: self.group,
            status: self.status.unwrap_or_default(),
            last_location: self.last_location,
            latitude: self.latitude,
            longitude: self.longitude,
            battery_level: self.battery_level.unwrap_or(Self::DEFAULT_BATTERY_LEVEL),
            last_update,
            is_active: self.is_active.unwrap_or(true),
        }
    }
}

/// Partial update for a tracker. Absent fields are left unchanged.
///
/// `tracker_id` and `is_active` can be rewritten through this path too.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackerChanges {
    /// New external identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tracker_id: Option<String>,
    /// New name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// New group.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    /// New status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TrackerStatus>,
    /// New place description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_location: Option<String>,
    /// New latitude.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    /// New longitude.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    /// New battery level.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub battery_level: Option<i32>,
    /// New active flag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
}

impl TrackerChanges {
    /// Changes that only force the status.
    #[must_use]
    pub fn status(status: TrackerStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    /// Check whether no field is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Check the constraints the store relies on.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if a new `tracker_id` is blank.
    pub fn validate(&self) -> Result<()> {
        if self
            .tracker_id
            .as_deref()
            .is_some_and(|id| id.trim().is_empty())
        {
            return Err(Error::validation("trackerId must not be empty"));
        }
        Ok(())
    }

    /// Merge the set fields into `tracker` and stamp `last_update`.
    pub fn apply_to(self, tracker: &mut Tracker, last_update: DateTime<Utc>) {
        if let Some(tracker_id) = self.tracker_id {
            tracker.tracker_id = tracker_id;
        }
        if let Some(name) = self.name {
            tracker.name = name;
        }
        if let Some(group) = self.group {
            tracker.group = group;
        }
        if let Some(status) = self.status {
            tracker.status = status;
        }
        if let Some(last_location) = self.last_location {
            tracker.last_location = last_location;
        }
        if let Some(latitude) = self.latitude {
            tracker.latitude = latitude;
        }
        if let Some(longitude) = self.longitude {
            tracker.longitude = longitude;
        }
        if let Some(battery_level) = self.battery_level {
            tracker.battery_level = battery_level;
        }
        if let Some(is_active) = self.is_active {
            tracker.is_active = is_active;
        }
        tracker.last_update = last_update;
    }
}

/// A calling point shown to operators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmergencyContact {
    /// Store-assigned identity.
    pub id: i64,
    /// Display name.
    pub name: String,
    /// Phone number as dialled.
    pub phone: String,
    /// Kind of calling point.
    #[serde(rename = "type")]
    pub contact_type: ContactType,
    /// Inactive contacts are hidden from listings.
    pub is_active: bool,
}

/// Fields accepted when creating an emergency contact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewContact {
    /// Display name.
    pub name: String,
    /// Phone number.
    pub phone: String,
    /// Kind of calling point.
    #[serde(rename = "type")]
    pub contact_type: ContactType,
    /// Defaults to `true`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
}

impl NewContact {
    /// Create an active contact.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        phone: impl Into<String>,
        contact_type: ContactType,
    ) -> Self {
        Self {
            name: name.into(),
            phone: phone.into(),
            contact_type,
            is_active: None,
        }
    }

    /// Check the constraints the store relies on.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if `name` or `phone` is blank.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::validation("name must not be empty"));
        }
        if self.phone.trim().is_empty() {
            return Err(Error::validation("phone must not be empty"));
        }
        Ok(())
    }

    /// Materialize the full record.
    #[must_use]
    pub fn into_contact(self, id: i64) -> EmergencyContact {
        EmergencyContact {
            id,
            name: self.name,
            phone: self.phone,
            contact_type: self.contact_type,
            is_active: self.is_active.unwrap_or(true),
        }
    }
}

/// A historical position sample, linked to a tracker by its external id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    /// Store-assigned identity.
    pub id: i64,
    /// External tracker identifier. Not checked against existing trackers.
    pub tracker_id: String,
    /// Latitude.
    pub latitude: f64,
    /// Longitude.
    pub longitude: f64,
    /// Optional place name.
    pub location_name: Option<String>,
    /// Insertion time.
    pub timestamp: DateTime<Utc>,
}

/// Fields accepted when recording a location sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewLocation {
    /// External tracker identifier.
    pub tracker_id: String,
    /// Latitude.
    pub latitude: f64,
    /// Longitude.
    pub longitude: f64,
    /// Optional place name.
    #[serde(default)]
    pub location_name: Option<String>,
}

impl NewLocation {
    /// Create a sample without a place name.
    #[must_use]
    pub fn new(tracker_id: impl Into<String>, latitude: f64, longitude: f64) -> Self {
        Self {
            tracker_id: tracker_id.into(),
            latitude,
            longitude,
            location_name: None,
        }
    }

    /// Attach a place name.
    #[must_use]
    pub fn with_name(mut self, location_name: impl Into<String>) -> Self {
        self.location_name = Some(location_name.into());
        self
    }

    /// Materialize the full record.
    #[must_use]
    pub fn into_location(self, id: i64, timestamp: DateTime<Utc>) -> Location {
        Location {
            id,
            tracker_id: self.tracker_id,
            latitude: self.latitude,
            longitude: self.longitude,
            location_name: self.location_name,
            timestamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> NewTracker {
        NewTracker::new("TK-9001", "X", "G", "Gate1", 1.0, 1.0)
    }

    #[test]
    fn test_status_display_and_parse() {
        for status in TrackerStatus::ALL {
            assert_eq!(status.to_string().parse::<TrackerStatus>().unwrap(), status);
        }
        assert!("panic".parse::<TrackerStatus>().unwrap_err().is_validation());
    }

    #[test]
    fn test_contact_type_parse() {
        assert_eq!("medical".parse::<ContactType>().unwrap(), ContactType::Medical);
        assert!("police".parse::<ContactType>().is_err());
    }

    #[test]
    fn test_into_tracker_applies_defaults() {
        let stamp = now();
        let tracker = sample().into_tracker(7, stamp);

        assert_eq!(tracker.id, 7);
        assert_eq!(tracker.status, TrackerStatus::Safe);
        assert_eq!(tracker.battery_level, 100);
        assert!(tracker.is_active);
        assert_eq!(tracker.last_update, stamp);
    }

    #[test]
    fn test_into_tracker_keeps_explicit_fields() {
        let tracker = sample()
            .with_status(TrackerStatus::Alert)
            .with_battery_level(-5)
            .into_tracker(1, now());

        assert_eq!(tracker.status, TrackerStatus::Alert);
        assert_eq!(tracker.battery_level, -5);
    }

    #[test]
    fn test_new_tracker_validate() {
        assert!(sample().validate().is_ok());

        let mut blank = sample();
        blank.tracker_id = "   ".to_string();
        assert!(blank.validate().unwrap_err().is_validation());
    }

    #[test]
    fn test_changes_apply_only_set_fields() {
        let mut tracker = sample().into_tracker(1, now());
        let before = tracker.clone();
        let later = before.last_update + chrono::Duration::seconds(5);

        TrackerChanges {
            latitude: Some(2.0),
            is_active: Some(false),
            ..TrackerChanges::default()
        }
        .apply_to(&mut tracker, later);

        assert!((tracker.latitude - 2.0).abs() < f64::EPSILON);
        assert!(!tracker.is_active);
        assert_eq!(tracker.name, before.name);
        assert_eq!(tracker.longitude.to_bits(), before.longitude.to_bits());
        assert_eq!(tracker.last_update, later);
    }

    #[test]
    fn test_empty_changes_only_touch_last_update() {
        let mut tracker = sample().into_tracker(1, now());
        let before = tracker.clone();
        let later = before.last_update + chrono::Duration::seconds(1);

        let changes = TrackerChanges::default();
        assert!(changes.is_empty());
        changes.apply_to(&mut tracker, later);

        assert_eq!(
            Tracker {
                last_update: later,
                ..before
            },
            tracker
        );
    }

    #[test]
    fn test_changes_validate_blank_tracker_id() {
        let changes = TrackerChanges {
            tracker_id: Some(String::new()),
            ..TrackerChanges::default()
        };
        assert!(changes.validate().is_err());
        assert!(TrackerChanges::status(TrackerStatus::Alert).validate().is_ok());
    }

    #[test]
    fn test_tracker_wire_names() {
        let json = serde_json::to_value(sample().into_tracker(1, now())).unwrap();
        assert_eq!(json["trackerId"], "TK-9001");
        assert_eq!(json["lastLocation"], "Gate1");
        assert_eq!(json["batteryLevel"], 100);
        assert_eq!(json["isActive"], true);
        assert_eq!(json["status"], "safe");
        assert!(json.get("lastUpdate").is_some());
    }

    #[test]
    fn test_new_tracker_from_json_with_omitted_optionals() {
        let body = serde_json::json!({
            "trackerId": "TK-1",
            "name": "A",
            "group": "G",
            "lastLocation": "Gate 1",
            "latitude": 25.3,
            "longitude": 82.9
        });
        let new: NewTracker = serde_json::from_value(body).unwrap();
        assert!(new.status.is_none());
        assert!(new.battery_level.is_none());
        assert!(new.is_active.is_none());
    }

    #[test]
    fn test_contact_type_field_name() {
        let contact = NewContact::new("Medical Team", "+91 9876543211", ContactType::Medical)
            .into_contact(3);
        let json = serde_json::to_value(&contact).unwrap();
        assert_eq!(json["type"], "medical");
        assert_eq!(json["isActive"], true);
    }

    #[test]
    fn test_new_contact_validate() {
        let contact = NewContact::new("", "108", ContactType::Emergency);
        assert!(contact.validate().is_err());
        let contact = NewContact::new("Emergency Services", " ", ContactType::Emergency);
        assert!(contact.validate().is_err());
    }

    #[test]
    fn test_location_name_defaults_to_none() {
        let body = serde_json::json!({"trackerId": "TK-1", "latitude": 1.0, "longitude": 2.0});
        let new: NewLocation = serde_json::from_value(body).unwrap();
        let location = new.into_location(1, now());
        assert!(location.location_name.is_none());
        assert_eq!(
            serde_json::to_value(&location).unwrap()["locationName"],
            serde_json::Value::Null
        );
    }

    #[test]
    fn test_now_is_microsecond_precision() {
        assert_eq!(now().timestamp_subsec_nanos() % 1_000, 0);
    }
}
