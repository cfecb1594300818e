//! Default emergency contacts and sample trackers.

use tracing::info;

use crate::error::Result;
use crate::model::{ContactType, NewContact, NewTracker, TrackerStatus};
use crate::store::TrackerStore;

/// Calling points every deployment starts with.
#[must_use]
pub fn default_contacts() -> Vec<NewContact> {
    vec![
        NewContact::new("Emergency Services", "108", ContactType::Emergency),
        NewContact::new("Security Command", "+91 9876543210", ContactType::Security),
        NewContact::new("Medical Team", "+91 9876543211", ContactType::Medical),
    ]
}

/// Trackers used for demonstrations.
#[must_use]
pub fn sample_trackers() -> Vec<NewTracker> {
    vec![
        NewTracker::new(
            "TK-1234",
            "Amit Patel",
            "Family A",
            "Gate 2 - Main Entry",
            25.3176,
            82.9739,
        )
        .with_status(TrackerStatus::Safe)
        .with_battery_level(85),
        NewTracker::new(
            "TK-2847",
            "Rajesh Kumar",
            "Individual",
            "Gate 3 - Exit",
            25.3180,
            82.9745,
        )
        .with_status(TrackerStatus::Alert)
        .with_battery_level(45),
        NewTracker::new(
            "TK-1923",
            "Priya Sharma",
            "Family B",
            "Food Court - Section B",
            25.3165,
            82.9730,
        )
        .with_status(TrackerStatus::Safe)
        .with_battery_level(72),
    ]
}

/// Load the default data, but only into a store that holds nothing yet.
///
/// Returns `true` if anything was inserted.
///
/// # Errors
///
/// Returns an error if the store fails.
pub fn seed_if_empty(store: &dyn TrackerStore) -> Result<bool> {
    if !store.is_empty()? {
        return Ok(false);
    }

    for contact in default_contacts() {
        store.create_contact(contact)?;
    }
    for tracker in sample_trackers() {
        store.create_tracker(tracker)?;
    }

    info!("Seeded {} store with demo data", store.backend_name());
    Ok(true)
}
