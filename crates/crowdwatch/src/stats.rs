//! Dashboard statistics over the active tracker set.
//!
//! Counts are derived on every call from one read of the store; nothing is
//! cached or maintained incrementally.

use serde::{Deserialize, Serialize};

use crate::model::{Tracker, TrackerStatus};

/// Snapshot of tracker counts shown at the top of the dashboard.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackerStats {
    /// Trackers with `is_active` set.
    pub active_trackers: u64,
    /// Active trackers whose status is `safe`.
    pub safe_locations: u64,
    /// Active trackers whose status is `alert`.
    pub alerts: u64,
    /// Active trackers whose status is `emergency`.
    pub emergencies: u64,
}

impl TrackerStats {
    /// Fold a snapshot of trackers into counts. Inactive trackers are skipped.
    #[must_use]
    pub fn from_trackers<'a>(trackers: impl IntoIterator<Item = &'a Tracker>) -> Self {
        trackers
            .into_iter()
            .filter(|tracker| tracker.is_active)
            .fold(Self::default(), |mut stats, tracker| {
                stats.active_trackers += 1;
                match tracker.status {
                    TrackerStatus::Safe => stats.safe_locations += 1,
                    TrackerStatus::Alert => stats.alerts += 1,
                    TrackerStatus::Emergency => stats.emergencies += 1,
                }
                stats
            })
    }

    /// Sum of the per-status counts.
    #[must_use]
    pub fn classified(&self) -> u64 {
        self.safe_locations + self.alerts + self.emergencies
    }

    /// Per-status counts never exceed the active count.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.classified() <= self.active_trackers
    }
}
