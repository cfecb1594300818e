//! Search and filter over the active tracker list.
//!
//! Pure functions with no store access; the dashboard re-runs them on every
//! refresh tick.

use std::collections::BTreeSet;

use crate::error::Result;
use crate::model::{Tracker, TrackerStatus};

/// Sentinel accepted for the group and status selectors meaning "no constraint".
pub const ALL: &str = "all";

/// Combined search, group and status constraints. Unset fields match anything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackerFilter {
    /// Case-insensitive substring matched against name or tracker id.
    pub search: Option<String>,
    /// Exact group name.
    pub group: Option<String>,
    /// Exact status.
    pub status: Option<TrackerStatus>,
}

impl TrackerFilter {
    /// Build a filter from raw selector values.
    ///
    /// Blank search text and the [`ALL`] sentinel are treated as unset.
    ///
    /// # Errors
    ///
    /// Returns a validation error if `status` is neither [`ALL`] nor a known status.
    pub fn from_params(
        search: Option<&str>,
        group: Option<&str>,
        status: Option<&str>,
    ) -> Result<Self> {
        let search = search
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        let group = group.filter(|g| *g != ALL).map(str::to_string);
        let status = match status {
            None | Some(ALL) => None,
            Some(s) => Some(s.parse()?),
        };
        Ok(Self {
            search,
            group,
            status,
        })
    }

    /// Filter showing only trackers in the alert state.
    #[must_use]
    pub fn alerts() -> Self {
        Self {
            status: Some(TrackerStatus::Alert),
            ..Self::default()
        }
    }

    /// Check whether a tracker satisfies every set constraint.
    #[must_use]
    pub fn matches(&self, tracker: &Tracker) -> bool {
        let matches_search = self.search.as_deref().map_or(true, |needle| {
            let needle = needle.to_lowercase();
            tracker.name.to_lowercase().contains(&needle)
                || tracker.tracker_id.to_lowercase().contains(&needle)
        });
        let matches_group = self
            .group
            .as_deref()
            .map_or(true, |group| tracker.group == group);
        let matches_status = self.status.map_or(true, |status| tracker.status == status);

        matches_search && matches_group && matches_status
    }

    /// Keep the trackers that match, preserving order.
    #[must_use]
    pub fn apply(&self, trackers: &[Tracker]) -> Vec<Tracker> {
        trackers
            .iter()
            .filter(|tracker| self.matches(tracker))
            .cloned()
            .collect()
    }
}

/// Sorted, de-duplicated group names for the group selector.
#[must_use]
pub fn distinct_groups(trackers: &[Tracker]) -> Vec<String> {
    trackers
        .iter()
        .map(|tracker| tracker.group.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
