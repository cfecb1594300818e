//! Periodically refreshed dashboard view.

use std::time::Duration;

use chrono::Utc;
use tracing::{info, warn};

use super::commands::{FilterArgs, OutputFormat};
use super::render;
use crate::dispatch::{Dispatcher, Request};
use crate::error::Result;
use crate::filter::TrackerFilter;
use crate::model::{EmergencyContact, Tracker};
use crate::stats::TrackerStats;

/// Build one dashboard frame: the counters, the matching trackers, the alert
/// panel and the emergency contacts.
///
/// Counters and alerts always cover every active tracker; only the tracker
/// list follows `filter`.
///
/// # Errors
///
/// Returns an error if any request fails.
pub fn render_frame(dispatcher: &Dispatcher, filter: &FilterArgs) -> Result<String> {
    let stats: TrackerStats = dispatcher.handle(Request::GetStats).decode()?;
    let trackers: Vec<Tracker> = dispatcher.handle(filter.to_request()).decode()?;
    let active: Vec<Tracker> = dispatcher.handle(Request::ListTrackers).decode()?;
    let contacts: Vec<EmergencyContact> = dispatcher.handle(Request::ListContacts).decode()?;

    Ok(format!(
        "{}\n\n{}\n\n{}\n\nEmergency contacts\n{}",
        render::stats(&stats, false)?,
        render::trackers(&trackers, filter.format)?,
        render::alerts(&TrackerFilter::alerts().apply(&active)),
        render::contacts(&contacts, OutputFormat::Plain)?
    ))
}

/// Redraw the dashboard every `interval` until Ctrl-C.
///
/// A failed refresh is logged and retried on the next tick.
///
/// # Errors
///
/// Returns an error if the Ctrl-C handler cannot be installed.
pub async fn watch(dispatcher: &Dispatcher, filter: &FilterArgs, interval: Duration) -> Result<()> {
    info!("Refreshing every {}s, Ctrl-C to stop", interval.as_secs());

    let mut ticker = tokio::time::interval(interval);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            result = &mut shutdown => {
                result?;
                info!("Stopping watch");
                return Ok(());
            }
            _ = ticker.tick() => {
                match render_frame(dispatcher, filter) {
                    Ok(frame) => {
                        // Clear screen, cursor home.
                        print!("\x1b[2J\x1b[H");
                        println!("crowdwatch | {}", Utc::now().format("%H:%M:%S"));
                        println!();
                        println!("{frame}");
                    }
                    Err(e) => warn!("Refresh failed: {e}"),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::commands::StatusFilterArg;
    use crate::seed::seed_if_empty;
    use crate::store::MemoryStore;

    fn dispatcher() -> Dispatcher {
        let dispatcher = Dispatcher::new(Box::new(MemoryStore::new()));
        seed_if_empty(dispatcher.store()).unwrap();
        dispatcher
    }

    fn filter(status: Option<StatusFilterArg>) -> FilterArgs {
        FilterArgs {
            search: None,
            group: None,
            status,
            format: OutputFormat::Plain,
        }
    }

    #[test]
    fn test_frame_lists_counts_and_trackers() {
        let frame = render_frame(&dispatcher(), &filter(None)).unwrap();
        assert!(frame.starts_with("Active trackers: 3"));
        assert!(frame.contains("TK-1234 Amit Patel"));
        assert!(frame.contains("TK-2847 Rajesh Kumar"));
    }

    #[test]
    fn test_frame_applies_filter() {
        let frame = render_frame(&dispatcher(), &filter(Some(StatusFilterArg::Alert))).unwrap();
        assert!(frame.contains("TK-2847"));
        assert!(!frame.contains("TK-1234"));
        // Counters always cover the whole active set.
        assert!(frame.contains("Safe:            2"));
    }

    #[test]
    fn test_frame_shows_alert_panel_and_contacts() {
        let dispatcher = dispatcher();
        // The list filter does not narrow the alert panel.
        let frame = render_frame(&dispatcher, &filter(Some(StatusFilterArg::Safe))).unwrap();

        assert!(frame.contains(
            "Active alerts (1)\n  Rajesh Kumar (TK-2847) last seen at Gate 3 - Exit"
        ));
        assert!(frame.contains("Emergency contacts\nEmergency Services (emergency): 108"));
        assert!(frame.ends_with("Medical Team (medical): +91 9876543211"));

        dispatcher.handle(Request::TriggerSos {
            tracker_id: "TK-2847".to_string(),
        });
        let frame = render_frame(&dispatcher, &filter(None)).unwrap();
        assert!(frame.contains("Active alerts (0)\n  No active alerts"));
    }

    #[test]
    fn test_frame_empty_store() {
        let dispatcher = Dispatcher::new(Box::new(MemoryStore::new()));
        let frame = render_frame(&dispatcher, &filter(None)).unwrap();
        assert!(frame.contains("No trackers found."));
        assert!(frame.contains("No active alerts"));
        assert!(frame.ends_with("No emergency contacts."));
    }
}
