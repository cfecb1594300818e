//! Text rendering for command output.

use std::fmt::Write as _;

use serde::Serialize;

use super::commands::OutputFormat;
use crate::error::Result;
use crate::model::{EmergencyContact, Location, Tracker};
use crate::stats::TrackerStats;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

fn json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

/// Render a list of trackers.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn trackers(trackers: &[Tracker], format: OutputFormat) -> Result<String> {
    if format == OutputFormat::Json {
        return json(trackers);
    }
    if trackers.is_empty() {
        return Ok("No trackers found.".to_string());
    }

    let mut out = String::new();
    match format {
        OutputFormat::Table => {
            let _ = writeln!(
                out,
                "{:>4}  {:<10} {:<20} {:<14} {:<10} {:>4}  {}",
                "ID", "TRACKER", "NAME", "GROUP", "STATUS", "BATT", "LOCATION"
            );
            for t in trackers {
                let _ = writeln!(
                    out,
                    "{:>4}  {:<10} {:<20} {:<14} {:<10} {:>3}%  {}",
                    t.id,
                    t.tracker_id,
                    t.name,
                    t.group,
                    t.status.as_str(),
                    t.battery_level,
                    t.last_location
                );
            }
        }
        _ => {
            for t in trackers {
                let _ = writeln!(
                    out,
                    "{} {} ({}) [{}] {}% at {}",
                    t.tracker_id,
                    t.name,
                    t.group,
                    t.status,
                    t.battery_level,
                    t.last_location
                );
            }
        }
    }
    Ok(out.trim_end().to_string())
}

/// Render a single tracker in detail.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn tracker(tracker: &Tracker, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => json(tracker),
        OutputFormat::Table => trackers(std::slice::from_ref(tracker), format),
        OutputFormat::Plain => {
            let mut out = String::new();
            let _ = writeln!(out, "Tracker #{}", tracker.id);
            let _ = writeln!(out, "  Tracker ID:   {}", tracker.tracker_id);
            let _ = writeln!(out, "  Name:         {}", tracker.name);
            let _ = writeln!(out, "  Group:        {}", tracker.group);
            let _ = writeln!(out, "  Status:       {}", tracker.status);
            let _ = writeln!(out, "  Location:     {}", tracker.last_location);
            let _ = writeln!(
                out,
                "  Coordinates:  {:.4}, {:.4}",
                tracker.latitude, tracker.longitude
            );
            let _ = writeln!(out, "  Battery:      {}%", tracker.battery_level);
            let _ = writeln!(
                out,
                "  Last update:  {}",
                tracker.last_update.format(TIMESTAMP_FORMAT)
            );
            let _ = write!(out, "  Active:       {}", tracker.is_active);
            Ok(out)
        }
    }
}

/// Render the alert panel: who needs attention and where they were last seen.
#[must_use]
pub fn alerts(alerts: &[Tracker]) -> String {
    let mut out = format!("Active alerts ({})", alerts.len());
    if alerts.is_empty() {
        out.push_str("\n  No active alerts");
    }
    for t in alerts {
        let _ = write!(
            out,
            "\n  {} ({}) last seen at {}",
            t.name, t.tracker_id, t.last_location
        );
    }
    out
}

/// Render emergency contacts.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn contacts(contacts: &[EmergencyContact], format: OutputFormat) -> Result<String> {
    if format == OutputFormat::Json {
        return json(contacts);
    }
    if contacts.is_empty() {
        return Ok("No emergency contacts.".to_string());
    }

    let mut out = String::new();
    if format == OutputFormat::Table {
        let _ = writeln!(out, "{:>4}  {:<24} {:<18} {}", "ID", "NAME", "PHONE", "TYPE");
    }
    for c in contacts {
        match format {
            OutputFormat::Table => {
                let _ = writeln!(
                    out,
                    "{:>4}  {:<24} {:<18} {}",
                    c.id, c.name, c.phone, c.contact_type
                );
            }
            _ => {
                let _ = writeln!(out, "{} ({}): {}", c.name, c.contact_type, c.phone);
            }
        }
    }
    Ok(out.trim_end().to_string())
}

/// Render a location history, newest first.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn locations(locations: &[Location], format: OutputFormat) -> Result<String> {
    if format == OutputFormat::Json {
        return json(locations);
    }
    if locations.is_empty() {
        return Ok("No location history.".to_string());
    }

    let mut out = String::new();
    if format == OutputFormat::Table {
        let _ = writeln!(
            out,
            "{:<19}  {:>10} {:>10}  {}",
            "TIME", "LAT", "LNG", "PLACE"
        );
    }
    for l in locations {
        let place = l.location_name.as_deref().unwrap_or("-");
        let time = l.timestamp.format(TIMESTAMP_FORMAT);
        match format {
            OutputFormat::Table => {
                let _ = writeln!(
                    out,
                    "{time:<19}  {:>10.4} {:>10.4}  {place}",
                    l.latitude, l.longitude
                );
            }
            _ => {
                let _ = writeln!(
                    out,
                    "{time} {:.4},{:.4} {place}",
                    l.latitude, l.longitude
                );
            }
        }
    }
    Ok(out.trim_end().to_string())
}

/// Render the dashboard counters.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn stats(stats: &TrackerStats, json_output: bool) -> Result<String> {
    if json_output {
        return json(stats);
    }
    Ok(format!(
        "Active trackers: {}\nSafe:            {}\nAlerts:          {}\nEmergencies:     {}",
        stats.active_trackers, stats.safe_locations, stats.alerts, stats.emergencies
    ))
}
