//! CLI command definitions.
//!
//! Every command that touches the store converts into a dispatcher
//! [`Request`], so the CLI and `serve` share one contract.

use std::path::PathBuf;

use clap::{Args, Subcommand, ValueEnum};

use crate::dispatch::Request;
use crate::error::Result;
use crate::model::{ContactType, NewContact, NewLocation, NewTracker, TrackerChanges, TrackerStatus};

/// Tracker management commands.
#[derive(Debug, Subcommand)]
pub enum TrackersCommand {
    /// List active trackers, optionally filtered
    List(FilterArgs),

    /// Show one tracker by internal id
    Show {
        /// Internal tracker id
        id: i64,

        /// Output format
        #[arg(short, long, value_enum, default_value = "plain")]
        format: OutputFormat,
    },

    /// Register a new tracker
    Add {
        /// External tracker id, e.g. TK-1234
        tracker_id: String,

        /// Name of the person carrying the tracker
        #[arg(short, long)]
        name: String,

        /// Group the person belongs to
        #[arg(short, long)]
        group: String,

        /// Description of the current place
        #[arg(short = 'l', long)]
        last_location: String,

        /// Latitude
        #[arg(long, allow_negative_numbers = true)]
        latitude: f64,

        /// Longitude
        #[arg(long, allow_negative_numbers = true)]
        longitude: f64,

        /// Initial status (defaults to safe)
        #[arg(short, long, value_enum)]
        status: Option<StatusArg>,

        /// Initial battery percentage (defaults to 100)
        #[arg(short, long, allow_negative_numbers = true)]
        battery: Option<i32>,
    },

    /// Change fields of a tracker
    Update {
        /// Internal tracker id
        id: i64,

        /// New external tracker id
        #[arg(long)]
        tracker_id: Option<String>,

        /// New name
        #[arg(short, long)]
        name: Option<String>,

        /// New group
        #[arg(short, long)]
        group: Option<String>,

        /// New status
        #[arg(short, long, value_enum)]
        status: Option<StatusArg>,

        /// New place description
        #[arg(short = 'l', long)]
        last_location: Option<String>,

        /// New latitude
        #[arg(long, allow_negative_numbers = true)]
        latitude: Option<f64>,

        /// New longitude
        #[arg(long, allow_negative_numbers = true)]
        longitude: Option<f64>,

        /// New battery percentage
        #[arg(short, long, allow_negative_numbers = true)]
        battery: Option<i32>,
    },

    /// Deactivate a tracker (kept for history)
    Delete {
        /// Internal tracker id
        id: i64,
    },
}

/// Emergency contact commands.
#[derive(Debug, Subcommand)]
pub enum ContactsCommand {
    /// List active emergency contacts
    List {
        /// Output format
        #[arg(short, long, value_enum, default_value = "table")]
        format: OutputFormat,
    },

    /// Add an emergency contact
    Add {
        /// Display name
        name: String,

        /// Phone number
        phone: String,

        /// Kind of calling point
        #[arg(short = 't', long = "type", value_enum)]
        contact_type: ContactTypeArg,
    },
}

/// Location history commands.
#[derive(Debug, Subcommand)]
pub enum LocationsCommand {
    /// Show the most recent location samples of a tracker
    History {
        /// External tracker id
        tracker_id: String,

        /// Maximum number of samples (defaults to the configured history limit)
        #[arg(short, long)]
        limit: Option<usize>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "table")]
        format: OutputFormat,
    },

    /// Record a location sample without moving the tracker
    Add(PositionArgs),
}

/// Search, group and status selectors shared by `trackers list` and `watch`.
#[derive(Debug, Clone, Args)]
pub struct FilterArgs {
    /// Case-insensitive search over name and tracker id
    #[arg(long)]
    pub search: Option<String>,

    /// Only trackers in this group ("all" for any)
    #[arg(short, long)]
    pub group: Option<String>,

    /// Only trackers with this status
    #[arg(short, long, value_enum)]
    pub status: Option<StatusFilterArg>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,
}

/// A tracker position report.
#[derive(Debug, Clone, Args)]
pub struct PositionArgs {
    /// External tracker id
    pub tracker_id: String,

    /// Latitude
    #[arg(long, allow_negative_numbers = true)]
    pub latitude: f64,

    /// Longitude
    #[arg(long, allow_negative_numbers = true)]
    pub longitude: f64,

    /// Name of the place
    #[arg(short, long)]
    pub name: Option<String>,
}

/// Stats command arguments.
#[derive(Debug, Args)]
pub struct StatsCommand {
    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Watch command arguments.
#[derive(Debug, Args)]
pub struct WatchCommand {
    /// Which trackers to show
    #[command(flatten)]
    pub filter: FilterArgs,

    /// Seconds between refreshes (defaults to the configured interval)
    #[arg(short, long)]
    pub interval: Option<u64>,
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

/// Tracker status argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StatusArg {
    /// Nothing to report
    Safe,
    /// Needs attention
    Alert,
    /// SOS raised
    Emergency,
}

impl From<StatusArg> for TrackerStatus {
    fn from(arg: StatusArg) -> Self {
        match arg {
            StatusArg::Safe => Self::Safe,
            StatusArg::Alert => Self::Alert,
            StatusArg::Emergency => Self::Emergency,
        }
    }
}

/// Status selector for filtering, including the "all" passthrough.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StatusFilterArg {
    /// Any status
    All,
    /// Safe trackers
    Safe,
    /// Trackers in alert
    Alert,
    /// Trackers in emergency
    Emergency,
}

impl StatusFilterArg {
    /// The selector value understood by the filter layer.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::All => crate::filter::ALL,
            Self::Safe => TrackerStatus::Safe.as_str(),
            Self::Alert => TrackerStatus::Alert.as_str(),
            Self::Emergency => TrackerStatus::Emergency.as_str(),
        }
    }
}

/// Contact type argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ContactTypeArg {
    /// Public emergency services
    Emergency,
    /// Event security
    Security,
    /// Medical team
    Medical,
}

impl From<ContactTypeArg> for ContactType {
    fn from(arg: ContactTypeArg) -> Self {
        match arg {
            ContactTypeArg::Emergency => Self::Emergency,
            ContactTypeArg::Security => Self::Security,
            ContactTypeArg::Medical => Self::Medical,
        }
    }
}

/// Output format for commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Plain text output
    #[default]
    Plain,
    /// Formatted table
    Table,
    /// JSON output
    Json,
}

impl FilterArgs {
    /// Build the search request for these selectors.
    #[must_use]
    pub fn to_request(&self) -> Request {
        Request::SearchTrackers {
            search: self.search.clone(),
            group: self.group.clone(),
            status: self.status.map(|s| s.as_str().to_string()),
        }
    }
}

impl PositionArgs {
    /// The location sample described by these arguments.
    #[must_use]
    pub fn to_location(&self) -> NewLocation {
        NewLocation {
            tracker_id: self.tracker_id.clone(),
            latitude: self.latitude,
            longitude: self.longitude,
            location_name: self.name.clone(),
        }
    }
}

impl TrackersCommand {
    /// Build the dispatcher request for this command.
    ///
    /// # Errors
    ///
    /// Returns an error if the request body cannot be serialized.
    pub fn to_request(&self) -> Result<Request> {
        let request = match self {
            Self::List(filter) => filter.to_request(),
            Self::Show { id, .. } => Request::GetTracker { id: *id },
            Self::Add {
                tracker_id,
                name,
                group,
                last_location,
                latitude,
                longitude,
                status,
                battery,
            } => {
                let mut tracker = NewTracker::new(
                    tracker_id.clone(),
                    name.clone(),
                    group.clone(),
                    last_location.clone(),
                    *latitude,
                    *longitude,
                );
                tracker.status = status.map(TrackerStatus::from);
                tracker.battery_level = *battery;
                Request::CreateTracker {
                    tracker: serde_json::to_value(tracker)?,
                }
            }
            Self::Update {
                id,
                tracker_id,
                name,
                group,
                status,
                last_location,
                latitude,
                longitude,
                battery,
            } => {
                let changes = TrackerChanges {
                    tracker_id: tracker_id.clone(),
                    name: name.clone(),
                    group: group.clone(),
                    status: status.map(TrackerStatus::from),
                    last_location: last_location.clone(),
                    latitude: *latitude,
                    longitude: *longitude,
                    battery_level: *battery,
                    is_active: None,
                };
                Request::UpdateTracker {
                    id: *id,
                    changes: serde_json::to_value(changes)?,
                }
            }
            Self::Delete { id } => Request::DeleteTracker { id: *id },
        };
        Ok(request)
    }
}

impl ContactsCommand {
    /// Build the dispatcher request for this command.
    ///
    /// # Errors
    ///
    /// Returns an error if the request body cannot be serialized.
    pub fn to_request(&self) -> Result<Request> {
        let request = match self {
            Self::List { .. } => Request::ListContacts,
            Self::Add {
                name,
                phone,
                contact_type,
            } => Request::CreateContact {
                contact: serde_json::to_value(NewContact::new(
                    name.clone(),
                    phone.clone(),
                    ContactType::from(*contact_type),
                ))?,
            },
        };
        Ok(request)
    }
}

impl LocationsCommand {
    /// Build the dispatcher request for this command.
    ///
    /// # Errors
    ///
    /// Returns an error if the request body cannot be serialized.
    pub fn to_request(&self) -> Result<Request> {
        let request = match self {
            Self::History {
                tracker_id, limit, ..
            } => Request::LocationHistory {
                tracker_id: tracker_id.clone(),
                limit: *limit,
            },
            Self::Add(position) => Request::AddLocation {
                location: serde_json::to_value(position.to_location())?,
            },
        };
        Ok(request)
    }
}
