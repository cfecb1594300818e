//! Command-line interface for crowdwatch.
//!
//! This module provides the CLI structure, output rendering and the
//! long-running `serve` and `watch` loops for the `crowdwatch` binary.

mod commands;
pub mod render;
pub mod serve;
pub mod watch;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::{
    ConfigCommand, ContactTypeArg, ContactsCommand, FilterArgs, LocationsCommand, OutputFormat,
    PositionArgs, StatsCommand, StatusArg, StatusFilterArg, TrackersCommand, WatchCommand,
};

/// crowdwatch - Keep track of people at crowded events
///
/// Manages attendee trackers, their location history and emergency contacts,
/// and summarizes who is safe, in alert or in an emergency.
#[derive(Debug, Parser)]
#[command(name = "crowdwatch")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Manage attendee trackers
    #[command(subcommand)]
    Trackers(TrackersCommand),

    /// Manage emergency contacts
    #[command(subcommand)]
    Contacts(ContactsCommand),

    /// Inspect or record location history
    #[command(subcommand)]
    Locations(LocationsCommand),

    /// Move a tracker and record the new position in its history
    Move(PositionArgs),

    /// Raise an SOS for a tracker
    Sos {
        /// External tracker id
        tracker_id: String,
    },

    /// Show dashboard counts
    Stats(StatsCommand),

    /// List the groups of active trackers
    Groups,

    /// Answer JSON requests line by line on stdin/stdout
    Serve,

    /// Continuously redraw the dashboard
    Watch(WatchCommand),

    /// View or validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> crate::logging::Verbosity {
        crate::logging::Verbosity::from_flags(self.verbose, self.quiet)
    }
}
