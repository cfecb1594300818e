//! `crowdwatch` - Attendee tracking for crowded events
//!
//! This library provides the tracker store (in-memory or `SQLite`), the
//! dashboard statistics and filters, and a transport-neutral request
//! dispatcher that the CLI and the line-oriented server share.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod cli;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod filter;
pub mod logging;
pub mod model;
pub mod seed;
pub mod stats;
pub mod store;

pub use config::Config;
pub use dispatch::{Dispatcher, Request, Response};
pub use error::{Error, Result};
pub use filter::TrackerFilter;
pub use logging::init_logging;
pub use model::{
    ContactType, EmergencyContact, Location, NewContact, NewLocation, NewTracker, Tracker,
    TrackerChanges, TrackerStatus,
};
pub use stats::TrackerStats;
pub use store::{open_store, MemoryStore, SqliteStore, TrackerStore};
