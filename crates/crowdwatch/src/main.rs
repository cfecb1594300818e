//! `crowdwatch` - CLI for the attendee tracker
//!
//! Every store operation goes through the request dispatcher, so the CLI
//! behaves exactly like a `serve` client would.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use serde_json::Value;
use tokio::io::BufReader;
use tracing::debug;

use crowdwatch::cli::{
    render, serve, watch, Cli, Command, ConfigCommand, ContactsCommand, LocationsCommand,
    OutputFormat, TrackersCommand,
};
use crowdwatch::config::Backend;
use crowdwatch::seed::seed_if_empty;
use crowdwatch::{
    init_logging, open_store, Config, Dispatcher, EmergencyContact, Location, Request, Tracker,
    TrackerStats,
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    init_logging(cli.verbosity());

    // Config commands must work even when the config itself is broken
    if let Command::Config(cmd) = &cli.command {
        return handle_config(cli.config.clone(), cmd);
    }

    let config = Config::load_from(cli.config.clone()).context("failed to load configuration")?;
    let dispatcher = build_dispatcher(&config)?;

    match cli.command {
        Command::Trackers(cmd) => handle_trackers(&dispatcher, &cmd),
        Command::Contacts(cmd) => handle_contacts(&dispatcher, &cmd),
        Command::Locations(cmd) => handle_locations(&dispatcher, &cmd),
        Command::Move(position) => {
            let location = position.to_location();
            let name = location.location_name.clone();
            dispatcher
                .handle(Request::UpdateTrackerLocation {
                    tracker_id: location.tracker_id,
                    latitude: location.latitude,
                    longitude: location.longitude,
                    location_name: location.location_name,
                })
                .decode::<Value>()?;
            match name.filter(|n| !n.is_empty()) {
                Some(name) => println!("Moved {} to {name}", position.tracker_id),
                None => println!(
                    "Moved {} to {:.4}, {:.4}",
                    position.tracker_id, position.latitude, position.longitude
                ),
            }
            Ok(())
        }
        Command::Sos { tracker_id } => {
            let body: Value = dispatcher
                .handle(Request::TriggerSos {
                    tracker_id: tracker_id.clone(),
                })
                .decode()?;
            let message = body["message"].as_str().unwrap_or("SOS alert triggered");
            println!("{message} for {tracker_id}");
            Ok(())
        }
        Command::Stats(cmd) => {
            let stats: TrackerStats = dispatcher.handle(Request::GetStats).decode()?;
            println!("{}", render::stats(&stats, cmd.json)?);
            Ok(())
        }
        Command::Groups => {
            let groups: Vec<String> = dispatcher.handle(Request::ListGroups).decode()?;
            for group in groups {
                println!("{group}");
            }
            Ok(())
        }
        Command::Serve => {
            let reader = BufReader::new(tokio::io::stdin());
            serve::serve_lines(&dispatcher, reader, tokio::io::stdout()).await?;
            Ok(())
        }
        Command::Watch(cmd) => {
            let interval = cmd
                .interval
                .filter(|secs| *secs > 0)
                .map_or_else(|| config.refresh_interval(), Duration::from_secs);
            watch::watch(&dispatcher, &cmd.filter, interval).await?;
            Ok(())
        }
        Command::Config(cmd) => handle_config(cli.config, &cmd),
    }
}

fn build_dispatcher(config: &Config) -> Result<Dispatcher> {
    let store = open_store(config).context("failed to open tracker store")?;

    if config.storage.seed_demo_data && seed_if_empty(store.as_ref())? {
        debug!("Loaded demo data");
    }

    Ok(Dispatcher::new(store).with_history_limit(config.dashboard.history_limit))
}

fn handle_trackers(dispatcher: &Dispatcher, cmd: &TrackersCommand) -> Result<()> {
    let response = dispatcher.handle(cmd.to_request()?);

    let output = match cmd {
        TrackersCommand::List(filter) => {
            render::trackers(&response.decode::<Vec<Tracker>>()?, filter.format)?
        }
        TrackersCommand::Show { format, .. } => {
            render::tracker(&response.decode::<Tracker>()?, *format)?
        }
        TrackersCommand::Add { .. } => {
            let tracker: Tracker = response.decode()?;
            format!("Created tracker #{} ({})", tracker.id, tracker.tracker_id)
        }
        TrackersCommand::Update { .. } => {
            render::tracker(&response.decode::<Tracker>()?, OutputFormat::Plain)?
        }
        TrackersCommand::Delete { id } => {
            response.decode::<Value>()?;
            format!("Tracker #{id} deactivated")
        }
    };

    println!("{output}");
    Ok(())
}

fn handle_contacts(dispatcher: &Dispatcher, cmd: &ContactsCommand) -> Result<()> {
    let response = dispatcher.handle(cmd.to_request()?);

    let output = match cmd {
        ContactsCommand::List { format } => {
            render::contacts(&response.decode::<Vec<EmergencyContact>>()?, *format)?
        }
        ContactsCommand::Add { .. } => {
            let contact: EmergencyContact = response.decode()?;
            format!("Added contact #{} ({})", contact.id, contact.name)
        }
    };

    println!("{output}");
    Ok(())
}

fn handle_locations(dispatcher: &Dispatcher, cmd: &LocationsCommand) -> Result<()> {
    let response = dispatcher.handle(cmd.to_request()?);

    let output = match cmd {
        LocationsCommand::History { format, .. } => {
            render::locations(&response.decode::<Vec<Location>>()?, *format)?
        }
        LocationsCommand::Add(_) => {
            let location: Location = response.decode()?;
            format!(
                "Recorded location #{} for {}",
                location.id, location.tracker_id
            )
        }
    };

    println!("{output}");
    Ok(())
}

fn handle_config(config_path: Option<PathBuf>, cmd: &ConfigCommand) -> Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            let config = Config::load_from(config_path).context("failed to load configuration")?;
            if *json {
                println!("{}", serde_json::to_string_pretty(&config)?);
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Storage]");
                println!(
                    "  Backend:            {}",
                    match config.storage.backend {
                        Backend::Memory => "memory",
                        Backend::Sqlite => "sqlite",
                    }
                );
                println!("  Database path:      {}", config.database_path().display());
                println!("  Seed demo data:     {}", config.storage.seed_demo_data);
                println!();
                println!("[Dashboard]");
                println!(
                    "  Refresh (secs):     {}",
                    config.dashboard.refresh_interval_secs
                );
                println!("  History limit:      {}", config.dashboard.history_limit);
            }
        }
        ConfigCommand::Path => {
            let path = config_path.unwrap_or_else(Config::default_config_path);
            println!("{}", path.display());
        }
        ConfigCommand::Validate { file } => {
            let path = file
                .clone()
                .or(config_path)
                .unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            match Config::load_from(Some(path)) {
                Ok(_) => println!("Configuration is valid."),
                Err(e) => bail!("Configuration error: {e}"),
            }
        }
    }
    Ok(())
}
