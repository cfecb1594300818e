//! Configuration management for crowdwatch.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults.

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default data directory name.
const DATA_DIR_NAME: &str = "crowdwatch";

/// Default database file name.
const DATABASE_FILE_NAME: &str = "trackers.db";

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `CROWDWATCH_`)
/// 2. TOML config file at `~/.config/crowdwatch/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Storage configuration.
    pub storage: StorageConfig,
    /// Dashboard configuration.
    pub dashboard: DashboardConfig,
}

/// Which storage backend to open at startup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Keep records for the lifetime of the process.
    #[default]
    Memory,
    /// Persist records in a `SQLite` database file.
    Sqlite,
}

/// Storage-related configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Storage backend.
    pub backend: Backend,
    /// Path to the database file (sqlite backend only).
    /// Defaults to `~/.local/share/crowdwatch/trackers.db`
    pub database_path: Option<PathBuf>,
    /// Load the default emergency contacts and sample trackers into an empty store.
    pub seed_demo_data: bool,
}

/// Dashboard-related configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    /// Seconds between refreshes in watch mode.
    pub refresh_interval_secs: u64,
    /// Location samples returned when a history request gives no limit.
    pub history_limit: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: Backend::Memory,
            database_path: None, // Will be resolved to default at runtime
            seed_demo_data: true,
        }
    }
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            refresh_interval_secs: 5,
            history_limit: crate::store::DEFAULT_HISTORY_LIMIT,
        }
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// Sources are merged in this order (later sources override earlier):
    /// defaults, the TOML file (if it exists), then `CROWDWATCH_` environment
    /// variables with `__` separating nested keys.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_file))
            .merge(Env::prefixed("CROWDWATCH_").split("__"));

        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(DATA_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from(".local/share"))
            .join(DATA_DIR_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        if self.dashboard.refresh_interval_secs == 0 {
            return Err(Error::ConfigValidation {
                message: "refresh_interval_secs must be greater than 0".to_string(),
            });
        }

        if self.dashboard.history_limit == 0 {
            return Err(Error::ConfigValidation {
                message: "history_limit must be greater than 0".to_string(),
            });
        }

        Ok(())
    }

    /// Get the database path, resolving defaults if not set.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.storage
            .database_path
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(DATABASE_FILE_NAME))
    }

    /// Get the dashboard refresh interval as a Duration.
    #[must_use]
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.dashboard.refresh_interval_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.storage.backend, Backend::Memory);
        assert!(config.storage.database_path.is_none());
        assert!(config.storage.seed_demo_data);
        assert_eq!(config.dashboard.refresh_interval_secs, 5);
        assert_eq!(config.dashboard.history_limit, 10);
    }

    #[test]
    fn test_validate_valid_config() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_validate_zero_refresh_interval() {
        let mut config = Config::default();
        config.dashboard.refresh_interval_secs = 0;

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("refresh_interval_secs"));
    }

    #[test]
    fn test_validate_zero_history_limit() {
        let mut config = Config::default();
        config.dashboard.history_limit = 0;

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("history_limit"));
    }

    #[test]
    fn test_database_path_default() {
        let path = Config::default().database_path();
        assert!(path.to_string_lossy().contains("trackers.db"));
    }

    #[test]
    fn test_database_path_custom() {
        let mut config = Config::default();
        config.storage.database_path = Some(PathBuf::from("/custom/path/db.sqlite"));

        assert_eq!(
            config.database_path(),
            PathBuf::from("/custom/path/db.sqlite")
        );
    }

    #[test]
    fn test_refresh_interval() {
        assert_eq!(Config::default().refresh_interval(), Duration::from_secs(5));
    }

    #[test]
    fn test_default_config_path() {
        let path = Config::default_config_path();
        assert!(path.to_string_lossy().contains("crowdwatch"));
        assert!(path.to_string_lossy().contains("config.toml"));
    }

    // Loading reads the process environment, so these run inside
    // `figment::Jail`, which serializes them and restores env and cwd.

    #[test]
    fn test_load_nonexistent_config() {
        figment::Jail::expect_with(|_jail| {
            let config = Config::load_from(Some(PathBuf::from("missing.toml")))
                .map_err(|e| e.to_string())?;
            assert_eq!(config, Config::default());
            Ok(())
        });
    }

    #[test]
    fn test_load_from_toml_file() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "config.toml",
                r#"
                [storage]
                backend = "sqlite"
                database_path = "/tmp/events.db"

                [dashboard]
                refresh_interval_secs = 2
                "#,
            )?;

            let config = Config::load_from(Some(PathBuf::from("config.toml")))
                .map_err(|e| e.to_string())?;
            assert_eq!(config.storage.backend, Backend::Sqlite);
            assert_eq!(config.database_path(), PathBuf::from("/tmp/events.db"));
            assert_eq!(config.dashboard.refresh_interval_secs, 2);
            assert_eq!(config.dashboard.history_limit, 10);
            Ok(())
        });
    }

    #[test]
    fn test_env_overrides_file_and_defaults() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "config.toml",
                r#"
                [storage]
                backend = "memory"

                [dashboard]
                history_limit = 7
                "#,
            )?;
            jail.set_env("CROWDWATCH_STORAGE__BACKEND", "sqlite");
            jail.set_env("CROWDWATCH_DASHBOARD__HISTORY_LIMIT", "3");

            let config = Config::load_from(Some(PathBuf::from("config.toml")))
                .map_err(|e| e.to_string())?;
            assert_eq!(config.storage.backend, Backend::Sqlite);
            assert_eq!(config.dashboard.history_limit, 3);
            // Keys set nowhere else keep their defaults.
            assert_eq!(config.dashboard.refresh_interval_secs, 5);
            assert!(config.storage.seed_demo_data);

            // Without a file the environment still wins over the defaults.
            let config = Config::load_from(Some(PathBuf::from("missing.toml")))
                .map_err(|e| e.to_string())?;
            assert_eq!(config.storage.backend, Backend::Sqlite);
            assert_eq!(config.dashboard.history_limit, 3);
            Ok(())
        });
    }

    #[test]
    fn test_load_rejects_invalid_file_values() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("config.toml", "[dashboard]\nhistory_limit = 0\n")?;

            let err = Config::load_from(Some(PathBuf::from("config.toml"))).unwrap_err();
            assert!(matches!(err, Error::ConfigValidation { .. }));
            Ok(())
        });
    }

    #[test]
    fn test_load_rejects_invalid_env_values() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("CROWDWATCH_STORAGE__BACKEND", "postgres");

            let err = Config::load_from(Some(PathBuf::from("missing.toml"))).unwrap_err();
            assert!(matches!(err, Error::ConfigLoad(_)));
            Ok(())
        });
    }

    #[test]
    fn test_backend_deserialize() {
        let storage: StorageConfig = serde_json::from_str(r#"{"backend": "sqlite"}"#).unwrap();
        assert_eq!(storage.backend, Backend::Sqlite);
        assert!(storage.seed_demo_data);
    }

    #[test]
    fn test_config_serialize() {
        let json = serde_json::to_string(&Config::default()).unwrap();
        assert!(json.contains("refresh_interval_secs"));
        assert!(json.contains("\"memory\""));
    }
}
