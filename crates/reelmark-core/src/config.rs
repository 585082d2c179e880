use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::error::ReelmarkError;

const DEFAULT_CONFIG: &str = include_str!("../../../config/default.toml");

/// Top-level application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub detection: DetectionConfig,
    pub session: SessionConfig,
    pub backend: BackendConfig,
    pub metadata: MetadataConfig,
    pub sync: SyncConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Detection loop timings, in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionConfig {
    pub initial_delay_ms: u64,
    pub mutation_debounce_ms: u64,
    pub periodic_interval_ms: u64,
    pub url_poll_ms: u64,
    pub navigation_delay_ms: u64,
    pub cooldown_ms: u64,
    pub retry_grace_ms: u64,
    pub session_poll_ms: u64,
}

impl DetectionConfig {
    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    pub fn mutation_debounce(&self) -> Duration {
        Duration::from_millis(self.mutation_debounce_ms)
    }

    pub fn periodic_interval(&self) -> Duration {
        Duration::from_millis(self.periodic_interval_ms)
    }

    pub fn url_poll(&self) -> Duration {
        Duration::from_millis(self.url_poll_ms)
    }

    pub fn navigation_delay(&self) -> Duration {
        Duration::from_millis(self.navigation_delay_ms)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }

    pub fn retry_grace(&self) -> Duration {
        Duration::from_millis(self.retry_grace_ms)
    }

    pub fn session_poll(&self) -> Duration {
        Duration::from_millis(self.session_poll_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Sessions older than this are discarded.
    pub freshness_hours: i64,
}

impl SessionConfig {
    pub fn freshness(&self) -> chrono::Duration {
        chrono::Duration::hours(self.freshness_hours)
    }
}

/// Hosted auth + record storage service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    pub url: String,
    pub anon_key: String,
}

/// Metadata catalog (posters and release years).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataConfig {
    pub base_url: String,
    pub api_key: String,
    pub image_base: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Maximum records backfilled per cover run.
    pub cover_backfill_limit: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub filter: String,
    /// Also write a daily-rolling log file under the data directory.
    pub file: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "reelmark=info".into(),
            file: false,
        }
    }
}

impl AppConfig {
    /// Load config: user file (if exists) or built-in defaults.
    pub fn load() -> Result<Self, ReelmarkError> {
        let user_path = Self::config_path();
        if user_path.exists() {
            Self::load_from(&user_path)
        } else {
            Self::defaults()
        }
    }

    /// Load config from an explicit file.
    pub fn load_from(path: &Path) -> Result<Self, ReelmarkError> {
        let user_str = std::fs::read_to_string(path)?;
        toml::from_str(&user_str).map_err(|e| ReelmarkError::Config(e.to_string()))
    }

    fn defaults() -> Result<Self, ReelmarkError> {
        toml::from_str(DEFAULT_CONFIG).map_err(|e| ReelmarkError::Config(e.to_string()))
    }

    /// Save current config to the user config file.
    pub fn save(&self) -> Result<(), ReelmarkError> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ReelmarkError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| ReelmarkError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Path to user config file (XDG on Linux, AppData on Windows).
    pub fn config_path() -> PathBuf {
        Self::project_dirs()
            .map(|d| d.config_dir().join("config.toml"))
            .unwrap_or_else(|| PathBuf::from("config.toml"))
    }

    /// Path to an optional user platform database merged over the embedded one.
    pub fn platforms_path() -> PathBuf {
        Self::project_dirs()
            .map(|d| d.config_dir().join("platforms.toml"))
            .unwrap_or_else(|| PathBuf::from("platforms.toml"))
    }

    /// Directory for the database and log files.
    pub fn data_dir() -> PathBuf {
        Self::project_dirs()
            .map(|d| d.data_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Path to the database file.
    pub fn db_path() -> PathBuf {
        Self::data_dir().join("reelmark.db")
    }

    /// Ensure the data directory exists and return the DB path.
    pub fn ensure_db_path() -> Result<PathBuf, ReelmarkError> {
        let path = Self::db_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(path)
    }

    fn project_dirs() -> Option<ProjectDirs> {
        ProjectDirs::from("", "", "reelmark")
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        toml::from_str(DEFAULT_CONFIG).expect("built-in default config is valid TOML")
    }
}
