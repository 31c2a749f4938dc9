//! Configuration for the sprig CLI.
//!
//! One TOML file layered with `SPRIG_*` environment variables, translated
//! into `sprig_core::SyncConfig`. Nested keys use a double underscore:
//! `SPRIG_TELEMETRY__OWNER` overrides `[telemetry] owner`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use sprig_core::config::{
    DEFAULT_MAX_CONCURRENT_FETCHES, DEFAULT_OWNER, DEFAULT_RECENT_LIMIT, DEFAULT_TELEMETRY_URL,
};
use sprig_core::{StorageLocation, SyncConfig, SyncOptions};

/// Storage path value that keeps state in memory for the process lifetime.
pub const IN_MEMORY: &str = ":memory:";

const ENV_PREFIX: &str = "SPRIG_";
const CATALOG_FILE: &str = "catalog.db";
const PREFERENCES_FILE: &str = "preferences.json";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

fn invalid(field: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Validation {
        field: field.into(),
        reason: reason.into(),
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub telemetry: TelemetrySection,

    #[serde(default)]
    pub storage: StorageSection,

    #[serde(default)]
    pub sync: SyncSection,
}

/// `[telemetry]`: where device readings come from.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct TelemetrySection {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Identity every telemetry path is scoped to.
    #[serde(default = "default_owner")]
    pub owner: String,

    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_fetches: usize,

    /// Extra root certificate (PEM) for a self-hosted service.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca_cert: Option<PathBuf>,
}

impl Default for TelemetrySection {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            owner: default_owner(),
            timeout_secs: default_timeout(),
            max_concurrent_fetches: default_max_concurrent(),
            ca_cert: None,
        }
    }
}

/// `[storage]`: local files. Unset paths fall back to the data directory;
/// `":memory:"` keeps nothing on disk.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct StorageSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<PathBuf>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferences: Option<PathBuf>,
}

/// `[sync]`: coordinator behaviour.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SyncSection {
    /// Seconds between background reloads. 0 disables them.
    #[serde(default)]
    pub refresh_interval_secs: u64,

    #[serde(default = "default_recent_limit")]
    pub recent_limit: usize,
}

impl Default for SyncSection {
    fn default() -> Self {
        Self {
            refresh_interval_secs: 0,
            recent_limit: default_recent_limit(),
        }
    }
}

fn default_base_url() -> String {
    DEFAULT_TELEMETRY_URL.into()
}
fn default_owner() -> String {
    DEFAULT_OWNER.into()
}
fn default_timeout() -> u64 {
    10
}
fn default_max_concurrent() -> usize {
    DEFAULT_MAX_CONCURRENT_FETCHES
}
fn default_recent_limit() -> usize {
    DEFAULT_RECENT_LIMIT
}

// ── Paths ───────────────────────────────────────────────────────────

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("dev", "sprig", "sprig")
}

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    project_dirs().map_or_else(
        || home_fallback(".config").join("config.toml"),
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

/// Directory for the catalog database and preferences when not configured.
pub fn data_dir() -> PathBuf {
    project_dirs().map_or_else(
        || home_fallback(".local/share"),
        |dirs| dirs.data_dir().to_path_buf(),
    )
}

fn home_fallback(base: &str) -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(base);
    p.push("sprig");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Defaults, then the TOML file at `path` (if any), then `SPRIG_*` env.
pub fn figment(path: &Path) -> Figment {
    Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
}

/// Load from the canonical config path.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from an explicit file. A missing file is not an error.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    Ok(figment(path).extract()?)
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Translation ─────────────────────────────────────────────────────

impl Config {
    /// Build the runtime configuration, resolving default storage paths.
    pub fn to_sync_config(&self) -> Result<SyncConfig, ConfigError> {
        let telemetry = &self.telemetry;
        let url: url::Url = telemetry.base_url.parse().map_err(|_| {
            invalid(
                "telemetry.base_url",
                format!("invalid URL: {}", telemetry.base_url),
            )
        })?;
        if telemetry.owner.trim().is_empty() {
            return Err(invalid("telemetry.owner", "must not be empty"));
        }
        if telemetry.timeout_secs == 0 {
            return Err(invalid("telemetry.timeout_secs", "must be at least 1"));
        }
        if telemetry.max_concurrent_fetches == 0 {
            return Err(invalid(
                "telemetry.max_concurrent_fetches",
                "must be at least 1",
            ));
        }

        let mut sync = SyncConfig::new(url);
        sync.owner.clone_from(&telemetry.owner);
        sync.timeout = Duration::from_secs(telemetry.timeout_secs);
        sync.ca_cert.clone_from(&telemetry.ca_cert);
        sync.database = storage_location(self.storage.database.as_deref(), CATALOG_FILE);
        sync.preferences = storage_location(self.storage.preferences.as_deref(), PREFERENCES_FILE);
        sync.recent_limit = self.sync.recent_limit;
        sync.sync = SyncOptions {
            max_concurrent_fetches: telemetry.max_concurrent_fetches,
            refresh_interval: Duration::from_secs(self.sync.refresh_interval_secs),
        };
        Ok(sync)
    }
}

fn storage_location(configured: Option<&Path>, file_name: &str) -> StorageLocation {
    match configured {
        Some(path) if path == Path::new(IN_MEMORY) => StorageLocation::InMemory,
        Some(path) => StorageLocation::File(path.to_path_buf()),
        None => StorageLocation::File(data_dir().join(file_name)),
    }
}
