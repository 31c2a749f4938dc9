//! CLI configuration -- thin wrapper around `sprig_config`.
//!
//! Adds resolution that respects the `--config` flag.

use std::path::PathBuf;

use sprig_core::SyncConfig;

use crate::cli::GlobalOpts;
use crate::error::CliError;

pub use sprig_config::{Config, save_config_to};

/// `--config` (or `SPRIG_CONFIG`) if given, else the platform default.
pub fn active_path(global: &GlobalOpts) -> PathBuf {
    global
        .config
        .clone()
        .unwrap_or_else(sprig_config::config_path)
}

/// Load file + environment. A missing file yields the defaults.
pub fn load(global: &GlobalOpts) -> Result<Config, CliError> {
    Ok(sprig_config::load_config_from(&active_path(global))?)
}

/// Resolve the runtime configuration for the sync coordinator.
pub fn sync_config(global: &GlobalOpts) -> Result<SyncConfig, CliError> {
    Ok(load(global)?.to_sync_config()?)
}
