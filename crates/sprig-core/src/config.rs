// ── Runtime sync configuration ──
//
// Describes where the catalog lives and how to reach the telemetry
// service. Never touches disk; the CLI builds a `SyncConfig` from its
// config file and hands it in.

use std::path::PathBuf;
use std::time::Duration;

use url::Url;

pub const DEFAULT_TELEMETRY_URL: &str = "http://vm.drcvault.dev/";
pub const DEFAULT_OWNER: &str = "grower@example.com";
pub const DEFAULT_MAX_CONCURRENT_FETCHES: usize = 8;
pub const DEFAULT_RECENT_LIMIT: usize = 3;

/// Where a piece of local state is kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageLocation {
    /// Gone when the process exits.
    InMemory,
    File(PathBuf),
}

/// Coordinator tuning, independent of storage and transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOptions {
    /// Upper bound on concurrent telemetry requests per cycle.
    pub max_concurrent_fetches: usize,
    /// Background reload period. `Duration::ZERO` disables it.
    pub refresh_interval: Duration,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            max_concurrent_fetches: DEFAULT_MAX_CONCURRENT_FETCHES,
            refresh_interval: Duration::ZERO,
        }
    }
}

/// Everything needed to assemble a running [`SyncCoordinator`](crate::SyncCoordinator).
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Telemetry service root.
    pub telemetry_url: Url,
    /// Fixed owner identity every telemetry path is scoped to.
    pub owner: String,
    pub timeout: Duration,
    /// Extra root certificate for a self-hosted telemetry service.
    pub ca_cert: Option<PathBuf>,
    pub database: StorageLocation,
    pub preferences: StorageLocation,
    /// How many plants the "recent" view shows.
    pub recent_limit: usize,
    pub sync: SyncOptions,
}

impl SyncConfig {
    /// Defaults for everything but the service URL, with in-memory storage.
    pub fn new(telemetry_url: Url) -> Self {
        Self {
            telemetry_url,
            owner: DEFAULT_OWNER.into(),
            timeout: sprig_api::transport::DEFAULT_TIMEOUT,
            ca_cert: None,
            database: StorageLocation::InMemory,
            preferences: StorageLocation::InMemory,
            recent_limit: DEFAULT_RECENT_LIMIT,
            sync: SyncOptions::default(),
        }
    }
}
