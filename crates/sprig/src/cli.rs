//! Clap derive structures for the `sprig` CLI.
//!
//! Defines the complete command tree, global flags, and shared types.
//! Depends only on clap so `build.rs` can include it for man pages.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// sprig -- plant catalog with live sensor readings
#[derive(Debug, Parser)]
#[command(
    name = "sprig",
    version,
    about = "Track your plants and the sensors watching them",
    long_about = "Keeps a local catalog of plants and merges in the latest soil\n\
        and climate readings from the devices bound to them.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Config file (defaults to the platform config directory)
    #[arg(long, env = "SPRIG_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "SPRIG_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Skip confirmation prompts
    #[arg(long, short = 'y', global = true)]
    pub yes: bool,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Show every plant with its latest readings
    #[command(alias = "ls")]
    List,

    /// Show the most recently added plants
    Recent {
        /// How many plants to show (defaults to `[sync] recent_limit`)
        #[arg(long, short = 'l')]
        limit: Option<usize>,
    },

    /// Add a plant to the catalog
    Add(AddArgs),

    /// Set or clear a plant's nickname
    Rename {
        /// Plant ID
        id: i64,

        /// New nickname; omit to fall back to the canonical name
        #[arg(default_value = "")]
        nickname: String,
    },

    /// Change where a plant lives
    Locate {
        /// Plant ID
        id: i64,

        /// Free-form location, e.g. "Kitchen window"
        location: String,
    },

    /// Remove a plant from the catalog
    #[command(alias = "rm")]
    Delete {
        /// Plant ID
        id: i64,
    },

    /// Attach a sensor device to a plant
    Bind {
        /// Plant ID
        id: i64,

        /// Device ID or picker label; omit to choose interactively
        device: Option<String>,
    },

    /// Detach the sensor device from a plant
    Unbind {
        /// Plant ID
        id: i64,
    },

    /// List the owner's registered devices
    #[command(alias = "dev")]
    Devices,

    /// Manage friendly device names
    Alias(AliasArgs),

    /// Show recent readings for a device
    Logs {
        /// Device ID
        device: String,

        /// Number of readings
        #[arg(long, short = 'l', default_value = "10")]
        limit: usize,
    },

    /// Keep the plant list on screen, refreshing periodically
    Watch(WatchArgs),

    /// Manage CLI configuration
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Plants ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct AddArgs {
    /// Canonical (scientific) name
    pub name: String,

    /// Comma-separated common names
    #[arg(long, default_value = "")]
    pub common_names: String,

    #[arg(long)]
    pub nickname: Option<String>,

    #[arg(long, default_value = "")]
    pub location: String,

    /// Identification confidence, 0.0 to 1.0
    #[arg(long, default_value = "0")]
    pub confidence: f64,

    /// Device to bind right away
    #[arg(long)]
    pub device: Option<String>,

    /// Path to a photo of the plant
    #[arg(long)]
    pub image: Option<String>,
}

// ── Aliases ──────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct AliasArgs {
    #[command(subcommand)]
    pub command: AliasCommand,
}

#[derive(Debug, Subcommand)]
pub enum AliasCommand {
    /// Print a device's alias
    Get {
        /// Device ID
        device: String,
    },

    /// Give a device a friendly name
    Set {
        /// Device ID
        device: String,

        /// Friendly name
        alias: String,
    },

    /// Remove a device's alias
    Clear {
        /// Device ID
        device: String,
    },
}

// ── Watch ────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Seconds between refreshes (overrides `[sync] refresh_interval_secs`)
    #[arg(long, short = 'n')]
    pub interval: Option<u64>,

    /// Exit after this many updates
    #[arg(long)]
    pub count: Option<usize>,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Create the config file with guided setup
    Init,

    /// Display the resolved configuration
    Show,

    /// Print the config file location
    Path,
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
