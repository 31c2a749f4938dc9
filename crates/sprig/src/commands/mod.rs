//! Command dispatch: bridges CLI args -> coordinator calls -> output formatting.

pub mod alias;
pub mod config_cmd;
pub mod devices;
pub mod plants;
pub mod util;
pub mod watch;

use sprig_core::{SyncConfig, SyncCoordinator};

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch a coordinator-bound command to the appropriate handler.
pub async fn dispatch(
    cmd: Command,
    coordinator: &SyncCoordinator,
    sync: &SyncConfig,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match cmd {
        Command::List => plants::list(coordinator, global).await,
        Command::Recent { limit } => {
            plants::recent(coordinator, limit.unwrap_or(sync.recent_limit), global).await
        }
        Command::Add(args) => plants::add(coordinator, args, global).await,
        Command::Rename { id, nickname } => plants::rename(coordinator, id, &nickname, global).await,
        Command::Locate { id, location } => {
            plants::locate(coordinator, id, &location, global).await
        }
        Command::Delete { id } => plants::delete(coordinator, id, global).await,
        Command::Bind { id, device } => devices::bind(coordinator, id, device, global).await,
        Command::Unbind { id } => devices::unbind(coordinator, id, global).await,
        Command::Devices => devices::list(coordinator, global).await,
        Command::Logs { device, limit } => devices::logs(coordinator, &device, limit, global).await,
        Command::Alias(args) => alias::handle(coordinator.bindings(), args, global),
        Command::Watch(args) => watch::handle(coordinator, args, global).await,
        // Config and Completions are handled before dispatch
        Command::Config(_) | Command::Completions(_) => unreachable!(),
    }
}
