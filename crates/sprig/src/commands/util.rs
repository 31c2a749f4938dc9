//! Shared helpers for command handlers.

use std::io::IsTerminal;

use tokio::sync::broadcast::{self, error::TryRecvError};

use sprig_core::{PlantView, TelemetryDiagnostic, ViewState};

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

/// Prompt for confirmation, auto-approving if `--yes` was passed.
pub fn confirm(message: &str, yes_flag: bool) -> Result<bool, CliError> {
    if yes_flag {
        return Ok(true);
    }
    require_terminal("confirmation", "Pass --yes (-y) to skip the prompt.")?;
    let confirmed = dialoguer::Confirm::new()
        .with_prompt(message)
        .default(false)
        .interact()
        .map_err(prompt_err)?;
    Ok(confirmed)
}

/// Let the user choose one of `items`; returns its index.
pub fn pick(prompt: &str, items: &[&str], hint: &str) -> Result<usize, CliError> {
    require_terminal("selection", hint)?;
    dialoguer::Select::new()
        .with_prompt(prompt)
        .items(items)
        .default(0)
        .interact()
        .map_err(prompt_err)
}

pub fn require_terminal(action: &str, hint: &str) -> Result<(), CliError> {
    if std::io::stdin().is_terminal() {
        Ok(())
    } else {
        Err(CliError::NonInteractive {
            action: action.into(),
            hint: hint.into(),
        })
    }
}

/// Map a dialoguer / interactive I/O failure into CliError.
pub fn prompt_err(e: dialoguer::Error) -> CliError {
    CliError::Io(std::io::Error::other(e))
}

/// Plants to show for a finished reload.
///
/// A failed cycle still shows the last good view with a warning; with
/// nothing to fall back on it is an error.
pub fn loaded_plants(state: &ViewState, global: &GlobalOpts) -> Result<Vec<PlantView>, CliError> {
    if let Some(message) = state.error_message() {
        if state.view().is_none() {
            return Err(CliError::Storage {
                message: message.to_owned(),
            });
        }
        output::warn(global, &format!("showing last loaded view: {message}"));
    }
    Ok(state.plants().to_vec())
}

/// Print telemetry failures that were degraded to "no reading".
pub fn report_diagnostics(rx: &mut broadcast::Receiver<TelemetryDiagnostic>, global: &GlobalOpts) {
    loop {
        match rx.try_recv() {
            Ok(diag) => {
                let subject = diag.device_id.as_deref().unwrap_or("telemetry");
                output::warn(global, &format!("{subject}: {}", diag.message));
            }
            Err(TryRecvError::Lagged(skipped)) => {
                output::warn(global, &format!("{skipped} more telemetry failures"));
            }
            Err(TryRecvError::Empty | TryRecvError::Closed) => break,
        }
    }
}
