//! `watch`: redraw the plant list whenever a sync cycle completes.

use std::time::Duration;

use tokio_stream::StreamExt;

use sprig_core::{SyncCoordinator, ViewState};

use crate::cli::{GlobalOpts, OutputFormat, WatchArgs};
use crate::error::CliError;
use crate::output;

use super::plants;

/// Used when neither `--interval` nor the config sets a refresh period.
const DEFAULT_INTERVAL: Duration = Duration::from_secs(30);

/// Refresh period for a watch session.
pub fn refresh_interval(args: &WatchArgs, configured: Duration) -> Duration {
    match args.interval {
        Some(secs) => Duration::from_secs(secs.max(1)),
        None if configured.is_zero() => DEFAULT_INTERVAL,
        None => configured,
    }
}

pub async fn handle(
    coordinator: &SyncCoordinator,
    args: WatchArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let mut updates = coordinator.view_stream().into_stream();
    let mut diagnostics = coordinator.telemetry_diagnostics();
    coordinator.request_reload();

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let mut shown = 0usize;
    loop {
        tokio::select! {
            _ = &mut ctrl_c => break,
            state = updates.next() => {
                let Some(state) = state else { break };
                match &state {
                    ViewState::Ready(snapshot) => {
                        super::util::report_diagnostics(&mut diagnostics, global);
                        if matches!(global.output, OutputFormat::Table) && !global.quiet {
                            println!(
                                "\n{} plants at {} (cycle {})",
                                snapshot.plants.len(),
                                snapshot.loaded_at.format("%H:%M:%S"),
                                snapshot.generation,
                            );
                        }
                        plants::render_plants(&snapshot.plants, coordinator.bindings(), global)?;
                        shown += 1;
                    }
                    ViewState::Error { message, .. } => {
                        output::warn(global, &format!("refresh failed: {message}"));
                        shown += 1;
                    }
                    ViewState::Idle | ViewState::Loading { .. } => {}
                }
                if args.count.is_some_and(|n| shown >= n) {
                    break;
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(interval: Option<u64>) -> WatchArgs {
        WatchArgs {
            interval,
            count: None,
        }
    }

    #[test]
    fn flag_wins_over_config() {
        let period = refresh_interval(&args(Some(5)), Duration::from_secs(60));
        assert_eq!(period, Duration::from_secs(5));
    }

    #[test]
    fn zero_flag_is_clamped() {
        assert_eq!(refresh_interval(&args(Some(0)), Duration::ZERO), Duration::from_secs(1));
    }

    #[test]
    fn disabled_config_falls_back_to_default() {
        assert_eq!(refresh_interval(&args(None), Duration::ZERO), DEFAULT_INTERVAL);
        assert_eq!(
            refresh_interval(&args(None), Duration::from_secs(12)),
            Duration::from_secs(12)
        );
    }
}
