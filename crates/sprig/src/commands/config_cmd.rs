//! Config subcommand handlers.

use dialoguer::Input;

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::config::{self, Config};
use crate::error::CliError;
use crate::output;

use super::util;

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        // ── Path ────────────────────────────────────────────────────
        ConfigCommand::Path => {
            println!("{}", config::active_path(global).display());
            Ok(())
        }

        // ── Show: resolved file + environment ───────────────────────
        ConfigCommand::Show => {
            let cfg = config::load(global)?;
            let rendered = toml::to_string_pretty(&cfg).map_err(|e| CliError::ConfigWrite {
                message: e.to_string(),
            })?;
            let out = output::render_single(
                &global.output,
                &cfg,
                |_| rendered.clone(),
                |_| config::active_path(global).display().to_string(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        // ── Init: interactive wizard ────────────────────────────────
        ConfigCommand::Init => {
            let path = config::active_path(global);
            util::require_terminal(
                "config init",
                "Write the file by hand or set SPRIG_* variables; see: sprig config show",
            )?;
            if path.exists()
                && !util::confirm(&format!("Overwrite {}?", path.display()), global.yes)?
            {
                return Ok(());
            }

            eprintln!("sprig configuration");
            eprintln!("   Config path: {}\n", path.display());

            let mut cfg = Config::default();

            cfg.telemetry.base_url = Input::new()
                .with_prompt("Telemetry service URL")
                .default(cfg.telemetry.base_url.clone())
                .interact_text()
                .map_err(util::prompt_err)?;

            cfg.telemetry.owner = Input::new()
                .with_prompt("Owner (account the devices are registered to)")
                .default(cfg.telemetry.owner.clone())
                .interact_text()
                .map_err(util::prompt_err)?;

            cfg.sync.refresh_interval_secs = Input::new()
                .with_prompt("Background refresh in seconds (0 = off)")
                .default(cfg.sync.refresh_interval_secs)
                .interact_text()
                .map_err(util::prompt_err)?;

            // Reject unusable values before writing anything.
            cfg.to_sync_config()?;

            config::save_config_to(&cfg, &path)?;
            output::status(global, &format!("Config written to {}", path.display()));
            Ok(())
        }
    }
}
