//! Device alias command handlers.

use sprig_core::DeviceBindingRegistry;

use crate::cli::{AliasArgs, AliasCommand, GlobalOpts};
use crate::error::CliError;
use crate::output;

pub fn handle(
    bindings: &DeviceBindingRegistry,
    args: AliasArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match args.command {
        AliasCommand::Get { device } => {
            let alias = bindings.get_alias(&device).ok_or_else(|| CliError::NotFound {
                resource_type: "alias for device".into(),
                identifier: device.clone(),
                list_command: "devices".into(),
            })?;
            output::print_output(&alias, global.quiet);
            Ok(())
        }

        AliasCommand::Set { device, alias } => {
            bindings.set_alias(&device, &alias)?;
            output::status(global, &format!("{device} is now {}", bindings.label_for(&device)));
            Ok(())
        }

        AliasCommand::Clear { device } => {
            if bindings.clear_alias(&device)? {
                output::status(global, &format!("Alias of {device} removed"));
            } else if !global.quiet {
                output::warn(global, &format!("{device} had no alias"));
            }
            Ok(())
        }
    }
}
