use serde::Serialize;

pub mod circle;
pub mod config;
pub mod events;
pub mod reports;
pub mod system;

use crate::cli::output;
use crate::cli::registry::CommandEntry;
use crate::errors::CommandResult;

pub(crate) fn all_definitions() -> Vec<CommandEntry> {
    let mut commands = Vec::new();
    commands.extend(system::definitions());
    commands.extend(circle::definitions());
    commands.extend(events::definitions());
    commands.extend(reports::definitions());
    commands.extend(config::definitions());
    commands
}

/// Prints `value` as pretty JSON on stdout.
pub(crate) fn print_json<T: Serialize>(value: &T) -> CommandResult {
    output::info(serde_json::to_string_pretty(value)?);
    Ok(())
}
