use circle_config::Config;

use crate::cli::output::{self, render_table, Alignment};
use crate::cli::registry::CommandEntry;
use crate::cli::shell_context::ShellContext;
use crate::errors::{CliError, CommandResult};

pub(crate) fn definitions() -> Vec<CommandEntry> {
    vec![CommandEntry::new(
        "config",
        "View and manage CLI preferences",
        "config [show|set <key> <value>|backup [note]|backups|restore <name>]",
        cmd_config,
    )]
}

fn cmd_config(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    if args.is_empty() || args[0].eq_ignore_ascii_case("show") {
        return show(context);
    }

    match args[0].to_ascii_lowercase().as_str() {
        "set" => {
            if args.len() < 3 {
                return Err(CliError::input(format!(
                    "usage: config set <{}> <value>",
                    Config::KEYS.join("|")
                )));
            }
            let key = args[1];
            let value = args[2..].join(" ");
            let mut config = context.config.clone();
            config.set(key, &value)?;
            context.apply_config(config)?;
            let shown = context.config.get(key).unwrap_or_default();
            output::success(format!("{key} = {shown}"));
            if key == "data_dir" || key == "backup_retention" {
                output::warning("Storage settings take effect on the next run.");
            }
            Ok(())
        }
        "backup" => {
            let note = (args.len() > 1).then(|| args[1..].join(" "));
            let name = context
                .config_manager
                .backup(&context.config, note.as_deref())?;
            output::success(format!("Configuration backed up as `{name}`"));
            Ok(())
        }
        "backups" => {
            let backups = context.config_manager.list_backups()?;
            if backups.is_empty() {
                output::info("No configuration backups.");
            }
            for backup in backups {
                output::info(format!(
                    "  {}  (taken {})",
                    backup.name,
                    backup.taken_at.format("%Y-%m-%d %H:%M:%S UTC")
                ));
            }
            Ok(())
        }
        "restore" => {
            let name = args
                .get(1)
                .ok_or_else(|| CliError::input("usage: config restore <name>"))?;
            let restored = context.config_manager.restore(name)?;
            context.apply_config(restored)?;
            output::success(format!("Configuration restored from `{name}`"));
            Ok(())
        }
        other => Err(CliError::input(format!(
            "unknown config subcommand `{other}`"
        ))),
    }
}

fn show(context: &ShellContext) -> CommandResult {
    output::section("Configuration");
    let rows: Vec<Vec<String>> = Config::KEYS
        .iter()
        .map(|key| {
            vec![
                (*key).to_string(),
                context.config.get(key).unwrap_or_default(),
            ]
        })
        .collect();
    output::info(render_table(
        &[("Key", Alignment::Left), ("Value", Alignment::Left)],
        &rows,
    ));
    output::info(format!("Home: {}", context.home.display()));
    Ok(())
}
