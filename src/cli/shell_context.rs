use std::path::PathBuf;

use circle_config::{Config, ConfigManager};
use circle_core::CircleLedger;
use circle_domain::Circle;
use circle_storage_json::{JsonEventStore, StoragePaths};
use tracing::{debug, info};
use uuid::Uuid;

use crate::cli::commands;
use crate::cli::output::{self, OutputPreferences};
use crate::cli::registry::{CommandEntry, CommandRegistry};
use crate::errors::{CliError, CommandResult};
use crate::utils::app_data_dir;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CliMode {
    /// One command taken from the process arguments.
    Command,
    /// Newline-separated commands read from a file or stdin.
    Script,
}

pub struct ShellContext {
    pub mode: CliMode,
    pub running: bool,
    pub home: PathBuf,
    pub config: Config,
    pub config_manager: ConfigManager,
    pub ledger: CircleLedger<JsonEventStore>,
    pub registry: CommandRegistry,
}

impl ShellContext {
    pub fn new(mode: CliMode) -> Result<Self, CliError> {
        Self::with_home(mode, app_data_dir())
    }

    pub fn with_home(mode: CliMode, home: PathBuf) -> Result<Self, CliError> {
        let config_manager = ConfigManager::with_base_dir(home.clone())?;
        let mut config = config_manager.load()?;
        if config.user_id.is_nil() {
            config.user_id = Uuid::new_v4();
            config_manager.save(&config)?;
            info!(user = %config.user_id, "assigned local member id");
        }
        apply_output_preferences(&config);

        let data_dir = config.resolve_data_dir(&home);
        let store =
            JsonEventStore::with_retention(StoragePaths::under(&data_dir), config.backup_retention)?;
        debug!(home = %home.display(), data = %data_dir.display(), "shell context ready");

        let mut registry = CommandRegistry::new();
        for entry in commands::all_definitions() {
            registry.register(entry);
        }

        Ok(Self {
            mode,
            running: true,
            home,
            config,
            config_manager,
            ledger: CircleLedger::new(store),
            registry,
        })
    }

    pub fn command(&self, name: &str) -> Option<&CommandEntry> {
        self.registry.get(name)
    }

    pub fn dispatch(&mut self, name: &str, args: &[&str]) -> CommandResult {
        let handler = self
            .registry
            .handler(&name.to_ascii_lowercase())
            .ok_or_else(|| CliError::UnknownCommand(name.to_string()))?;
        debug!(command = name, args = args.len(), "dispatching command");
        handler(self, args)
    }

    /// Prints a command failure. Script runs keep going; single commands surface it.
    pub fn report_error(&self, err: CliError) -> Result<(), CliError> {
        match self.mode {
            CliMode::Command => Err(err),
            CliMode::Script => {
                output::error(&err);
                if matches!(err, CliError::Input(_)) {
                    output::info("Use `help <command>` for usage details.");
                }
                Ok(())
            }
        }
    }

    /// Looks a circle up by id or by case-insensitive name.
    pub fn resolve_circle(&self, reference: &str) -> Result<Circle, CliError> {
        if let Ok(id) = Uuid::parse_str(reference) {
            return Ok(self.ledger.circle(id)?);
        }
        let mut matches: Vec<Circle> = self
            .ledger
            .circles()?
            .into_iter()
            .filter(|circle| circle.name.eq_ignore_ascii_case(reference.trim()))
            .collect();
        match matches.len() {
            0 => Err(CliError::input(format!("no circle named `{reference}`"))),
            1 => Ok(matches.remove(0)),
            _ => Err(CliError::input(format!(
                "several circles are named `{reference}`; use the circle id"
            ))),
        }
    }

    pub fn apply_config(&mut self, config: Config) -> CommandResult {
        self.config_manager.save(&config)?;
        apply_output_preferences(&config);
        self.config = config;
        Ok(())
    }
}

fn apply_output_preferences(config: &Config) {
    output::set_preferences(OutputPreferences {
        color: config.ui_color_enabled,
        quiet: false,
    });
}
