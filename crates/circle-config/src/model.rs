use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::ConfigError;

/// Stores user-configurable CLI preferences.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// ISO code used when a new circle does not name one.
    pub currency: String,
    /// Member recorded as the author of events written from this machine.
    #[serde(default)]
    pub user_id: Uuid,
    #[serde(default = "Config::default_feed_page_limit")]
    pub feed_page_limit: usize,
    #[serde(default = "Config::default_max_feed_page_limit")]
    pub max_feed_page_limit: usize,
    #[serde(default = "Config::default_top_tags")]
    pub top_tags: usize,
    #[serde(default = "Config::default_ui_color_enabled")]
    pub ui_color_enabled: bool,
    #[serde(default = "Config::default_backup_retention")]
    pub backup_retention: usize,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    /// Optional custom root for circle data. Defaults to `<home>/data`.
    pub data_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            currency: "EUR".into(),
            user_id: Uuid::nil(),
            feed_page_limit: Self::default_feed_page_limit(),
            max_feed_page_limit: Self::default_max_feed_page_limit(),
            top_tags: Self::default_top_tags(),
            ui_color_enabled: Self::default_ui_color_enabled(),
            backup_retention: Self::default_backup_retention(),
            data_dir: None,
        }
    }
}

impl Config {
    pub const KEYS: [&'static str; 8] = [
        "currency",
        "user_id",
        "feed_page_limit",
        "max_feed_page_limit",
        "top_tags",
        "ui_color_enabled",
        "backup_retention",
        "data_dir",
    ];

    pub fn default_feed_page_limit() -> usize {
        20
    }

    pub fn default_max_feed_page_limit() -> usize {
        100
    }

    pub fn default_top_tags() -> usize {
        5
    }

    pub fn default_ui_color_enabled() -> bool {
        true
    }

    pub fn default_backup_retention() -> usize {
        5
    }

    /// Default application home, `~/.circle_ledger`.
    pub fn default_home() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".circle_ledger")
    }

    /// Directory holding circle data: `data_dir` when set, otherwise `<home>/data`.
    pub fn resolve_data_dir(&self, home: &Path) -> PathBuf {
        match &self.data_dir {
            Some(path) => path.clone(),
            None => home.join("data"),
        }
    }

    /// Clamps a requested feed page size to `[1, max_feed_page_limit]`; `None` picks the
    /// configured default.
    pub fn page_limit(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.feed_page_limit)
            .clamp(1, self.max_feed_page_limit.max(1))
    }

    /// Current value of `key` rendered for display.
    pub fn get(&self, key: &str) -> Option<String> {
        let value = match key {
            "currency" => self.currency.clone(),
            "user_id" => self.user_id.to_string(),
            "feed_page_limit" => self.feed_page_limit.to_string(),
            "max_feed_page_limit" => self.max_feed_page_limit.to_string(),
            "top_tags" => self.top_tags.to_string(),
            "ui_color_enabled" => self.ui_color_enabled.to_string(),
            "backup_retention" => self.backup_retention.to_string(),
            "data_dir" => self
                .data_dir
                .as_ref()
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "(default)".into()),
            _ => return None,
        };
        Some(value)
    }

    /// Parses and applies one setting.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let value = value.trim();
        match key {
            "currency" => {
                if value.len() != 3 || !value.chars().all(|ch| ch.is_ascii_alphabetic()) {
                    return Err(invalid(key, "expected a three-letter currency code"));
                }
                self.currency = value.to_ascii_uppercase();
            }
            "user_id" => {
                self.user_id = value
                    .parse()
                    .map_err(|_| invalid(key, "expected a UUID"))?;
            }
            "feed_page_limit" => {
                let limit = parse_count(key, value)?;
                if limit > self.max_feed_page_limit {
                    return Err(invalid(key, "must not exceed max_feed_page_limit"));
                }
                self.feed_page_limit = limit;
            }
            "max_feed_page_limit" => {
                let limit = parse_count(key, value)?;
                self.max_feed_page_limit = limit;
                self.feed_page_limit = self.feed_page_limit.min(limit);
            }
            "top_tags" => self.top_tags = parse_count(key, value)?,
            "ui_color_enabled" => {
                self.ui_color_enabled = match value.to_ascii_lowercase().as_str() {
                    "true" | "on" | "yes" => true,
                    "false" | "off" | "no" => false,
                    _ => return Err(invalid(key, "expected true or false")),
                };
            }
            "backup_retention" => self.backup_retention = parse_count(key, value)?,
            "data_dir" => {
                self.data_dir = (!value.is_empty()).then(|| PathBuf::from(value));
            }
            _ => {
                return Err(invalid(
                    key,
                    &format!("unknown key; expected one of {}", Self::KEYS.join(", ")),
                ))
            }
        }
        Ok(())
    }
}

fn parse_count(key: &str, value: &str) -> Result<usize, ConfigError> {
    match value.parse::<usize>() {
        Ok(count) if count > 0 => Ok(count),
        _ => Err(invalid(key, "expected a positive integer")),
    }
}

fn invalid(key: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidSetting {
        key: key.to_string(),
        reason: reason.to_string(),
    }
}
