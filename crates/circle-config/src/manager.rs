use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Serialize;

use crate::{Config, ConfigError};

const PREFIX: &str = "config_";
const SUFFIX: &str = ".json";
const STAMP_FORMAT: &str = "%Y%m%dT%H%M%SZ";
const STAMP_LEN: usize = 16;

/// One stored copy of the configuration, `config_<stamp>[_<note>].json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfigBackup {
    pub name: String,
    pub taken_at: DateTime<Utc>,
    pub note: Option<String>,
}

impl ConfigBackup {
    fn new(taken_at: DateTime<Utc>, note: Option<String>) -> Self {
        let mut name = format!("{PREFIX}{}", taken_at.format(STAMP_FORMAT));
        if let Some(note) = &note {
            name.push('_');
            name.push_str(note);
        }
        name.push_str(SUFFIX);
        Self {
            name,
            taken_at,
            note,
        }
    }

    /// Recognizes a backup file name; anything else in the directory is ignored.
    pub fn parse(name: &str) -> Option<Self> {
        let body = name.strip_prefix(PREFIX)?.strip_suffix(SUFFIX)?;
        let stamp = body.get(..STAMP_LEN)?;
        let taken_at = NaiveDateTime::parse_from_str(stamp, STAMP_FORMAT)
            .ok()?
            .and_utc();
        let note = match &body[STAMP_LEN..] {
            "" => None,
            rest => {
                let note = rest.strip_prefix('_')?;
                if note.is_empty() || !note.chars().all(|ch| ch.is_ascii_alphanumeric() || ch == '-') {
                    return None;
                }
                Some(note.to_string())
            }
        };
        Some(Self {
            name: name.to_string(),
            taken_at,
            note,
        })
    }
}

/// Loads, saves and snapshots the CLI configuration file.
#[derive(Debug, Clone)]
pub struct ConfigManager {
    file: PathBuf,
    backups: PathBuf,
}

impl ConfigManager {
    pub fn new(file: PathBuf, backups: PathBuf) -> Self {
        Self { file, backups }
    }

    /// `config/config.json` and `config/backups/` below `base`.
    pub fn with_base_dir(base: PathBuf) -> Result<Self, ConfigError> {
        let dir = base.join("config");
        let manager = Self::new(dir.join("config.json"), dir.join("backups"));
        fs::create_dir_all(&manager.backups)?;
        Ok(manager)
    }

    /// The stored configuration, or defaults when nothing was saved yet.
    pub fn load(&self) -> Result<Config, ConfigError> {
        match fs::read_to_string(&self.file) {
            Ok(text) => decode(&text),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Config::default()),
            Err(err) => Err(err.into()),
        }
    }

    pub fn save(&self, config: &Config) -> Result<(), ConfigError> {
        replace_file(&self.file, &encode(config)?)
    }

    /// Snapshots `config` and returns the new backup's file name.
    pub fn backup(&self, config: &Config, note: Option<&str>) -> Result<String, ConfigError> {
        let taken_at = Utc::now();
        let note = note.and_then(slug);
        let mut backup = ConfigBackup::new(taken_at, note.clone());
        // Same-second snapshots get a counter instead of overwriting each other.
        for attempt in 2.. {
            if !self.backups.join(&backup.name).exists() {
                break;
            }
            let counted = match &note {
                Some(note) => format!("{note}-{attempt}"),
                None => attempt.to_string(),
            };
            backup = ConfigBackup::new(taken_at, Some(counted));
        }
        replace_file(&self.backups.join(&backup.name), &encode(config)?)?;
        Ok(backup.name)
    }

    /// Makes the named backup the active configuration and returns it.
    pub fn restore(&self, name: &str) -> Result<Config, ConfigError> {
        let missing = || ConfigError::BackupNotFound(name.to_string());
        let backup = ConfigBackup::parse(name).ok_or_else(missing)?;
        let text = match fs::read_to_string(self.backups.join(&backup.name)) {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Err(missing()),
            Err(err) => return Err(err.into()),
        };
        let config = decode(&text)?;
        self.save(&config)?;
        Ok(config)
    }

    /// Stored backups, newest first.
    pub fn list_backups(&self) -> Result<Vec<ConfigBackup>, ConfigError> {
        let entries = match fs::read_dir(&self.backups) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };
        let mut backups = Vec::new();
        for entry in entries {
            let entry = entry?;
            if let Some(backup) = entry.file_name().to_str().and_then(ConfigBackup::parse) {
                backups.push(backup);
            }
        }
        backups.sort_by(|a, b| b.taken_at.cmp(&a.taken_at).then_with(|| b.name.cmp(&a.name)));
        Ok(backups)
    }
}

/// Lowercase ASCII words joined by single dashes; `None` when nothing usable remains.
fn slug(note: &str) -> Option<String> {
    let words: Vec<String> = note
        .split(|ch: char| !ch.is_ascii_alphanumeric())
        .filter(|word| !word.is_empty())
        .map(str::to_ascii_lowercase)
        .collect();
    (!words.is_empty()).then(|| words.join("-"))
}

fn decode(text: &str) -> Result<Config, ConfigError> {
    serde_json::from_str(text).map_err(|err| ConfigError::Serde(err.to_string()))
}

fn encode(config: &Config) -> Result<String, ConfigError> {
    serde_json::to_string_pretty(config).map_err(|err| ConfigError::Serde(err.to_string()))
}

/// Writes next to `path` and renames over it, so readers never see a partial file.
fn replace_file(path: &Path, contents: &str) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut staging = path.as_os_str().to_owned();
    staging.push(".tmp");
    let staging = PathBuf::from(staging);
    {
        let mut file = fs::File::create(&staging)?;
        file.write_all(contents.as_bytes())?;
        file.sync_all()?;
    }
    fs::rename(&staging, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn backup_names_parse_with_and_without_note() {
        let taken_at = Utc.with_ymd_and_hms(2024, 3, 1, 8, 15, 30).unwrap();
        let plain = ConfigBackup::new(taken_at, None);
        assert_eq!(plain.name, "config_20240301T081530Z.json");
        assert_eq!(ConfigBackup::parse(&plain.name), Some(plain));

        let noted = ConfigBackup::parse("config_20240301T081530Z_pre-upgrade.json").unwrap();
        assert_eq!(noted.taken_at, taken_at);
        assert_eq!(noted.note.as_deref(), Some("pre-upgrade"));

        assert_eq!(ConfigBackup::parse("notes.json"), None);
        assert_eq!(ConfigBackup::parse("config_20240301T081530Zx.json"), None);
        assert_eq!(ConfigBackup::parse("config_../../etc/passwd.json"), None);
        assert_eq!(ConfigBackup::parse("config_20240301T081530Z_../x.json"), None);
    }

    #[test]
    fn notes_are_slugged() {
        assert_eq!(slug(" Pre  Upgrade! "), Some("pre-upgrade".into()));
        assert_eq!(slug("v1.2_final"), Some("v1-2-final".into()));
        assert_eq!(slug("!!"), None);
    }
}
