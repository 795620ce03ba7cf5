use std::{
    cmp::Reverse,
    fs::{self, File},
    io::Write,
    path::{Path, PathBuf},
};

use chrono::{DateTime, NaiveDateTime, Utc};
use circle_core::{
    store::{CircleLog, CircleWork, EventQuery, EventStore},
    CoreError, CoreResult, MemoryEventStore,
};
use circle_domain::{Circle, LedgerEvent};
use tracing::{debug, info};
use uuid::Uuid;

const FILE_EXTENSION: &str = "json";
const BACKUP_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M";
const TMP_SUFFIX: &str = "tmp";
const DEFAULT_RETENTION: usize = 5;

/// Directories used by [`JsonEventStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoragePaths {
    pub circle_root: PathBuf,
    pub backup_root: PathBuf,
}

impl StoragePaths {
    /// `circles/` and `backups/` below `root`.
    pub fn under(root: &Path) -> Self {
        Self {
            circle_root: root.join("circles"),
            backup_root: root.join("backups"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircleBackupInfo {
    pub circle_id: Uuid,
    pub id: String,
    pub created_at: Option<DateTime<Utc>>,
    pub path: PathBuf,
}

/// Filesystem-backed event store: one JSON document per circle holding its full
/// [`CircleLog`]. Every committed unit of work rewrites the document atomically and
/// rotates the previous version into the circle's backup directory.
#[derive(Debug)]
pub struct JsonEventStore {
    paths: StoragePaths,
    retention: usize,
    inner: MemoryEventStore,
}

impl JsonEventStore {
    pub fn open(paths: StoragePaths) -> CoreResult<Self> {
        Self::with_retention(paths, DEFAULT_RETENTION)
    }

    pub fn with_retention(paths: StoragePaths, retention: usize) -> CoreResult<Self> {
        fs::create_dir_all(&paths.circle_root)?;
        fs::create_dir_all(&paths.backup_root)?;
        let store = Self {
            paths,
            retention: retention.max(1),
            inner: MemoryEventStore::new(),
        };
        let loaded = store.load_all()?;
        info!(
            circles = loaded,
            root = %store.paths.circle_root.display(),
            "opened json event store"
        );
        Ok(store)
    }

    pub fn paths(&self) -> &StoragePaths {
        &self.paths
    }

    pub fn circle_path(&self, circle_id: Uuid) -> PathBuf {
        self.paths
            .circle_root
            .join(format!("{}.{}", circle_id, FILE_EXTENSION))
    }

    /// Writes a labelled copy of the circle's current log into its backup directory.
    pub fn backup_circle(&self, circle_id: Uuid, note: Option<&str>) -> CoreResult<CircleBackupInfo> {
        let log = self.inner.snapshot(circle_id)?;
        let dir = self.backup_dir(circle_id);
        fs::create_dir_all(&dir)?;
        let timestamp = Utc::now().format(BACKUP_TIMESTAMP_FORMAT).to_string();
        let mut stem = format!("{}_{}", circle_id, timestamp);
        if let Some(label) = sanitize_backup_note(note) {
            stem.push('_');
            stem.push_str(&label);
        }
        let file_name = format!("{}.{}", stem, FILE_EXTENSION);
        let path = dir.join(&file_name);
        write_atomic(&path, &serialize_log(&log)?)?;
        self.prune_backups(circle_id)?;
        Ok(CircleBackupInfo {
            circle_id,
            created_at: parse_backup_timestamp(circle_id, &file_name),
            id: file_name,
            path,
        })
    }

    /// Backups of a circle, newest first.
    pub fn list_backups(&self, circle_id: Uuid) -> CoreResult<Vec<CircleBackupInfo>> {
        let dir = self.backup_dir(circle_id);
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut entries = Vec::new();
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(FILE_EXTENSION) {
                continue;
            }
            if let Some(file_name) = path.file_name().and_then(|name| name.to_str()) {
                entries.push(CircleBackupInfo {
                    circle_id,
                    id: file_name.to_string(),
                    created_at: parse_backup_timestamp(circle_id, file_name),
                    path: path.clone(),
                });
            }
        }
        entries.sort_by(|a, b| {
            Reverse(a.created_at)
                .cmp(&Reverse(b.created_at))
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(entries)
    }

    /// Replaces the live log of the backup's circle with the backed-up one.
    pub fn restore_backup(&self, backup: &CircleBackupInfo) -> CoreResult<CircleLog> {
        if !backup.path.exists() {
            return Err(CoreError::Storage(format!(
                "backup `{}` not found",
                backup.id
            )));
        }
        let log = load_log_from_path(&backup.path)?;
        if log.circle.id != backup.circle_id {
            return Err(CoreError::Storage(format!(
                "backup `{}` belongs to circle {}",
                backup.id, log.circle.id
            )));
        }
        let replaced = self.inner.write_circle_with(
            log.circle.id,
            &mut |live: &mut CircleLog| {
                *live = log.clone();
                Ok(())
            },
            |staged| self.persist(staged),
        );
        match replaced {
            Err(CoreError::CircleNotFound(_)) => {
                self.persist(&log)?;
                self.inner.load(log.clone())?;
            }
            other => other?,
        }
        info!(circle = %backup.circle_id, backup = %backup.id, "restored circle backup");
        Ok(log)
    }

    fn load_all(&self) -> CoreResult<usize> {
        let mut loaded = 0;
        for entry in fs::read_dir(&self.paths.circle_root)? {
            let path = entry?.path();
            if !path.is_file() {
                continue;
            }
            if path.extension().and_then(|ext| ext.to_str()) != Some(FILE_EXTENSION) {
                continue;
            }
            let log = load_log_from_path(&path)?;
            debug!(circle = %log.circle.id, events = log.events.len(), "loaded circle log");
            self.inner.load(log)?;
            loaded += 1;
        }
        Ok(loaded)
    }

    fn persist(&self, log: &CircleLog) -> CoreResult<()> {
        let path = self.circle_path(log.circle.id);
        if path.exists() {
            self.backup_existing_file(log.circle.id, &path)?;
        }
        save_log_to_path(log, &path)
    }

    fn backup_dir(&self, circle_id: Uuid) -> PathBuf {
        self.paths.backup_root.join(circle_id.to_string())
    }

    fn backup_existing_file(&self, circle_id: Uuid, path: &Path) -> CoreResult<()> {
        let dir = self.backup_dir(circle_id);
        fs::create_dir_all(&dir)?;
        let timestamp = Utc::now().format(BACKUP_TIMESTAMP_FORMAT).to_string();
        let file_name = format!("{}_{}.{}", circle_id, timestamp, FILE_EXTENSION);
        fs::copy(path, dir.join(file_name))?;
        self.prune_backups(circle_id)
    }

    fn prune_backups(&self, circle_id: Uuid) -> CoreResult<()> {
        for entry in self.list_backups(circle_id)?.into_iter().skip(self.retention) {
            let _ = fs::remove_file(entry.path);
        }
        Ok(())
    }
}

impl EventStore for JsonEventStore {
    fn circles(&self) -> CoreResult<Vec<Circle>> {
        self.inner.circles()
    }

    fn circle(&self, id: Uuid) -> CoreResult<Circle> {
        self.inner.circle(id)
    }

    fn insert_circle(&self, circle: Circle) -> CoreResult<()> {
        self.inner.insert_circle_with(circle, |log| self.persist(log))
    }

    fn list_events(&self, query: &EventQuery) -> CoreResult<Vec<LedgerEvent>> {
        self.inner.list_events(query)
    }

    fn snapshot(&self, circle_id: Uuid) -> CoreResult<CircleLog> {
        self.inner.snapshot(circle_id)
    }

    fn write_circle(&self, circle_id: Uuid, work: &mut CircleWork<'_>) -> CoreResult<()> {
        self.inner
            .write_circle_with(circle_id, work, |log| self.persist(log))
    }
}

/// Saves a circle log to an arbitrary path on disk.
pub fn save_log_to_path(log: &CircleLog, path: &Path) -> CoreResult<()> {
    let tmp = tmp_path(path);
    write_atomic(&tmp, &serialize_log(log)?)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

/// Loads a circle log from the provided filesystem path.
pub fn load_log_from_path(path: &Path) -> CoreResult<CircleLog> {
    let data = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&data)?)
}

fn sanitize_backup_note(note: Option<&str>) -> Option<String> {
    let raw = note?.trim();
    let mut sanitized = String::new();
    let mut last_dash = false;
    for ch in raw.chars() {
        if ch.is_ascii_alphanumeric() {
            sanitized.push(ch.to_ascii_lowercase());
            last_dash = false;
        } else if (ch.is_whitespace() || matches!(ch, '-' | '.' | '_'))
            && !sanitized.is_empty()
            && !last_dash
        {
            sanitized.push('-');
            last_dash = true;
        }
    }
    let trimmed = sanitized.trim_matches('-');
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Reads the `%Y%m%d_%H%M` stamp that follows the circle id in a backup file name.
fn parse_backup_timestamp(circle_id: Uuid, name: &str) -> Option<DateTime<Utc>> {
    let rest = name.strip_prefix(&format!("{}_", circle_id))?;
    let stamp = rest.get(..13)?;
    NaiveDateTime::parse_from_str(stamp, BACKUP_TIMESTAMP_FORMAT)
        .ok()
        .map(|naive| DateTime::from_naive_utc_and_offset(naive, Utc))
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut tmp = path.to_path_buf();
    let ext = match path.extension().and_then(|ext| ext.to_str()) {
        Some(existing) => format!("{}.{}", existing, TMP_SUFFIX),
        None => TMP_SUFFIX.to_string(),
    };
    tmp.set_extension(ext);
    tmp
}

fn write_atomic(path: &Path, data: &str) -> CoreResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = File::create(path)?;
    file.write_all(data.as_bytes())?;
    file.sync_all()?;
    Ok(())
}

fn serialize_log(log: &CircleLog) -> CoreResult<String> {
    Ok(serde_json::to_string_pretty(log)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backup_notes_are_slugged() {
        assert_eq!(
            sanitize_backup_note(Some("  Before Reconcile!! v2.1 ")),
            Some("before-reconcile-v2-1".into())
        );
        assert_eq!(sanitize_backup_note(Some("   ")), None);
        assert_eq!(sanitize_backup_note(None), None);
    }

    #[test]
    fn backup_names_parse_with_and_without_note() {
        let id = Uuid::nil();
        let plain = format!("{id}_20240105_0930.json");
        let noted = format!("{id}_20240105_0930_before-import.json");
        let expected = NaiveDateTime::parse_from_str("20240105_0930", BACKUP_TIMESTAMP_FORMAT)
            .ok()
            .map(|naive| DateTime::from_naive_utc_and_offset(naive, Utc));
        assert!(expected.is_some());
        assert_eq!(parse_backup_timestamp(id, &plain), expected);
        assert_eq!(parse_backup_timestamp(id, &noted), expected);
        assert_eq!(parse_backup_timestamp(id, "other.json"), None);
    }
}
