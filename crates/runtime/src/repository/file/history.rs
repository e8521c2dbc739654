//! File-based HistoryRepository implementation.

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::repository::{HistoryRecord, HistoryRepository, RepositoryError, Result};

const HISTORY_FILE_NAME: &str = "history.jsonl";

/// History stored as one JSON object per line.
///
/// Appends never rewrite earlier lines, so a crash mid-write can at worst
/// truncate the last record. Reading reports such a line as corrupted data
/// instead of silently dropping it.
pub struct FileHistory {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileHistory {
    /// Open (or lazily create) the history file at `path`.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        Ok(Self {
            path,
            write_lock: Mutex::new(()),
        })
    }

    /// History file under the platform data directory.
    pub fn default_location() -> Result<PathBuf> {
        let dirs = directories::ProjectDirs::from("", "", "teraverse")
            .ok_or(RepositoryError::NoDataDir)?;
        Ok(dirs.data_dir().join(HISTORY_FILE_NAME))
    }

    pub fn open_default() -> Result<Self> {
        Self::new(Self::default_location()?)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl HistoryRepository for FileHistory {
    fn append(&self, record: &HistoryRecord) -> Result<()> {
        let mut line =
            serde_json::to_string(record).map_err(|e| RepositoryError::Json(e.to_string()))?;
        line.push('\n');

        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| RepositoryError::LockPoisoned)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(line.as_bytes())?;
        file.flush()?;

        tracing::debug!("Appended history record to {}", self.path.display());
        Ok(())
    }

    fn list(&self) -> Result<Vec<HistoryRecord>> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut records = Vec::new();
        for (index, line) in BufReader::new(file).lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let record = serde_json::from_str(&line).map_err(|e| {
                RepositoryError::CorruptedData(format!(
                    "{} line {}: {e}",
                    self.path.display(),
                    index + 1
                ))
            })?;
            records.push(record);
        }
        Ok(records)
    }

    fn clear(&self) -> Result<()> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| RepositoryError::LockPoisoned)?;
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn record(dungeon_id: u32, enemies: u32) -> HistoryRecord {
        HistoryRecord {
            dungeon_id,
            dungeon_name: format!("Dungeon {dungeon_id}"),
            juiced: false,
            enemies_defeated: enemies,
            completed: false,
            item_changes: BTreeMap::from([(7, 2), (9, -1)]),
            provider: "random".into(),
            recorded_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn records_survive_reopening() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("history.jsonl");

        let history = FileHistory::new(&path).unwrap();
        assert!(history.is_empty().unwrap());
        history.append(&record(1, 3)).unwrap();
        history.append(&record(2, 0)).unwrap();

        let reopened = FileHistory::new(&path).unwrap();
        let records = reopened.list().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].enemies_defeated, 3);
        assert_eq!(records[1].dungeon_id, 2);
        assert_eq!(records[0].item_changes.get(&9), Some(&-1));
    }

    #[test]
    fn clear_removes_everything() {
        let dir = tempfile::tempdir().unwrap();
        let history = FileHistory::new(dir.path().join("history.jsonl")).unwrap();
        history.append(&record(1, 1)).unwrap();

        history.clear().unwrap();
        assert!(history.list().unwrap().is_empty());
        // Clearing twice is harmless.
        history.clear().unwrap();
    }

    #[test]
    fn truncated_line_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.jsonl");
        let history = FileHistory::new(&path).unwrap();
        history.append(&record(1, 1)).unwrap();
        fs::write(&path, "{\"dungeon_id\": 1, \"dung").unwrap();

        assert!(matches!(
            history.list(),
            Err(RepositoryError::CorruptedData(_))
        ));
    }
}
