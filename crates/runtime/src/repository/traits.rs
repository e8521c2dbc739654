//! Repository contract for finished-run history.

use super::error::Result;
use super::types::HistoryRecord;

/// Append-only store of [`HistoryRecord`]s, oldest first.
pub trait HistoryRepository: Send + Sync {
    fn append(&self, record: &HistoryRecord) -> Result<()>;

    fn list(&self) -> Result<Vec<HistoryRecord>>;

    /// Remove every record.
    fn clear(&self) -> Result<()>;

    fn len(&self) -> Result<usize> {
        Ok(self.list()?.len())
    }

    fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}
