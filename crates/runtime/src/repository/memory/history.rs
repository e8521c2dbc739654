//! In-memory HistoryRepository implementation.

use std::sync::RwLock;

use crate::repository::{HistoryRecord, HistoryRepository, RepositoryError, Result};

/// History kept for the lifetime of the process.
#[derive(Default)]
pub struct InMemoryHistory {
    records: RwLock<Vec<HistoryRecord>>,
}

impl InMemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }
}

impl HistoryRepository for InMemoryHistory {
    fn append(&self, record: &HistoryRecord) -> Result<()> {
        let mut records = self
            .records
            .write()
            .map_err(|_| RepositoryError::LockPoisoned)?;
        records.push(record.clone());
        Ok(())
    }

    fn list(&self) -> Result<Vec<HistoryRecord>> {
        let records = self
            .records
            .read()
            .map_err(|_| RepositoryError::LockPoisoned)?;
        Ok(records.clone())
    }

    fn clear(&self) -> Result<()> {
        self.records
            .write()
            .map_err(|_| RepositoryError::LockPoisoned)?
            .clear();
        Ok(())
    }

    fn len(&self) -> Result<usize> {
        let records = self
            .records
            .read()
            .map_err(|_| RepositoryError::LockPoisoned)?;
        Ok(records.len())
    }
}
