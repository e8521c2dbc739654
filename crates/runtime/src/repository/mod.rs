//! Repository layer for run history.
//!
//! Finished runs are summarized into [`HistoryRecord`]s and appended to a
//! [`HistoryRepository`]: in memory for tests and throwaway sessions, or a
//! JSON-lines file that survives restarts. [`RunStats`] aggregates the
//! records per dungeon and decision provider.

mod error;
mod file;
mod memory;
mod stats;
mod traits;
mod types;

pub use error::{RepositoryError, Result};
pub use file::FileHistory;
pub use memory::InMemoryHistory;
pub use stats::{DungeonStats, ProviderStats, RunStats};
pub use traits::HistoryRepository;
pub use types::HistoryRecord;
