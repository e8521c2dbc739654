//! Persisted record types.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Summary of one finished run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub dungeon_id: u32,
    pub dungeon_name: String,
    pub juiced: bool,
    /// Rooms cleared before the run ended.
    pub enemies_defeated: u32,
    /// `true` when the run was finished rather than lost.
    pub completed: bool,
    /// Net item changes over the whole run, keyed by item id.
    #[serde(default)]
    pub item_changes: BTreeMap<u32, i64>,
    /// Decision provider in charge when the run ended.
    pub provider: String,
    pub recorded_at: DateTime<Utc>,
}
