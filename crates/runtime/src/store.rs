//! Explicitly owned session state.
//!
//! [`SessionStore`] holds the latest server snapshots (run, energy,
//! claimables, catalog, day progress) plus local bookkeeping for the run in
//! progress. Orchestrators share one store through cheap clones; readers get
//! owned copies and never hold a lock across an `.await`.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use client_api_core::{
    ClaimableObject, DayProgress, DungeonInfo, EnergyState, ItemDelta, RunState,
};

/// Local bookkeeping for the run being played.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunContext {
    pub entity_id: Option<String>,
    pub dungeon_id: u32,
    pub dungeon_name: String,
    pub juiced: bool,
    /// Net item changes merged from every accepted move.
    pub item_changes: BTreeMap<u32, i64>,
    /// Set once a history record has been written for this run.
    pub history_recorded: bool,
}

impl RunContext {
    pub fn new(
        entity_id: Option<String>,
        dungeon_id: u32,
        dungeon_name: impl Into<String>,
        juiced: bool,
    ) -> Self {
        Self {
            entity_id,
            dungeon_id,
            dungeon_name: dungeon_name.into(),
            juiced,
            item_changes: BTreeMap::new(),
            history_recorded: false,
        }
    }

    fn merge(&mut self, deltas: &[ItemDelta]) {
        for delta in deltas {
            let entry = self.item_changes.entry(delta.item_id).or_default();
            *entry += delta.amount;
            if *entry == 0 {
                self.item_changes.remove(&delta.item_id);
            }
        }
    }
}

#[derive(Debug, Default)]
struct SessionData {
    run: Option<RunState>,
    energy: Option<EnergyState>,
    claimables: Vec<ClaimableObject>,
    dungeons: Vec<DungeonInfo>,
    progress: DayProgress,
    context: Option<RunContext>,
    last_error: Option<String>,
}

#[derive(Clone, Default)]
pub struct SessionStore {
    data: Arc<RwLock<SessionData>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    // Poisoning is ignored: every write replaces whole values.
    fn read(&self) -> RwLockReadGuard<'_, SessionData> {
        self.data.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, SessionData> {
        self.data.write().unwrap_or_else(PoisonError::into_inner)
    }

    // ------------------------------------------------------------------
    // Run
    // ------------------------------------------------------------------

    pub fn run(&self) -> Option<RunState> {
        self.read().run.clone()
    }

    /// Replace the run snapshot with a server answer.
    ///
    /// A run the context does not know about (resumed after a restart, or
    /// started elsewhere) gets a fresh context named from the catalog.
    pub fn set_run(&self, run: Option<RunState>) {
        let mut data = self.write();
        if let Some(active) = run.as_ref().filter(|r| r.is_active()) {
            let known = data
                .context
                .as_ref()
                .is_some_and(|ctx| ctx.entity_id == active.entity_id);
            if !known {
                let name = data
                    .dungeons
                    .iter()
                    .find(|d| d.id == active.dungeon_id)
                    .map(DungeonInfo::display_name)
                    .unwrap_or_else(|| format!("Dungeon #{}", active.dungeon_id));
                // Run state carries no mode; adopted runs are recorded as not juiced.
                data.context = Some(RunContext::new(
                    active.entity_id.clone(),
                    active.dungeon_id,
                    name,
                    false,
                ));
            }
        }
        data.run = run;
    }

    /// Start bookkeeping for a freshly started run.
    pub fn begin_run(&self, context: RunContext, run: RunState) {
        let mut data = self.write();
        data.context = Some(context);
        data.run = Some(run);
    }

    pub fn run_context(&self) -> Option<RunContext> {
        self.read().context.clone()
    }

    pub fn merge_item_deltas(&self, deltas: &[ItemDelta]) {
        if deltas.is_empty() {
            return;
        }
        if let Some(context) = self.write().context.as_mut() {
            context.merge(deltas);
        }
    }

    /// Net item changes of the current run.
    pub fn item_changes(&self) -> BTreeMap<u32, i64> {
        self.read()
            .context
            .as_ref()
            .map(|ctx| ctx.item_changes.clone())
            .unwrap_or_default()
    }

    /// Claim the right to write this run's history record.
    ///
    /// Returns the context the first time it is called for a run, and
    /// `None` afterwards.
    pub fn take_history_slot(&self) -> Option<RunContext> {
        let mut data = self.write();
        let context = data.context.as_mut()?;
        if context.history_recorded {
            return None;
        }
        context.history_recorded = true;
        Some(context.clone())
    }

    // ------------------------------------------------------------------
    // Energy, claimables, catalog
    // ------------------------------------------------------------------

    pub fn energy(&self) -> Option<EnergyState> {
        self.read().energy
    }

    pub fn set_energy(&self, energy: EnergyState) {
        self.write().energy = Some(energy);
    }

    pub fn claimables(&self) -> Vec<ClaimableObject> {
        self.read().claimables.clone()
    }

    pub fn set_claimables(&self, objects: Vec<ClaimableObject>) {
        self.write().claimables = objects;
    }

    pub fn dungeons(&self) -> Vec<DungeonInfo> {
        self.read().dungeons.clone()
    }

    pub fn dungeon(&self, id: u32) -> Option<DungeonInfo> {
        self.read().dungeons.iter().find(|d| d.id == id).cloned()
    }

    pub fn set_dungeons(&self, dungeons: Vec<DungeonInfo>) {
        self.write().dungeons = dungeons;
    }

    pub fn day_progress(&self) -> DayProgress {
        self.read().progress.clone()
    }

    pub fn runs_used(&self, dungeon_id: u32) -> u32 {
        self.read().progress.get(&dungeon_id).copied().unwrap_or(0)
    }

    pub fn set_day_progress(&self, progress: DayProgress) {
        self.write().progress = progress;
    }

    /// Count runs locally until the next progress refresh.
    pub fn bump_progress(&self, dungeon_id: u32, runs: u32) {
        *self.write().progress.entry(dungeon_id).or_default() += runs;
    }

    // ------------------------------------------------------------------
    // Errors
    // ------------------------------------------------------------------

    /// Most recent failure message of any operation.
    pub fn last_error(&self) -> Option<String> {
        self.read().last_error.clone()
    }

    pub fn set_last_error(&self, message: impl Into<String>) {
        self.write().last_error = Some(message.into());
    }

    pub fn clear_last_error(&self) {
        self.write().last_error = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delta(item_id: u32, amount: i64) -> ItemDelta {
        ItemDelta { item_id, amount }
    }

    #[test]
    fn item_deltas_accumulate_and_cancel() {
        let store = SessionStore::new();
        let run = RunState::new("run-1", 1, 10);
        store.begin_run(RunContext::new(run.entity_id.clone(), 1, "Crypt", false), run);

        store.merge_item_deltas(&[delta(5, 2), delta(6, 1)]);
        store.merge_item_deltas(&[delta(5, 3), delta(6, -1)]);

        assert_eq!(store.item_changes(), BTreeMap::from([(5, 5)]));
    }

    #[test]
    fn adopted_run_is_recorded_as_not_juiced() {
        let store = SessionStore::new();
        store.set_run(Some(RunState::new("run-7", 3, 10)));

        let context = store.run_context().unwrap();
        assert_eq!(context.dungeon_id, 3);
        assert_eq!(context.dungeon_name, "Dungeon #3");
        assert!(!context.juiced);

        // A run started by this session keeps its mode across refreshes.
        let run = RunState::new("run-8", 3, 10);
        store.begin_run(RunContext::new(run.entity_id.clone(), 3, "Crypt", true), run.clone());
        store.set_run(Some(run));
        assert!(store.run_context().unwrap().juiced);
    }

    #[test]
    fn history_slot_is_handed_out_once_per_run() {
        let store = SessionStore::new();
        assert!(store.take_history_slot().is_none());

        let run = RunState::new("run-1", 1, 10);
        store.begin_run(RunContext::new(run.entity_id.clone(), 1, "Crypt", true), run);
        let slot = store.take_history_slot().unwrap();
        assert!(slot.juiced);
        assert!(store.take_history_slot().is_none());

        let next = RunState::new("run-2", 1, 10);
        store.begin_run(RunContext::new(next.entity_id.clone(), 1, "Crypt", false), next);
        assert!(store.take_history_slot().is_some());
    }

    #[test]
    fn unknown_runs_get_a_catalog_named_context() {
        let store = SessionStore::new();
        store.set_dungeons(vec![DungeonInfo {
            id: 3,
            name: "Underhalls".into(),
            energy_cost: 40,
            max_runs_per_day: 10,
            juiced_max_runs_per_day: 30,
        }]);

        store.set_run(Some(RunState::new("run-7", 3, 10)));
        let context = store.run_context().unwrap();
        assert_eq!(context.dungeon_name, "Underhalls");
        assert_eq!(context.entity_id.as_deref(), Some("run-7"));

        // Same run again keeps accumulated bookkeeping.
        store.merge_item_deltas(&[delta(1, 1)]);
        store.set_run(Some(RunState::new("run-7", 3, 8)));
        assert_eq!(store.item_changes(), BTreeMap::from([(1, 1)]));

        // Clearing the run keeps the context for history.
        store.set_run(None);
        assert!(store.run().is_none());
        assert!(store.run_context().is_some());
    }

    #[test]
    fn progress_bumps_are_local() {
        let store = SessionStore::new();
        store.set_day_progress(DayProgress::from([(1, 2)]));
        store.bump_progress(1, 3);
        store.bump_progress(4, 1);
        assert_eq!(store.runs_used(1), 5);
        assert_eq!(store.runs_used(4), 1);
        assert_eq!(store.runs_used(9), 0);
    }
}
