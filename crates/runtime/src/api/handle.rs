//! Cloneable façade over the runtime's components.
//!
//! [`RuntimeHandle`] is what a UI or CLI holds: it forwards operations to
//! the orchestrators and the energy scheduler, and exposes read-only
//! snapshots of the session store.
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use client_api_core::{
    ActionToken, ClaimCategory, ClaimableObject, DayProgress, DungeonInfo, EnergyState, Move,
    RunState,
};

use super::errors::{Result, RuntimeError};
use super::providers::{DecisionProvider, ProviderChoice};
use crate::context::ApiContext;
use crate::energy::{EnergyScheduler, SchedulerState};
use crate::events::{Event, Topic};
use crate::orchestrator::{
    ClaimOrchestrator, ClaimReport, ClaimTotals, LoopReport, RunOrchestrator,
};
use crate::repository::{HistoryRecord, HistoryRepository, RunStats};
use crate::store::RunContext;
use crate::token::ActionTokenTracker;

/// Client-facing handle to interact with the runtime
#[derive(Clone)]
pub struct RuntimeHandle {
    ctx: ApiContext,
    tokens: Arc<ActionTokenTracker>,
    energy: EnergyScheduler,
    runs: RunOrchestrator,
    claims: ClaimOrchestrator,
    history: Arc<dyn HistoryRepository>,
    auto_play_task: Arc<Mutex<Option<JoinHandle<LoopReport>>>>,
}

impl RuntimeHandle {
    pub(crate) fn new(
        ctx: ApiContext,
        tokens: Arc<ActionTokenTracker>,
        energy: EnergyScheduler,
        runs: RunOrchestrator,
        claims: ClaimOrchestrator,
        history: Arc<dyn HistoryRepository>,
    ) -> Self {
        Self {
            ctx,
            tokens,
            energy,
            runs,
            claims,
            history,
            auto_play_task: Arc::new(Mutex::new(None)),
        }
    }

    pub fn address(&self) -> &str {
        &self.ctx.address
    }

    // ------------------------------------------------------------------
    // Loading
    // ------------------------------------------------------------------

    /// Initial sync: catalog, day progress, run and claimables, then start
    /// the energy timer.
    ///
    /// Every fetch is attempted; the first failure is returned.
    pub async fn load(&self) -> Result<()> {
        let (catalog, progress, run, claimables) = tokio::join!(
            self.refresh_catalog(),
            self.refresh_day_progress(),
            self.runs.refresh_run_state(),
            self.claims.refresh_claimables(),
        );
        self.energy.start();

        catalog?;
        progress?;
        run?;
        claimables?;
        Ok(())
    }

    /// Re-fetch everything the store holds.
    pub async fn refresh_all(&self) -> Result<()> {
        let (catalog, progress, run, claimables, energy) = tokio::join!(
            self.refresh_catalog(),
            self.refresh_day_progress(),
            self.runs.refresh_run_state(),
            self.claims.refresh_claimables(),
            self.energy.refresh(),
        );

        catalog?;
        progress?;
        run?;
        claimables?;
        energy?;
        Ok(())
    }

    pub async fn refresh_catalog(&self) -> Result<Vec<DungeonInfo>> {
        let ctx = &self.ctx;
        let dungeons = ctx
            .call(ctx.api.get_today_dungeons())
            .await
            .map_err(|e| ctx.note_error(e))?;
        ctx.store.set_dungeons(dungeons.clone());
        Ok(dungeons)
    }

    pub async fn refresh_day_progress(&self) -> Result<DayProgress> {
        let ctx = &self.ctx;
        let progress = ctx
            .call(ctx.api.get_day_progress(&ctx.address))
            .await
            .map_err(|e| ctx.note_error(e))?;
        ctx.store.set_day_progress(progress.clone());
        Ok(progress)
    }

    pub async fn refresh_run_state(&self) -> Result<Option<RunState>> {
        self.runs.refresh_run_state().await
    }

    pub async fn refresh_claimables(&self) -> Result<Vec<ClaimableObject>> {
        self.claims.refresh_claimables().await
    }

    // ------------------------------------------------------------------
    // Energy
    // ------------------------------------------------------------------

    pub fn start_energy_timer(&self) {
        self.energy.start();
    }

    pub fn stop_energy_timer(&self) {
        self.energy.stop();
    }

    pub async fn refresh_energy(&self) -> Result<EnergyState> {
        self.energy.refresh().await
    }

    pub fn energy_scheduler_state(&self) -> SchedulerState {
        self.energy.state()
    }

    pub fn armed_energy_timers(&self) -> usize {
        self.energy.armed_timers()
    }

    // ------------------------------------------------------------------
    // Runs
    // ------------------------------------------------------------------

    pub async fn start_run(&self, dungeon_id: u32, juiced: bool) -> Result<RunState> {
        self.runs.start_run(dungeon_id, juiced).await
    }

    /// Submit one move by hand, then check whether it ended the run.
    pub async fn play_move(&self, mv: Move) -> Result<Option<RunState>> {
        let run = self.runs.play_move(mv).await?;
        if run.as_ref().is_some_and(RunState::is_over) {
            self.runs.check_run_over_and_refresh().await;
        }
        Ok(run)
    }

    pub async fn recommended_move(&self) -> Option<Move> {
        self.runs.recommend_move().await
    }

    /// Enable auto-play and spawn its loop.
    ///
    /// Returns `false` when auto-play was already on.
    pub fn start_auto_play(&self) -> bool {
        if self.runs.is_auto_play_enabled() {
            return false;
        }
        let task = self.runs.spawn_auto_play();
        *self
            .auto_play_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(task);
        true
    }

    pub fn stop_auto_play(&self) {
        self.runs.disable_auto_play();
    }

    pub fn is_auto_play_enabled(&self) -> bool {
        self.runs.is_auto_play_enabled()
    }

    /// Wait for the most recently spawned auto-play loop to return.
    pub async fn wait_auto_play(&self) -> Result<Option<LoopReport>> {
        let task = self
            .auto_play_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match task {
            Some(task) => Ok(Some(task.await.map_err(RuntimeError::WorkerJoin)?)),
            None => Ok(None),
        }
    }

    /// Swap the decision provider; auto-play is turned off.
    pub fn set_provider(&self, provider: Arc<dyn DecisionProvider>) {
        self.runs.set_provider(provider);
    }

    pub fn set_provider_choice(&self, choice: ProviderChoice) {
        self.runs.set_provider(choice.build());
    }

    pub fn provider_name(&self) -> String {
        self.runs.provider().name().to_string()
    }

    // ------------------------------------------------------------------
    // Claims
    // ------------------------------------------------------------------

    pub async fn claim_all(&self, category: ClaimCategory) -> Result<ClaimReport> {
        self.claims.claim_all(category).await
    }

    pub fn is_claiming(&self) -> bool {
        self.claims.is_busy()
    }

    // ------------------------------------------------------------------
    // Snapshots
    // ------------------------------------------------------------------

    pub fn run_state(&self) -> Option<RunState> {
        self.ctx.store.run()
    }

    pub fn run_context(&self) -> Option<RunContext> {
        self.ctx.store.run_context()
    }

    /// Net item changes of the current run.
    pub fn item_changes(&self) -> BTreeMap<u32, i64> {
        self.ctx.store.item_changes()
    }

    pub fn energy(&self) -> Option<EnergyState> {
        self.ctx.store.energy()
    }

    pub fn claimables(&self) -> Vec<ClaimableObject> {
        self.ctx.store.claimables()
    }

    pub fn claim_totals(&self) -> ClaimTotals {
        ClaimTotals::from_objects(&self.ctx.store.claimables())
    }

    pub fn dungeons(&self) -> Vec<DungeonInfo> {
        self.ctx.store.dungeons()
    }

    pub fn day_progress(&self) -> DayProgress {
        self.ctx.store.day_progress()
    }

    pub fn action_token(&self) -> Option<ActionToken> {
        self.tokens.current()
    }

    pub fn last_error(&self) -> Option<String> {
        self.ctx.store.last_error()
    }

    // ------------------------------------------------------------------
    // Events and history
    // ------------------------------------------------------------------

    /// Subscribe to events from a specific topic
    ///
    /// # Topics
    ///
    /// - `Topic::Run` - Run lifecycle and auto-play progress
    /// - `Topic::Energy` - Energy refreshes and timer activity
    /// - `Topic::Claim` - Claim batches
    /// - `Topic::History` - Appended history records
    pub fn subscribe(&self, topic: Topic) -> broadcast::Receiver<Event> {
        self.ctx.bus.subscribe(topic)
    }

    pub fn subscribe_multiple(&self, topics: &[Topic]) -> HashMap<Topic, broadcast::Receiver<Event>> {
        self.ctx.bus.subscribe_multiple(topics)
    }

    pub fn history(&self) -> Result<Vec<HistoryRecord>> {
        Ok(self.history.list()?)
    }

    /// Recorded runs grouped per dungeon and decision provider.
    pub fn run_stats(&self) -> Result<RunStats> {
        Ok(RunStats::from_records(&self.history.list()?))
    }

    pub fn clear_history(&self) -> Result<()> {
        Ok(self.history.clear()?)
    }

    pub fn history_repository(&self) -> &dyn HistoryRepository {
        self.history.as_ref()
    }

    // ------------------------------------------------------------------
    // Shutdown
    // ------------------------------------------------------------------

    pub(crate) async fn shutdown(&self) -> Result<()> {
        self.runs.disable_auto_play();
        self.wait_auto_play().await?;
        self.energy.shutdown().await
    }
}
