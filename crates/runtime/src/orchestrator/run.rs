//! Run lifecycle and the auto-play loop.
//!
//! [`RunOrchestrator`] starts runs, submits moves under the action-token
//! lease, detects when a run is over, and writes one history record per
//! finished run. The auto-play loop asks the installed
//! [`DecisionProvider`] for each move; only one loop runs at a time.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use client_api_core::{DungeonInfo, Move, RunState};

use crate::api::{DecisionProvider, Result, RuntimeError};
use crate::config::AutoPlayConfig;
use crate::context::ApiContext;
use crate::energy::EnergyScheduler;
use crate::events::RunEvent;
use crate::repository::{HistoryRecord, HistoryRepository};
use crate::store::RunContext;
use crate::token::ActionTokenTracker;

/// Why an auto-play loop returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoopExit {
    /// The run ended or there is no run.
    RunOver,
    /// The provider had nothing to recommend.
    NoRecommendation,
    StepCapReached,
    Cancelled,
    /// Another loop was already running; this call did nothing.
    AlreadyRunning,
}

/// Summary of one auto-play loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoopReport {
    pub exit: LoopExit,
    pub submissions: u32,
    pub failed_submissions: u32,
    /// Result of the termination check made after the loop exited.
    pub run_over: bool,
}

impl LoopReport {
    fn new(exit: LoopExit) -> Self {
        Self {
            exit,
            submissions: 0,
            failed_submissions: 0,
            run_over: false,
        }
    }
}

/// Clears the running flag and wakes waiting loops when the loop exits,
/// however it exits.
struct LoopGuard<'a> {
    flag: &'a AtomicBool,
    idle: &'a Notify,
}

impl<'a> LoopGuard<'a> {
    fn acquire(flag: &'a AtomicBool, idle: &'a Notify) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| Self { flag, idle })
    }
}

impl Drop for LoopGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
        self.idle.notify_waiters();
    }
}

struct RunInner {
    ctx: ApiContext,
    tokens: Arc<ActionTokenTracker>,
    energy: EnergyScheduler,
    provider: RwLock<Arc<dyn DecisionProvider>>,
    history: Arc<dyn HistoryRepository>,
    config: AutoPlayConfig,
    running: AtomicBool,
    /// Signalled whenever a loop releases `running`.
    idle: Notify,
    /// Live while auto-play is enabled.
    auto_play: Mutex<Option<CancellationToken>>,
}

#[derive(Clone)]
pub struct RunOrchestrator {
    inner: Arc<RunInner>,
}

impl RunOrchestrator {
    pub fn new(
        ctx: ApiContext,
        tokens: Arc<ActionTokenTracker>,
        energy: EnergyScheduler,
        provider: Arc<dyn DecisionProvider>,
        history: Arc<dyn HistoryRepository>,
        config: AutoPlayConfig,
    ) -> Self {
        Self {
            inner: Arc::new(RunInner {
                ctx,
                tokens,
                energy,
                provider: RwLock::new(provider),
                history,
                config,
                running: AtomicBool::new(false),
                idle: Notify::new(),
                auto_play: Mutex::new(None),
            }),
        }
    }

    // ------------------------------------------------------------------
    // Provider
    // ------------------------------------------------------------------

    pub fn provider(&self) -> Arc<dyn DecisionProvider> {
        let provider = self
            .inner
            .provider
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&provider)
    }

    /// Swap the decision provider. Auto-play is disabled by the swap.
    pub fn set_provider(&self, provider: Arc<dyn DecisionProvider>) {
        tracing::info!(
            target: "runtime::autoplay",
            provider = provider.name(),
            "decision provider changed"
        );
        *self
            .inner
            .provider
            .write()
            .unwrap_or_else(PoisonError::into_inner) = provider;
        self.disable_auto_play();
    }

    pub async fn recommend_move(&self) -> Option<Move> {
        let run = self.inner.ctx.store.run().filter(|run| !run.is_over())?;
        self.provider().pick_action(&run).await
    }

    // ------------------------------------------------------------------
    // Auto-play switch
    // ------------------------------------------------------------------

    fn slot(&self) -> MutexGuard<'_, Option<CancellationToken>> {
        self.inner
            .auto_play
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Turn auto-play on and return the token the loop should watch.
    pub fn enable_auto_play(&self) -> CancellationToken {
        let mut slot = self.slot();
        match slot.as_ref().filter(|token| !token.is_cancelled()) {
            Some(token) => token.clone(),
            None => {
                let token = CancellationToken::new();
                *slot = Some(token.clone());
                token
            }
        }
    }

    /// Turn auto-play off. A running loop stops at its next check.
    pub fn disable_auto_play(&self) {
        if let Some(token) = self.slot().take() {
            token.cancel();
        }
    }

    pub fn is_auto_play_enabled(&self) -> bool {
        self.live_token().is_some()
    }

    pub fn is_loop_running(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }

    fn live_token(&self) -> Option<CancellationToken> {
        self.slot()
            .as_ref()
            .filter(|token| !token.is_cancelled())
            .cloned()
    }

    /// Forget `token` if it is still the installed one.
    fn retire(&self, token: &CancellationToken) {
        token.cancel();
        let mut slot = self.slot();
        if slot.as_ref().is_some_and(CancellationToken::is_cancelled) {
            *slot = None;
        }
    }

    /// Enable auto-play and drive it on a background task.
    ///
    /// If a previous loop is still winding down (auto-play was stopped and
    /// restarted during an in-flight move), the task waits for it to return
    /// and then runs its own loop, so the returned handle always reports the
    /// loop that actually played.
    pub fn spawn_auto_play(&self) -> JoinHandle<LoopReport> {
        let token = self.enable_auto_play();
        let this = self.clone();
        tokio::spawn(async move {
            loop {
                let idle = this.inner.idle.notified();
                tokio::pin!(idle);
                // Registered before the attempt so a release in between is not missed.
                idle.as_mut().enable();

                let report = this.run_loop(token.clone()).await;
                if report.exit != LoopExit::AlreadyRunning {
                    return report;
                }

                tracing::debug!(
                    target: "runtime::autoplay",
                    "waiting for the previous auto-play loop to return"
                );
                tokio::select! {
                    biased;
                    _ = token.cancelled() => return LoopReport::new(LoopExit::Cancelled),
                    _ = &mut idle => {}
                }
            }
        })
    }

    // ------------------------------------------------------------------
    // Loop
    // ------------------------------------------------------------------

    /// Play moves until the run ends, the provider has nothing to suggest,
    /// the step cap is hit, or `cancel` fires.
    ///
    /// Calling this while another loop runs returns immediately with
    /// [`LoopExit::AlreadyRunning`].
    pub async fn run_loop(&self, cancel: CancellationToken) -> LoopReport {
        let Some(_guard) = LoopGuard::acquire(&self.inner.running, &self.inner.idle) else {
            tracing::debug!(target: "runtime::autoplay", "auto-play loop already running");
            return LoopReport::new(LoopExit::AlreadyRunning);
        };

        let step_cap = self.inner.config.step_cap;
        tracing::info!(target: "runtime::autoplay", step_cap, "auto-play started");
        self.inner.ctx.bus.publish(RunEvent::AutoPlayStarted);

        let mut report = LoopReport::new(LoopExit::Cancelled);
        let mut steps_remaining = step_cap;

        report.exit = loop {
            if cancel.is_cancelled() {
                break LoopExit::Cancelled;
            }
            if steps_remaining == 0 {
                break LoopExit::StepCapReached;
            }
            steps_remaining -= 1;

            if self.check_run_over_and_refresh().await {
                break LoopExit::RunOver;
            }

            let Some(mv) = self.recommend_move().await else {
                break LoopExit::NoRecommendation;
            };
            if cancel.is_cancelled() {
                break LoopExit::Cancelled;
            }

            match self.play_move(mv).await {
                Ok(_) => report.submissions += 1,
                // Logged by play_move; the next iteration re-evaluates.
                Err(_) => report.failed_submissions += 1,
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {}
                _ = tokio::time::sleep(self.inner.config.pace) => {}
            }
        };

        report.run_over = self.finish_loop().await;
        self.retire(&cancel);

        tracing::info!(
            target: "runtime::autoplay",
            exit = ?report.exit,
            submissions = report.submissions,
            failed = report.failed_submissions,
            "auto-play stopped"
        );
        self.inner.ctx.bus.publish(RunEvent::AutoPlayStopped {
            exit: report.exit,
            submissions: report.submissions,
        });
        report
    }

    /// Final termination check against both the local and the server view.
    async fn finish_loop(&self) -> bool {
        let over_locally = self.check_run_over();
        if let Err(error) = self.refresh_run_state().await {
            tracing::warn!(target: "runtime::autoplay", %error, "final run refresh failed");
        }
        over_locally || self.check_run_over()
    }

    // ------------------------------------------------------------------
    // Termination
    // ------------------------------------------------------------------

    /// Evaluate the local run snapshot.
    ///
    /// A missing run disables auto-play. A dead or completed run also
    /// disables auto-play and records history once.
    pub fn check_run_over(&self) -> bool {
        let Some(run) = self.inner.ctx.store.run().filter(RunState::is_active) else {
            self.disable_auto_play();
            return true;
        };

        if run.player_health <= 0 || run.completed {
            self.disable_auto_play();
            self.record_history(&run);
            return true;
        }
        false
    }

    /// [`check_run_over`](Self::check_run_over), then re-fetch the run when
    /// it is over.
    pub async fn check_run_over_and_refresh(&self) -> bool {
        if !self.check_run_over() {
            return false;
        }
        if let Err(error) = self.refresh_run_state().await {
            tracing::warn!(target: "runtime::autoplay", %error, "run refresh failed");
        }
        true
    }

    fn record_history(&self, run: &RunState) {
        let ctx = &self.inner.ctx;
        let Some(context) = ctx.store.take_history_slot() else {
            return;
        };

        let record = HistoryRecord {
            dungeon_id: context.dungeon_id,
            dungeon_name: context.dungeon_name,
            juiced: context.juiced,
            enemies_defeated: run.enemies_defeated(),
            completed: run.completed,
            item_changes: context.item_changes,
            provider: self.provider().name().to_string(),
            recorded_at: Utc::now(),
        };

        tracing::info!(
            target: "runtime::autoplay",
            dungeon_id = record.dungeon_id,
            enemies_defeated = record.enemies_defeated,
            completed = record.completed,
            "run ended"
        );
        ctx.bus.publish(RunEvent::Ended {
            dungeon_id: record.dungeon_id,
            enemies_defeated: record.enemies_defeated,
        });

        if let Err(error) = self.inner.history.append(&record) {
            tracing::warn!(target: "runtime::autoplay", %error, "failed to persist run history");
            ctx.store.set_last_error(error.to_string());
        }
        ctx.bus.publish(record);
    }

    // ------------------------------------------------------------------
    // Server calls
    // ------------------------------------------------------------------

    /// Replace the local run snapshot with the server's.
    pub async fn refresh_run_state(&self) -> Result<Option<RunState>> {
        let ctx = &self.inner.ctx;
        let run = ctx
            .call(ctx.api.fetch_run_state())
            .await
            .map_err(|e| ctx.note_error(e))?;

        ctx.store.set_run(run.clone());
        ctx.bus.publish(RunEvent::StateChanged { run: run.clone() });
        Ok(run)
    }

    /// Submit one move for the active run.
    pub async fn play_move(&self, mv: Move) -> Result<Option<RunState>> {
        let ctx = &self.inner.ctx;
        let run = ctx
            .store
            .run()
            .filter(|run| !run.is_over())
            .ok_or(RuntimeError::NoActiveRun)?;

        let outcome = {
            let mut lease = self.inner.tokens.lease().await;
            match ctx
                .call(ctx.api.submit_move(mv, run.dungeon_id, lease.token()))
                .await
            {
                Ok(outcome) => {
                    lease.advance(outcome.action_token.clone());
                    outcome
                }
                Err(error) => {
                    tracing::warn!(target: "runtime::autoplay", %mv, %error, "move failed");
                    ctx.bus.publish(RunEvent::MoveFailed {
                        mv,
                        error: error.to_string(),
                    });
                    return Err(ctx.note_error(error).into());
                }
            }
        };

        ctx.store.merge_item_deltas(&outcome.item_deltas);
        ctx.store.set_run(outcome.run.clone());

        tracing::debug!(
            target: "runtime::autoplay",
            %mv,
            room = outcome.run.as_ref().map(|r| r.room_number),
            health = outcome.run.as_ref().map(|r| r.player_health),
            "move played"
        );
        ctx.bus.publish(RunEvent::MovePlayed {
            mv,
            run: outcome.run.clone(),
        });
        Ok(outcome.run)
    }

    /// Validate eligibility locally, then start a run.
    ///
    /// Refuses unknown dungeons, juiced runs on accounts that are not
    /// boosted, starts past the daily limit, and starts the current energy
    /// cannot pay for. On success the run bookkeeping is reset and energy
    /// is refreshed.
    pub async fn start_run(&self, dungeon_id: u32, juiced: bool) -> Result<RunState> {
        let ctx = &self.inner.ctx;

        if ctx.store.run().is_some_and(|run| !run.is_over()) {
            return Err(ctx.note_error(RuntimeError::RunInProgress));
        }

        let dungeon = self.find_dungeon(dungeon_id).await?;
        let energy = match ctx.store.energy() {
            Some(energy) => energy,
            None => self.inner.energy.refresh().await?,
        };
        self.check_eligibility(&dungeon, juiced, energy.boosted, energy.visible())
            .map_err(|e| ctx.note_error(e))?;

        let start = {
            let mut lease = self.inner.tokens.lease().await;
            let start = ctx
                .call(ctx.api.start_run(dungeon_id, juiced, lease.token()))
                .await
                .map_err(|e| ctx.note_error(e))?;
            lease.advance(start.action_token.clone());
            start
        };

        let run = start
            .run
            .filter(RunState::is_active)
            .ok_or_else(|| ctx.note_error(RuntimeError::NoActiveRun))?;

        ctx.store.begin_run(
            RunContext::new(run.entity_id.clone(), dungeon_id, dungeon.display_name(), juiced),
            run.clone(),
        );
        ctx.store
            .bump_progress(dungeon_id, DungeonInfo::runs_consumed(juiced));
        ctx.store.clear_last_error();

        tracing::info!(
            target: "runtime::autoplay",
            dungeon_id,
            juiced,
            dungeon = %dungeon.display_name(),
            "run started"
        );
        ctx.bus.publish(RunEvent::Started {
            dungeon_id,
            juiced,
            run: run.clone(),
        });

        if let Err(error) = self.inner.energy.refresh().await {
            tracing::warn!(target: "runtime::energy", %error, "energy refresh after start failed");
        }
        Ok(run)
    }

    async fn find_dungeon(&self, dungeon_id: u32) -> Result<DungeonInfo> {
        let ctx = &self.inner.ctx;
        if let Some(dungeon) = ctx.store.dungeon(dungeon_id) {
            return Ok(dungeon);
        }

        let dungeons = ctx
            .call(ctx.api.get_today_dungeons())
            .await
            .map_err(|e| ctx.note_error(e))?;
        ctx.store.set_dungeons(dungeons);
        ctx.store
            .dungeon(dungeon_id)
            .ok_or_else(|| ctx.note_error(RuntimeError::UnknownDungeon(dungeon_id)))
    }

    fn check_eligibility(
        &self,
        dungeon: &DungeonInfo,
        juiced: bool,
        boosted: bool,
        available: u64,
    ) -> Result<()> {
        if juiced && !boosted {
            return Err(RuntimeError::JuicedUnavailable);
        }

        let used = self.inner.ctx.store.runs_used(dungeon.id);
        let max = dungeon.effective_max_runs(boosted);
        if used + DungeonInfo::runs_consumed(juiced) > max {
            return Err(RuntimeError::DailyLimitReached {
                dungeon_id: dungeon.id,
                used,
                max,
            });
        }

        let required = dungeon.cost(juiced);
        if available < required {
            return Err(RuntimeError::InsufficientEnergy {
                required,
                available,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use client_api_core::{ApiCall, ApiError, EnergyState, ItemDelta, MockGameApi, RawEnergy};

    use crate::api::{ManualProvider, ScriptedProvider};
    use crate::config::EnergyConfig;
    use crate::events::EventBus;
    use crate::repository::InMemoryHistory;
    use crate::store::SessionStore;

    struct Harness {
        mock: MockGameApi,
        orchestrator: RunOrchestrator,
        store: SessionStore,
        history: Arc<InMemoryHistory>,
    }

    fn dungeon(id: u32, cost: u64) -> DungeonInfo {
        DungeonInfo {
            id,
            name: format!("Dungeon {id}"),
            energy_cost: cost,
            max_runs_per_day: 2,
            juiced_max_runs_per_day: 6,
        }
    }

    fn harness(provider: Arc<dyn DecisionProvider>, config: AutoPlayConfig) -> Harness {
        let mock = MockGameApi::new(100);
        mock.set_dungeons(vec![dungeon(1, 40)]);

        let store = SessionStore::new();
        let ctx = ApiContext::new(
            Arc::new(mock.clone()),
            "0xabc",
            store.clone(),
            EventBus::new(),
            Duration::from_secs(5),
        );
        let energy = EnergyScheduler::new(ctx.clone(), &EnergyConfig::default());
        let history = Arc::new(InMemoryHistory::new());
        let orchestrator = RunOrchestrator::new(
            ctx,
            Arc::new(ActionTokenTracker::new()),
            energy,
            provider,
            history.clone(),
            config,
        );

        Harness {
            mock,
            orchestrator,
            store,
            history,
        }
    }

    fn fast() -> AutoPlayConfig {
        AutoPlayConfig {
            step_cap: 20,
            pace: Duration::from_millis(10),
        }
    }

    async fn settle() {
        for _ in 0..16 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn dead_run_ends_loop_and_records_once() {
        let h = harness(Arc::new(ScriptedProvider::new([Move::Rock])), fast());
        h.mock.keep_finished_runs();
        let mut dead = RunState::new("run-1", 1, 10);
        dead.room_number = 4;
        dead.player_health = 0;
        h.mock.set_run(Some(dead));
        h.orchestrator.refresh_run_state().await.unwrap();

        let token = h.orchestrator.enable_auto_play();
        let report = h.orchestrator.run_loop(token).await;

        assert_eq!(report.exit, LoopExit::RunOver);
        assert_eq!(report.submissions, 0);
        assert!(report.run_over);
        assert!(!h.orchestrator.is_auto_play_enabled());

        let records = h.history.list().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].enemies_defeated, 3);
        assert_eq!(records[0].provider, "scripted");

        // Re-checking the same finished run does not record it again.
        assert!(h.orchestrator.check_run_over());
        let token = h.orchestrator.enable_auto_play();
        h.orchestrator.run_loop(token).await;
        assert_eq!(h.history.list().unwrap().len(), 1);
        assert!(h.mock.submitted().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn missing_run_disables_without_history() {
        let h = harness(Arc::new(ScriptedProvider::new([Move::Rock])), fast());

        let token = h.orchestrator.enable_auto_play();
        let report = h.orchestrator.run_loop(token).await;

        assert_eq!(report.exit, LoopExit::RunOver);
        assert!(h.history.list().unwrap().is_empty());
        assert!(!h.orchestrator.is_auto_play_enabled());
    }

    #[tokio::test(start_paused = true)]
    async fn zero_step_cap_still_refreshes() {
        let config = AutoPlayConfig {
            step_cap: 0,
            pace: Duration::from_millis(10),
        };
        let h = harness(Arc::new(ScriptedProvider::new([Move::Rock])), config);
        h.orchestrator.start_run(1, false).await.unwrap();
        let fetches = h.mock.calls(ApiCall::FetchRunState);

        let token = h.orchestrator.enable_auto_play();
        let report = h.orchestrator.run_loop(token).await;

        assert_eq!(report.exit, LoopExit::StepCapReached);
        assert_eq!(report.submissions, 0);
        assert!(!report.run_over);
        assert_eq!(h.mock.calls(ApiCall::FetchRunState), fetches + 1);
        assert!(h.mock.submitted().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn second_loop_is_a_no_op() {
        let moves = std::iter::repeat(Move::Rock).take(50);
        let h = harness(Arc::new(ScriptedProvider::new(moves)), fast());
        h.orchestrator.start_run(1, false).await.unwrap();

        let task = h.orchestrator.spawn_auto_play();
        settle().await;
        assert!(h.orchestrator.is_loop_running());

        let token = h.orchestrator.enable_auto_play();
        let report = h.orchestrator.run_loop(token).await;
        assert_eq!(report.exit, LoopExit::AlreadyRunning);
        assert_eq!(report.submissions, 0);

        h.orchestrator.disable_auto_play();
        let report = task.await.unwrap();
        assert_eq!(report.exit, LoopExit::Cancelled);
        assert_eq!(h.mock.submitted().len() as u32, report.submissions);
        assert!(!h.orchestrator.is_loop_running());
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_interrupts_the_pace_sleep() {
        let config = AutoPlayConfig {
            step_cap: 20,
            pace: Duration::from_secs(60),
        };
        let h = harness(Arc::new(ScriptedProvider::new([Move::Rock, Move::Rock])), config);
        h.orchestrator.start_run(1, false).await.unwrap();

        let task = h.orchestrator.spawn_auto_play();
        settle().await;
        assert_eq!(h.mock.submitted().len(), 1);

        h.orchestrator.disable_auto_play();
        settle().await;
        assert!(task.is_finished());
        let report = task.await.unwrap();
        assert_eq!(report.exit, LoopExit::Cancelled);
        assert_eq!(h.mock.submitted().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn manual_provider_stops_the_loop() {
        let h = harness(Arc::new(ManualProvider), fast());
        h.orchestrator.start_run(1, false).await.unwrap();

        let token = h.orchestrator.enable_auto_play();
        let report = h.orchestrator.run_loop(token).await;
        assert_eq!(report.exit, LoopExit::NoRecommendation);
        assert!(!h.orchestrator.is_auto_play_enabled());
    }

    #[tokio::test(start_paused = true)]
    async fn failed_moves_do_not_stop_the_loop() {
        let h = harness(Arc::new(ScriptedProvider::new([Move::Rock, Move::Paper])), fast());
        h.orchestrator.start_run(1, false).await.unwrap();
        h.mock
            .fail_next(ApiCall::SubmitMove, ApiError::Network("flaky".into()));

        let token = h.orchestrator.enable_auto_play();
        let report = h.orchestrator.run_loop(token).await;

        assert_eq!(report.exit, LoopExit::NoRecommendation);
        assert_eq!(report.submissions, 1);
        assert_eq!(report.failed_submissions, 1);
        assert!(h.store.last_error().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn each_move_echoes_the_previous_token() {
        let h = harness(
            Arc::new(ScriptedProvider::new([Move::Rock, Move::LootOne, Move::Scissor])),
            fast(),
        );
        h.orchestrator.start_run(1, false).await.unwrap();

        let token = h.orchestrator.enable_auto_play();
        let report = h.orchestrator.run_loop(token).await;
        assert_eq!(report.submissions, 3);

        let tokens: Vec<_> = h
            .mock
            .submitted()
            .into_iter()
            .map(|(_, token)| token.unwrap().0)
            .collect();
        assert_eq!(tokens, ["tok-1", "tok-2", "tok-3"]);
    }

    #[tokio::test(start_paused = true)]
    async fn item_deltas_reach_the_history_record() {
        let h = harness(Arc::new(ScriptedProvider::new([Move::Rock, Move::Rock])), fast());
        h.orchestrator.start_run(1, false).await.unwrap();
        h.mock.queue_move(
            vec![ItemDelta { item_id: 4, amount: 2 }],
            |run| run.room_number = 2,
        );
        h.mock.queue_move(
            vec![ItemDelta { item_id: 4, amount: 1 }, ItemDelta { item_id: 8, amount: -1 }],
            |run| run.player_health = 0,
        );

        let token = h.orchestrator.enable_auto_play();
        let report = h.orchestrator.run_loop(token).await;
        assert_eq!(report.exit, LoopExit::RunOver);

        let records = h.history.list().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].dungeon_name, "Dungeon 1");
        assert_eq!(records[0].enemies_defeated, 1);
        assert_eq!(records[0].item_changes.get(&4), Some(&3));
        assert_eq!(records[0].item_changes.get(&8), Some(&-1));
    }

    #[tokio::test]
    async fn play_move_requires_an_active_run() {
        let h = harness(Arc::new(ManualProvider), fast());
        assert!(matches!(
            h.orchestrator.play_move(Move::Rock).await,
            Err(RuntimeError::NoActiveRun)
        ));
    }

    #[tokio::test]
    async fn start_run_checks_eligibility_locally() {
        let h = harness(Arc::new(ManualProvider), fast());

        assert!(matches!(
            h.orchestrator.start_run(9, false).await,
            Err(RuntimeError::UnknownDungeon(9))
        ));
        assert!(matches!(
            h.orchestrator.start_run(1, true).await,
            Err(RuntimeError::JuicedUnavailable)
        ));

        h.mock.set_energy(EnergyState {
            raw: RawEnergy::from_units(30),
            capacity: 100,
            regen_per_second: 0,
            boosted: false,
        });
        h.orchestrator.inner.energy.refresh().await.unwrap();
        assert!(matches!(
            h.orchestrator.start_run(1, false).await,
            Err(RuntimeError::InsufficientEnergy {
                required: 40,
                available: 30
            })
        ));

        h.store.set_day_progress([(1, 2)].into());
        assert!(matches!(
            h.orchestrator.start_run(1, false).await,
            Err(RuntimeError::DailyLimitReached { used: 2, max: 2, .. })
        ));
        assert_eq!(h.mock.calls(ApiCall::StartRun), 0);
    }

    #[tokio::test]
    async fn start_run_resets_bookkeeping() {
        let h = harness(Arc::new(ManualProvider), fast());
        let run = h.orchestrator.start_run(1, false).await.unwrap();

        assert_eq!(run.room_number, 1);
        assert_eq!(h.store.runs_used(1), 1);
        assert_eq!(h.store.energy().unwrap().visible(), 60);
        let context = h.store.run_context().unwrap();
        assert_eq!(context.dungeon_name, "Dungeon 1");
        assert!(!context.history_recorded);

        assert!(matches!(
            h.orchestrator.start_run(1, false).await,
            Err(RuntimeError::RunInProgress)
        ));
    }

    #[tokio::test]
    async fn swapping_provider_disables_auto_play() {
        let h = harness(Arc::new(ManualProvider), fast());
        h.orchestrator.enable_auto_play();
        assert!(h.orchestrator.is_auto_play_enabled());

        h.orchestrator
            .set_provider(Arc::new(ScriptedProvider::new([Move::Rock])));
        assert!(!h.orchestrator.is_auto_play_enabled());
        assert_eq!(h.orchestrator.provider().name(), "scripted");
    }
}
