//! In-memory game server for tests and offline runs.
//!
//! [`MockGameApi`] keeps a tiny authoritative model of one account: a run,
//! regenerating energy, claimable objects, and the dungeon catalog. It issues
//! and validates action tokens the way the real service does, and records
//! every call so tests can assert on traffic.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use crate::traits::{ApiError, GameApi};
use crate::types::{
    ActionToken, ClaimCategory, ClaimableObject, DayProgress, DungeonInfo, EnergyState,
    ItemDelta, Move, MoveOutcome, RawEnergy, RunStart, RunState,
};

/// Remote operations, used to index recorded calls and injected failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiCall {
    StartRun,
    SubmitMove,
    FetchRunState,
    GetEnergy,
    GetClaimables,
    Claim,
    GetTodayDungeons,
    GetDayProgress,
}

type MoveEffect = Box<dyn FnOnce(&mut RunState) + Send>;

struct ScriptedMove {
    deltas: Vec<ItemDelta>,
    effect: MoveEffect,
}

struct MockServer {
    run: Option<RunState>,
    discard_finished_runs: bool,
    script: VecDeque<ScriptedMove>,
    starting_health: i64,

    energy: EnergyState,
    energy_set_at: Instant,

    claimables: Vec<ClaimableObject>,
    failing_claims: HashSet<String>,
    claimed: Vec<(String, ClaimCategory)>,

    dungeons: Vec<DungeonInfo>,
    progress: DayProgress,

    last_token: Option<ActionToken>,
    issued_tokens: u64,
    submitted: Vec<(Move, Option<ActionToken>)>,
    next_entity: u64,

    failures: HashMap<ApiCall, VecDeque<ApiError>>,
    calls: Vec<ApiCall>,
    latency: Option<Duration>,
}

impl MockServer {
    fn current_energy(&self) -> EnergyState {
        let cap = self.energy.capacity_raw();
        let mut energy = self.energy;
        if energy.raw < cap {
            let elapsed = self.energy_set_at.elapsed().as_nanos();
            let gained = elapsed * u128::from(energy.regen_per_second) / 1_000_000_000;
            let raw = (u128::from(energy.raw.get()) + gained).min(u128::from(cap.get()));
            energy.raw = RawEnergy(raw as u64);
        }
        energy
    }

    fn rebase_energy(&mut self, raw: RawEnergy) {
        self.energy.raw = raw;
        self.energy_set_at = Instant::now();
    }

    fn issue_token(&mut self) -> ActionToken {
        self.issued_tokens += 1;
        let token = ActionToken::new(format!("tok-{}", self.issued_tokens));
        self.last_token = Some(token.clone());
        token
    }

    fn check_token(&self, token: Option<&ActionToken>) -> Result<(), ApiError> {
        match (&self.last_token, token) {
            (None, _) => Ok(()),
            (Some(expected), Some(provided)) if expected == provided => Ok(()),
            (Some(expected), provided) => Err(ApiError::Rejected(format!(
                "stale action token: expected {expected}, got {provided:?}"
            ))),
        }
    }

    fn take_failure(&mut self, call: ApiCall) -> Result<(), ApiError> {
        self.calls.push(call);
        match self.failures.get_mut(&call).and_then(VecDeque::pop_front) {
            Some(error) => {
                tracing::debug!(target: "api::mock", ?call, %error, "injected failure");
                Err(error)
            }
            None => Ok(()),
        }
    }

    fn default_effect(run: &mut RunState, mv: Move) {
        if mv.is_loot() {
            run.loot_phase = false;
            run.loot_option_count = 0;
        } else {
            run.room_number += 1;
            run.loot_phase = true;
            run.loot_option_count = 3;
        }
    }
}

/// Cloneable handle to a shared in-memory game server.
#[derive(Clone)]
pub struct MockGameApi {
    server: Arc<Mutex<MockServer>>,
}

impl MockGameApi {
    /// Account with full energy of `capacity` units, no regeneration and no run.
    pub fn new(capacity: u64) -> Self {
        let energy = EnergyState {
            raw: RawEnergy::from_units(capacity),
            capacity,
            regen_per_second: 0,
            boosted: false,
        };

        Self {
            server: Arc::new(Mutex::new(MockServer {
                run: None,
                discard_finished_runs: true,
                script: VecDeque::new(),
                starting_health: 10,
                energy,
                energy_set_at: Instant::now(),
                claimables: Vec::new(),
                failing_claims: HashSet::new(),
                claimed: Vec::new(),
                dungeons: Vec::new(),
                progress: DayProgress::new(),
                last_token: None,
                issued_tokens: 0,
                submitted: Vec::new(),
                next_entity: 1,
                failures: HashMap::new(),
                calls: Vec::new(),
                latency: None,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MockServer> {
        self.server.lock().expect("mock server mutex poisoned")
    }

    async fn delay(&self) {
        let latency = self.lock().latency;
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }

    // ------------------------------------------------------------------
    // Setup
    // ------------------------------------------------------------------

    /// Replace the account energy; regeneration restarts from now.
    pub fn set_energy(&self, energy: EnergyState) {
        let mut server = self.lock();
        server.energy = energy;
        server.energy_set_at = Instant::now();
    }

    pub fn set_run(&self, run: Option<RunState>) {
        self.lock().run = run;
    }

    pub fn set_starting_health(&self, health: i64) {
        self.lock().starting_health = health;
    }

    /// Keep finished runs visible to `fetch_run_state` instead of discarding them.
    pub fn keep_finished_runs(&self) {
        self.lock().discard_finished_runs = false;
    }

    pub fn set_claimables(&self, objects: Vec<ClaimableObject>) {
        self.lock().claimables = objects;
    }

    pub fn set_dungeons(&self, dungeons: Vec<DungeonInfo>) {
        self.lock().dungeons = dungeons;
    }

    pub fn set_progress(&self, progress: DayProgress) {
        self.lock().progress = progress;
    }

    /// Make every claim against `object_id` fail.
    pub fn fail_claims_for(&self, object_id: impl Into<String>) {
        self.lock().failing_claims.insert(object_id.into());
    }

    /// Fail the next call of `call` with `error`. Failures queue up.
    pub fn fail_next(&self, call: ApiCall, error: ApiError) {
        self.lock()
            .failures
            .entry(call)
            .or_default()
            .push_back(error);
    }

    /// Delay every call by `latency` before it is served.
    pub fn set_latency(&self, latency: Option<Duration>) {
        self.lock().latency = latency;
    }

    /// Script the outcome of the next submitted move.
    ///
    /// Unscripted combat moves advance one room and open a three-option loot
    /// phase; unscripted loot picks close it.
    pub fn queue_move<F>(&self, deltas: Vec<ItemDelta>, effect: F)
    where
        F: FnOnce(&mut RunState) + Send + 'static,
    {
        self.lock().script.push_back(ScriptedMove {
            deltas,
            effect: Box::new(effect),
        });
    }

    // ------------------------------------------------------------------
    // Inspection
    // ------------------------------------------------------------------

    pub fn calls(&self, call: ApiCall) -> usize {
        self.lock().calls.iter().filter(|c| **c == call).count()
    }

    pub fn call_log(&self) -> Vec<ApiCall> {
        self.lock().calls.clone()
    }

    /// Successful claims in the order they were served.
    pub fn claimed(&self) -> Vec<(String, ClaimCategory)> {
        self.lock().claimed.clone()
    }

    /// Accepted moves with the token each one carried.
    pub fn submitted(&self) -> Vec<(Move, Option<ActionToken>)> {
        self.lock().submitted.clone()
    }

    pub fn last_token(&self) -> Option<ActionToken> {
        self.lock().last_token.clone()
    }

    pub fn run(&self) -> Option<RunState> {
        self.lock().run.clone()
    }

    pub fn energy_now(&self) -> EnergyState {
        self.lock().current_energy()
    }
}

#[async_trait]
impl GameApi for MockGameApi {
    async fn start_run(
        &self,
        dungeon_id: u32,
        juiced: bool,
        token: Option<&ActionToken>,
    ) -> Result<RunStart, ApiError> {
        self.delay().await;
        let mut server = self.lock();
        server.take_failure(ApiCall::StartRun)?;
        server.check_token(token)?;

        if server.run.as_ref().is_some_and(|run| !run.is_over()) {
            return Err(ApiError::Rejected("run already in progress".into()));
        }

        let cost = server
            .dungeons
            .iter()
            .find(|d| d.id == dungeon_id)
            .map(|d| d.cost(juiced))
            .unwrap_or(0);
        let energy = server.current_energy();
        if energy.visible() < cost {
            return Err(ApiError::Rejected("not enough energy".into()));
        }
        let remaining = RawEnergy(energy.raw.get() - RawEnergy::from_units(cost).get());
        server.rebase_energy(remaining);
        *server.progress.entry(dungeon_id).or_default() += DungeonInfo::runs_consumed(juiced);

        let entity = format!("run-{}", server.next_entity);
        server.next_entity += 1;
        let run = RunState::new(entity, dungeon_id, server.starting_health);
        server.run = Some(run.clone());

        let action_token = Some(server.issue_token());
        Ok(RunStart {
            run: Some(run),
            action_token,
        })
    }

    async fn submit_move(
        &self,
        mv: Move,
        dungeon_id: u32,
        token: Option<&ActionToken>,
    ) -> Result<MoveOutcome, ApiError> {
        self.delay().await;
        let mut server = self.lock();
        server.take_failure(ApiCall::SubmitMove)?;
        server.check_token(token)?;

        let Some(mut run) = server.run.clone().filter(|run| !run.is_over()) else {
            return Err(ApiError::Rejected("no active run".into()));
        };
        if run.dungeon_id != dungeon_id {
            return Err(ApiError::Rejected(format!(
                "run belongs to dungeon {}, not {dungeon_id}",
                run.dungeon_id
            )));
        }

        let deltas = match server.script.pop_front() {
            Some(scripted) => {
                (scripted.effect)(&mut run);
                scripted.deltas
            }
            None => {
                MockServer::default_effect(&mut run, mv);
                Vec::new()
            }
        };

        server.submitted.push((mv, token.cloned()));
        let run = run.is_active().then_some(run);
        server.run = run.clone();

        let action_token = Some(server.issue_token());
        Ok(MoveOutcome {
            run,
            action_token,
            item_deltas: deltas,
        })
    }

    async fn fetch_run_state(&self) -> Result<Option<RunState>, ApiError> {
        self.delay().await;
        let mut server = self.lock();
        server.take_failure(ApiCall::FetchRunState)?;

        if server.discard_finished_runs && server.run.as_ref().is_some_and(RunState::is_over) {
            server.run = None;
        }
        Ok(server.run.clone())
    }

    async fn get_energy(&self, _address: &str) -> Result<EnergyState, ApiError> {
        self.delay().await;
        let mut server = self.lock();
        server.take_failure(ApiCall::GetEnergy)?;
        Ok(server.current_energy())
    }

    async fn get_claimables(&self, _address: &str) -> Result<Vec<ClaimableObject>, ApiError> {
        self.delay().await;
        let mut server = self.lock();
        server.take_failure(ApiCall::GetClaimables)?;
        Ok(server.claimables.clone())
    }

    async fn claim(&self, object_id: &str, category: ClaimCategory) -> Result<(), ApiError> {
        self.delay().await;
        let mut server = self.lock();
        server.take_failure(ApiCall::Claim)?;

        if server.failing_claims.contains(object_id) {
            tracing::debug!(target: "api::mock", object_id, "refusing claim");
            return Err(ApiError::Rejected(format!("claim refused for {object_id}")));
        }

        let Some(object) = server.claimables.iter_mut().find(|o| o.id == object_id) else {
            return Err(ApiError::NotFound(object_id.to_string()));
        };
        let amount = object.yield_for(category);
        match category {
            ClaimCategory::Dust => object.dust_yield = 0,
            ClaimCategory::Shard => object.shard_yield = 0,
            ClaimCategory::Energy => object.energy_yield = 0,
        }

        if category == ClaimCategory::Energy {
            let energy = server.current_energy();
            let raw = energy
                .raw
                .get()
                .saturating_add(RawEnergy::from_units(amount).get())
                .min(energy.capacity_raw().get());
            server.rebase_energy(RawEnergy(raw));
        }

        server.claimed.push((object_id.to_string(), category));
        Ok(())
    }

    async fn get_today_dungeons(&self) -> Result<Vec<DungeonInfo>, ApiError> {
        self.delay().await;
        let mut server = self.lock();
        server.take_failure(ApiCall::GetTodayDungeons)?;
        Ok(server.dungeons.clone())
    }

    async fn get_day_progress(&self, _address: &str) -> Result<DayProgress, ApiError> {
        self.delay().await;
        let mut server = self.lock();
        server.take_failure(ApiCall::GetDayProgress)?;
        Ok(server.progress.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn tokens_must_be_echoed_in_order() {
        let api = MockGameApi::new(100);
        let start = api.start_run(1, false, None).await.unwrap();
        let first = start.action_token.unwrap();

        let outcome = api.submit_move(Move::Rock, 1, Some(&first)).await.unwrap();
        let second = outcome.action_token.unwrap();
        assert_ne!(first, second);

        let stale = api.submit_move(Move::Rock, 1, Some(&first)).await;
        assert!(matches!(stale, Err(ApiError::Rejected(_))));

        assert!(api.submit_move(Move::LootOne, 1, Some(&second)).await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn energy_regenerates_up_to_capacity() {
        let api = MockGameApi::new(10);
        api.set_energy(EnergyState {
            raw: RawEnergy::from_units(8),
            capacity: 10,
            regen_per_second: RawEnergy::SCALE,
            boosted: false,
        });

        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(api.get_energy("addr").await.unwrap().visible(), 9);

        tokio::time::advance(Duration::from_secs(60)).await;
        assert_eq!(api.get_energy("addr").await.unwrap().visible(), 10);
    }

    #[tokio::test]
    async fn fetch_is_idempotent_without_mutation() {
        let api = MockGameApi::new(100);
        api.set_run(Some(RunState::new("run-9", 2, 12)));

        let first = api.fetch_run_state().await.unwrap();
        let second = api.fetch_run_state().await.unwrap();
        assert_eq!(first, second);
        assert_eq!(api.calls(ApiCall::FetchRunState), 2);
    }

    #[tokio::test]
    async fn injected_failures_are_consumed_once() {
        let api = MockGameApi::new(100);
        api.fail_next(ApiCall::GetEnergy, ApiError::Network("down".into()));

        assert!(api.get_energy("addr").await.is_err());
        assert!(api.get_energy("addr").await.is_ok());
    }
}
