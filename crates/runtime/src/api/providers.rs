//! Asynchronous abstraction for choosing the next move of a run.
//!
//! Auto-play asks a [`DecisionProvider`] for each move, so the same loop can
//! run with human input, a random policy, or scripted fixtures.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use client_api_core::{Move, RunState};

/// Source of move recommendations.
///
/// Returning `None` means "no recommendation"; auto-play stops on it.
#[async_trait]
pub trait DecisionProvider: Send + Sync {
    /// Short label recorded in run history.
    fn name(&self) -> &str;

    async fn pick_action(&self, state: &RunState) -> Option<Move>;
}

/// Built-in providers selectable from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ProviderChoice {
    Manual,
    Random,
}

impl ProviderChoice {
    pub fn build(self) -> Arc<dyn DecisionProvider> {
        match self {
            ProviderChoice::Manual => Arc::new(ManualProvider),
            ProviderChoice::Random => Arc::new(RandomProvider::new()),
        }
    }
}

/// Never recommends anything; moves come from the user.
pub struct ManualProvider;

#[async_trait]
impl DecisionProvider for ManualProvider {
    fn name(&self) -> &str {
        "manual"
    }

    async fn pick_action(&self, _state: &RunState) -> Option<Move> {
        None
    }
}

/// Uniform pick among the moves valid for the current phase.
pub struct RandomProvider {
    rng: Mutex<StdRng>,
}

impl RandomProvider {
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Deterministic sequence for tests and replays.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl Default for RandomProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DecisionProvider for RandomProvider {
    fn name(&self) -> &str {
        "random"
    }

    async fn pick_action(&self, state: &RunState) -> Option<Move> {
        if state.is_over() {
            return None;
        }
        let moves = state.phase_moves();
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        moves.choose(&mut *rng).copied()
    }
}

/// Replays a fixed list of moves, then stops recommending.
pub struct ScriptedProvider {
    moves: Mutex<VecDeque<Move>>,
}

impl ScriptedProvider {
    pub fn new(moves: impl IntoIterator<Item = Move>) -> Self {
        Self {
            moves: Mutex::new(moves.into_iter().collect()),
        }
    }

    pub fn remaining(&self) -> usize {
        self.moves
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[async_trait]
impl DecisionProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn pick_action(&self, _state: &RunState) -> Option<Move> {
        self.moves
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn loot_state(options: usize) -> RunState {
        let mut state = RunState::new("run-1", 1, 10);
        state.loot_phase = true;
        state.loot_option_count = options;
        state
    }

    #[tokio::test]
    async fn random_provider_respects_phase() {
        let provider = RandomProvider::seeded(7);
        let combat = RunState::new("run-1", 1, 10);
        for _ in 0..32 {
            let mv = provider.pick_action(&combat).await.unwrap();
            assert!(Move::COMBAT.contains(&mv));
        }

        let loot = loot_state(2);
        for _ in 0..32 {
            let mv = provider.pick_action(&loot).await.unwrap();
            assert!(matches!(mv, Move::LootOne | Move::LootTwo));
        }
    }

    #[tokio::test]
    async fn random_provider_is_silent_for_finished_runs() {
        let provider = RandomProvider::seeded(1);
        let mut dead = RunState::new("run-1", 1, 10);
        dead.player_health = 0;
        assert_eq!(provider.pick_action(&dead).await, None);
    }

    #[tokio::test]
    async fn scripted_provider_drains_in_order() {
        let provider = ScriptedProvider::new([Move::Paper, Move::LootTwo]);
        let state = RunState::new("run-1", 1, 10);
        assert_eq!(provider.pick_action(&state).await, Some(Move::Paper));
        assert_eq!(provider.pick_action(&state).await, Some(Move::LootTwo));
        assert_eq!(provider.pick_action(&state).await, None);
        assert_eq!(provider.remaining(), 0);
    }

    #[test]
    fn choice_parses_case_insensitively() {
        assert_eq!(ProviderChoice::from_str("Random"), Ok(ProviderChoice::Random));
        assert_eq!(ProviderChoice::from_str("manual"), Ok(ProviderChoice::Manual));
        assert!(ProviderChoice::from_str("genius").is_err());
        assert_eq!(ProviderChoice::Manual.build().name(), "manual");
    }
}
