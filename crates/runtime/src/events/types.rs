//! Event types for different topics.

use std::time::Duration;

use serde::Serialize;

use client_api_core::{ClaimCategory, EnergyState, Move, RunState};

use crate::orchestrator::{ClaimReport, LoopExit};

/// Run lifecycle and auto-play progress
#[derive(Debug, Clone, Serialize)]
pub enum RunEvent {
    Started {
        dungeon_id: u32,
        juiced: bool,
        run: RunState,
    },

    /// Local run state was replaced by a server answer.
    StateChanged { run: Option<RunState> },

    MovePlayed {
        mv: Move,
        run: Option<RunState>,
    },

    MoveFailed { mv: Move, error: String },

    AutoPlayStarted,

    AutoPlayStopped { exit: LoopExit, submissions: u32 },

    /// The run ended by death or completion.
    Ended {
        dungeon_id: u32,
        enemies_defeated: u32,
    },
}

/// Energy scheduler activity
#[derive(Debug, Clone, Serialize)]
pub enum EnergyEvent {
    Refreshed(EnergyState),

    /// A timer is armed to fire after `delay`.
    Scheduled { delay: Duration },

    RefreshFailed { attempt: u32, error: String },

    /// Nothing to wait for: energy is full, static, or retries ran out.
    Idle,
}

/// Claim batch progress
#[derive(Debug, Clone, Serialize)]
pub enum ClaimEvent {
    BatchStarted {
        category: ClaimCategory,
        planned: usize,
    },

    Claimed {
        object_id: String,
        category: ClaimCategory,
        amount: u64,
    },

    Failed {
        object_id: String,
        category: ClaimCategory,
        error: String,
    },

    BatchFinished(ClaimReport),
}
