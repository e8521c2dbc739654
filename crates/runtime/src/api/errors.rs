//! Unified error types surfaced by the runtime API.
//!
//! Wraps failures from the game service, the history repository, and local
//! eligibility checks so clients can show one message per failed operation.

use thiserror::Error;

use client_api_core::ApiError;

pub use crate::repository::RepositoryError;

pub type Result<T> = std::result::Result<T, RuntimeError>;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error("no active run")]
    NoActiveRun,

    #[error("a run is already in progress")]
    RunInProgress,

    #[error("dungeon {0} is not in today's catalog")]
    UnknownDungeon(u32),

    #[error("not enough energy: {required} required, {available} available")]
    InsufficientEnergy { required: u64, available: u64 },

    #[error("daily limit reached for dungeon {dungeon_id}: {used}/{max} runs used")]
    DailyLimitReached { dungeon_id: u32, used: u32, max: u32 },

    #[error("juiced runs require a boosted account")]
    JuicedUnavailable,

    #[error("energy state is not available")]
    EnergyUnavailable,

    #[error("a claim pass is already in progress")]
    ClaimInProgress,

    #[error("runtime requires a game API before building")]
    MissingApi,

    #[error("runtime requires an account address before building")]
    MissingAccount,

    #[error("background task join failed")]
    WorkerJoin(#[source] tokio::task::JoinError),
}
