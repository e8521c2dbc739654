//! Session runtime for a dungeon-crawler game client.
//!
//! This crate keeps one account's session in sync with the game service:
//! it plays runs (by hand or through an auto-play loop driven by a
//! [`DecisionProvider`]), tracks regenerating energy with a single refresh
//! timer, claims accumulated resources in batches, and records a history
//! entry for every finished run. Consumers embed [`Runtime`] and interact
//! through [`RuntimeHandle`].
//!
//! Modules are organized by responsibility:
//! - [`runtime`] hosts the runtime and builder
//! - [`api`] exposes the types downstream clients interact with
//! - [`orchestrator`] drives runs and claims
//! - [`energy`] computes energy boundaries and schedules refreshes
//! - [`events`] provides topic-based event bus for flexible event routing
//! - [`repository`] persists run history
//! - [`store`] and [`token`] hold session state and the action token
pub mod api;
pub mod config;
pub mod context;
pub mod energy;
pub mod events;
pub mod orchestrator;
pub mod repository;
pub mod runtime;
pub mod store;
pub mod token;

pub use api::{
    DecisionProvider, ManualProvider, ProviderChoice, RandomProvider, Result, RuntimeError,
    RuntimeHandle, ScriptedProvider,
};
pub use config::{AutoPlayConfig, ClaimConfig, EnergyConfig, RetryPolicy, RuntimeConfig};
pub use context::ApiContext;
pub use energy::{EnergyModel, EnergyScheduler, SchedulerState};
pub use events::{ClaimEvent, EnergyEvent, Event, EventBus, RunEvent, Topic};
pub use orchestrator::{
    ClaimFailure, ClaimOrchestrator, ClaimReport, ClaimTotals, LoopExit, LoopReport,
    RunOrchestrator, plan_claims,
};
pub use repository::{
    DungeonStats, FileHistory, HistoryRecord, HistoryRepository, InMemoryHistory, ProviderStats,
    RepositoryError, RunStats,
};
pub use runtime::{Runtime, RuntimeBuilder};
pub use store::{RunContext, SessionStore};
pub use token::{ActionTokenTracker, TokenLease};
