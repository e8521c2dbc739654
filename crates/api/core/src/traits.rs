//! Game service abstraction.
//!
//! [`GameApi`] is the narrow surface the orchestration layer consumes. Every
//! method maps to one remote call; implementations must not cache state.

use std::time::Duration;

use async_trait::async_trait;

use crate::types::{
    ActionToken, ClaimCategory, ClaimableObject, DayProgress, DungeonInfo, EnergyState,
    MoveOutcome, Move, RunStart, RunState,
};

// ============================================================================
// Error Types
// ============================================================================

/// Failures surfaced by [`GameApi`] implementations.
///
/// All variants are recoverable from the caller's point of view: the runtime
/// logs them and keeps its orchestrators alive.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Server returned status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Request rejected: {0}")]
    Rejected(String),

    #[error("Failed to decode response: {0}")]
    Decode(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Not found: {0}")]
    NotFound(String),
}

// ============================================================================
// Capability Trait
// ============================================================================

/// Remote game operations used by the orchestrators.
///
/// Mutating calls (`start_run`, `submit_move`) carry the most recent
/// [`ActionToken`] and hand back the next one.
#[async_trait]
pub trait GameApi: Send + Sync {
    /// Start a run in the given dungeon.
    async fn start_run(
        &self,
        dungeon_id: u32,
        juiced: bool,
        token: Option<&ActionToken>,
    ) -> Result<RunStart, ApiError>;

    /// Submit one move for the active run.
    async fn submit_move(
        &self,
        mv: Move,
        dungeon_id: u32,
        token: Option<&ActionToken>,
    ) -> Result<MoveOutcome, ApiError>;

    /// Fetch the active run, `None` when the server reports no run.
    async fn fetch_run_state(&self) -> Result<Option<RunState>, ApiError>;

    /// Fetch the account's energy.
    async fn get_energy(&self, address: &str) -> Result<EnergyState, ApiError>;

    /// Fetch every claimable object owned by the account.
    async fn get_claimables(&self, address: &str) -> Result<Vec<ClaimableObject>, ApiError>;

    /// Drain one category of accumulated yield from a single object.
    async fn claim(&self, object_id: &str, category: ClaimCategory) -> Result<(), ApiError>;

    /// Today's dungeon catalog.
    async fn get_today_dungeons(&self) -> Result<Vec<DungeonInfo>, ApiError>;

    /// Runs already used today, keyed by dungeon id.
    async fn get_day_progress(&self, address: &str) -> Result<DayProgress, ApiError>;
}
