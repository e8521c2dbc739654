//! Capability contract for the remote game service.
//!
//! The runtime never talks HTTP directly. It drives runs, energy and claims
//! through the [`GameApi`] trait defined here, so the same orchestration code
//! runs against the real service or an in-memory server in tests.
//!
//! # Architecture
//!
//! ```text
//! runtime (orchestrators)
//!    └── GameApi (this crate)
//!          ├── HttpGameApi   (client-api-http)
//!          └── MockGameApi   (feature = "mock")
//! ```

pub mod traits;
pub mod types;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use traits::{ApiError, GameApi};

pub use types::{
    ActionToken, ClaimCategory, ClaimableObject, DayProgress, DungeonInfo, EnergyState,
    ItemDelta, Move, MoveOutcome, RawEnergy, RunStart, RunState,
};

#[cfg(any(test, feature = "mock"))]
pub use mock::{ApiCall, MockGameApi};
