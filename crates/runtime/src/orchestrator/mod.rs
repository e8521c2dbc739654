//! Orchestrators for runs and claims.

mod claim;
mod run;

pub use claim::{ClaimFailure, ClaimOrchestrator, ClaimReport, ClaimTotals, plan_claims};
pub use run::{LoopExit, LoopReport, RunOrchestrator};
