//! Command implementations
//!
//! Each command declares its own arguments and runs against a
//! [`runtime::RuntimeHandle`].

mod claim;
mod energy;
mod history;
mod play;
mod status;

pub use claim::Claim;
pub use energy::Energy;
pub use history::History;
pub use play::{AutoPlay, Play, PlayMove};
pub use status::Status;
