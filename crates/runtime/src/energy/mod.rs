//! Energy regeneration tracking.
//!
//! [`EnergyModel`] turns a fixed-point energy reading into the exact time of
//! the next visible change, and [`EnergyScheduler`] keeps one refresh timer
//! armed against that boundary.

mod model;
mod scheduler;

pub use model::EnergyModel;
pub use scheduler::{EnergyScheduler, SchedulerState};
