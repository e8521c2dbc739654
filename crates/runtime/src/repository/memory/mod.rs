//! In-memory repository implementations for tests and ephemeral sessions.

mod history;

pub use history::InMemoryHistory;
