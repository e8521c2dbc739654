//! File-based repository implementations.

mod history;

pub use history::FileHistory;
