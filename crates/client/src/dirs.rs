//! Platform-specific directories for the client.

use std::path::PathBuf;

/// Log directory
///
/// - Linux: `~/.cache/teraverse/logs` (or `$XDG_CACHE_HOME/teraverse/logs`)
/// - macOS: `~/Library/Caches/teraverse/logs`
/// - Windows: `%LOCALAPPDATA%\teraverse\cache\logs`
/// - Fallback: `/tmp/teraverse/logs`
pub fn log_dir() -> PathBuf {
    let base_dir = directories::ProjectDirs::from("", "", "teraverse")
        .map(|dirs| dirs.cache_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("/tmp/teraverse"));

    base_dir.join("logs")
}
