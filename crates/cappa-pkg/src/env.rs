//! Environment variable access

use std::path::PathBuf;

/// Source of environment variables and user directories
pub trait Environment: Send + Sync {
    /// Value of `key`, `None` if unset
    fn var(&self, key: &str) -> Option<String>;

    /// Current user's home directory
    fn home_dir(&self) -> Option<PathBuf>;

    /// Temp directory from `TMPDIR`, `TEMP`, `TMP`, falling back to `/tmp`
    fn temp_dir(&self) -> PathBuf {
        ["TMPDIR", "TEMP", "TMP"]
            .iter()
            .find_map(|key| self.var(key))
            .map(|dir| dir.trim().to_string())
            .filter(|dir| !dir.is_empty())
            .map_or_else(|| PathBuf::from("/tmp"), PathBuf::from)
    }
}

/// Environment of the current process
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnvironment;

impl Environment for ProcessEnvironment {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }

    fn home_dir(&self) -> Option<PathBuf> {
        dirs::home_dir()
    }
}
