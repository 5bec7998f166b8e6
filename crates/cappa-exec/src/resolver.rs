//! Executable lookup with a lazily filled path cache

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use tracing::debug;

use crate::traits::ExecutableResolver;

/// Resolves executables on `PATH` and remembers every hit
///
/// Misses are not cached, so a manager installed by an earlier step of the
/// same run is found on the next lookup.
#[derive(Debug, Default)]
pub struct CachingResolver {
    cache: Mutex<HashMap<String, PathBuf>>,
}

impl CachingResolver {
    /// Create a resolver with an empty cache
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl ExecutableResolver for CachingResolver {
    fn resolve(&self, name: &str) -> Option<PathBuf> {
        if let Ok(cache) = self.cache.lock()
            && let Some(path) = cache.get(name)
        {
            return Some(path.clone());
        }

        let path = which::which(name).ok()?;
        debug!(name, path = %path.display(), "resolved executable");

        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(name.to_string(), path.clone());
        }
        Some(path)
    }
}
