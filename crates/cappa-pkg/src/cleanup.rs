//! Residual temp file cleanup after manager runs
//!
//! npm and pip leave `npm-*` / `pip-*` directories in their temp locations,
//! often owned by root after a sudo install. Cleanup is best-effort: failures
//! are logged and never reach the caller.

use std::path::PathBuf;

use cappa_exec::{CommandRunner, ExecutableResolver};
use tracing::{debug, warn};

use crate::env::Environment;
use crate::error::PackageError;
use crate::fs::Filesystem;
use crate::registry::Residue;

/// Collaborators needed to purge residues
pub(crate) struct Cleanup<'a> {
    pub runner: &'a dyn CommandRunner,
    pub resolver: &'a dyn ExecutableResolver,
    pub fs: &'a dyn Filesystem,
    pub env: &'a dyn Environment,
    /// Remove with sudo (files may be owned by root)
    pub elevate: bool,
}

impl Cleanup<'_> {
    /// Remove residual entries, logging instead of failing
    pub async fn purge(&self, residue: Residue) {
        match self.try_purge(residue).await {
            Ok(0) => {}
            Ok(removed) => debug!(?residue, removed, "purged residual temp files"),
            Err(e) => warn!(?residue, error = %e, "residual cleanup failed"),
        }
    }

    async fn try_purge(&self, residue: Residue) -> Result<usize, PackageError> {
        let Some(dir) = self.residue_dir(residue).await? else {
            return Ok(0);
        };

        let targets: Vec<String> = self
            .fs
            .list_dir(&dir)?
            .into_iter()
            .filter(|path| {
                path.file_name()
                    .and_then(|name| name.to_str())
                    .is_some_and(|name| name.starts_with(residue.prefix()))
            })
            .map(|path| path.to_string_lossy().into_owned())
            .collect();

        if targets.is_empty() {
            return Ok(0);
        }

        let mut argv = vec!["rm".to_string(), "-rf".to_string()];
        argv.extend(targets.iter().cloned());

        let result = self.runner.run(&argv, self.elevate).await?;
        if !result.success() {
            return Err(PackageError::CommandFailed {
                command: "rm -rf".to_string(),
                status: result.status,
                message: result.stderr.trim().to_string(),
            });
        }

        Ok(targets.len())
    }

    /// Directory the residues live in, `None` if the manager is absent
    async fn residue_dir(&self, residue: Residue) -> Result<Option<PathBuf>, PackageError> {
        match residue {
            Residue::Pip => Ok(Some(self.env.temp_dir())),
            Residue::Npm => {
                let Some(npm) = self.resolver.resolve("npm") else {
                    return Ok(None);
                };
                let argv = [
                    npm.to_string_lossy().into_owned(),
                    "config".to_string(),
                    "get".to_string(),
                    "tmp".to_string(),
                ];
                let result = self.runner.run(&argv, false).await?;
                let dir = result.stdout.trim();
                if !result.success() || dir.is_empty() || dir == "undefined" {
                    return Ok(None);
                }
                Ok(Some(PathBuf::from(dir)))
            }
        }
    }
}
