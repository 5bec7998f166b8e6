//! Command runner and executable resolver traits

use std::path::PathBuf;

use async_trait::async_trait;

use crate::error::ExecError;
use crate::result::CommandResult;

/// Runs a single external command to completion
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `argv` (program followed by its arguments)
    ///
    /// When `elevate` is set the runner is expected to obtain root
    /// privileges for the command, e.g. by prefixing `sudo`.
    ///
    /// # Errors
    /// Returns `ExecError` if the process cannot be spawned or awaited. A
    /// non-zero exit is reported through `CommandResult::status`, not as an
    /// error.
    async fn run(&self, argv: &[String], elevate: bool) -> Result<CommandResult, ExecError>;
}

/// Locates executables by name
pub trait ExecutableResolver: Send + Sync {
    /// Return the full path of `name`, or `None` if it is not installed
    fn resolve(&self, name: &str) -> Option<PathBuf>;
}
