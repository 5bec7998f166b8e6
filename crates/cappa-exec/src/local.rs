//! Local command execution using `tokio::process`

use std::process::Stdio;
use std::time::Instant;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, error, instrument};

use crate::error::ExecError;
use crate::result::CommandResult;
use crate::traits::CommandRunner;

/// Local command runner
///
/// Spawns the program directly (no shell) in the current working directory.
/// Elevated commands are prefixed with `sudo` unless sudo is disabled, e.g.
/// when already running as root.
#[derive(Debug, Clone)]
pub struct LocalRunner {
    use_sudo: bool,
}

impl LocalRunner {
    /// Create a new local runner
    #[must_use]
    pub fn new(use_sudo: bool) -> Self {
        Self { use_sudo }
    }

    /// Build the final argv, applying the sudo prefix when needed
    fn command_line(&self, argv: &[String], elevate: bool) -> Vec<String> {
        let mut line = Vec::with_capacity(argv.len() + 1);
        if elevate && self.use_sudo {
            line.push("sudo".to_string());
        }
        line.extend(argv.iter().cloned());
        line
    }

    async fn execute(&self, line: &[String]) -> Result<CommandResult, ExecError> {
        let (program, args) = line.split_first().ok_or(ExecError::EmptyCommand)?;
        let start = Instant::now();

        // Arguments are left out of logs: private source URLs embed tokens
        debug!(program = %program, args = args.len(), "executing local command");

        let child = Command::new(program)
            .args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| ExecError::SpawnError {
                program: program.clone(),
                message: e.to_string(),
            })?;

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| ExecError::IoError(e.to_string()))?;

        let duration = start.elapsed();

        let status = output.status.code().unwrap_or(-1);
        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        debug!(
            program = %program,
            status = status,
            duration = ?duration,
            "command completed"
        );

        if !output.status.success() {
            error!(
                program = %program,
                status = status,
                stderr = %stderr,
                "command failed"
            );
        }

        Ok(CommandResult {
            status,
            stdout,
            stderr,
            duration,
        })
    }
}

impl Default for LocalRunner {
    fn default() -> Self {
        Self::new(true)
    }
}

#[async_trait]
impl CommandRunner for LocalRunner {
    #[instrument(skip(self, argv), fields(program = argv.first().map(String::as_str)), level = "debug")]
    async fn run(&self, argv: &[String], elevate: bool) -> Result<CommandResult, ExecError> {
        let line = self.command_line(argv, elevate);
        self.execute(&line).await
    }
}
