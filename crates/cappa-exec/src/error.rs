//! Error types for cappa-exec

use thiserror::Error;

/// Errors that can occur while running an external command
#[derive(Error, Debug, Clone)]
pub enum ExecError {
    /// Empty argument vector
    #[error("empty command")]
    EmptyCommand,

    /// Process spawn error
    #[error("failed to spawn {program}: {message}")]
    SpawnError {
        /// Program that could not be started
        program: String,
        /// Underlying OS error
        message: String,
    },

    /// I/O error while waiting for the process
    #[error("I/O error: {0}")]
    IoError(String),
}
