//! Error types for cappa-pkg

use thiserror::Error;

/// Errors that can occur while parsing or installing packages
#[derive(Error, Debug, Clone)]
pub enum PackageError {
    /// Manager key or token prefix is not recognized
    #[error("unknown package manager: {0}")]
    UnknownManager(String),

    /// Manager is recognized but its executable is not installed
    #[error("{0} not found")]
    MissingExecutable(String),

    /// System packages requested on an unsupported OS family
    #[error("unsupported platform: {0}")]
    UnsupportedPlatform(String),

    /// Install command exited non-zero
    #[error("command failed: {command} ({status}) - {message}")]
    CommandFailed {
        /// Command line that was run
        command: String,
        /// Exit status
        status: i32,
        /// Error message
        message: String,
    },

    /// Install command could not be started
    #[error("execution error: {0}")]
    ExecutionError(String),

    /// Malformed package spec
    #[error("invalid package spec: {0}")]
    InvalidSpec(String),

    /// Credential needed for private sources is not set
    #[error("missing credential: environment variable {0} is not set")]
    MissingCredential(String),

    /// Filesystem error while handling manifest files
    #[error("I/O error: {0}")]
    Io(String),
}

impl PackageError {
    /// Check if error came from running the underlying manager
    #[must_use]
    pub fn is_external(&self) -> bool {
        matches!(
            self,
            PackageError::CommandFailed { .. } | PackageError::ExecutionError(_)
        )
    }
}

impl From<std::io::Error> for PackageError {
    fn from(e: std::io::Error) -> Self {
        PackageError::Io(e.to_string())
    }
}

impl From<cappa_exec::ExecError> for PackageError {
    fn from(e: cappa_exec::ExecError) -> Self {
        PackageError::ExecutionError(e.to_string())
    }
}
