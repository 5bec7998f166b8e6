//! Installer configuration

use serde::{Deserialize, Serialize};

/// Installer settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstallerConfig {
    /// Log and skip failing groups instead of aborting
    pub warn_mode: bool,
    /// Fetch private repositories over HTTPS with an OAuth token
    pub private_https_oauth: bool,
    /// pip installs target an active virtualenv (no sudo)
    pub use_venv: bool,
    /// Spec key and GitHub organization of private repositories
    pub organization: String,
    /// Environment variable holding the OAuth token
    pub token_var: String,
    /// Prefix elevated commands with sudo
    pub use_sudo: bool,
}

impl Default for InstallerConfig {
    fn default() -> Self {
        Self {
            warn_mode: false,
            private_https_oauth: false,
            use_venv: true,
            organization: "Captricity".to_string(),
            token_var: "GITHUB_TOKEN".to_string(),
            use_sudo: true,
        }
    }
}

impl InstallerConfig {
    /// Set warn mode
    #[must_use]
    pub fn with_warn_mode(mut self, warn_mode: bool) -> Self {
        self.warn_mode = warn_mode;
        self
    }

    /// Set HTTPS OAuth mode for private repositories
    #[must_use]
    pub fn with_https_oauth(mut self, enabled: bool) -> Self {
        self.private_https_oauth = enabled;
        self
    }

    /// Set virtualenv mode
    #[must_use]
    pub fn with_venv(mut self, use_venv: bool) -> Self {
        self.use_venv = use_venv;
        self
    }
}
