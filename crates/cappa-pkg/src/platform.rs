//! Host platform detection

use std::fmt;

/// Operating system family of the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Platform {
    /// Ubuntu or a derivative (`ID_LIKE` contains `ubuntu`)
    Ubuntu,
    /// macOS
    MacOs,
    /// Anything else, by os-release `ID`
    Other(String),
}

impl Platform {
    /// Detect the running platform
    #[must_use]
    pub fn detect() -> Self {
        if cfg!(target_os = "macos") {
            return Platform::MacOs;
        }
        match std::fs::read_to_string("/etc/os-release") {
            Ok(content) => Self::from_os_release(&content),
            Err(_) => Platform::Other(std::env::consts::OS.to_string()),
        }
    }

    /// Classify from `/etc/os-release` contents
    #[must_use]
    pub fn from_os_release(content: &str) -> Self {
        let id = os_release_field(content, "ID").unwrap_or_default();
        let id_like = os_release_field(content, "ID_LIKE").unwrap_or_default();

        if id == "ubuntu" || id_like.split_whitespace().any(|like| like == "ubuntu") {
            Platform::Ubuntu
        } else if id.is_empty() {
            Platform::Other("unknown".to_string())
        } else {
            Platform::Other(id)
        }
    }

    /// Whether apt system packages are supported
    #[must_use]
    pub fn supports_system_packages(&self) -> bool {
        matches!(self, Platform::Ubuntu)
    }

    /// Whether the host is macOS
    #[must_use]
    pub fn is_mac(&self) -> bool {
        matches!(self, Platform::MacOs)
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Platform::Ubuntu => write!(f, "ubuntu"),
            Platform::MacOs => write!(f, "macos"),
            Platform::Other(id) => write!(f, "{id}"),
        }
    }
}

/// Read a `KEY=value` field, stripping quotes
fn os_release_field(content: &str, field: &str) -> Option<String> {
    content.lines().find_map(|line| {
        line.strip_prefix(field)
            .and_then(|rest| rest.strip_prefix('='))
            .map(|value| value.trim().trim_matches('"').to_string())
    })
}
