//! Type definitions for package installation

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::PackageError;

/// Package manager kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ManagerKind {
    /// pip (Python 2 / default interpreter)
    Pip,
    /// pip3
    Pip3,
    /// pip for PyPy
    PipPypy,
    /// apt-get (system packages)
    Apt,
    /// npm, local install
    Npm,
    /// npm, global install
    NpmGlobal,
    /// Bower
    Bower,
    /// TypeScript definition manager
    Tsd,
    /// pip from private git repositories
    PrivatePip,
    /// pip3 from private git repositories
    PrivatePip3,
}

impl ManagerKind {
    /// Key used for this manager in package specs
    #[must_use]
    pub fn key(self) -> &'static str {
        match self {
            ManagerKind::Pip | ManagerKind::PrivatePip => "pip",
            ManagerKind::Pip3 | ManagerKind::PrivatePip3 => "pip3",
            ManagerKind::PipPypy => "pip_pypy",
            ManagerKind::Apt => "sys",
            ManagerKind::Npm => "npm",
            ManagerKind::NpmGlobal => "npmg",
            ManagerKind::Bower => "bower",
            ManagerKind::Tsd => "tsd",
        }
    }
}

impl fmt::Display for ManagerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ManagerKind::Pip => write!(f, "pip"),
            ManagerKind::Pip3 => write!(f, "pip3"),
            ManagerKind::PipPypy => write!(f, "pip_pypy"),
            ManagerKind::Apt => write!(f, "apt"),
            ManagerKind::Npm => write!(f, "npm"),
            ManagerKind::NpmGlobal => write!(f, "npm (global)"),
            ManagerKind::Bower => write!(f, "bower"),
            ManagerKind::Tsd => write!(f, "tsd"),
            ManagerKind::PrivatePip => write!(f, "pip (private)"),
            ManagerKind::PrivatePip3 => write!(f, "pip3 (private)"),
        }
    }
}

/// Version requirement attached to a package
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionConstraint {
    /// No constraint
    #[default]
    Any,
    /// Exactly this version
    Exact(String),
    /// At least `lower`, below `upper`
    Range {
        /// Inclusive lower bound
        lower: String,
        /// Exclusive upper bound
        upper: String,
    },
}

/// Per-package install option
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallOption {
    /// Install into the global prefix (`-g`)
    Global,
}

impl InstallOption {
    /// Command-line flag for this option
    #[must_use]
    pub fn flag(self) -> &'static str {
        match self {
            InstallOption::Global => "-g",
        }
    }
}

impl fmt::Display for InstallOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstallOption::Global => write!(f, "global"),
        }
    }
}

/// A single package to install
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageRequest {
    /// Manager that owns the package
    pub manager: ManagerKind,
    /// Package name (or source URL)
    pub name: String,
    /// Version requirement
    pub version: VersionConstraint,
    /// Extra install options
    pub options: BTreeSet<InstallOption>,
}

impl PackageRequest {
    /// Create an unconstrained request
    ///
    /// # Errors
    /// Returns `PackageError::InvalidSpec` if `name` is empty
    pub fn new(manager: ManagerKind, name: impl Into<String>) -> Result<Self, PackageError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(PackageError::InvalidSpec(format!(
                "empty package name for {manager}"
            )));
        }
        Ok(Self {
            manager,
            name,
            version: VersionConstraint::Any,
            options: BTreeSet::new(),
        })
    }

    /// Set version constraint
    #[must_use]
    pub fn with_version(mut self, version: VersionConstraint) -> Self {
        self.version = version;
        self
    }

    /// Add an install option
    #[must_use]
    pub fn with_option(mut self, option: InstallOption) -> Self {
        self.options.insert(option);
        self
    }

    /// Manager kind the request is dispatched to once options are applied
    #[must_use]
    pub fn effective_kind(&self) -> ManagerKind {
        match self.manager {
            ManagerKind::Npm if self.options.contains(&InstallOption::Global) => {
                ManagerKind::NpmGlobal
            }
            kind => kind,
        }
    }
}

/// Host facts that decide install flags and privilege escalation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstallScope {
    /// pip installs go into an active virtualenv
    pub use_venv: bool,
    /// Running on macOS (global npm needs no sudo)
    pub is_mac: bool,
}

impl Default for InstallScope {
    fn default() -> Self {
        Self {
            use_venv: true,
            is_mac: false,
        }
    }
}

/// Outcome of a single manager group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum GroupOutcome {
    /// Install command ran successfully
    Installed {
        /// Group key from the spec
        group: String,
        /// Manager that ran
        manager: ManagerKind,
        /// Package arguments passed to the manager
        packages: Vec<String>,
    },
    /// Group was skipped in warn mode
    Skipped {
        /// Group key from the spec
        group: String,
        /// Why the group was skipped
        reason: String,
    },
}

/// Result of an install run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallReport {
    /// Group outcomes in execution order
    pub outcomes: Vec<GroupOutcome>,
}

impl InstallReport {
    /// Record an outcome
    pub fn push(&mut self, outcome: GroupOutcome) {
        self.outcomes.push(outcome);
    }

    /// Number of groups that installed
    #[must_use]
    pub fn installed_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, GroupOutcome::Installed { .. }))
            .count()
    }

    /// Groups skipped in warn mode
    pub fn skipped(&self) -> impl Iterator<Item = (&str, &str)> {
        self.outcomes.iter().filter_map(|o| match o {
            GroupOutcome::Skipped { group, reason } => Some((group.as_str(), reason.as_str())),
            GroupOutcome::Installed { .. } => None,
        })
    }
}
