//! cappa-pkg: Package installation orchestration
//!
//! Parses package specs (flat `manager-name` token lists or nested
//! manager → package → version mappings), maps manager keys to adapters
//! and dispatches one install command per manager group
//! (pip, pip3, pip_pypy, apt, npm, bower, tsd)

mod cleanup;
pub mod config;
pub mod env;
pub mod error;
pub mod fs;
pub mod installer;
pub mod platform;
pub mod registry;
pub mod spec;
pub mod types;

pub use config::InstallerConfig;
pub use env::{Environment, ProcessEnvironment};
pub use error::PackageError;
pub use fs::{Filesystem, LocalFilesystem, WorkdirGuard};
pub use installer::Installer;
pub use platform::Platform;
pub use registry::{ManagerAdapter, Registry, Residue};
pub use spec::{
    GroupEntry, GroupSpec, ManifestDescriptor, PackageSpec, extract_manager, private_repo_url,
};
pub use types::{
    GroupOutcome, InstallOption, InstallReport, InstallScope, ManagerKind, PackageRequest,
    VersionConstraint,
};
