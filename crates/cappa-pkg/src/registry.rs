//! Manager registry: manager keys to adapter records

use crate::error::PackageError;
use crate::types::{InstallScope, ManagerKind, VersionConstraint};

/// Temporary files a manager leaves behind after an install
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Residue {
    /// `npm-*` entries under `npm config get tmp`
    Npm,
    /// `pip-*` entries under the temp directory
    Pip,
}

impl Residue {
    /// File name prefix of residual entries
    #[must_use]
    pub fn prefix(self) -> &'static str {
        match self {
            Residue::Npm => "npm-",
            Residue::Pip => "pip-",
        }
    }
}

/// When an install needs root privileges
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Elevation {
    Never,
    Always,
    /// Global npm prefixes are user-writable on macOS
    UnlessMac,
    /// Outside a virtualenv pip writes to the system site-packages
    UnlessVenv,
}

/// Capabilities of one package manager
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagerAdapter {
    /// Manager kind
    pub kind: ManagerKind,
    /// Executable name looked up on `PATH`
    pub executable: &'static str,
    /// Symbol joining package name and version, `None` if unversioned
    pub connector: Option<&'static str>,
    /// Native manifest file name, if the manager installs from one
    pub manifest_file: Option<&'static str>,
    /// Residue purged after each install
    pub residue: Option<Residue>,
    flags: &'static [&'static str],
    elevation: Elevation,
}

const PIP: ManagerAdapter = ManagerAdapter {
    kind: ManagerKind::Pip,
    executable: "pip",
    connector: Some("=="),
    manifest_file: None,
    residue: Some(Residue::Pip),
    flags: &[],
    elevation: Elevation::UnlessVenv,
};

const PIP3: ManagerAdapter = ManagerAdapter {
    kind: ManagerKind::Pip3,
    executable: "pip3",
    ..PIP
};

const PIP_PYPY: ManagerAdapter = ManagerAdapter {
    kind: ManagerKind::PipPypy,
    executable: "pip_pypy",
    ..PIP
};

const PRIVATE_PIP: ManagerAdapter = ManagerAdapter {
    kind: ManagerKind::PrivatePip,
    ..PIP
};

const PRIVATE_PIP3: ManagerAdapter = ManagerAdapter {
    kind: ManagerKind::PrivatePip3,
    executable: "pip3",
    ..PIP
};

const APT: ManagerAdapter = ManagerAdapter {
    kind: ManagerKind::Apt,
    executable: "apt-get",
    connector: None,
    manifest_file: None,
    residue: None,
    flags: &["-y"],
    elevation: Elevation::Always,
};

const NPM: ManagerAdapter = ManagerAdapter {
    kind: ManagerKind::Npm,
    executable: "npm",
    connector: Some("@"),
    manifest_file: Some("package.json"),
    residue: Some(Residue::Npm),
    flags: &[],
    elevation: Elevation::Never,
};

const NPM_GLOBAL: ManagerAdapter = ManagerAdapter {
    kind: ManagerKind::NpmGlobal,
    manifest_file: None,
    flags: &["-g"],
    elevation: Elevation::UnlessMac,
    ..NPM
};

const BOWER: ManagerAdapter = ManagerAdapter {
    kind: ManagerKind::Bower,
    executable: "bower",
    connector: Some("#"),
    manifest_file: Some("bower.json"),
    residue: None,
    flags: &[],
    elevation: Elevation::Never,
};

const TSD: ManagerAdapter = ManagerAdapter {
    kind: ManagerKind::Tsd,
    executable: "tsd",
    connector: None,
    manifest_file: None,
    residue: None,
    flags: &[],
    elevation: Elevation::Never,
};

impl ManagerAdapter {
    /// Flags placed after `install`
    ///
    /// Host-dependent behaviour (sudo for system-wide pip, global npm off
    /// macOS) is decided by [`requires_elevation`](Self::requires_elevation).
    #[must_use]
    pub fn install_options(&self) -> Vec<String> {
        self.flags.iter().map(ToString::to_string).collect()
    }

    /// Whether the install command must run elevated
    #[must_use]
    pub fn requires_elevation(&self, scope: &InstallScope) -> bool {
        match self.elevation {
            Elevation::Never => false,
            Elevation::Always => true,
            Elevation::UnlessMac => !scope.is_mac,
            Elevation::UnlessVenv => !scope.use_venv,
        }
    }

    /// Render a package argument with its version constraint
    ///
    /// Managers without a connector get the bare name; the version is
    /// dropped rather than rejected.
    #[must_use]
    pub fn package_argument(&self, name: &str, version: &VersionConstraint) -> String {
        match (self.connector, version) {
            (None, _) | (_, VersionConstraint::Any) => name.to_string(),
            (Some(_), VersionConstraint::Range { lower, upper }) => {
                format!("{name}>={lower},<{upper}")
            }
            (Some(connector), VersionConstraint::Exact(v)) => format!("{name}{connector}{v}"),
        }
    }
}

impl ManagerKind {
    /// Adapter record for this kind
    #[must_use]
    pub fn adapter(self) -> &'static ManagerAdapter {
        match self {
            ManagerKind::Pip => &PIP,
            ManagerKind::Pip3 => &PIP3,
            ManagerKind::PipPypy => &PIP_PYPY,
            ManagerKind::Apt => &APT,
            ManagerKind::Npm => &NPM,
            ManagerKind::NpmGlobal => &NPM_GLOBAL,
            ManagerKind::Bower => &BOWER,
            ManagerKind::Tsd => &TSD,
            ManagerKind::PrivatePip => &PRIVATE_PIP,
            ManagerKind::PrivatePip3 => &PRIVATE_PIP3,
        }
    }
}

/// Lookup of manager keys used in package specs
#[derive(Debug, Clone, Copy, Default)]
pub struct Registry;

impl Registry {
    /// Map a spec key (`pip`, `sys`, `npmg`, ...) to its manager
    ///
    /// # Errors
    /// Returns `PackageError::UnknownManager` for unrecognized keys
    pub fn lookup(key: &str) -> Result<ManagerKind, PackageError> {
        match key {
            "pip" => Ok(ManagerKind::Pip),
            "pip3" => Ok(ManagerKind::Pip3),
            "pip_pypy" => Ok(ManagerKind::PipPypy),
            "sys" => Ok(ManagerKind::Apt),
            "npm" => Ok(ManagerKind::Npm),
            "npmg" => Ok(ManagerKind::NpmGlobal),
            "bower" => Ok(ManagerKind::Bower),
            "tsd" => Ok(ManagerKind::Tsd),
            _ => Err(PackageError::UnknownManager(format!(
                "{key} is not a supported manager"
            ))),
        }
    }

    /// Map a key under the private-repository group to its manager
    ///
    /// # Errors
    /// Returns `PackageError::UnknownManager` for managers without private
    /// repository support
    pub fn lookup_private(key: &str) -> Result<ManagerKind, PackageError> {
        match key {
            "pip" => Ok(ManagerKind::PrivatePip),
            "pip3" => Ok(ManagerKind::PrivatePip3),
            _ => Err(PackageError::UnknownManager(format!(
                "{key} is not a supported private repo manager"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [ManagerKind; 10] = [
        ManagerKind::Pip,
        ManagerKind::Pip3,
        ManagerKind::PipPypy,
        ManagerKind::Apt,
        ManagerKind::Npm,
        ManagerKind::NpmGlobal,
        ManagerKind::Bower,
        ManagerKind::Tsd,
        ManagerKind::PrivatePip,
        ManagerKind::PrivatePip3,
    ];

    #[test]
    fn test_adapter_kind_matches() {
        for kind in ALL {
            assert_eq!(kind.adapter().kind, kind);
        }
    }

    #[test]
    fn test_lookup_round_trips_public_keys() {
        for kind in ALL {
            if matches!(kind, ManagerKind::PrivatePip | ManagerKind::PrivatePip3) {
                continue;
            }
            assert_eq!(Registry::lookup(kind.key()).unwrap(), kind);
        }
    }

    #[test]
    fn test_lookup_unknown() {
        assert!(matches!(
            Registry::lookup("gem"),
            Err(PackageError::UnknownManager(_))
        ));
        assert!(matches!(
            Registry::lookup_private("npm"),
            Err(PackageError::UnknownManager(_))
        ));
        assert_eq!(
            Registry::lookup_private("pip3").unwrap(),
            ManagerKind::PrivatePip3
        );
    }

    #[test]
    fn test_package_argument() {
        let pip = ManagerKind::Pip.adapter();
        assert_eq!(pip.package_argument("flask", &VersionConstraint::Any), "flask");
        assert_eq!(
            pip.package_argument("requests", &VersionConstraint::Exact("2.0.0".into())),
            "requests==2.0.0"
        );

        let npm = ManagerKind::Npm.adapter();
        let range = VersionConstraint::Range {
            lower: "3.0.0".into(),
            upper: "4.0.0".into(),
        };
        assert_eq!(npm.package_argument("lodash", &range), "lodash>=3.0.0,<4.0.0");
        assert_eq!(
            npm.package_argument("lodash", &VersionConstraint::Exact("4.17.0".into())),
            "lodash@4.17.0"
        );

        let bower = ManagerKind::Bower.adapter();
        assert_eq!(
            bower.package_argument("jquery", &VersionConstraint::Exact("2.1.4".into())),
            "jquery#2.1.4"
        );
    }

    #[test]
    fn test_unversioned_manager_drops_version() {
        let apt = ManagerKind::Apt.adapter();
        assert_eq!(
            apt.package_argument("curl", &VersionConstraint::Exact("7.0".into())),
            "curl"
        );
        let range = VersionConstraint::Range {
            lower: "1".into(),
            upper: "2".into(),
        };
        assert_eq!(apt.package_argument("curl", &range), "curl");
    }

    #[test]
    fn test_elevation() {
        let venv = InstallScope {
            use_venv: true,
            is_mac: false,
        };
        let system = InstallScope {
            use_venv: false,
            is_mac: true,
        };

        assert!(ManagerKind::Apt.adapter().requires_elevation(&venv));
        assert!(!ManagerKind::Pip.adapter().requires_elevation(&venv));
        assert!(ManagerKind::Pip.adapter().requires_elevation(&system));
        assert!(ManagerKind::NpmGlobal.adapter().requires_elevation(&venv));
        assert!(!ManagerKind::NpmGlobal.adapter().requires_elevation(&system));
        assert!(!ManagerKind::Npm.adapter().requires_elevation(&system));
    }

    #[test]
    fn test_install_options() {
        assert_eq!(ManagerKind::Apt.adapter().install_options(), vec!["-y"]);
        assert_eq!(ManagerKind::NpmGlobal.adapter().install_options(), vec!["-g"]);
        assert!(ManagerKind::Pip.adapter().install_options().is_empty());
    }

    #[test]
    fn test_manifest_files() {
        assert_eq!(ManagerKind::Npm.adapter().manifest_file, Some("package.json"));
        assert_eq!(ManagerKind::Bower.adapter().manifest_file, Some("bower.json"));
        assert!(ManagerKind::NpmGlobal.adapter().manifest_file.is_none());
        assert!(ManagerKind::Pip.adapter().manifest_file.is_none());
    }
}
