//! Installer: groups package requests by manager and dispatches them

use std::path::Path;
use std::sync::Arc;

use cappa_exec::{CachingResolver, CommandResult, CommandRunner, ExecutableResolver};
use tracing::{debug, info, instrument, warn};

use crate::cleanup::Cleanup;
use crate::config::InstallerConfig;
use crate::env::{Environment, ProcessEnvironment};
use crate::error::PackageError;
use crate::fs::{Filesystem, LocalFilesystem, WorkdirGuard};
use crate::platform::Platform;
use crate::registry::Registry;
use crate::spec::{
    GroupEntry, GroupSpec, ManifestDescriptor, PackageSpec, SYSTEM_KEY, extract_manager,
    private_repo_url,
};
use crate::types::{GroupOutcome, InstallReport, InstallScope, ManagerKind, PackageRequest};

/// Contents written to `~/.bowerrc` before the first bower install
const BOWERRC: &str = r#"{"analytics": false}"#;

/// Package installer
///
/// Runs one command per manager group, sequentially. In strict mode the
/// first failing group aborts the run; in warn mode failures are logged,
/// recorded in the [`InstallReport`] and the remaining groups proceed.
pub struct Installer {
    config: InstallerConfig,
    runner: Arc<dyn CommandRunner>,
    resolver: Arc<dyn ExecutableResolver>,
    fs: Arc<dyn Filesystem>,
    env: Arc<dyn Environment>,
    platform: Platform,
}

impl Installer {
    /// Create an installer using the local filesystem, process environment,
    /// `PATH` lookup and the detected platform
    pub fn new(config: InstallerConfig, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            config,
            runner,
            resolver: Arc::new(CachingResolver::new()),
            fs: Arc::new(LocalFilesystem),
            env: Arc::new(ProcessEnvironment),
            platform: Platform::detect(),
        }
    }

    /// Set executable resolver
    #[must_use]
    pub fn with_resolver(mut self, resolver: Arc<dyn ExecutableResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    /// Set filesystem
    #[must_use]
    pub fn with_filesystem(mut self, fs: Arc<dyn Filesystem>) -> Self {
        self.fs = fs;
        self
    }

    /// Set environment
    #[must_use]
    pub fn with_environment(mut self, env: Arc<dyn Environment>) -> Self {
        self.env = env;
        self
    }

    /// Override the detected platform
    #[must_use]
    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    fn scope(&self) -> InstallScope {
        InstallScope {
            use_venv: self.config.use_venv,
            is_mac: self.platform.is_mac(),
        }
    }

    /// Install every package in `spec`
    ///
    /// # Errors
    /// In strict mode, returns the first group error. In warn mode group
    /// errors are reported through the returned [`InstallReport`] instead.
    #[instrument(skip(self, spec), fields(warn_mode = self.config.warn_mode))]
    pub async fn install(&self, spec: &PackageSpec) -> Result<InstallReport, PackageError> {
        let mut report = InstallReport::default();

        match spec {
            PackageSpec::List(tokens) => self.install_list(tokens, &mut report).await?,
            PackageSpec::Mapping(groups) => self.install_mapping(groups, &mut report).await?,
        }

        info!(
            installed = report.installed_count(),
            skipped = report.skipped().count(),
            "install finished"
        );
        Ok(report)
    }

    async fn install_list(
        &self,
        tokens: &[String],
        report: &mut InstallReport,
    ) -> Result<(), PackageError> {
        let mut groups: Vec<(ManagerKind, Vec<PackageRequest>)> = Vec::new();

        for token in tokens {
            let request = extract_manager(token).and_then(|(manager, name, options)| {
                let request = PackageRequest::new(manager, name)?;
                Ok(options.into_iter().fold(request, PackageRequest::with_option))
            });

            match request {
                Ok(request) => {
                    let kind = request.effective_kind();
                    match groups.iter_mut().find(|(k, _)| *k == kind) {
                        Some((_, requests)) => requests.push(request),
                        None => groups.push((kind, vec![request])),
                    }
                }
                Err(e) => self.settle(token, Err(e), report)?,
            }
        }

        for (kind, requests) in groups {
            let outcome = self.install_packages(kind.key(), kind, &requests).await;
            self.settle(kind.key(), outcome, report)?;
        }
        Ok(())
    }

    async fn install_mapping(
        &self,
        groups: &[GroupEntry],
        report: &mut InstallReport,
    ) -> Result<(), PackageError> {
        // System packages go first so the cache refresh precedes everything
        let (system, rest): (Vec<&GroupEntry>, Vec<&GroupEntry>) =
            groups.iter().partition(|g| g.key == SYSTEM_KEY);

        for entry in system.into_iter().chain(rest) {
            match &entry.spec {
                Ok(GroupSpec::Private(repos)) => {
                    self.install_private(&entry.key, repos, report).await?;
                }
                Ok(spec) => {
                    let outcome = self.install_group(&entry.key, spec).await;
                    self.settle(&entry.key, outcome, report)?;
                }
                Err(e) => self.settle(&entry.key, Err(e.clone()), report)?,
            }
        }
        Ok(())
    }

    async fn install_group(
        &self,
        key: &str,
        spec: &GroupSpec,
    ) -> Result<GroupOutcome, PackageError> {
        match spec {
            GroupSpec::System(names) => self.install_system(key, names).await,
            GroupSpec::Packages(packages) => {
                let kind = Registry::lookup(key)?;
                let requests = packages
                    .iter()
                    .map(|(name, version)| {
                        PackageRequest::new(kind, name.clone())
                            .map(|r| r.with_version(version.clone()))
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                self.install_packages(key, kind, &requests).await
            }
            GroupSpec::Manifest(manifest) => {
                let kind = Registry::lookup(key)?;
                self.install_manifest(key, kind, manifest).await
            }
            GroupSpec::Private(_) => Err(PackageError::InvalidSpec(format!(
                "{key}: private repositories cannot be nested"
            ))),
        }
    }

    /// Refresh the apt cache, then install system packages
    ///
    /// Off Ubuntu the refresh fails the group in strict mode; in warn mode
    /// only the refresh is skipped.
    async fn install_system(
        &self,
        key: &str,
        names: &[String],
    ) -> Result<GroupOutcome, PackageError> {
        let requests = names
            .iter()
            .map(|name| PackageRequest::new(ManagerKind::Apt, name.clone()))
            .collect::<Result<Vec<_>, _>>()?;

        if self.platform.supports_system_packages() {
            let apt_get = self.resolve_executable(ManagerKind::Apt)?;
            info!("updating apt cache");
            self.run_checked(&[apt_get, "update".to_string()], true)
                .await?;
        } else if self.config.warn_mode {
            warn!(platform = %self.platform, "apt cache refresh is only supported on Ubuntu, skipping");
        } else {
            return Err(PackageError::UnsupportedPlatform(format!(
                "system packages are only supported on Ubuntu, not {}",
                self.platform
            )));
        }

        self.install_packages(key, ManagerKind::Apt, &requests).await
    }

    /// Rewrite private repositories into source URLs and install them
    async fn install_private(
        &self,
        key: &str,
        repos: &[(String, Vec<String>)],
        report: &mut InstallReport,
    ) -> Result<(), PackageError> {
        for (manager_key, names) in repos {
            let group = format!("{key}.{manager_key}");
            let outcome = self.install_private_group(&group, manager_key, names).await;
            self.settle(&group, outcome, report)?;
        }
        Ok(())
    }

    async fn install_private_group(
        &self,
        group: &str,
        manager_key: &str,
        names: &[String],
    ) -> Result<GroupOutcome, PackageError> {
        let kind = Registry::lookup_private(manager_key)?;

        let token = if self.config.private_https_oauth {
            let token = self
                .env
                .var(&self.config.token_var)
                .filter(|t| !t.is_empty())
                .ok_or_else(|| PackageError::MissingCredential(self.config.token_var.clone()))?;
            Some(token)
        } else {
            None
        };

        let requests = names
            .iter()
            .map(|repo| {
                if repo.trim().is_empty() {
                    return Err(PackageError::InvalidSpec(format!(
                        "{group}: empty repository name"
                    )));
                }
                let url = private_repo_url(&self.config.organization, repo, token.as_deref());
                PackageRequest::new(kind, url)
            })
            .collect::<Result<Vec<_>, _>>()?;

        let outcome = self.install_packages(group, kind, &requests).await?;

        // Keep the token out of the report
        Ok(match (outcome, token) {
            (
                GroupOutcome::Installed {
                    group,
                    manager,
                    packages,
                },
                Some(token),
            ) => GroupOutcome::Installed {
                group,
                manager,
                packages: packages.iter().map(|p| p.replace(&token, "***")).collect(),
            },
            (outcome, _) => outcome,
        })
    }

    /// Install package arguments with one command, then purge residues
    async fn install_packages(
        &self,
        group: &str,
        kind: ManagerKind,
        requests: &[PackageRequest],
    ) -> Result<GroupOutcome, PackageError> {
        if requests.is_empty() {
            debug!(group, "no packages listed");
            return Ok(GroupOutcome::Installed {
                group: group.to_string(),
                manager: kind,
                packages: Vec::new(),
            });
        }

        let result = self.dispatch_packages(group, kind, requests).await;
        self.cleanup(kind).await;
        result
    }

    async fn dispatch_packages(
        &self,
        group: &str,
        kind: ManagerKind,
        requests: &[PackageRequest],
    ) -> Result<GroupOutcome, PackageError> {
        let adapter = kind.adapter();
        let scope = self.scope();

        if kind == ManagerKind::Bower {
            self.setup_bower();
        }
        let executable = self.resolve_executable(kind)?;

        let mut flags = adapter.install_options();
        for option in requests.iter().flat_map(|r| r.options.iter()) {
            let flag = option.flag().to_string();
            if !flags.contains(&flag) {
                flags.push(flag);
            }
        }

        let packages: Vec<String> = requests
            .iter()
            .map(|r| adapter.package_argument(&r.name, &r.version))
            .collect();

        let mut argv = vec![executable, "install".to_string()];
        argv.extend(flags);
        argv.extend(packages.iter().cloned());

        info!(group, manager = %kind, count = packages.len(), "installing packages");
        self.run_checked(&argv, adapter.requires_elevation(&scope))
            .await?;

        Ok(GroupOutcome::Installed {
            group: group.to_string(),
            manager: kind,
            packages,
        })
    }

    /// Write the manager's manifest file and run a bare `install`
    async fn install_manifest(
        &self,
        group: &str,
        kind: ManagerKind,
        manifest: &ManifestDescriptor,
    ) -> Result<GroupOutcome, PackageError> {
        let result = self.dispatch_manifest(group, kind, manifest).await;
        self.cleanup(kind).await;
        result
    }

    async fn dispatch_manifest(
        &self,
        group: &str,
        kind: ManagerKind,
        manifest: &ManifestDescriptor,
    ) -> Result<GroupOutcome, PackageError> {
        let adapter = kind.adapter();
        let file = adapter.manifest_file.ok_or_else(|| {
            PackageError::InvalidSpec(format!("{kind} does not install from a manifest file"))
        })?;

        if kind == ManagerKind::Bower {
            self.setup_bower();
        }
        let executable = self.resolve_executable(kind)?;
        let contents = manifest.to_json()?;

        let _guard = WorkdirGuard::enter(self.fs.as_ref(), manifest.target_dir.as_deref())?;
        let path = Path::new(file);
        self.fs.write(path, &contents)?;

        info!(group, manager = %kind, file, "installing from manifest");
        let result = self
            .run_checked(
                &[executable, "install".to_string()],
                adapter.requires_elevation(&self.scope()),
            )
            .await;

        if let Err(e) = self.fs.remove(path) {
            warn!(file, error = %e, "failed to remove manifest file");
        }
        result?;

        Ok(GroupOutcome::Installed {
            group: group.to_string(),
            manager: kind,
            packages: vec![file.to_string()],
        })
    }

    /// Write `~/.bowerrc` once so bower never prompts for analytics
    fn setup_bower(&self) {
        let Some(home) = self.env.home_dir() else {
            warn!("home directory unknown, not writing .bowerrc");
            return;
        };

        let path = home.join(".bowerrc");
        if self.fs.exists(&path) {
            return;
        }
        match self.fs.write(&path, BOWERRC) {
            Ok(()) => debug!(path = %path.display(), "wrote bower config"),
            Err(e) => warn!(path = %path.display(), error = %e, "failed to write bower config"),
        }
    }

    async fn cleanup(&self, kind: ManagerKind) {
        let Some(residue) = kind.adapter().residue else {
            return;
        };

        Cleanup {
            runner: self.runner.as_ref(),
            resolver: self.resolver.as_ref(),
            fs: self.fs.as_ref(),
            env: self.env.as_ref(),
            elevate: !self.platform.is_mac(),
        }
        .purge(residue)
        .await;
    }

    fn resolve_executable(&self, kind: ManagerKind) -> Result<String, PackageError> {
        let name = kind.adapter().executable;
        self.resolver
            .resolve(name)
            .map(|path| path.to_string_lossy().into_owned())
            .ok_or_else(|| PackageError::MissingExecutable(name.to_string()))
    }

    async fn run_checked(
        &self,
        argv: &[String],
        elevate: bool,
    ) -> Result<CommandResult, PackageError> {
        let result = self.runner.run(argv, elevate).await?;

        if !result.success() {
            // Program and subcommand only: arguments may carry credentials
            let command = argv.iter().take(2).cloned().collect::<Vec<_>>().join(" ");
            return Err(PackageError::CommandFailed {
                command,
                status: result.status,
                message: result.stderr.trim().to_string(),
            });
        }
        Ok(result)
    }

    /// Apply the warn-mode policy to a group outcome
    fn settle(
        &self,
        group: &str,
        outcome: Result<GroupOutcome, PackageError>,
        report: &mut InstallReport,
    ) -> Result<(), PackageError> {
        match outcome {
            Ok(outcome) => {
                report.push(outcome);
                Ok(())
            }
            Err(e) if self.config.warn_mode => {
                if e.is_external() {
                    warn!(group, error = %e, "install command failed, continuing");
                } else {
                    warn!(group, error = %e, "skipping group");
                }
                report.push(GroupOutcome::Skipped {
                    group: group.to_string(),
                    reason: e.to_string(),
                });
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}
