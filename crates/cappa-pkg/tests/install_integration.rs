use std::collections::{HashMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::json;

use cappa_exec::error::ExecError;
use cappa_exec::result::CommandResult;
use cappa_exec::traits::{CommandRunner, ExecutableResolver};
use cappa_pkg::*;

// Mock implementations

/// Records every command; answers `npm config get tmp` with `npm_tmp`
/// (or fails it when `npm_tmp_status` is non-zero)
#[derive(Default)]
struct MockRunner {
    commands: Mutex<Vec<(Vec<String>, bool)>>,
    npm_tmp: String,
    npm_tmp_status: i32,
    fail_program: Option<&'static str>,
}

impl MockRunner {
    fn commands(&self) -> Vec<(Vec<String>, bool)> {
        self.commands.lock().unwrap().clone()
    }

    fn argv(&self) -> Vec<Vec<String>> {
        self.commands().into_iter().map(|(argv, _)| argv).collect()
    }
}

#[async_trait]
impl CommandRunner for MockRunner {
    async fn run(&self, argv: &[String], elevate: bool) -> Result<CommandResult, ExecError> {
        self.commands
            .lock()
            .unwrap()
            .push((argv.to_vec(), elevate));

        if argv.len() == 4 && argv[1..] == ["config", "get", "tmp"] {
            if self.npm_tmp_status != 0 {
                return Ok(CommandResult::failed(self.npm_tmp_status, "npm config broken"));
            }
            return Ok(CommandResult::ok(format!("{}\n", self.npm_tmp)));
        }
        if self.fail_program.is_some_and(|p| argv[0] == p) {
            return Ok(CommandResult::failed(1, "install failed"));
        }
        Ok(CommandResult::ok(""))
    }
}

/// Resolves names to `/usr/bin/<name>` unless listed as missing
#[derive(Default)]
struct MockResolver {
    missing: HashSet<&'static str>,
}

impl ExecutableResolver for MockResolver {
    fn resolve(&self, name: &str) -> Option<PathBuf> {
        if self.missing.contains(name) {
            None
        } else {
            Some(PathBuf::from("/usr/bin").join(name))
        }
    }
}

/// In-memory filesystem with a tracked working directory
struct MockFilesystem {
    files: Mutex<HashMap<PathBuf, String>>,
    cwd: Mutex<PathBuf>,
    /// Every (cwd, path, contents) write, in order
    writes: Mutex<Vec<(PathBuf, PathBuf, String)>>,
    dirs: HashSet<PathBuf>,
}

impl MockFilesystem {
    fn new(dirs: &[&str]) -> Self {
        Self {
            files: Mutex::new(HashMap::new()),
            cwd: Mutex::new(PathBuf::from("/work")),
            writes: Mutex::new(Vec::new()),
            dirs: dirs.iter().map(PathBuf::from).collect(),
        }
    }

    fn with_file(self, path: &str) -> Self {
        self.files
            .lock()
            .unwrap()
            .insert(PathBuf::from(path), String::new());
        self
    }

    fn absolute(&self, path: &Path) -> PathBuf {
        self.cwd.lock().unwrap().join(path)
    }

    fn cwd(&self) -> PathBuf {
        self.cwd.lock().unwrap().clone()
    }

    fn writes(&self) -> Vec<(PathBuf, PathBuf, String)> {
        self.writes.lock().unwrap().clone()
    }

    fn file(&self, path: &str) -> Option<String> {
        self.files.lock().unwrap().get(Path::new(path)).cloned()
    }
}

impl Filesystem for MockFilesystem {
    fn exists(&self, path: &Path) -> bool {
        self.files.lock().unwrap().contains_key(&self.absolute(path))
    }

    fn write(&self, path: &Path, contents: &str) -> io::Result<()> {
        let absolute = self.absolute(path);
        self.writes
            .lock()
            .unwrap()
            .push((self.cwd(), path.to_path_buf(), contents.to_string()));
        self.files
            .lock()
            .unwrap()
            .insert(absolute, contents.to_string());
        Ok(())
    }

    fn remove(&self, path: &Path) -> io::Result<()> {
        self.files
            .lock()
            .unwrap()
            .remove(&self.absolute(path))
            .map(|_| ())
            .ok_or_else(|| io::Error::from(io::ErrorKind::NotFound))
    }

    fn list_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
        let files = self.files.lock().unwrap();
        let mut entries: Vec<PathBuf> = files
            .keys()
            .filter(|p| p.parent() == Some(path))
            .cloned()
            .collect();
        entries.sort();
        Ok(entries)
    }

    fn current_dir(&self) -> io::Result<PathBuf> {
        Ok(self.cwd())
    }

    fn set_current_dir(&self, path: &Path) -> io::Result<()> {
        let target = self.absolute(path);
        if !self.dirs.contains(&target) {
            return Err(io::Error::from(io::ErrorKind::NotFound));
        }
        *self.cwd.lock().unwrap() = target;
        Ok(())
    }
}

struct MockEnvironment {
    vars: HashMap<&'static str, &'static str>,
}

impl MockEnvironment {
    fn new(vars: &[(&'static str, &'static str)]) -> Self {
        Self {
            vars: vars.iter().copied().collect(),
        }
    }
}

impl Environment for MockEnvironment {
    fn var(&self, key: &str) -> Option<String> {
        self.vars.get(key).map(ToString::to_string)
    }

    fn home_dir(&self) -> Option<PathBuf> {
        Some(PathBuf::from("/home/dev"))
    }
}

struct Harness {
    runner: Arc<MockRunner>,
    fs: Arc<MockFilesystem>,
    installer: Installer,
}

fn harness(config: InstallerConfig, platform: Platform) -> Harness {
    harness_with(
        config,
        platform,
        MockRunner::default(),
        MockFilesystem::new(&["/work", "/work/web"]),
        MockEnvironment::new(&[]),
    )
}

fn harness_with(
    config: InstallerConfig,
    platform: Platform,
    runner: MockRunner,
    fs: MockFilesystem,
    env: MockEnvironment,
) -> Harness {
    let runner = Arc::new(runner);
    let fs = Arc::new(fs);
    let installer = Installer::new(config, runner.clone())
        .with_resolver(Arc::new(MockResolver::default()))
        .with_filesystem(fs.clone())
        .with_environment(Arc::new(env))
        .with_platform(platform);
    Harness {
        runner,
        fs,
        installer,
    }
}

fn spec(value: serde_json::Value) -> PackageSpec {
    PackageSpec::from_value(value, "Captricity").unwrap()
}

fn strings(parts: &[&str]) -> Vec<String> {
    parts.iter().map(ToString::to_string).collect()
}

#[tokio::test]
async fn test_system_packages_first() {
    let h = harness(InstallerConfig::default(), Platform::Ubuntu);

    // "bower" and "npm" sort before "sys" in the mapping
    h.installer
        .install(&spec(json!({
            "bower": {"jquery": null},
            "pip": {"flask": null},
            "sys": {"curl": null, "git": "1:2.0"}
        })))
        .await
        .unwrap();

    let commands = h.runner.commands();
    assert_eq!(
        commands[0],
        (strings(&["/usr/bin/apt-get", "update"]), true)
    );
    assert_eq!(
        commands[1],
        (
            strings(&["/usr/bin/apt-get", "install", "-y", "curl", "git"]),
            true
        )
    );
    let pip = commands
        .iter()
        .position(|(argv, _)| argv[0] == "/usr/bin/pip")
        .unwrap();
    assert!(pip > 1);
}

#[tokio::test]
async fn test_system_packages_unsupported_platform_strict() {
    let h = harness(
        InstallerConfig::default(),
        Platform::Other("fedora".to_string()),
    );

    let result = h
        .installer
        .install(&spec(json!({"sys": {"curl": null}, "pip": {"flask": null}})))
        .await;

    assert!(matches!(result, Err(PackageError::UnsupportedPlatform(_))));
    assert!(h.runner.commands().is_empty());
}

#[tokio::test]
async fn test_system_packages_unsupported_platform_warn() {
    let h = harness(
        InstallerConfig::default().with_warn_mode(true),
        Platform::Other("debian".to_string()),
    );

    let report = h
        .installer
        .install(&spec(json!({"sys": {"curl": null}, "pip": {"flask": null}})))
        .await
        .unwrap();

    // Only the cache refresh is skipped; the packages still install
    assert_eq!(report.skipped().count(), 0);
    assert_eq!(report.installed_count(), 2);
    let argv = h.runner.argv();
    assert_eq!(argv[0], strings(&["/usr/bin/apt-get", "install", "-y", "curl"]));
    assert!(argv.iter().all(|a| a.get(1).is_none_or(|sub| sub != "update")));
}

#[tokio::test]
async fn test_system_packages_warn_without_apt_get() {
    let h = harness(
        InstallerConfig::default().with_warn_mode(true),
        Platform::Other("fedora".to_string()),
    );
    let installer = h.installer.with_resolver(Arc::new(MockResolver {
        missing: HashSet::from(["apt-get"]),
    }));

    let report = installer
        .install(&spec(json!({"sys": {"curl": null}, "pip": {"flask": null}})))
        .await
        .unwrap();

    let skipped: Vec<_> = report.skipped().collect();
    assert_eq!(skipped, vec![("sys", "apt-get not found")]);
    assert_eq!(h.runner.argv(), vec![strings(&["/usr/bin/pip", "install", "flask"])]);
}

#[tokio::test]
async fn test_unknown_manager_strict_aborts() {
    let h = harness(InstallerConfig::default(), Platform::Ubuntu);

    // "gem" sorts before "pip": pip must not run
    let result = h
        .installer
        .install(&spec(json!({"gem": {"rails": null}, "pip": {"flask": null}})))
        .await;

    assert!(matches!(result, Err(PackageError::UnknownManager(_))));
    assert!(h.runner.commands().is_empty());
}

#[tokio::test]
async fn test_unknown_manager_warn_continues() {
    let h = harness(
        InstallerConfig::default().with_warn_mode(true),
        Platform::Ubuntu,
    );

    let report = h
        .installer
        .install(&spec(json!({"gem": {"rails": null}, "pip": {"flask": null}})))
        .await
        .unwrap();

    assert_eq!(report.outcomes.len(), 2);
    assert!(matches!(
        &report.outcomes[0],
        GroupOutcome::Skipped { group, .. } if group == "gem"
    ));
    assert!(matches!(
        &report.outcomes[1],
        GroupOutcome::Installed { manager: ManagerKind::Pip, packages, .. } if packages == &["flask"]
    ));
}

#[tokio::test]
async fn test_command_failure_warn_continues() {
    let runner = MockRunner {
        fail_program: Some("/usr/bin/npm"),
        ..Default::default()
    };
    let h = harness_with(
        InstallerConfig::default().with_warn_mode(true),
        Platform::Ubuntu,
        runner,
        MockFilesystem::new(&["/work"]),
        MockEnvironment::new(&[]),
    );

    let report = h
        .installer
        .install(&spec(json!({"npm": {"gulp": null}, "pip": {"flask": null}})))
        .await
        .unwrap();

    let skipped: Vec<_> = report.skipped().collect();
    assert_eq!(skipped.len(), 1);
    assert_eq!(skipped[0].0, "npm");
    assert!(skipped[0].1.contains("install failed"));
    assert_eq!(report.installed_count(), 1);
}

#[tokio::test]
async fn test_private_repos_ssh() {
    let h = harness(InstallerConfig::default(), Platform::Ubuntu);

    let report = h
        .installer
        .install(&spec(json!({"Captricity": {"pip": ["captools"]}})))
        .await
        .unwrap();

    assert_eq!(h.runner.argv()[0], strings(&[
        "/usr/bin/pip",
        "install",
        "git+ssh://git@github.com/Captricity/captools.git@master"
    ]));
    assert!(matches!(
        &report.outcomes[0],
        GroupOutcome::Installed { manager: ManagerKind::PrivatePip, .. }
    ));
}

#[tokio::test]
async fn test_private_repos_https_oauth() {
    let h = harness_with(
        InstallerConfig::default().with_https_oauth(true),
        Platform::Ubuntu,
        MockRunner::default(),
        MockFilesystem::new(&["/work"]),
        MockEnvironment::new(&[("GITHUB_TOKEN", "T")]),
    );

    let report = h
        .installer
        .install(&spec(json!({"Captricity": {"pip3": ["captools", "capauth"]}})))
        .await
        .unwrap();

    let argv = &h.runner.argv()[0];
    assert_eq!(argv[0], "/usr/bin/pip3");
    assert!(argv[2].contains("https://T@"));
    assert!(argv.iter().all(|a| !a.contains("ssh://")));
    assert_eq!(argv.len(), 4);

    // The token never reaches the report
    let GroupOutcome::Installed { packages, .. } = &report.outcomes[0] else {
        panic!("expected install");
    };
    assert!(packages.iter().all(|p| !p.contains("T@")));
}

#[tokio::test]
async fn test_private_repos_missing_token() {
    let h = harness(
        InstallerConfig::default().with_https_oauth(true),
        Platform::Ubuntu,
    );

    let result = h
        .installer
        .install(&spec(json!({"Captricity": {"pip": ["captools"]}})))
        .await;

    assert!(matches!(result, Err(PackageError::MissingCredential(var)) if var == "GITHUB_TOKEN"));
    assert!(h.runner.commands().is_empty());
}

#[tokio::test]
async fn test_private_repos_unsupported_manager() {
    let h = harness(
        InstallerConfig::default().with_warn_mode(true),
        Platform::Ubuntu,
    );

    let report = h
        .installer
        .install(&spec(json!({"Captricity": {"npm": ["widget"], "pip": ["captools"]}})))
        .await
        .unwrap();

    let skipped: Vec<_> = report.skipped().map(|(group, _)| group).collect();
    assert_eq!(skipped, vec!["Captricity.npm"]);
    assert_eq!(report.installed_count(), 1);
}

#[tokio::test]
async fn test_manifest_install_in_target_dir() {
    let h = harness(InstallerConfig::default(), Platform::Ubuntu);

    h.installer
        .install(&spec(json!({"npm": {
            "name": "frontend",
            "version": "1.0.0",
            "target_dir": "web",
            "dependencies": {"react": "^15.0.0"}
        }})))
        .await
        .unwrap();

    let writes = h.fs.writes();
    assert_eq!(writes.len(), 1);
    let (cwd, path, contents) = &writes[0];
    assert_eq!(cwd, Path::new("/work/web"));
    assert_eq!(path, Path::new("package.json"));

    let manifest: serde_json::Value = serde_json::from_str(contents).unwrap();
    assert_eq!(manifest["name"], "frontend");
    assert!(manifest.get("target_dir").is_none());

    assert_eq!(h.runner.argv()[0], strings(&["/usr/bin/npm", "install"]));

    // Manifest removed and working directory restored
    assert!(h.fs.file("/work/web/package.json").is_none());
    assert_eq!(h.fs.cwd(), PathBuf::from("/work"));
}

#[tokio::test]
async fn test_manifest_failure_restores_workdir() {
    let runner = MockRunner {
        fail_program: Some("/usr/bin/bower"),
        ..Default::default()
    };
    let h = harness_with(
        InstallerConfig::default(),
        Platform::Ubuntu,
        runner,
        MockFilesystem::new(&["/work", "/work/web"]),
        MockEnvironment::new(&[]),
    );

    let result = h
        .installer
        .install(&spec(json!({"bower": {
            "name": "frontend",
            "version": "1.0.0",
            "target_dir": "web"
        }})))
        .await;

    assert!(matches!(result, Err(PackageError::CommandFailed { .. })));
    assert_eq!(h.fs.cwd(), PathBuf::from("/work"));
    assert!(h.fs.file("/work/web/bower.json").is_none());
}

#[tokio::test]
async fn test_manifest_unsupported_manager() {
    let h = harness(InstallerConfig::default(), Platform::Ubuntu);

    let result = h
        .installer
        .install(&spec(json!({"pip": {"name": "app", "version": "1.0"}})))
        .await;

    assert!(matches!(result, Err(PackageError::InvalidSpec(_))));
}

#[tokio::test]
async fn test_bowerrc_written_once() {
    let h = harness(InstallerConfig::default(), Platform::Ubuntu);

    h.installer
        .install(&spec(json!({"bower": {"jquery": "2.1.4"}})))
        .await
        .unwrap();

    assert_eq!(
        h.fs.file("/home/dev/.bowerrc").as_deref(),
        Some(r#"{"analytics": false}"#)
    );
    assert_eq!(h.runner.argv()[0], strings(&[
        "/usr/bin/bower",
        "install",
        "jquery#2.1.4"
    ]));

    let existing = harness_with(
        InstallerConfig::default(),
        Platform::Ubuntu,
        MockRunner::default(),
        MockFilesystem::new(&["/work"]).with_file("/home/dev/.bowerrc"),
        MockEnvironment::new(&[]),
    );
    existing
        .installer
        .install(&spec(json!({"bower": {"jquery": null}})))
        .await
        .unwrap();
    assert!(existing.fs.writes().is_empty());
}

#[tokio::test]
async fn test_residue_cleanup_after_group() {
    let runner = MockRunner {
        npm_tmp: "/var/npm-tmp".to_string(),
        ..Default::default()
    };
    let fs = MockFilesystem::new(&["/work"])
        .with_file("/var/npm-tmp/npm-1234")
        .with_file("/var/npm-tmp/other")
        .with_file("/scratch/pip-build-x");
    let h = harness_with(
        InstallerConfig::default(),
        Platform::Ubuntu,
        runner,
        fs,
        MockEnvironment::new(&[("TMPDIR", "/scratch")]),
    );

    h.installer
        .install(&spec(json!({"npm": {"gulp": null}, "pip": {"flask": null}})))
        .await
        .unwrap();

    let commands = h.runner.commands();
    assert!(commands.contains(&(strings(&["rm", "-rf", "/var/npm-tmp/npm-1234"]), true)));
    assert!(commands.contains(&(strings(&["rm", "-rf", "/scratch/pip-build-x"]), true)));

    // npm cleanup follows the npm install and precedes pip
    let position = |argv: &[&str]| {
        commands
            .iter()
            .position(|(a, _)| a == &strings(argv))
            .unwrap()
    };
    assert!(position(&["/usr/bin/npm", "install", "gulp"]) < position(&["rm", "-rf", "/var/npm-tmp/npm-1234"]));
    assert!(position(&["rm", "-rf", "/var/npm-tmp/npm-1234"]) < position(&["/usr/bin/pip", "install", "flask"]));
}

#[tokio::test]
async fn test_cleanup_failure_keeps_outcome() {
    let runner = MockRunner {
        npm_tmp_status: 1,
        fail_program: Some("rm"),
        ..Default::default()
    };
    let h = harness_with(
        InstallerConfig::default(),
        Platform::Ubuntu,
        runner,
        MockFilesystem::new(&["/work"]).with_file("/scratch/pip-build-x"),
        MockEnvironment::new(&[("TMPDIR", "/scratch")]),
    );

    let report = h
        .installer
        .install(&spec(json!({"npm": {"gulp": null}, "pip": {"flask": null}})))
        .await
        .unwrap();

    assert_eq!(report.installed_count(), 2);
    assert_eq!(report.skipped().count(), 0);

    // The pip purge was attempted and failed; npm had no temp dir to purge
    let removals: Vec<_> = h
        .runner
        .argv()
        .into_iter()
        .filter(|argv| argv[0] == "rm")
        .collect();
    assert_eq!(removals, vec![strings(&["rm", "-rf", "/scratch/pip-build-x"])]);
}

#[tokio::test]
async fn test_install_failure_still_cleans_up() {
    let runner = MockRunner {
        npm_tmp: "/var/npm-tmp".to_string(),
        fail_program: Some("/usr/bin/npm"),
        ..Default::default()
    };
    let h = harness_with(
        InstallerConfig::default(),
        Platform::Ubuntu,
        runner,
        MockFilesystem::new(&["/work"]).with_file("/var/npm-tmp/npm-1234"),
        MockEnvironment::new(&[]),
    );

    let result = h
        .installer
        .install(&spec(json!({"npm": {"gulp": null}, "pip": {"flask": null}})))
        .await;

    match result {
        Err(PackageError::CommandFailed { command, .. }) => {
            assert_eq!(command, "/usr/bin/npm install");
        }
        other => panic!("expected npm install failure, got {other:?}"),
    }

    let argv = h.runner.argv();
    assert!(argv.contains(&strings(&["rm", "-rf", "/var/npm-tmp/npm-1234"])));
    assert!(argv.iter().all(|a| a[0] != "/usr/bin/pip"));
}

#[tokio::test]
async fn test_same_arguments_every_run() {
    let h = harness(InstallerConfig::default(), Platform::Ubuntu);
    let packages = spec(json!({"pip": {"requests": "2.0.0"}, "npm": {"lodash": ["3.0.0", "4.0.0"]}}));

    h.installer.install(&packages).await.unwrap();
    let first = h.runner.argv();
    h.installer.install(&packages).await.unwrap();
    let all = h.runner.argv();

    assert_eq!(&all[first.len()..], first.as_slice());
}

#[tokio::test]
async fn test_flat_list_warn_mode_skips_bad_token() {
    let h = harness(
        InstallerConfig::default().with_warn_mode(true),
        Platform::Ubuntu,
    );

    let report = h
        .installer
        .install(&spec(json!(["foo-bar", "pip-flask", "bower-jquery"])))
        .await
        .unwrap();

    let skipped: Vec<_> = report.skipped().map(|(group, _)| group).collect();
    assert_eq!(skipped, vec!["foo-bar"]);
    assert_eq!(report.installed_count(), 2);
}
