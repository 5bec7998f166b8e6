//! cappa
//!
//! Installs a project's dependencies across pip, apt, npm, bower and tsd
//! from a single requirements file

use std::path::{Path, PathBuf};
use std::sync::Arc;

use cappa_exec::LocalRunner;
use cappa_pkg::{GroupOutcome, InstallReport, Installer, PackageSpec};
use clap::Parser;
use color_eyre::Result;
use eyre::WrapErr;
use tracing_subscriber::EnvFilter;

mod config;

use config::Config;

#[derive(Parser)]
#[command(name = "cappa")]
#[command(about = "Install project dependencies across package managers", long_about = None)]
struct Cli {
    /// Requirements file (JSON, or YAML with a .yml/.yaml extension)
    #[arg(default_value = "requirements.json")]
    requirements: PathBuf,

    /// Config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log failing groups and keep going
    #[arg(short, long)]
    warn: bool,

    /// Fetch private repositories over HTTPS using an OAuth token
    #[arg(long)]
    https_oauth: bool,

    /// Install pip packages system-wide (with sudo)
    #[arg(long)]
    no_venv: bool,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();

    let mut config = Config::load_default(cli.config.as_deref())?;
    init_tracing(&config.log.level, cli.verbose);

    if cli.warn {
        config.installer.warn_mode = true;
    }
    if cli.https_oauth {
        config.installer.private_https_oauth = true;
    }
    if cli.no_venv {
        config.installer.use_venv = false;
    }

    let spec = load_requirements(&cli.requirements, &config.installer.organization)?;

    let runner = Arc::new(LocalRunner::new(config.installer.use_sudo));
    let installer = Installer::new(config.installer, runner);
    let report = installer.install(&spec).await?;

    print_report(&report);
    Ok(())
}

fn init_tracing(level: &str, verbose: bool) {
    let default = if verbose { "debug" } else { level };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_requirements(path: &Path, organization: &str) -> Result<PackageSpec> {
    let content = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("reading requirements {}", path.display()))?;

    let yaml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| matches!(ext, "yml" | "yaml"));

    let spec = if yaml {
        PackageSpec::from_yaml_str(&content, organization)
    } else {
        PackageSpec::from_json_str(&content, organization)
    };
    spec.wrap_err_with(|| format!("parsing requirements {}", path.display()))
}

fn print_report(report: &InstallReport) {
    for outcome in &report.outcomes {
        match outcome {
            GroupOutcome::Installed {
                group, packages, ..
            } => println!("installed {group}: {}", packages.join(" ")),
            GroupOutcome::Skipped { group, reason } => println!("skipped {group}: {reason}"),
        }
    }
}
