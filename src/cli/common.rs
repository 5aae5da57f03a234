//! Shared setup and output helpers for CLI commands.

use anyhow::{Result, bail};
use colored::Colorize;
use std::path::PathBuf;
use tracing::debug;

use super::CliConfig;
use crate::component::{ComponentContext, InstallConfig};
use crate::config::InstallerConfig;
use crate::installer::{InstallReport, Installer, RunOptions};
use crate::registry::ComponentRegistry;
use crate::utils::progress::InstallProgress;

/// Installer bound to the roots resolved from flags and the config file.
pub struct Session {
    pub config: InstallerConfig,
    pub install_root: PathBuf,
    pub source_root: PathBuf,
    pub installer: Installer,
}

impl Session {
    pub async fn open(cli: &CliConfig) -> Result<Self> {
        let config = InstallerConfig::load(cli.config_path.as_deref()).await?;
        let install_root = config.install_dir(cli.install_dir.as_deref())?;
        let source_root = config.source_dir(cli.source_dir.as_deref())?;
        debug!(
            install_root = %install_root.display(),
            source_root = %source_root.display(),
            "Opening installer session"
        );

        let ctx = ComponentContext::with_retention(&install_root, &source_root, config.backup_retention())
            .with_staged_commit(config.staged_commit && !cli.direct);
        let progress = if cli.no_progress {
            InstallProgress::hidden()
        } else {
            InstallProgress::new(0)
        };
        let installer = Installer::new(ComponentRegistry::with_builtins()?, ctx).with_progress(progress);

        Ok(Self {
            config,
            install_root,
            source_root,
            installer,
        })
    }

    pub fn run_options(&self, config: InstallConfig, force: bool, max_parallel: Option<usize>) -> RunOptions {
        RunOptions {
            config,
            force,
            max_parallel: self.config.max_parallel(max_parallel),
        }
    }
}

/// Prints what a run did and fails when any component failed.
pub fn finish_report(verb: &str, report: &InstallReport) -> Result<()> {
    for outcome in &report.succeeded {
        println!("  {} {outcome}", "✓".green());
    }
    for (name, error) in &report.failed {
        println!("  {} {name}: {error}", "✗".red());
    }
    for name in &report.skipped {
        println!("  {} {name} {}", "-".dimmed(), "(skipped)".dimmed());
    }

    if !report.is_success() {
        let names: Vec<&str> = report.failed.iter().map(|(name, _)| name.as_str()).collect();
        bail!("Failed to {verb} {}", names.join(", "));
    }

    let summary = if report.dry_run {
        format!("Dry run complete: {} component(s) would {verb}", report.succeeded.len())
    } else {
        format!("{} component(s) {verb} complete", report.succeeded.len())
    };
    println!("\n{}", summary.green().bold());
    Ok(())
}
