//! Command-line interface for crew.
//!
//! # Available Commands
//!
//! - `install` - Install components and their dependencies
//! - `update` - Re-install components that are already installed
//! - `uninstall` - Remove components
//! - `list` - Show known components and installed versions
//! - `verify` - Check installed files against recorded hashes
//! - `migrate` - Move legacy installer fields out of `settings.json`
//! - `plan` - Show installation order and dependency trees
//!
//! # Global Options
//!
//! - `--verbose` / `--quiet` - Log level (`RUST_LOG` wins when set)
//! - `--config` - Installer config file (default `~/.crew/config.toml`)
//! - `--install-dir` / `--source` - Install root and framework source tree
//! - `--direct` - Copy files straight into place instead of staging them
//! - `--no-progress` - Hide progress bars

mod common;
mod install;
mod list;
mod migrate;
mod plan;
mod uninstall;
mod update;
mod verify;


use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Settings derived from the global flags, passed to every command.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    /// `None` disables logging entirely.
    pub log_level: Option<String>,
    pub no_progress: bool,
    pub config_path: Option<PathBuf>,
    pub install_dir: Option<String>,
    pub source_dir: Option<String>,
    pub direct: bool,
}

impl CliConfig {
    /// Installs the global tracing subscriber on stderr.
    ///
    /// `RUST_LOG` takes precedence over the flag-derived level.
    pub fn init_logging(&self) {
        let filter = match std::env::var("RUST_LOG") {
            Ok(_) => EnvFilter::from_default_env(),
            Err(_) => match &self.log_level {
                Some(level) => EnvFilter::new(format!("crew_installer={level}")),
                None => return,
            },
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .try_init();
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "crew",
    about = "Install and manage crew framework components",
    version,
    long_about = "crew installs framework components (documents, commands, hooks, MCP configs, agents) \
                  into an install directory and tracks versions, dependencies and file hashes."
)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Path to the installer config file
    #[arg(short, long, global = true, env = "CREW_CONFIG")]
    config: Option<PathBuf>,

    /// Install directory (default: ~/.claude)
    #[arg(long, global = true)]
    install_dir: Option<String>,

    /// Framework source directory (default: current directory)
    #[arg(long, global = true)]
    source: Option<String>,

    /// Copy files straight into place instead of staging them first
    #[arg(long, global = true)]
    direct: bool,

    /// Hide progress bars
    #[arg(long, global = true)]
    no_progress: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Install components and their dependencies
    Install(install::InstallCommand),

    /// Re-install components that are already installed
    Update(update::UpdateCommand),

    /// Remove installed components
    Uninstall(uninstall::UninstallCommand),

    /// List known components and installed versions
    List(list::ListCommand),

    /// Check installed files against their recorded hashes
    Verify(verify::VerifyCommand),

    /// Move legacy installer fields out of settings.json
    Migrate(migrate::MigrateCommand),

    /// Show installation order without installing
    Plan(plan::PlanCommand),
}

impl Cli {
    pub async fn execute(self) -> Result<()> {
        let config = self.build_config();
        config.init_logging();
        self.execute_with_config(config).await
    }

    #[must_use]
    pub fn build_config(&self) -> CliConfig {
        let log_level = if self.verbose {
            Some("debug".to_string())
        } else if self.quiet {
            None
        } else {
            Some("warn".to_string())
        };

        CliConfig {
            log_level,
            no_progress: self.no_progress || self.quiet,
            config_path: self.config.clone(),
            install_dir: self.install_dir.clone(),
            source_dir: self.source.clone(),
            direct: self.direct,
        }
    }

    pub async fn execute_with_config(self, config: CliConfig) -> Result<()> {
        match self.command {
            Commands::Install(cmd) => cmd.execute(&config).await,
            Commands::Update(cmd) => cmd.execute(&config).await,
            Commands::Uninstall(cmd) => cmd.execute(&config).await,
            Commands::List(cmd) => cmd.execute(&config).await,
            Commands::Verify(cmd) => cmd.execute(&config).await,
            Commands::Migrate(cmd) => cmd.execute(&config).await,
            Commands::Plan(cmd) => cmd.execute(&config).await,
        }
    }
}
