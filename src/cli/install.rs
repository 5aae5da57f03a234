//! Install components and their dependencies.

use anyhow::Result;
use clap::Args;
use colored::Colorize;

use super::CliConfig;
use super::common::{Session, finish_report};
use crate::component::InstallConfig;

#[derive(Args, Debug)]
pub struct InstallCommand {
    /// Components to install; dependencies are added automatically
    #[arg(default_value = "core")]
    components: Vec<String>,

    /// Show what would be installed without writing anything
    #[arg(long)]
    dry_run: bool,

    /// Install even when selected components conflict
    #[arg(long)]
    force: bool,

    /// Replace merge-sensitive files instead of appending to them
    #[arg(long)]
    overwrite: bool,

    /// Leave files that already exist untouched
    #[arg(long)]
    skip_existing: bool,

    /// Components installed concurrently within one dependency level
    #[arg(long, value_name = "N")]
    max_parallel: Option<usize>,
}

impl InstallCommand {
    pub async fn execute(self, cli: &CliConfig) -> Result<()> {
        let session = Session::open(cli).await?;
        let plan = session.installer.plan(&self.components)?;

        println!(
            "Installing {} into {}",
            plan.order.join(", ").bold(),
            session.install_root.display()
        );

        let config = InstallConfig {
            dry_run: self.dry_run,
            overwrite: self.overwrite,
            skip_existing: self.skip_existing,
            preserve_user_data: false,
        };
        let options = session.run_options(config, self.force, self.max_parallel);
        let report = session.installer.install(&self.components, &options).await?;
        finish_report("install", &report)
    }
}
