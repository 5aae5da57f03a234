//! Remove installed components.

use anyhow::Result;
use clap::Args;

use super::CliConfig;
use super::common::{Session, finish_report};
use crate::component::InstallConfig;

#[derive(Args, Debug)]
pub struct UninstallCommand {
    /// Components to remove
    #[arg(required = true)]
    components: Vec<String>,

    #[arg(long)]
    dry_run: bool,

    /// Remove even when other installed components depend on these
    #[arg(long)]
    force: bool,

    /// Keep logs, memory, user files and merged documents
    #[arg(long)]
    keep_user_data: bool,
}

impl UninstallCommand {
    pub async fn execute(self, cli: &CliConfig) -> Result<()> {
        let session = Session::open(cli).await?;
        let config = InstallConfig {
            dry_run: self.dry_run,
            preserve_user_data: self.keep_user_data,
            ..Default::default()
        };
        let options = session.run_options(config, self.force, None);
        let report = session.installer.uninstall(&self.components, &options).await?;
        finish_report("uninstall", &report)
    }
}
