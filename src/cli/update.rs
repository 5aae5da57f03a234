//! Re-install components that are already installed.

use anyhow::Result;
use clap::Args;

use super::CliConfig;
use super::common::{Session, finish_report};
use crate::component::InstallConfig;

#[derive(Args, Debug)]
pub struct UpdateCommand {
    /// Components to update (default: every installed component)
    components: Vec<String>,

    #[arg(long)]
    dry_run: bool,

    /// Replace merge-sensitive files and user-edited hooks
    #[arg(long)]
    overwrite: bool,
}

impl UpdateCommand {
    pub async fn execute(self, cli: &CliConfig) -> Result<()> {
        let session = Session::open(cli).await?;
        let config = InstallConfig {
            dry_run: self.dry_run,
            overwrite: self.overwrite,
            ..Default::default()
        };
        let options = session.run_options(config, false, None);
        let report = session.installer.update(&self.components, &options).await?;
        if report.succeeded.is_empty() && report.failed.is_empty() {
            println!("Nothing to update");
            return Ok(());
        }
        finish_report("update", &report)
    }
}
