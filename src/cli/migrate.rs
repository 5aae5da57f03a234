//! Move installer fields out of `settings.json` written by older releases.

use anyhow::Result;
use clap::Args;
use colored::Colorize;

use super::CliConfig;
use super::common::Session;

#[derive(Args, Debug)]
pub struct MigrateCommand {}

impl MigrateCommand {
    pub async fn execute(self, cli: &CliConfig) -> Result<()> {
        let session = Session::open(cli).await?;
        let store = session.installer.context().store();
        if store.migrate_metadata()? {
            println!("✅ {}", "Migrated legacy settings into installer metadata".green());
            if let Some(backup) = store.backups().list()?.last() {
                println!("  Previous settings saved to {}", backup.display());
            }
        } else {
            println!("✅ {}", "No legacy settings found.".green());
        }
        Ok(())
    }
}
