//! Check installed files against their recorded hashes.

use anyhow::{Result, bail};
use clap::Args;
use colored::Colorize;

use super::CliConfig;
use super::common::Session;

#[derive(Args, Debug)]
pub struct VerifyCommand {}

impl VerifyCommand {
    pub async fn execute(self, cli: &CliConfig) -> Result<()> {
        let session = Session::open(cli).await?;
        let report = session.installer.verify()?;
        let integrity = &report.integrity;

        println!(
            "Files: {} tracked, {} clean, {} modified, {} missing, {} corrupted",
            integrity.total,
            integrity.clean,
            integrity.modified.len(),
            integrity.missing.len(),
            integrity.corrupted.len()
        );
        for path in &integrity.modified {
            println!("  {} {path}", "modified".yellow());
        }
        for path in &integrity.missing {
            println!("  {} {path}", "missing".red());
        }
        for path in &integrity.corrupted {
            println!("  {} {path}", "corrupted".red());
        }

        for (name, validation) in &report.components {
            if validation.is_ok() {
                println!("{} {name}", "✓".green());
            } else {
                println!("{} {name}", "✗".red());
                for reason in validation.reasons() {
                    println!("    {reason}");
                }
            }
        }

        if !report.is_ok() {
            bail!("Installation is {}", integrity.status());
        }
        println!("\n{}", "Installation verified".green().bold());
        Ok(())
    }
}
