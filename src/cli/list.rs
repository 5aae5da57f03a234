//! List known components and what is installed.

use anyhow::Result;
use clap::{Args, ValueEnum};
use colored::Colorize;

use super::CliConfig;
use super::common::Session;

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
enum OutputFormat {
    #[default]
    Table,
    Json,
}

#[derive(Args, Debug)]
pub struct ListCommand {
    /// Only show installed components
    #[arg(long)]
    installed: bool,

    #[arg(long, value_enum, default_value_t)]
    format: OutputFormat,
}

impl ListCommand {
    pub async fn execute(self, cli: &CliConfig) -> Result<()> {
        let session = Session::open(cli).await?;
        let mut status = session.installer.status()?;
        if self.installed {
            status.retain(|s| s.installed_version.is_some());
        }

        match self.format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&status)?),
            OutputFormat::Table => {
                if status.is_empty() {
                    println!("No components installed");
                }
                for component in &status {
                    let state = match &component.installed_version {
                        Some(version) if component.is_outdated() => {
                            format!("{version} → {}", component.available_version).yellow()
                        }
                        Some(version) => version.green(),
                        None => "not installed".dimmed(),
                    };
                    println!(
                        "{:<10} {:<12} {:<24} {}",
                        component.name.bold(),
                        component.category,
                        state,
                        component.description
                    );
                }
            }
        }
        Ok(())
    }
}
