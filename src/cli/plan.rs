//! Show installation order and dependency trees without installing.

use anyhow::Result;
use clap::Args;
use colored::Colorize;

use super::CliConfig;
use super::common::Session;

#[derive(Args, Debug)]
pub struct PlanCommand {
    /// Components to plan for
    #[arg(default_value = "core")]
    components: Vec<String>,

    /// Also print each component's dependency tree
    #[arg(long)]
    tree: bool,
}

impl PlanCommand {
    pub async fn execute(self, cli: &CliConfig) -> Result<()> {
        let session = Session::open(cli).await?;
        let plan = session.installer.plan(&self.components)?;
        print!("{plan}");

        if self.tree {
            for name in &self.components {
                println!();
                print!("{}", session.installer.registry().tree_string(name)?);
            }
        }

        if plan.has_conflicts() {
            println!("\n{}", "Install would abort unless --force is given".yellow());
        }
        Ok(())
    }
}
