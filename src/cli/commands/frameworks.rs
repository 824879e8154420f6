use anyhow::Result;
use clap::Args;
use colored::*;

use esg_questionnaire::questionnaire::FrameworkRegistry;

#[derive(Args)]
pub struct FrameworksCommands {}

pub async fn handle_frameworks_command(_args: FrameworksCommands) -> Result<()> {
    let registry = FrameworkRegistry::shared();
    println!("📚 Registered frameworks:");
    for key in registry.keys() {
        println!("  • {}", key.bright_green().bold());
    }
    Ok(())
}
