use super::commands::FrameworksCommands;
use super::commands::InspectCommands;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "esg-questionnaire")]
#[command(about = "Load ESG questionnaire documents and report how they were ingested")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build a questionnaire document and show its summary and errors
    Inspect(InspectCommands),
    /// List the registered reporting frameworks
    Frameworks(FrameworksCommands),
}
