use anyhow::Result;
use clap::Parser;
use log::info;

mod cli;

use cli::{Cli, Commands};
use cli::commands::{handle_frameworks_command, handle_inspect_command};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Initialize logger to file (truncate on each run)
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open("esg-questionnaire.log")?;
    env_logger::Builder::from_default_env()
        .target(env_logger::Target::Pipe(Box::new(log_file)))
        .init();

    let cli = Cli::parse();
    info!("Starting esg-questionnaire");

    match cli.command {
        Commands::Inspect(args) => handle_inspect_command(args).await,
        Commands::Frameworks(args) => handle_frameworks_command(args).await,
    }
}
