pub mod handler;

use clap::Args;
use std::path::PathBuf;

pub use handler::handle_inspect_command;

#[derive(Args)]
pub struct InspectCommands {
    /// Document stem to load (e.g. 'GRI202' loads '<source>/GRI202.json')
    pub stem: String,

    /// Directory or http(s) base URL holding the documents
    #[arg(short, long, help = "Override the configured document source")]
    pub source: Option<String>,

    /// Reporting framework used for row normalization
    #[arg(short, long, help = "Override the configured framework")]
    pub framework: Option<String>,

    /// Read settings from this file instead of the user config directory
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Read '<stem>.xlsx' or '<stem>.csv' from the source directory instead of JSON
    #[arg(long)]
    pub sheet: bool,

    /// Worksheet name when reading a workbook (defaults to the first sheet)
    #[arg(long, requires = "sheet")]
    pub worksheet: Option<String>,

    /// Print the section/card/question outline
    #[arg(short, long)]
    pub tree: bool,
}
