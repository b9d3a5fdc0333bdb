use clap::Parser;
use std::path::PathBuf;

/// User-specified command line parameters
#[derive(Debug, Parser)]
#[clap(name = "gsview", about)]
pub struct Args {
    /// The GraphScript file (an ADF container) to inspect.
    pub file: PathBuf,

    #[clap(long)]
    /// Prints the decoded graph as JSON instead of text.
    pub json: bool,

    #[clap(long)]
    /// Also lists the extracted connections in text mode.
    pub edges: bool,
}
