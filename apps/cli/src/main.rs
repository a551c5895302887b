//! bizproposal CLI: assemble business proposals from a source document.
//!
//! Detects which proposal topics a document is missing, generates every
//! section of the selected template, and renders the result as a document.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);

    let json = cli.json;
    match commands::run(cli).await {
        Err(report) if json => {
            commands::print_error_payload(&report);
            std::process::exit(1);
        }
        other => other,
    }
}
