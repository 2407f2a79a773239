//! Competitor Intel CLI.
//!
//! Turns a company URL into a competitor report: profile extraction,
//! competitor discovery, deep scraping, synthesis, storage and email.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
