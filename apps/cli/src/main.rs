//! migratebot CLI: ticket-driven migration of reference pages into the docs corpus.
//!
//! Reads open migration tickets, converts each source page with a generative
//! model, verifies the corpus build, and opens a draft pull request per ticket.

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
