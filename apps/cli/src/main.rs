//! pricescrape CLI: video game resale price ingestion.
//!
//! Reads a price catalog, scrapes completed-sales history for every item,
//! and loads the result into a local libSQL store.

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
