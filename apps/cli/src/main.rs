//! Riskbase CLI: build and query occupational AI-exposure knowledge bases.
//!
//! Turns an extraction bundle into a validated `knowledge_base.json` and
//! answers risk, search and ranking queries against a persisted one.

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
