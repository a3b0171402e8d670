mod auth;
mod cli;
mod config;
mod error;
mod metrics;
mod model;
mod output;
mod providers;
mod report;
mod tracking;

use anyhow::Result;
use clap::Parser;
use cli::Cli;
use log::info;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    output::print_banner();

    let cli = Cli::parse();
    info!("Starting DoraLens - DORA and flow metrics");
    cli.execute().await?;

    Ok(())
}
