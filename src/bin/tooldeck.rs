//! tooldeck CLI Binary
//!
//! Serves a directory of capability files to protocol clients over stdio.

use anyhow::Context;
use clap::Parser;
use std::process;
use tooldeck::config::ConfigLoader;
use tooldeck::logging::init_logging;
use tooldeck::tooling::cli::{Cli, CliContext};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = ConfigLoader::resolve(&cli.workspace, cli.config.as_deref())
        .context("failed to load configuration")?;
    let logging = cli.logging_config(&config.logging);
    init_logging(Some(&logging), Some(&cli.workspace)).context("failed to initialize logging")?;

    let context = CliContext::with_config(cli.workspace.clone(), config);
    let output = context.execute(&cli.command).await?;
    if !output.is_empty() {
        println!("{}", output);
    }
    Ok(())
}
