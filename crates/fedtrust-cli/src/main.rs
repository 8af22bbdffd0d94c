//! # fedtrust
//!
//! SAML trust resolution and assertion exchange from the command line.

#![forbid(unsafe_code)]

use anyhow::Context;
use clap::Parser;
use fedtrust_cli::{
    cli::{Cli, Command},
    commands::{run_consume, run_keygen, run_produce, run_resolve},
    load_config,
    output::error,
    EngineContext,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| default_filter.into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(e) = run(cli).await {
        error(&format!("{e:#}"));
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(cli.config.as_deref()).context("failed to load configuration")?;
    let context = EngineContext::new(config);

    match cli.command {
        Command::Keygen(args) => run_keygen(args, &context).await.context("keygen failed")?,
        Command::Resolve(args) => run_resolve(args, &context).await.context("resolve failed")?,
        Command::Produce(args) => run_produce(args, &context).await.context("produce failed")?,
        Command::Consume(args) => run_consume(args, &context).await.context("consume failed")?,
    }
    Ok(())
}
