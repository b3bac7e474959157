mod cli;
mod config;
mod glossary;
mod llm;
mod novel;
mod pipeline;
mod utils;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cli::{Cli, Commands};

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Translate(args) => pipeline::run(args)?,
        Commands::Glossary(args) => glossary::commands::run(args)?,
        Commands::Config(args) => config::commands::run(args)?,
    }

    Ok(())
}
