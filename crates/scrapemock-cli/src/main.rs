//! scrapemock CLI - offline checks for scraping platform scripts
//!
//! Thin front end over `scrapemock-core`: compatibility reports, gid
//! computation and fixture queries.

use anyhow::{Context, Result};
use clap::Parser;
use scrapemock_core::Config;

mod cli;
mod commands;
mod utils;

use cli::{Cli, Commands};
use commands::QueryArgs;
use utils::logging::initialize_logging;

fn main() -> Result<()> {
    let cli = Cli::parse();

    initialize_logging(&cli)?;
    let config = load_config(&cli)?;

    execute_command(cli.command, &config)
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::default(),
    };
    config
        .apply_env_overrides()
        .context("Invalid environment override")?;
    Ok(config)
}

fn execute_command(command: Commands, config: &Config) -> Result<()> {
    match command {
        Commands::Compat { role, reference } => {
            commands::check_compat(role, &reference)?;
        },

        Commands::Gid { page } => {
            commands::print_gid(&page, config)?;
        },

        Commands::Query {
            fixture,
            collection,
            filter,
            offset,
            limit,
        } => {
            let args = QueryArgs {
                collection: &collection,
                filter: filter.as_deref(),
                offset,
                limit,
            };
            commands::query_fixture(&fixture, &args, config)?;
        },
    }

    Ok(())
}
