//! # CLI Structure and Argument Parsing
//!
//! Command-line interface for `scrapemock`, built with `clap` derive macros.
//!
//! ## Usage Patterns
//!
//! ```bash
//! # Is the fake still in step with the platform's published operations?
//! scrapemock compat --role parser --reference parser-operations.txt
//!
//! # Which gid will the platform give this page?
//! scrapemock gid page.json
//!
//! # What does a fixture look like once it is saved?
//! scrapemock query fixture.json --collection outputs --filter '{"_collection":"products"}'
//! ```
//!
//! Every command writes JSON or plain values to stdout; logs go to stderr.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use scrapemock_core::Role;

/// Main CLI structure for the `scrapemock` command
#[derive(Parser, Clone, Debug)]
#[command(name = "scrapemock")]
#[command(version)]
#[command(about = "scrapemock - offline checks for scraping platform scripts", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable debug logging
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    /// Suppress warnings (only show errors)
    #[arg(short = 'q', long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Path to configuration file. Also via `SCRAPEMOCK_CONFIG`.
    #[arg(long, global = true, value_name = "FILE", env = "SCRAPEMOCK_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Available subcommands
#[derive(Subcommand, Clone, Debug)]
pub enum Commands {
    /// Check a role's operations against the platform's reference list
    ///
    /// Prints the compatibility report as JSON and fails when the role
    /// exposes operations the reference does not have.
    Compat {
        /// Role to check (seeder, parser or finisher)
        #[arg(short, long)]
        role: Role,

        /// File with one operation name per line (`-` for stdin)
        #[arg(long, value_name = "FILE")]
        reference: PathBuf,
    },

    /// Print the gid the platform assigns to a page
    Gid {
        /// Page JSON file (`-` for stdin)
        #[arg(value_name = "PAGE")]
        page: PathBuf,
    },

    /// Load an executor fixture, save its drafts and query the result
    Query {
        /// Fixture JSON file (`-` for stdin)
        #[arg(value_name = "FIXTURE")]
        fixture: PathBuf,

        /// Collection to query (jobs, pages or outputs)
        #[arg(short, long, default_value = "outputs")]
        collection: String,

        /// Equality filter as a JSON object
        #[arg(short, long, value_name = "JSON")]
        filter: Option<String>,

        /// Matches to skip
        #[arg(long, default_value_t = 0)]
        offset: usize,

        /// Maximum matches to print
        #[arg(short, long)]
        limit: Option<i64>,
    },
}
