//! kabind CLI
//!
//! Command-line access to kabind local stores, driving the same bulk
//! adapters the C surface exposes.
//!
//! # Commands
//!
//! - `inspect` - Display store statistics
//! - `get` / `set` - Single-key access
//! - `match-prefix` / `match-regex` - List matching keys
//! - `get-bulk` / `set-bulk` / `remove-bulk` - Multi-key operations

mod commands;
mod error;

use clap::{Parser, Subcommand};
use commands::query::MatchKind;
use error::CliError;
use kabind_client::{LocalStore, OpenMode, StoreClient};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// kabind command-line store tools.
#[derive(Parser)]
#[command(name = "kabind")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the store snapshot
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Display store statistics
    Inspect {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Print the value of a key
    Get {
        /// The key
        key: String,
    },

    /// Set a key to a value
    Set {
        /// The key
        key: String,
        /// The value
        value: String,
    },

    /// List keys starting with a prefix
    MatchPrefix {
        /// The prefix
        prefix: String,

        /// Maximum number of keys (default 1000)
        #[arg(short, long)]
        max: Option<usize>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// List keys matching a regular expression
    MatchRegex {
        /// The pattern
        pattern: String,

        /// Maximum number of keys (default 1000)
        #[arg(short, long)]
        max: Option<usize>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Fetch several keys at once
    GetBulk {
        /// Keys to fetch
        #[arg(required = true)]
        keys: Vec<String>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Store several KEY=VALUE pairs at once
    SetBulk {
        /// Pairs to store
        #[arg(required = true)]
        pairs: Vec<String>,
    },

    /// Remove several keys at once
    RemoveBulk {
        /// Keys to remove
        #[arg(required = true)]
        keys: Vec<String>,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let path = |command: &'static str| cli.path.clone().ok_or(CliError::MissingPath(command));

    match cli.command {
        Commands::Inspect { ref format } => {
            commands::inspect::run(&path("inspect")?, format)?;
        }
        Commands::Get { ref key } => {
            let store = LocalStore::open(path("get")?, OpenMode::Read)?;
            match store.get(key.as_bytes())? {
                Some(value) => println!("{}", commands::text(&value)),
                None => return Err(format!("no record for {key:?}").into()),
            }
        }
        Commands::Set { ref key, ref value } => {
            commands::write::run_set(&path("set")?, key, value)?;
        }
        Commands::MatchPrefix {
            ref prefix,
            max,
            ref format,
        } => {
            commands::query::run_match(&path("match-prefix")?, MatchKind::Prefix, prefix, max, format)?;
        }
        Commands::MatchRegex {
            ref pattern,
            max,
            ref format,
        } => {
            commands::query::run_match(&path("match-regex")?, MatchKind::Regex, pattern, max, format)?;
        }
        Commands::GetBulk { ref keys, ref format } => {
            commands::query::run_get_bulk(&path("get-bulk")?, keys, format)?;
        }
        Commands::SetBulk { ref pairs } => {
            commands::write::run_set_bulk(&path("set-bulk")?, pairs)?;
        }
        Commands::RemoveBulk { ref keys } => {
            commands::write::run_remove_bulk(&path("remove-bulk")?, keys)?;
        }
        Commands::Version => {
            println!("kabind CLI v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
