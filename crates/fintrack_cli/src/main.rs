//! fintrack CLI
//!
//! Command-line front end for a fintrack data directory.
//!
//! # Commands
//!
//! - `add`, `rename`, `remove` - Edit categories offline
//! - `pending` - List outbox entries awaiting reconciliation
//! - `sync` - Replay the outbox against the backend
//! - `catch-up` - Recover remote ids lost to empty create responses

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// fintrack offline-first finance tools.
#[derive(Parser)]
#[command(name = "fintrack")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the data directory
    #[arg(global = true, short, long, default_value = "fintrack-data")]
    data: PathBuf,

    /// Base URL of the backend
    #[arg(global = true, long, default_value = "http://127.0.0.1:8080")]
    url: String,

    /// Request timeout in seconds
    #[arg(global = true, long, default_value = "30")]
    timeout: u64,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a category
    Add {
        /// Category name
        name: String,

        /// Book income instead of spending
        #[arg(long)]
        income: bool,
    },

    /// Rename a category
    Rename {
        /// Local id of the category
        id: u64,

        /// New name
        name: String,
    },

    /// Remove a category
    Remove {
        /// Local id of the category
        id: u64,
    },

    /// List outbox entries awaiting reconciliation
    Pending {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Replay the outbox against the backend
    Sync {
        /// Table to reconcile (all tables if omitted)
        table: Option<String>,

        /// Replay the most recent entries first
        #[arg(long)]
        newest_first: bool,
    },

    /// Assign remote ids to records that lack one by matching names
    CatchUp {
        /// Table to repair (all tables if omitted)
        table: Option<String>,
    },
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

    let remote = commands::RemoteOptions {
        base_url: cli.url,
        timeout: Duration::from_secs(cli.timeout),
    };

    match cli.command {
        Commands::Add { name, income } => {
            commands::categories::add(&cli.data, &name, income)?;
        }
        Commands::Rename { id, name } => {
            commands::categories::rename(&cli.data, id, &name)?;
        }
        Commands::Remove { id } => {
            commands::categories::remove(&cli.data, id)?;
        }
        Commands::Pending { format } => {
            commands::pending::run(&cli.data, &format)?;
        }
        Commands::Sync {
            table,
            newest_first,
        } => {
            commands::sync::run(&cli.data, &remote, table.as_deref(), newest_first)?;
        }
        Commands::CatchUp { table } => {
            commands::sync::catch_up(&cli.data, &remote, table.as_deref())?;
        }
    }

    Ok(())
}
