//! CLI commands implementation.
//!
//! This module contains the CLI parser and dispatches to command-specific
//! modules.

mod init;
mod status;
mod sync_cmd;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::{load_settings, LoadOptions};

#[derive(Parser)]
#[command(name = "dshs-sync")]
#[command(about = "DSHS adult family home registry synchronization")]
#[command(version)]
pub struct Cli {
    /// Data directory (overrides config file)
    #[arg(long, short = 'd', global = true)]
    data: Option<PathBuf>,

    /// Config file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the data directory and database
    Init,

    /// Run a registry sync against the portal
    Sync {
        /// Sync a single county instead of all of them
        #[arg(long)]
        county: Option<String>,
    },

    /// Show recent sync runs
    Status {
        /// Number of runs to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },

    /// List the known counties
    Counties,
}

/// Run the CLI.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let options = LoadOptions {
        config_path: cli.config,
        data: cli.data,
    };
    let settings = load_settings(&options);

    match cli.command {
        Commands::Init => init::cmd_init(&settings),
        Commands::Sync { county } => sync_cmd::cmd_sync(&settings, county.as_deref()).await,
        Commands::Status { limit } => status::cmd_status(&settings, limit),
        Commands::Counties => {
            status::cmd_counties();
            Ok(())
        }
    }
}
