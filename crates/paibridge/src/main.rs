// SPDX-FileCopyrightText: 2026 Paibridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! paibridge - bridge Slack conversations to a locally invoked agent CLI.
//!
//! This is the binary entry point.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod serve;
mod status;

/// paibridge - bridge Slack conversations to a locally invoked agent CLI.
#[derive(Parser, Debug)]
#[command(name = "paibridge", version, about, long_about = None)]
struct Cli {
    /// Path to a specific config file (defaults to the XDG hierarchy).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Connect to Slack and run the bridge until terminated.
    Serve,
    /// Print the queue status snapshot and exit.
    Status,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => paibridge_config::load_config_from_path(path),
        None => paibridge_config::load_config(),
    };
    let config = match config {
        Ok(config) => config,
        Err(error) => {
            eprintln!("error: failed to load configuration: {error}");
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Serve => serve::run_serve(config).await,
        Commands::Status => status::run_status(config).await,
    };

    if let Err(error) = result {
        eprintln!("error: {error}");
        std::process::exit(1);
    }
}
