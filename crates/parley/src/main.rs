// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Parley - coordination core of a live customer-support chat platform.
//!
//! This is the binary entry point for the Parley server.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use clap::{Parser, Subcommand};

use parley_config::{ConfigError, ParleyConfig};

mod serve;
mod shutdown;

/// Parley - coordination core of a live customer-support chat platform.
#[derive(Parser, Debug)]
#[command(name = "parley", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the Parley coordinator server.
    Serve {
        /// Explicit config file (default: XDG hierarchy + PARLEY_* env).
        #[arg(long)]
        config: Option<std::path::PathBuf>,
    },
    /// Print the resolved configuration and exit.
    Config,
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { config } => {
            let config = match load(config.as_deref()) {
                Ok(config) => config,
                Err(e) => {
                    eprintln!("error: {e}");
                    return std::process::ExitCode::FAILURE;
                }
            };
            if let Err(e) = serve::run_serve(config).await {
                eprintln!("error: {e}");
                return std::process::ExitCode::FAILURE;
            }
            std::process::ExitCode::SUCCESS
        }
        Commands::Config => match load(None) {
            Ok(config) => match serde_json::to_string_pretty(&config) {
                Ok(rendered) => {
                    println!("{rendered}");
                    std::process::ExitCode::SUCCESS
                }
                Err(e) => {
                    eprintln!("error: {e}");
                    std::process::ExitCode::FAILURE
                }
            },
            Err(e) => {
                eprintln!("error: {e}");
                std::process::ExitCode::FAILURE
            }
        },
    }
}

fn load(path: Option<&std::path::Path>) -> Result<ParleyConfig, ConfigError> {
    match path {
        Some(path) => parley_config::load_config_from_path(path),
        None => parley_config::load_config(),
    }
}
