// SPDX-FileCopyrightText: 2026 Skillrun Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Skillrun - skill invocation streaming execution engine.
//!
//! This is the binary entry point: the HTTP gateway plus queue worker, a
//! worker-only mode, and a configuration check.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod runnable;
mod serve;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use skillrun_config::{ConfigError, SkillrunConfig};

/// Skillrun - skill invocation streaming execution engine.
#[derive(Parser, Debug)]
#[command(name = "skillrun", version, about, long_about = None)]
struct Cli {
    /// Configuration file. Defaults to the XDG lookup.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the HTTP gateway and a queue worker.
    Serve,
    /// Run a queue worker without the HTTP gateway.
    Worker,
    /// Validate the configuration and exit.
    CheckConfig,
}

fn load_config(path: Option<&PathBuf>) -> Result<SkillrunConfig, Vec<ConfigError>> {
    match path {
        Some(path) => skillrun_config::load_and_validate_path(path),
        None => skillrun_config::load_and_validate(),
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_ref()) {
        Ok(config) => config,
        Err(errors) => {
            skillrun_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Some(Commands::Serve) => serve::run(config, serve::Mode::Serve).await,
        Some(Commands::Worker) => serve::run(config, serve::Mode::WorkerOnly).await,
        Some(Commands::CheckConfig) => {
            println!(
                "skillrun: config ok (engine.name={}, database={})",
                config.engine.name, config.storage.database_path
            );
            Ok(())
        }
        None => {
            println!("skillrun: use --help for available commands");
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("skillrun: {e}");
        std::process::exit(1);
    }
}
