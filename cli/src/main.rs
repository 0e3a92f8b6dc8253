// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # The Weave host CLI
//!
//! The `weave` binary hosts the field event bridge.
//!
//! ## Commands
//!
//! - `weave run [--events FILE]` - Bridge a local field fed with newline-delimited events
//! - `weave backup stats|states|ceremonies|wisdom|export|vacuum` - Inspect the local backup store
//! - `weave remote history|agents|coherence` - Read back the remote store
//! - `weave feeds stats|opml` - Inspect the generated feeds
//! - `weave visions cleanup [--days N]` - Prune old generated images
//! - `weave config show|validate|generate` - Configuration management

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

use weave_cli::commands::{
    self, BackupCommand, ConfigCommand, FeedsCommand, RemoteCommand, RunArgs, VisionsCommand,
};

/// The Weave - bridge field events to the outside world
#[derive(Parser)]
#[command(name = "weave")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(
        short,
        long,
        global = true,
        env = "WEAVE_CONFIG_PATH",
        value_name = "FILE"
    )]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "WEAVE_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Log format (text, json)
    #[arg(long, global = true, env = "WEAVE_LOG_FORMAT", default_value = "text")]
    log_format: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the event bridge over a local field
    #[command(name = "run")]
    Run(RunArgs),

    /// Local SQLite backup store
    #[command(name = "backup")]
    Backup {
        #[command(subcommand)]
        command: BackupCommand,
    },

    /// Remote living-memory store
    #[command(name = "remote")]
    Remote {
        #[command(subcommand)]
        command: RemoteCommand,
    },

    /// Generated RSS, Atom and JSON feeds
    #[command(name = "feeds")]
    Feeds {
        #[command(subcommand)]
        command: FeedsCommand,
    },

    /// Generated vision images
    #[command(name = "visions")]
    Visions {
        #[command(subcommand)]
        command: VisionsCommand,
    },

    /// Configuration management
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // .env must be loaded before clap reads env-backed arguments
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    init_logging(&cli.log_level, &cli.log_format)?;

    match cli.command {
        Some(Commands::Run(args)) => commands::run::execute(args, cli.config).await,
        Some(Commands::Backup { command }) => {
            commands::backup::handle_command(command, cli.config).await
        }
        Some(Commands::Remote { command }) => {
            commands::remote::handle_command(command, cli.config).await
        }
        Some(Commands::Feeds { command }) => {
            commands::feeds::handle_command(command, cli.config).await
        }
        Some(Commands::Visions { command }) => {
            commands::visions::handle_command(command, cli.config).await
        }
        Some(Commands::Config { command }) => {
            commands::config::handle_command(command, cli.config).await
        }
        None => {
            eprintln!("{}", "No command specified. Use --help for usage.".yellow());
            std::process::exit(1);
        }
    }
}

/// Initialize tracing subscriber for logging
fn init_logging(level: &str, format: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    if format.eq_ignore_ascii_case("json") {
        builder.json().init();
    } else {
        builder.compact().init();
    }

    Ok(())
}
