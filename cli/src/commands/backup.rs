// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Local backup store commands
//!
//! Commands: stats, states, ceremonies, wisdom, export, vacuum

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;

use weave_core::domain::integration::Integration;
use weave_core::domain::records::BackupStats;
use weave_core::domain::weave_config::SqliteConfig;
use weave_core::infrastructure::integrations::SqliteIntegration;
use weave_core::infrastructure::repositories::SqliteBackupRepository;

#[derive(Subcommand)]
pub enum BackupCommand {
    /// Row counts, time span and size of the backup database
    Stats,

    /// Field states captured in the last hours
    States {
        /// Window size, at most a century
        #[arg(long, default_value = "24", value_parser = clap::value_parser!(i64).range(1..=876_000))]
        hours: i64,
    },

    /// Most recent ceremonies
    Ceremonies {
        #[arg(long, default_value = "10")]
        limit: i64,
    },

    /// Search oracle wisdom by question or response text
    Wisdom {
        query: String,

        #[arg(long, default_value = "10")]
        limit: i64,
    },

    /// Export every table as one JSON document
    Export {
        #[arg(value_name = "FILE")]
        output: PathBuf,
    },

    /// Compact the database file
    Vacuum,
}

pub async fn handle_command(command: BackupCommand, config_path: Option<PathBuf>) -> Result<()> {
    let config = super::load_config(config_path)?;
    let store = open_store(config.spec.sqlite.clone()).await?;
    let repository = store
        .repository()
        .context("Backup repository unavailable after initialization")?;

    let result = match command {
        BackupCommand::Stats => stats(&repository, &store).await,
        BackupCommand::States { hours } => states(&repository, hours).await,
        BackupCommand::Ceremonies { limit } => ceremonies(&repository, limit).await,
        BackupCommand::Wisdom { query, limit } => wisdom(&repository, &query, limit).await,
        BackupCommand::Export { output } => export(&repository, output).await,
        BackupCommand::Vacuum => vacuum(&repository).await,
    };

    store.shutdown().await?;
    result
}

/// Open the configured database without starting the backup timer.
pub async fn open_store(config: SqliteConfig) -> Result<SqliteIntegration> {
    let store = SqliteIntegration::new(SqliteConfig {
        auto_backup: false,
        ..config
    });
    store
        .initialize()
        .await
        .with_context(|| format!("Failed to open backup database {:?}", store.db_path()))?;
    Ok(store)
}

async fn stats(repository: &Arc<SqliteBackupRepository>, store: &SqliteIntegration) -> Result<()> {
    let stats = repository.backup_stats().await?;
    println!("{}", "Backup database:".bold());
    println!("  Path: {}", store.db_path().display());
    print_stats(&stats);
    Ok(())
}

pub fn print_stats(stats: &BackupStats) {
    println!("  Size: {:.2} MB", stats.size_mb);
    match (stats.oldest, stats.newest) {
        (Some(oldest), Some(newest)) => {
            println!("  Span: {} → {}", oldest.to_rfc3339(), newest.to_rfc3339())
        }
        _ => println!("  Span: {}", "(empty)".dimmed()),
    }
    println!();
    println!("{}", "Tables:".bold());
    for (table, rows) in &stats.tables {
        println!("  {:<20} {}", table, rows);
    }
}

async fn states(repository: &Arc<SqliteBackupRepository>, hours: i64) -> Result<()> {
    let states = repository.recent_field_states(hours).await?;
    if states.is_empty() {
        println!("{}", format!("No field states in the last {} hours", hours).dimmed());
        return Ok(());
    }

    println!("{}", format!("Field states (last {} hours):", hours).bold());
    for stored in states {
        let state = stored.record;
        println!(
            "  #{:<6} {}  coherence {:>6.2}%  agents {}  ceremonies {}",
            stored.id,
            state.captured_at.format("%Y-%m-%d %H:%M:%S"),
            state.coherence,
            state.active_agents,
            state.active_ceremonies.len()
        );
    }
    Ok(())
}

async fn ceremonies(repository: &Arc<SqliteBackupRepository>, limit: i64) -> Result<()> {
    let ceremonies = repository.ceremony_history(limit).await?;
    if ceremonies.is_empty() {
        println!("{}", "No ceremonies recorded".dimmed());
        return Ok(());
    }

    println!("{}", "Ceremonies:".bold());
    for stored in ceremonies {
        let ceremony = stored.record;
        let status = if ceremony.is_completed() {
            "completed".green()
        } else {
            "in progress".yellow()
        };
        println!(
            "  {} ({}) {}  started {}",
            ceremony.ceremony_id.bold(),
            ceremony.ceremony_type,
            status,
            ceremony.started_at.format("%Y-%m-%d %H:%M:%S")
        );
        if !ceremony.participants.is_empty() {
            println!("    Participants: {}", ceremony.participants.join(", "));
        }
        if let (Some(initial), Some(last)) = (ceremony.initial_coherence, ceremony.final_coherence) {
            println!("    Coherence: {:.1}% → {:.1}%", initial, last);
        }
    }
    Ok(())
}

async fn wisdom(repository: &Arc<SqliteBackupRepository>, query: &str, limit: i64) -> Result<()> {
    let results = repository.search_wisdom(query, limit).await?;
    if results.is_empty() {
        println!("{}", format!("No wisdom matches \"{}\"", query).dimmed());
        return Ok(());
    }

    for stored in results {
        let record = stored.record;
        if let Some(question) = &record.question {
            println!("{} {}", "Q:".bold(), question.italic());
        }
        println!("{} {}", "A:".bold(), record.response);
        println!(
            "   {}",
            format!(
                "{} · {}",
                record.captured_at.format("%Y-%m-%d %H:%M"),
                record.seeker_id.as_deref().unwrap_or("anonymous")
            )
            .dimmed()
        );
        println!();
    }
    Ok(())
}

async fn export(repository: &Arc<SqliteBackupRepository>, output: PathBuf) -> Result<()> {
    let rows = repository
        .export_backup(&output)
        .await
        .with_context(|| format!("Failed to export backup to {:?}", output))?;
    println!(
        "{}",
        format!("✓ Exported {} rows to {}", rows, output.display()).green()
    );
    Ok(())
}

async fn vacuum(repository: &Arc<SqliteBackupRepository>) -> Result<()> {
    repository.vacuum().await?;
    println!("{}", "✓ Backup database vacuumed".green());
    Ok(())
}
