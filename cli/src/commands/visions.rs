// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Generated vision commands
//!
//! Commands: cleanup

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;

use weave_core::infrastructure::integrations::ReplicateIntegration;

#[derive(Subcommand)]
pub enum VisionsCommand {
    /// Delete vision images older than the given number of days
    Cleanup {
        #[arg(long, default_value = "7")]
        days: u32,
    },
}

pub async fn handle_command(command: VisionsCommand, config_path: Option<PathBuf>) -> Result<()> {
    let config = super::load_config(config_path)?;
    let visions = ReplicateIntegration::new(config.spec.replicate.clone());

    match command {
        VisionsCommand::Cleanup { days } => {
            let removed = visions
                .cleanup_old_visions(days)
                .await
                .with_context(|| format!("Failed to clean {:?}", visions.visions_dir()))?;
            println!(
                "{}",
                format!(
                    "✓ Removed {} vision files older than {} days from {}",
                    removed,
                    days,
                    visions.visions_dir().display()
                )
                .green()
            );
        }
    }

    Ok(())
}
