// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Feed commands
//!
//! Commands: stats, opml

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;

use weave_core::domain::integration::{FeedPublisher, Integration};
use weave_core::infrastructure::integrations::RssIntegration;

#[derive(Subcommand)]
pub enum FeedsCommand {
    /// Item counts and last update per feed
    Stats,

    /// Write the OPML subscription list for every feed
    Opml,
}

pub async fn handle_command(command: FeedsCommand, config_path: Option<PathBuf>) -> Result<()> {
    let config = super::load_config(config_path)?;
    let feeds = RssIntegration::new(config.spec.rss.clone());
    feeds
        .initialize()
        .await
        .with_context(|| format!("Failed to load feeds from {:?}", feeds.feed_path()))?;

    match command {
        FeedsCommand::Stats => {
            println!("{}", format!("Feeds in {}:", feeds.feed_path().display()).bold());
            for (name, stat) in feeds.feed_stats().await {
                let updated = stat
                    .last_update
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_else(|| "never".to_string());
                println!("  {:<12} {:>4} items  updated {}", name.bold(), stat.item_count, updated);
                if !stat.categories.is_empty() {
                    println!("    Categories: {}", stat.categories.join(", ").dimmed());
                }
            }
        }
        FeedsCommand::Opml => {
            let path = feeds.write_opml().await.context("Failed to write OPML")?;
            println!("{}", format!("✓ OPML written: {}", path.display()).green());
        }
    }

    feeds.shutdown().await?;
    Ok(())
}
