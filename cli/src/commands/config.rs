// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Configuration management commands
//!
//! Commands: show, validate, generate

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;

use weave_core::domain::weave_config::{resolve_secret, WeaveConfig};

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Show config file paths checked
        #[arg(long)]
        paths: bool,
    },

    /// Validate configuration file
    Validate {
        /// Path to config file (default: discover)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },

    /// Generate sample configuration
    Generate {
        /// Output path (default: ./weave-config.yaml)
        #[arg(short, long, default_value = "./weave-config.yaml")]
        output: PathBuf,

        /// Reference every credential through env:VAR_NAME
        #[arg(long)]
        examples: bool,
    },
}

pub async fn handle_command(
    command: ConfigCommand,
    config_override: Option<PathBuf>,
) -> Result<()> {
    match command {
        ConfigCommand::Show { paths } => show(config_override, paths).await,
        ConfigCommand::Validate { file } => validate(file.or(config_override)).await,
        ConfigCommand::Generate { output, examples } => generate(output, examples).await,
    }
}

async fn show(config_override: Option<PathBuf>, show_paths: bool) -> Result<()> {
    let config = WeaveConfig::load_or_default(config_override.clone())
        .context("Failed to load configuration")?;

    if show_paths {
        println!("{}", "Configuration discovery paths:".bold());
        if let Some(path) = &config_override {
            println!("  1. --config flag: {}", path.display());
        } else {
            println!("  1. --config flag: {}", "(not set)".dimmed());
        }
        println!(
            "  2. WEAVE_CONFIG_PATH: {}",
            std::env::var("WEAVE_CONFIG_PATH")
                .unwrap_or_else(|_| "(not set)".to_string())
                .dimmed()
        );
        println!("  3. ./weave-config.yaml");
        println!("  4. ~/.weave/config.yaml");
        println!("  5. /etc/weave/config.yaml");
        println!();
    }

    println!("{}", "Current configuration:".bold());
    println!("  Name: {}", config.metadata.name);
    println!();

    let spec = &config.spec;

    println!("{}", "Bridge:".bold());
    println!("  Call timeout: {} ms", spec.bridge.call_timeout_ms);
    println!("  Event buffer: {}", spec.bridge.event_buffer);
    println!();

    println!("{}", "Integrations:".bold());
    section("SQLite backup", spec.sqlite.enabled, true);
    println!("    Database: {}", spec.sqlite.resolved_db_path().display());
    if spec.sqlite.auto_backup {
        println!("    Auto-backup every {} ms", spec.sqlite.backup_interval_ms);
    }

    section(
        "Supabase",
        spec.supabase.enabled,
        spec.supabase.url.is_some() && resolve_secret(&spec.supabase.service_key).is_some(),
    );
    println!("    Table prefix: {}", spec.supabase.schema_prefix);

    section("RSS feeds", spec.rss.enabled, true);
    println!("    Directory: {}", spec.rss.resolved_feed_path().display());
    println!("    Base URL: {}", spec.rss.base_url);

    section(
        "Discord",
        spec.discord.enabled,
        resolve_secret(&spec.discord.webhook_url).is_some(),
    );
    println!("    Username: {}", spec.discord.username);

    section(
        "Replicate",
        spec.replicate.enabled,
        resolve_secret(&spec.replicate.api_token).is_some(),
    );
    println!("    Model: {}", spec.replicate.model);
    println!("    Visions: {}", spec.replicate.resolved_visions_dir().display());

    section(
        "GitHub",
        spec.github.enabled,
        resolve_secret(&spec.github.token).is_some() && spec.github.repository.is_some(),
    );
    if let Some(repository) = &spec.github.repository {
        println!("    Repository: {}", repository);
    }
    println!();

    Ok(())
}

fn section(name: &str, enabled: bool, configured: bool) {
    let state = match (enabled, configured) {
        (false, _) => "disabled".dimmed(),
        (true, true) => "ready".green(),
        (true, false) => "missing credentials".yellow(),
    };
    println!("  {} ({})", name.bold(), state);
}

async fn validate(config_path: Option<PathBuf>) -> Result<()> {
    println!("Validating configuration...");

    let config = WeaveConfig::load_or_default(config_path)
        .context("Failed to load configuration")?;

    config
        .validate()
        .context("Configuration validation failed")?;

    println!("{}", "✓ Configuration is valid".green());

    Ok(())
}

async fn generate(output: PathBuf, with_examples: bool) -> Result<()> {
    let config = sample_config(with_examples);
    config
        .to_yaml_file(&output)
        .with_context(|| format!("Failed to write config to {:?}", output))?;

    println!(
        "{}",
        format!("✓ Configuration generated: {}", output.display()).green()
    );

    Ok(())
}

pub fn sample_config(with_examples: bool) -> WeaveConfig {
    let mut config = WeaveConfig::default();
    if with_examples {
        let spec = &mut config.spec;
        spec.supabase.url = Some("https://your-project.supabase.co".to_string());
        spec.supabase.service_key = Some("env:SUPABASE_SERVICE_KEY".to_string());
        spec.discord.webhook_url = Some("env:DISCORD_WEBHOOK_URL".to_string());
        spec.replicate.api_token = Some("env:REPLICATE_API_TOKEN".to_string());
        spec.github.token = Some("env:GITHUB_TOKEN".to_string());
        spec.github.repository = Some("owner/the-weave".to_string());
    }
    config
}
