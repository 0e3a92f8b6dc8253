// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Remote store commands
//!
//! Commands: history, agents, coherence

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;

use weave_core::domain::integration::{Integration, RemoteStore};
use weave_core::domain::records::{AgentSnapshot, FieldStateSnapshot};
use weave_core::infrastructure::integrations::SupabaseIntegration;

#[derive(Subcommand)]
pub enum RemoteCommand {
    /// Field states stored remotely in the last hours, oldest first
    History {
        /// Window size, at most a century
        #[arg(long, default_value = "24", value_parser = clap::value_parser!(i64).range(1..=876_000))]
        hours: i64,
    },

    /// Agents seen in the last five minutes
    Agents,

    /// Coherence of the newest stored field state
    Coherence,
}

pub async fn handle_command(command: RemoteCommand, config_path: Option<PathBuf>) -> Result<()> {
    let config = super::load_config(config_path)?;
    let store = SupabaseIntegration::new(config.spec.supabase.clone());
    store
        .initialize()
        .await
        .context("Failed to connect to the remote store")?;

    let result = match command {
        RemoteCommand::History { hours } => history(&store, hours).await,
        RemoteCommand::Agents => agents(&store).await,
        RemoteCommand::Coherence => coherence(&store).await,
    };

    store.shutdown().await?;
    result
}

async fn history(store: &dyn RemoteStore, hours: i64) -> Result<()> {
    let states = store
        .field_history(hours)
        .await
        .context("Failed to read field history")?;
    if states.is_empty() {
        println!("{}", format!("No remote field states in the last {} hours", hours).dimmed());
        return Ok(());
    }

    println!("{}", format!("Remote field history (last {} hours):", hours).bold());
    for state in &states {
        println!("  {}", state_line(state));
    }
    Ok(())
}

async fn agents(store: &dyn RemoteStore) -> Result<()> {
    let agents = store
        .active_agents()
        .await
        .context("Failed to read agent presence")?;
    if agents.is_empty() {
        println!("{}", "No agents active".dimmed());
        return Ok(());
    }

    println!("{}", "Active agents:".bold());
    for agent in &agents {
        println!("  {}", agent_line(agent));
    }
    Ok(())
}

async fn coherence(store: &dyn RemoteStore) -> Result<()> {
    match store
        .current_coherence()
        .await
        .context("Failed to read current coherence")?
    {
        Some(coherence) => println!("Current coherence: {}", format!("{:.1}%", coherence).bold()),
        None => println!("{}", "No field state stored yet".dimmed()),
    }
    Ok(())
}

fn state_line(state: &FieldStateSnapshot) -> String {
    format!(
        "{}  coherence {:>6.2}%  agents {}",
        state.captured_at.format("%Y-%m-%d %H:%M:%S"),
        state.coherence,
        state.active_agents
    )
}

fn agent_line(agent: &AgentSnapshot) -> String {
    let role = agent.role.as_deref().unwrap_or("-");
    format!(
        "{:<16} {:<12} contribution {:>5.1}  actions {}",
        agent.name, role, agent.coherence_contribution, agent.sacred_actions
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use weave_core::domain::field::AgentInfo;

    #[test]
    fn agent_line_shows_contribution_and_actions() {
        let mut agent = AgentSnapshot::from(&AgentInfo {
            id: "a-1".to_string(),
            name: "Sophia".to_string(),
            role: None,
            capabilities: vec![],
        });
        agent.coherence_contribution = 4.5;
        agent.sacred_actions = 12;

        let line = agent_line(&agent);
        assert!(line.starts_with("Sophia"));
        assert!(line.contains("contribution   4.5"));
        assert!(line.ends_with("actions 12"));
    }

    #[test]
    fn state_line_shows_coherence() {
        let state = FieldStateSnapshot::new(72.5, BTreeMap::new()).with_active_agents(3);
        let line = state_line(&state);
        assert!(line.contains("coherence  72.50%"));
        assert!(line.ends_with("agents 3"));
    }

    #[tokio::test]
    async fn unconfigured_store_is_an_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("weave-config.yaml");
        super::super::config::sample_config(false).to_yaml_file(&path).unwrap();

        let err = handle_command(RemoteCommand::Coherence, Some(path)).await.unwrap_err();
        assert!(format!("{:#}", err).contains("remote store"));
    }
}
