// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Persisted records.
//!
//! Everything here except `Ceremony` is append-only. A ceremony row is
//! inserted when it starts and updated in place, by `ceremony_id`, when it
//! completes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::domain::field::{clamp_coherence, AgentInfo, Field, SacredEvent};

/// Point-in-time copy of the field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldStateSnapshot {
    pub coherence: f64,
    #[serde(default)]
    pub harmonies: BTreeMap<String, f64>,
    #[serde(default)]
    pub active_agents: u32,
    #[serde(default)]
    pub active_ceremonies: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sacred_geometry: Option<String>,
    #[serde(default)]
    pub metadata: serde_json::Value,
    #[serde(default = "Utc::now")]
    pub captured_at: DateTime<Utc>,
}

impl FieldStateSnapshot {
    /// New snapshot with `coherence` clamped into `[0, 100]`.
    pub fn new(coherence: f64, harmonies: BTreeMap<String, f64>) -> Self {
        Self {
            coherence: clamp_coherence(coherence),
            harmonies,
            active_agents: 0,
            active_ceremonies: Vec::new(),
            sacred_geometry: None,
            metadata: serde_json::Value::Null,
            captured_at: Utc::now(),
        }
    }

    /// Snapshot of a live field, filling in whatever optional state it exposes.
    pub fn capture(field: &dyn Field, coherence: f64, harmonies: BTreeMap<String, f64>) -> Self {
        let mut snapshot = Self::new(coherence, harmonies);
        snapshot.active_agents = field.active_agents().unwrap_or(0) as u32;
        snapshot.active_ceremonies = field.active_ceremonies();
        snapshot
    }

    pub fn with_active_agents(mut self, count: u32) -> Self {
        self.active_agents = count;
        self
    }

    pub fn with_ceremonies(mut self, ceremonies: Vec<String>) -> Self {
        self.active_ceremonies = ceremonies;
        self
    }

    pub fn with_geometry(mut self, tag: impl Into<String>) -> Self {
        self.sacred_geometry = Some(tag.into());
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SacredEventRecord {
    pub event_type: String,
    #[serde(default)]
    pub agent_id: Option<String>,
    #[serde(default)]
    pub agent_name: Option<String>,
    #[serde(default)]
    pub payload: serde_json::Value,
    #[serde(default)]
    pub field_impact: Option<f64>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default = "Utc::now")]
    pub captured_at: DateTime<Utc>,
}

impl SacredEventRecord {
    /// `fieldImpact` and `tags` are lifted out of the event data when present.
    pub fn from_event(event: &SacredEvent) -> Self {
        let field_impact = event.data.get("fieldImpact").and_then(|v| v.as_f64());
        let tags = event
            .data
            .get("tags")
            .and_then(|v| v.as_array())
            .map(|tags| {
                tags.iter()
                    .filter_map(|t| t.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();

        Self {
            event_type: event.event_type.clone(),
            agent_id: event.agent.as_ref().map(|a| a.id.clone()),
            agent_name: event.agent.as_ref().map(|a| a.name.clone()),
            payload: event.data.clone(),
            field_impact,
            tags,
            captured_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ceremony {
    pub ceremony_id: String,
    #[serde(rename = "type")]
    pub ceremony_type: String,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub participants: Vec<String>,
    #[serde(default)]
    pub initial_coherence: Option<f64>,
    #[serde(default)]
    pub final_coherence: Option<f64>,
    #[serde(default)]
    pub sacred_moments: Vec<serde_json::Value>,
    #[serde(default)]
    pub outcomes: serde_json::Value,
}

impl Ceremony {
    pub fn started(
        ceremony_id: impl Into<String>,
        ceremony_type: impl Into<String>,
        participants: Vec<String>,
        initial_coherence: Option<f64>,
    ) -> Self {
        Self {
            ceremony_id: ceremony_id.into(),
            ceremony_type: ceremony_type.into(),
            started_at: Utc::now(),
            completed_at: None,
            participants,
            initial_coherence,
            final_coherence: None,
            sacred_moments: Vec::new(),
            outcomes: serde_json::Value::Null,
        }
    }

    pub fn complete(mut self, final_coherence: Option<f64>, outcomes: serde_json::Value) -> Self {
        self.completed_at = Some(Utc::now());
        self.final_coherence = final_coherence;
        self.outcomes = outcomes;
        self
    }

    pub fn is_completed(&self) -> bool {
        self.completed_at.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OracleWisdomRecord {
    #[serde(default)]
    pub question: Option<String>,
    pub response: String,
    #[serde(default)]
    pub coherence_at_time: Option<f64>,
    #[serde(default)]
    pub seeker_id: Option<String>,
    #[serde(default = "default_wisdom_type")]
    pub wisdom_type: String,
    #[serde(default)]
    pub resonance_score: Option<f64>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default = "Utc::now")]
    pub captured_at: DateTime<Utc>,
}

pub fn default_wisdom_type() -> String {
    "general".to_string()
}

impl OracleWisdomRecord {
    pub fn new(question: Option<String>, response: impl Into<String>) -> Self {
        Self {
            question,
            response: response.into(),
            coherence_at_time: None,
            seeker_id: None,
            wisdom_type: default_wisdom_type(),
            resonance_score: None,
            tags: Vec::new(),
            captured_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentSnapshot {
    pub agent_id: String,
    pub name: String,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub capabilities: Vec<String>,
    #[serde(default)]
    pub coherence_contribution: f64,
    #[serde(default)]
    pub sacred_actions: i64,
    #[serde(default)]
    pub state: serde_json::Value,
    #[serde(default = "Utc::now")]
    pub snapshot_time: DateTime<Utc>,
}

impl From<&AgentInfo> for AgentSnapshot {
    fn from(agent: &AgentInfo) -> Self {
        Self {
            agent_id: agent.id.clone(),
            name: agent.name.clone(),
            role: agent.role.clone(),
            capabilities: agent.capabilities.clone(),
            coherence_contribution: 0.0,
            sacred_actions: 0,
            state: serde_json::Value::Null,
            snapshot_time: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupMetadata {
    pub backup_time: DateTime<Utc>,
    pub records_backed_up: i64,
    pub backup_type: String,
    pub source: String,
    pub success: bool,
}

/// Row id alongside the stored record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stored<T> {
    pub id: i64,
    #[serde(flatten)]
    pub record: T,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupStats {
    /// Row count per table.
    pub tables: BTreeMap<String, i64>,
    pub oldest: Option<DateTime<Utc>>,
    pub newest: Option<DateTime<Utc>>,
    pub size_bytes: i64,
    pub size_mb: f64,
}

/// Externally supplied batch for `perform_auto_backup`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoBackupBatch {
    #[serde(default)]
    pub field_states: Vec<FieldStateSnapshot>,
    #[serde(default)]
    pub events: Vec<SacredEventRecord>,
    #[serde(default = "default_backup_source")]
    pub source: String,
}

fn default_backup_source() -> String {
    "unknown".to_string()
}

impl AutoBackupBatch {
    pub fn empty(source: impl Into<String>) -> Self {
        Self {
            field_states: Vec::new(),
            events: Vec::new(),
            source: source.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.field_states.len() + self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupReport {
    pub records_backed_up: i64,
    pub source: String,
    pub success: bool,
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
