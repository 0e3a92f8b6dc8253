// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Field events and the field contract.
//!
//! The field is an external collaborator: it owns the coherence metric and
//! emits three kinds of events. The bridge only consumes them.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tokio::sync::broadcast;

pub const COHERENCE_MIN: f64 = 0.0;
pub const COHERENCE_MAX: f64 = 100.0;

/// Clamp a coherence reading into `[0, 100]`. NaN collapses to the minimum.
pub fn clamp_coherence(value: f64) -> f64 {
    if value.is_nan() {
        return COHERENCE_MIN;
    }
    value.clamp(COHERENCE_MIN, COHERENCE_MAX)
}

/// Event emitted by the field.
///
/// Wire form is adjacently tagged so that payloads may carry their own
/// `type` key: `{"event": "sacred-event", "payload": {"type": "oracle.consulted", ...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload", rename_all = "kebab-case")]
pub enum FieldEvent {
    CoherenceChanged(CoherenceChange),
    SacredEvent(SacredEvent),
    CommitMade(CommitMade),
}

impl FieldEvent {
    pub fn name(&self) -> &'static str {
        match self {
            FieldEvent::CoherenceChanged(_) => "coherence-changed",
            FieldEvent::SacredEvent(_) => "sacred-event",
            FieldEvent::CommitMade(_) => "commit-made",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoherenceChange {
    pub current: f64,
    pub previous: f64,
    #[serde(default)]
    pub harmonies: BTreeMap<String, f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger: Option<String>,
}

impl CoherenceChange {
    pub fn new(previous: f64, current: f64) -> Self {
        Self {
            current,
            previous,
            harmonies: BTreeMap::new(),
            trigger: None,
        }
    }

    pub fn with_harmonies(mut self, harmonies: BTreeMap<String, f64>) -> Self {
        self.harmonies = harmonies;
        self
    }

    /// Signed change, `current - previous`.
    pub fn delta(&self) -> f64 {
        self.current - self.previous
    }

    pub fn magnitude(&self) -> f64 {
        self.delta().abs()
    }
}

/// Identity of an agent taking part in the field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentInfo {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub capabilities: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SacredEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub data: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent: Option<AgentInfo>,
}

impl SacredEvent {
    pub fn new(event_type: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            event_type: event_type.into(),
            data,
            agent: None,
        }
    }

    pub fn with_agent(mut self, agent: AgentInfo) -> Self {
        self.agent = Some(agent);
        self
    }

    pub fn kind(&self) -> SacredEventKind {
        SacredEventKind::parse(&self.event_type)
    }
}

/// The sacred-event types the bridge has dedicated handling for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SacredEventKind {
    CeremonyStarted,
    CeremonyCompleted,
    OracleConsulted,
    AgentJoined,
    CollectiveFormed,
    Other(String),
}

impl SacredEventKind {
    pub fn parse(value: &str) -> Self {
        match value {
            "ceremony.started" => Self::CeremonyStarted,
            "ceremony.completed" => Self::CeremonyCompleted,
            "oracle.consulted" => Self::OracleConsulted,
            "agent.joined" => Self::AgentJoined,
            "collective.formed" => Self::CollectiveFormed,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::CeremonyStarted => "ceremony.started",
            Self::CeremonyCompleted => "ceremony.completed",
            Self::OracleConsulted => "oracle.consulted",
            Self::AgentJoined => "agent.joined",
            Self::CollectiveFormed => "collective.formed",
            Self::Other(value) => value,
        }
    }
}

impl fmt::Display for SacredEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitMade {
    pub sha: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    /// Pull request the commit belongs to, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pull_request: Option<u64>,
}

/// Contract the bridge needs from the field.
///
/// `active_agents` and `active_ceremonies` are optional capabilities; the
/// defaults report nothing.
pub trait Field: Send + Sync {
    fn coherence(&self) -> f64;

    fn active_agents(&self) -> Option<usize> {
        None
    }

    fn active_ceremonies(&self) -> Vec<String> {
        Vec::new()
    }

    /// Register a listener for every event emitted from now on.
    fn subscribe(&self) -> broadcast::Receiver<FieldEvent>;
}
