// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Typed views over `SacredEvent::data` for the event types the bridge
//! handles specifically. Unknown keys are ignored.

use serde::Deserialize;

use crate::domain::field::AgentInfo;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CeremonyPayload {
    #[serde(alias = "id")]
    pub ceremony_id: String,
    #[serde(rename = "type", default = "default_ceremony_type")]
    pub ceremony_type: String,
    #[serde(default)]
    pub participants: Vec<String>,
    #[serde(default)]
    pub coherence: Option<f64>,
    #[serde(default)]
    pub outcomes: serde_json::Value,
}

fn default_ceremony_type() -> String {
    "ceremony".to_string()
}

impl CeremonyPayload {
    /// `outcomes.coherenceGain`, when present and numeric.
    pub fn coherence_gain(&self) -> Option<f64> {
        self.outcomes.get("coherenceGain").and_then(|v| v.as_f64())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OraclePayload {
    #[serde(default)]
    pub question: Option<String>,
    pub response: String,
    #[serde(default, alias = "seeker")]
    pub seeker_id: Option<String>,
    #[serde(default, alias = "type")]
    pub wisdom_type: Option<String>,
    #[serde(default, alias = "resonanceScore")]
    pub resonance: Option<f64>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectivePayload {
    pub name: String,
    #[serde(default)]
    pub members: Vec<String>,
    #[serde(default)]
    pub purpose: Option<String>,
}

/// `agent.joined` carries the agent either on the event or inside its data.
#[derive(Debug, Clone, Deserialize)]
pub struct AgentJoinedPayload {
    #[serde(flatten)]
    pub agent: AgentInfo,
}
