// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Supabase Remote Store Adapter
//!
//! Living memory over PostgREST. Every table name carries the configured
//! prefix (`weave_` by default). Inserts ask for `return=minimal`; agent
//! presence is an upsert on `agent_id`; ceremony completion patches the row
//! matching `ceremony_id`. Action counts go through the `increment` stored
//! procedure.

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::OnceLock;
use tracing::Level;
use url::Url;

use super::http;
use crate::domain::field::AgentInfo;
use crate::domain::integration::{
    Integration, IntegrationError, IntegrationKind, RemoteStore, ACTIVE_AGENT_WINDOW,
};
use crate::domain::records::{
    AgentSnapshot, Ceremony, FieldStateSnapshot, OracleWisdomRecord, SacredEventRecord,
};
use crate::domain::weave_config::{resolve_secret, SupabaseConfig};

const NAME: &str = "Supabase";
const MINIMAL: &str = "return=minimal";

struct Credentials {
    url: String,
    service_key: String,
}

/// `field_state` row as PostgREST returns it.
#[derive(Debug, Deserialize)]
struct FieldStateRow {
    timestamp: DateTime<Utc>,
    coherence: f64,
    #[serde(default)]
    harmonies: Option<BTreeMap<String, f64>>,
    #[serde(default)]
    active_agents: Option<u32>,
    #[serde(default)]
    active_ceremonies: Option<Vec<String>>,
    #[serde(default)]
    sacred_geometry: Option<String>,
    #[serde(default)]
    metadata: serde_json::Value,
}

impl From<FieldStateRow> for FieldStateSnapshot {
    fn from(row: FieldStateRow) -> Self {
        let mut snapshot = FieldStateSnapshot::new(row.coherence, row.harmonies.unwrap_or_default())
            .with_active_agents(row.active_agents.unwrap_or(0))
            .with_ceremonies(row.active_ceremonies.unwrap_or_default())
            .with_metadata(row.metadata);
        snapshot.sacred_geometry = row.sacred_geometry;
        snapshot.captured_at = row.timestamp;
        snapshot
    }
}

/// `agent_presence` row.
#[derive(Debug, Deserialize)]
struct AgentPresenceRow {
    agent_id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    capabilities: Option<Vec<String>>,
    #[serde(default)]
    coherence_contribution: Option<f64>,
    #[serde(default)]
    sacred_actions: Option<i64>,
    #[serde(default)]
    state: serde_json::Value,
    last_seen: DateTime<Utc>,
}

impl From<AgentPresenceRow> for AgentSnapshot {
    fn from(row: AgentPresenceRow) -> Self {
        Self {
            name: row.name.unwrap_or_else(|| row.agent_id.clone()),
            agent_id: row.agent_id,
            role: row.role,
            capabilities: row.capabilities.unwrap_or_default(),
            coherence_contribution: row.coherence_contribution.unwrap_or(0.0),
            sacred_actions: row.sacred_actions.unwrap_or(0),
            state: row.state,
            snapshot_time: row.last_seen,
        }
    }
}

#[derive(Debug, Deserialize)]
struct CoherenceRow {
    coherence: f64,
}

pub struct SupabaseIntegration {
    config: SupabaseConfig,
    client: reqwest::Client,
    credentials: OnceLock<Credentials>,
}

impl SupabaseIntegration {
    pub fn new(config: SupabaseConfig) -> Self {
        Self {
            config,
            client: http::client(),
            credentials: OnceLock::new(),
        }
    }

    fn table(&self, name: &str) -> String {
        format!("{}{}", self.config.schema_prefix, name)
    }

    fn credentials(&self) -> Result<&Credentials, IntegrationError> {
        self.credentials
            .get()
            .ok_or_else(|| IntegrationError::NotInitialized(NAME.to_string()))
    }

    /// `<url>/rest/v1/<path>?<query>` with the query pairs escaped.
    fn endpoint(&self, path: &str, query: &[(&str, &str)]) -> Result<Url, IntegrationError> {
        let credentials = self.credentials()?;
        let mut url = Url::parse(&format!("{}/rest/v1/{}", http::trim_base(&credentials.url), path))
            .map_err(|e| IntegrationError::configuration(NAME, format!("invalid SUPABASE_URL: {}", e)))?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url)
    }

    fn request(&self, method: reqwest::Method, url: Url) -> Result<reqwest::RequestBuilder, IntegrationError> {
        let credentials = self.credentials()?;
        Ok(self
            .client
            .request(method, url)
            .header("apikey", &credentials.service_key)
            .header("Authorization", format!("Bearer {}", credentials.service_key)))
    }

    async fn insert(
        &self,
        table: &str,
        query: &[(&str, &str)],
        body: serde_json::Value,
        prefer: &str,
    ) -> Result<(), IntegrationError> {
        let url = self.endpoint(&self.table(table), query)?;
        let response = self
            .request(reqwest::Method::POST, url)?
            .header("Prefer", prefer)
            .json(&body)
            .send()
            .await?;

        http::check(NAME, response).await?;
        Ok(())
    }

    async fn update(&self, table: &str, query: &[(&str, &str)], body: serde_json::Value) -> Result<(), IntegrationError> {
        let url = self.endpoint(&self.table(table), query)?;
        let response = self
            .request(reqwest::Method::PATCH, url)?
            .header("Prefer", MINIMAL)
            .json(&body)
            .send()
            .await?;

        http::check(NAME, response).await?;
        Ok(())
    }

    async fn select<T: DeserializeOwned>(&self, table: &str, query: &[(&str, &str)]) -> Result<Vec<T>, IntegrationError> {
        let url = self.endpoint(&self.table(table), query)?;
        let response = self.request(reqwest::Method::GET, url)?.send().await?;
        let response = http::check(NAME, response).await?;
        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Stored procedures live under `rpc/` and are not prefixed.
    async fn rpc(&self, function: &str, body: serde_json::Value) -> Result<(), IntegrationError> {
        let url = self.endpoint(&format!("rpc/{}", function), &[])?;
        let response = self.request(reqwest::Method::POST, url)?.json(&body).send().await?;

        http::check(NAME, response).await?;
        Ok(())
    }
}

/// `now - window`, or the epoch when the window reaches past it.
fn window_start(window: TimeDelta) -> DateTime<Utc> {
    Utc::now()
        .checked_sub_signed(window)
        .map_or(DateTime::<Utc>::UNIX_EPOCH, |since| since.max(DateTime::<Utc>::UNIX_EPOCH))
}

fn gte(timestamp: DateTime<Utc>) -> String {
    format!("gte.{}", timestamp.to_rfc3339())
}

#[async_trait]
impl Integration for SupabaseIntegration {
    fn kind(&self) -> IntegrationKind {
        IntegrationKind::RemoteStore
    }

    fn name(&self) -> &str {
        NAME
    }

    async fn initialize(&self) -> Result<(), IntegrationError> {
        let url = self.config.url.clone().filter(|u| !u.is_empty());
        let service_key = resolve_secret(&self.config.service_key);

        let (Some(url), Some(service_key)) = (url, service_key) else {
            return Err(IntegrationError::configuration(
                NAME,
                "SUPABASE_URL and SUPABASE_SERVICE_KEY are required",
            ));
        };

        let _ = self.credentials.set(Credentials { url, service_key });
        self.log(Level::INFO, "Living memory connected");
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), IntegrationError> {
        self.log(Level::DEBUG, "Shutting down");
        Ok(())
    }
}

#[async_trait]
impl RemoteStore for SupabaseIntegration {
    async fn record_field_state(&self, snapshot: &FieldStateSnapshot) -> Result<(), IntegrationError> {
        let body = json!({
            "timestamp": snapshot.captured_at,
            "coherence": snapshot.coherence,
            "harmonies": snapshot.harmonies,
            "active_agents": snapshot.active_agents,
            "active_ceremonies": snapshot.active_ceremonies,
            "sacred_geometry": snapshot.sacred_geometry,
            "metadata": snapshot.metadata,
        });

        self.insert("field_state", &[], body, MINIMAL).await
    }

    async fn record_sacred_event(&self, record: &SacredEventRecord) -> Result<(), IntegrationError> {
        let body = json!({
            "timestamp": record.captured_at,
            "event_type": record.event_type,
            "agent_id": record.agent_id,
            "agent_name": record.agent_name,
            "data": record.payload,
            "field_impact": record.field_impact,
            "tags": record.tags,
        });

        self.insert("sacred_events", &[], body, MINIMAL).await?;
        self.log(Level::DEBUG, &format!("Recorded sacred event: {}", record.event_type));

        // counter failures are logged, not returned
        if let Some(agent_id) = &record.agent_id {
            if let Err(e) = self.increment_agent_actions(agent_id).await {
                self.log(Level::WARN, &format!("Failed to count action for {}: {}", agent_id, e));
            }
        }
        Ok(())
    }

    async fn upsert_agent_presence(&self, agent: &AgentInfo) -> Result<(), IntegrationError> {
        let body = json!({
            "agent_id": agent.id,
            "name": agent.name,
            "role": agent.role,
            "capabilities": agent.capabilities,
            "last_seen": Utc::now(),
        });

        self.insert(
            "agent_presence",
            &[("on_conflict", "agent_id")],
            body,
            "resolution=merge-duplicates,return=minimal",
        )
        .await?;
        self.log(Level::DEBUG, &format!("Agent presence tracked: {}", agent.name));
        Ok(())
    }

    async fn record_ceremony(&self, ceremony: &Ceremony) -> Result<(), IntegrationError> {
        let body = json!({
            "ceremony_id": ceremony.ceremony_id,
            "type": ceremony.ceremony_type,
            "started_at": ceremony.started_at,
            "participants": ceremony.participants,
            "initial_coherence": ceremony.initial_coherence,
        });

        self.insert("ceremonies", &[], body, MINIMAL).await?;
        self.log(Level::DEBUG, &format!("Ceremony recorded: {}", ceremony.ceremony_id));
        Ok(())
    }

    async fn complete_ceremony(&self, ceremony: &Ceremony) -> Result<(), IntegrationError> {
        let body = json!({
            "completed_at": ceremony.completed_at.unwrap_or_else(Utc::now),
            "final_coherence": ceremony.final_coherence,
            "outcomes": ceremony.outcomes,
        });
        let filter = format!("eq.{}", ceremony.ceremony_id);

        self.update("ceremonies", &[("ceremony_id", filter.as_str())], body).await?;
        self.log(Level::DEBUG, &format!("Ceremony completed: {}", ceremony.ceremony_id));
        Ok(())
    }

    async fn record_oracle_wisdom(&self, record: &OracleWisdomRecord) -> Result<(), IntegrationError> {
        let body = json!({
            "timestamp": record.captured_at,
            "question": record.question,
            "response": record.response,
            "coherence_at_time": record.coherence_at_time,
            "seeker_id": record.seeker_id,
            "wisdom_type": record.wisdom_type,
            "resonance_score": record.resonance_score,
            "tags": record.tags,
        });

        self.insert("oracle_wisdom", &[], body, MINIMAL).await
    }

    async fn increment_agent_actions(&self, agent_id: &str) -> Result<(), IntegrationError> {
        let body = json!({
            "table_name": self.table("agent_presence"),
            "column_name": "sacred_actions",
            "row_id": agent_id,
        });

        self.rpc("increment", body).await
    }

    async fn field_history(&self, hours: i64) -> Result<Vec<FieldStateSnapshot>, IntegrationError> {
        let window = TimeDelta::try_hours(hours.max(0)).unwrap_or(TimeDelta::MAX);
        let since = gte(window_start(window));
        let rows: Vec<FieldStateRow> = self
            .select(
                "field_state",
                &[("select", "*"), ("timestamp", since.as_str()), ("order", "timestamp.asc")],
            )
            .await?;

        Ok(rows.into_iter().map(FieldStateSnapshot::from).collect())
    }

    async fn active_agents(&self) -> Result<Vec<AgentSnapshot>, IntegrationError> {
        let window = TimeDelta::from_std(ACTIVE_AGENT_WINDOW).unwrap_or(TimeDelta::MAX);
        let since = gte(window_start(window));
        let rows: Vec<AgentPresenceRow> = self
            .select(
                "agent_presence",
                &[
                    ("select", "*"),
                    ("last_seen", since.as_str()),
                    ("order", "coherence_contribution.desc"),
                ],
            )
            .await?;

        Ok(rows.into_iter().map(AgentSnapshot::from).collect())
    }

    async fn current_coherence(&self) -> Result<Option<f64>, IntegrationError> {
        let rows: Vec<CoherenceRow> = self
            .select(
                "field_state",
                &[("select", "coherence"), ("order", "timestamp.desc"), ("limit", "1")],
            )
            .await?;

        Ok(rows.first().map(|row| row.coherence))
    }
}
