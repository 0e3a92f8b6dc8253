// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Integration Contracts
//!
//! Every external service sits behind the [`Integration`] lifecycle trait
//! plus exactly one capability trait. The bridge only ever talks to
//! capabilities, so a missing adapter is an explicit `None` rather than a
//! failed lookup by name.
//!
//! | Kind | Capability | Implementation |
//! |------|------------|----------------|
//! | `RemoteStore` | [`RemoteStore`] | `SupabaseIntegration` |
//! | `LocalBackup` | [`BackupStore`] | `SqliteIntegration` |
//! | `Feed` | [`FeedPublisher`] | `RssIntegration` |
//! | `Chat` | [`ChatNotifier`] | `DiscordIntegration` |
//! | `ImageGeneration` | [`ArtifactGenerator`] | `ReplicateIntegration` |
//! | `SourceControl` | [`SourceControl`] | `GitHubIntegration` |

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::Level;

use crate::domain::field::{AgentInfo, CoherenceChange, CommitMade, Field};
use crate::domain::records::{
    AgentSnapshot, Ceremony, FieldStateSnapshot, OracleWisdomRecord, SacredEventRecord,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IntegrationKind {
    RemoteStore,
    LocalBackup,
    Feed,
    Chat,
    ImageGeneration,
    SourceControl,
}

impl IntegrationKind {
    pub const ALL: [IntegrationKind; 6] = [
        IntegrationKind::RemoteStore,
        IntegrationKind::LocalBackup,
        IntegrationKind::Feed,
        IntegrationKind::Chat,
        IntegrationKind::ImageGeneration,
        IntegrationKind::SourceControl,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            IntegrationKind::RemoteStore => "remote-store",
            IntegrationKind::LocalBackup => "local-backup",
            IntegrationKind::Feed => "feed",
            IntegrationKind::Chat => "chat",
            IntegrationKind::ImageGeneration => "image-generation",
            IntegrationKind::SourceControl => "source-control",
        }
    }
}

impl fmt::Display for IntegrationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised by integrations.
#[derive(Debug, thiserror::Error)]
pub enum IntegrationError {
    #[error("{integration} is not configured: {reason}")]
    Configuration { integration: String, reason: String },

    #[error("{0} is not initialized")]
    NotInitialized(String),

    #[error("{0} returned no result")]
    EmptyResult(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("{service} responded with HTTP {status}: {body}")]
    Api {
        service: String,
        status: u16,
        body: String,
    },

    #[error("Database error: {0}")]
    Database(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Template error: {0}")]
    Template(String),

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    #[error("Timed out after {0:?}")]
    Timeout(Duration),
}

impl IntegrationError {
    pub fn configuration(integration: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Configuration {
            integration: integration.into(),
            reason: reason.into(),
        }
    }
}

impl From<reqwest::Error> for IntegrationError {
    fn from(e: reqwest::Error) -> Self {
        IntegrationError::Network(e.to_string())
    }
}

impl From<sqlx::Error> for IntegrationError {
    fn from(e: sqlx::Error) -> Self {
        IntegrationError::Database(e.to_string())
    }
}

/// Lifecycle every adapter satisfies.
#[async_trait]
pub trait Integration: Send + Sync {
    fn kind(&self) -> IntegrationKind;

    fn name(&self) -> &str;

    /// One-time setup. Fails with `IntegrationError::Configuration` when
    /// credentials or required settings are absent.
    async fn initialize(&self) -> Result<(), IntegrationError>;

    /// Hook invoked once the bridge has a field. Most adapters ignore it.
    async fn connect_to_field(&self, _field: Arc<dyn Field>) -> Result<(), IntegrationError> {
        Ok(())
    }

    /// Release timers, handles and connections. Must tolerate a failed or
    /// partial `initialize`.
    async fn shutdown(&self) -> Result<(), IntegrationError>;

    fn log(&self, level: Level, message: &str) {
        let integration = self.name();
        match level {
            Level::ERROR => tracing::error!(integration, "{}", message),
            Level::WARN => tracing::warn!(integration, "{}", message),
            Level::INFO => tracing::info!(integration, "{}", message),
            Level::DEBUG => tracing::debug!(integration, "{}", message),
            _ => tracing::trace!(integration, "{}", message),
        }
    }
}

// ============================================================================
// Capabilities
// ============================================================================

/// Remote "living memory" copy of field state and events.
#[async_trait]
pub trait RemoteStore: Integration {
    async fn record_field_state(&self, snapshot: &FieldStateSnapshot) -> Result<(), IntegrationError>;

    /// Also bumps the acting agent's action count when the record names one.
    async fn record_sacred_event(&self, record: &SacredEventRecord) -> Result<(), IntegrationError>;

    async fn upsert_agent_presence(&self, agent: &AgentInfo) -> Result<(), IntegrationError>;

    async fn record_ceremony(&self, ceremony: &Ceremony) -> Result<(), IntegrationError>;

    /// Update the row for `ceremony.ceremony_id` with its completion time,
    /// final coherence and outcomes.
    async fn complete_ceremony(&self, ceremony: &Ceremony) -> Result<(), IntegrationError>;

    async fn record_oracle_wisdom(&self, record: &OracleWisdomRecord) -> Result<(), IntegrationError>;

    async fn increment_agent_actions(&self, agent_id: &str) -> Result<(), IntegrationError>;

    /// Field states of the last `hours`, oldest first.
    async fn field_history(&self, hours: i64) -> Result<Vec<FieldStateSnapshot>, IntegrationError>;

    /// Agents seen within [`ACTIVE_AGENT_WINDOW`], strongest contribution first.
    async fn active_agents(&self) -> Result<Vec<AgentSnapshot>, IntegrationError>;

    /// Coherence of the newest stored field state, `None` when there is none.
    async fn current_coherence(&self) -> Result<Option<f64>, IntegrationError>;
}

/// How recently an agent must have been seen to count as active.
pub const ACTIVE_AGENT_WINDOW: Duration = Duration::from_secs(5 * 60);

/// Local durable backup of everything the field produces.
#[async_trait]
pub trait BackupStore: Integration {
    async fn backup_field_state(&self, snapshot: &FieldStateSnapshot) -> Result<i64, IntegrationError>;

    async fn backup_sacred_event(&self, record: &SacredEventRecord) -> Result<i64, IntegrationError>;

    /// Insert on first sight of `ceremony_id`, update in place afterwards.
    async fn backup_ceremony(&self, ceremony: &Ceremony) -> Result<(), IntegrationError>;

    async fn backup_oracle_wisdom(&self, record: &OracleWisdomRecord) -> Result<i64, IntegrationError>;

    async fn snapshot_agents(&self, agents: &[AgentSnapshot]) -> Result<usize, IntegrationError>;
}

/// Ceremony lifecycle entry for feeds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CeremonyFeedEntry {
    pub ceremony_id: String,
    pub ceremony_type: String,
    pub status: String,
    pub participants: Vec<String>,
    pub coherence_change: Option<f64>,
    pub outcomes: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedStat {
    pub item_count: usize,
    pub last_update: Option<DateTime<Utc>>,
    pub categories: Vec<String>,
}

/// Open-protocol feeds (RSS, Atom, JSON Feed).
#[async_trait]
pub trait FeedPublisher: Integration {
    async fn add_sacred_event(&self, record: &SacredEventRecord) -> Result<(), IntegrationError>;

    async fn add_coherence_update(&self, change: &CoherenceChange) -> Result<(), IntegrationError>;

    async fn add_ceremony(&self, entry: &CeremonyFeedEntry) -> Result<(), IntegrationError>;

    async fn add_oracle_wisdom(&self, record: &OracleWisdomRecord) -> Result<(), IntegrationError>;

    async fn add_agent_activity(
        &self,
        agent: &AgentInfo,
        action: &str,
        impact: Option<f64>,
    ) -> Result<(), IntegrationError>;

    async fn feed_stats(&self) -> BTreeMap<String, FeedStat>;

    /// Write the OPML subscription list and return its path.
    async fn write_opml(&self) -> Result<PathBuf, IntegrationError>;
}

/// Formatted message for a chat channel.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub metric: Option<f64>,
    pub image_url: Option<String>,
    pub color: Option<u32>,
}

impl Notification {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            ..Default::default()
        }
    }

    pub fn with_metric(mut self, metric: f64) -> Self {
        self.metric = Some(metric);
        self
    }

    pub fn with_image(mut self, url: impl Into<String>) -> Self {
        self.image_url = Some(url.into());
        self
    }

    pub fn with_color(mut self, color: u32) -> Self {
        self.color = Some(color);
        self
    }
}

#[async_trait]
pub trait ChatNotifier: Integration {
    async fn notify(&self, notification: &Notification) -> Result<(), IntegrationError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SizePreset {
    Square,
    Landscape,
    Portrait,
    Thumbnail,
}

impl SizePreset {
    pub fn dimensions(&self) -> (u32, u32) {
        match self {
            SizePreset::Square => (1024, 1024),
            SizePreset::Landscape => (1344, 768),
            SizePreset::Portrait => (768, 1344),
            SizePreset::Thumbnail => (512, 512),
        }
    }

    pub fn aspect_ratio(&self) -> &'static str {
        match self {
            SizePreset::Square | SizePreset::Thumbnail => "1:1",
            SizePreset::Landscape => "16:9",
            SizePreset::Portrait => "9:16",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactRequest {
    /// Short label used to build the local filename.
    pub name: String,
    pub prompt: String,
    pub size: SizePreset,
    /// Metric recorded with the artifact, usually field coherence.
    pub metric: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    pub remote_url: String,
    pub local_path: PathBuf,
    pub prompt: String,
    pub metric_value: f64,
    pub timestamp: DateTime<Utc>,
}

#[async_trait]
pub trait ArtifactGenerator: Integration {
    /// Generate, download and store an artifact. `EmptyResult` when the
    /// service produced nothing; never retried.
    async fn generate(&self, request: &ArtifactRequest) -> Result<Artifact, IntegrationError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    pub name: String,
    pub color: String,
    pub description: Option<String>,
}

#[async_trait]
pub trait SourceControl: Integration {
    async fn annotate_commit(&self, commit: &CommitMade, coherence: f64) -> Result<(), IntegrationError>;

    /// Create the label unless it already exists. Returns `true` when created.
    async fn ensure_label(&self, label: &Label) -> Result<bool, IntegrationError>;
}
