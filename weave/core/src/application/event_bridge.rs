// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # Event Bridge
//!
//! Subscribes to a [`Field`] and fans each event out to the active
//! integrations.
//!
//! | Event | Always | Conditional |
//! |-------|--------|-------------|
//! | `coherence-changed` | remote store, local backup | feed when `|Δ| > 3`, chat when `|Δ| > 5`, one image (then chat) per threshold crossed |
//! | `sacred-event` | remote store, local backup, feed | per event type, see below |
//! | `commit-made` | source control annotation | |
//!
//! Sacred events of type `ceremony.started`, `ceremony.completed`,
//! `oracle.consulted`, `agent.joined` and `collective.formed` get further
//! steps after the common ones.
//!
//! Every adapter call goes through `Dispatcher::invoke`, which applies the
//! bridge call timeout and records the outcome in a [`DispatchReport`]. A
//! failing step never stops the steps after it.
//!
//! The listener spawns one task per event, so handlers of consecutive
//! events may interleave. Start order follows arrival order.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::application::integration_manager::{ActiveIntegrations, IntegrationManager, Registration};
use crate::domain::field::{
    AgentInfo, CoherenceChange, CommitMade, Field, FieldEvent, SacredEvent, SacredEventKind,
};
use crate::domain::integration::{
    ArtifactRequest, CeremonyFeedEntry, IntegrationError, IntegrationKind, Notification, SizePreset,
};
use crate::domain::payloads::{AgentJoinedPayload, CeremonyPayload, CollectivePayload, OraclePayload};
use crate::domain::records::{
    AgentSnapshot, Ceremony, FieldStateSnapshot, OracleWisdomRecord, SacredEventRecord,
};
use crate::domain::weave_config::BridgeConfig;

/// Coherence change above which the feed is updated.
pub const FEED_DELTA: f64 = 3.0;
/// Coherence change above which chat is notified.
pub const CHAT_DELTA: f64 = 5.0;
/// Crossing any of these in either direction generates an image.
pub const VISUALIZATION_THRESHOLDS: [f64; 4] = [25.0, 50.0, 75.0, 90.0];
/// `outcomes.coherenceGain` above which a completed ceremony is visualized.
pub const COMPLETION_VISION_GAIN: f64 = 10.0;
/// Member count above which a new collective is visualized.
pub const COLLECTIVE_VISION_MEMBERS: usize = 2;

const COLOR_RISING: u32 = 0x2ECC71;
const COLOR_FALLING: u32 = 0xE74C3C;
const COLOR_CEREMONY: u32 = 0x9B59B6;
const COLOR_ORACLE: u32 = 0x3498DB;
const COLOR_AGENT: u32 = 0x1ABC9C;
const COLOR_COLLECTIVE: u32 = 0xE67E22;

/// Thresholds lying between `previous` and `current`, in the order the
/// field passed them.
pub fn crossed_thresholds(previous: f64, current: f64) -> Vec<f64> {
    let mut crossed: Vec<f64> = VISUALIZATION_THRESHOLDS
        .iter()
        .copied()
        .filter(|t| (previous < *t) != (current < *t))
        .collect();
    if current < previous {
        crossed.reverse();
    }
    crossed
}

fn threshold_prompt(threshold: f64, change: &CoherenceChange) -> String {
    let movement = if change.current >= change.previous {
        "rising through"
    } else {
        "descending through"
    };
    format!(
        "A consciousness field {} {:.0}% coherence, interwoven threads of light forming sacred geometry",
        movement, threshold
    )
}

fn completion_prompt(ceremony_type: &str, gain: f64) -> String {
    format!(
        "Completion of a {} ceremony, field coherence blossoming by {:.0}%, radiant mandala of unity",
        ceremony_type, gain
    )
}

fn collective_prompt(collective: &CollectivePayload) -> String {
    let purpose = collective
        .purpose
        .as_deref()
        .map(|p| format!(" united in {}", p))
        .unwrap_or_default();
    format!(
        "{} luminous beings forming the {} collective{}, woven constellation of consciousness",
        collective.members.len(),
        collective.name,
        purpose
    )
}

// ============================================================================
// Dispatch report
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    Succeeded,
    Failed(String),
    TimedOut(Duration),
}

#[derive(Debug, Clone, PartialEq)]
pub struct DispatchStep {
    pub integration: IntegrationKind,
    pub operation: &'static str,
    pub outcome: StepOutcome,
}

/// Every adapter call made for one event, in call order.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchReport {
    pub event: &'static str,
    pub steps: Vec<DispatchStep>,
}

impl DispatchReport {
    fn new(event: &'static str) -> Self {
        Self {
            event,
            steps: Vec::new(),
        }
    }

    pub fn operations(&self) -> Vec<&'static str> {
        self.steps.iter().map(|s| s.operation).collect()
    }

    pub fn count(&self, operation: &str) -> usize {
        self.steps.iter().filter(|s| s.operation == operation).count()
    }

    pub fn failures(&self) -> Vec<&DispatchStep> {
        self.steps
            .iter()
            .filter(|s| s.outcome != StepOutcome::Succeeded)
            .collect()
    }

    pub fn is_clean(&self) -> bool {
        self.failures().is_empty()
    }
}

// ============================================================================
// Dispatcher
// ============================================================================

/// Routing rules over a fixed set of active integrations.
pub struct Dispatcher {
    active: ActiveIntegrations,
    field: Arc<dyn Field>,
    call_timeout: Duration,
    reports: broadcast::Sender<DispatchReport>,
}

impl Dispatcher {
    pub fn new(active: ActiveIntegrations, field: Arc<dyn Field>, config: &BridgeConfig) -> Self {
        let (reports, _) = broadcast::channel(config.event_buffer.max(1));
        Self {
            active,
            field,
            call_timeout: Duration::from_millis(config.call_timeout_ms),
            reports,
        }
    }

    pub fn subscribe_reports(&self) -> broadcast::Receiver<DispatchReport> {
        self.reports.subscribe()
    }

    /// Run one adapter call under the bridge timeout and record the outcome.
    async fn invoke<T, F>(
        &self,
        report: &mut DispatchReport,
        integration: IntegrationKind,
        operation: &'static str,
        call: F,
    ) -> Option<T>
    where
        F: Future<Output = Result<T, IntegrationError>>,
    {
        let (outcome, value) = match tokio::time::timeout(self.call_timeout, call).await {
            Ok(Ok(value)) => (StepOutcome::Succeeded, Some(value)),
            Ok(Err(e)) => {
                warn!(
                    integration = %integration,
                    operation,
                    event = report.event,
                    error = %e,
                    "Integration call failed"
                );
                (StepOutcome::Failed(e.to_string()), None)
            }
            Err(_) => {
                warn!(
                    integration = %integration,
                    operation,
                    event = report.event,
                    timeout_ms = self.call_timeout.as_millis() as u64,
                    "Integration call timed out"
                );
                (StepOutcome::TimedOut(self.call_timeout), None)
            }
        };

        report.steps.push(DispatchStep {
            integration,
            operation,
            outcome,
        });
        value
    }

    async fn notify(&self, report: &mut DispatchReport, notification: Notification) {
        if let Some(chat) = &self.active.chat {
            self.invoke(report, IntegrationKind::Chat, "notify", chat.notify(&notification))
                .await;
        }
    }

    /// Generate an image and, when it succeeds, post it to chat.
    async fn visualize(&self, report: &mut DispatchReport, request: ArtifactRequest, title: String) {
        let Some(image) = &self.active.image else {
            return;
        };
        let artifact = self
            .invoke(report, IntegrationKind::ImageGeneration, "generate", image.generate(&request))
            .await;

        if let Some(artifact) = artifact {
            info!(
                name = %request.name,
                path = %artifact.local_path.display(),
                "Vision generated"
            );
            let notification = Notification::new(title, artifact.prompt.clone())
                .with_metric(artifact.metric_value)
                .with_image(artifact.remote_url.clone());
            self.notify(report, notification).await;
        }
    }

    pub async fn handle_event(&self, event: &FieldEvent) -> DispatchReport {
        let mut report = DispatchReport::new(event.name());
        match event {
            FieldEvent::CoherenceChanged(change) => self.handle_coherence_change(&mut report, change).await,
            FieldEvent::SacredEvent(sacred) => self.handle_sacred_event(&mut report, sacred).await,
            FieldEvent::CommitMade(commit) => self.handle_commit(&mut report, commit).await,
        }

        debug!(
            event = report.event,
            steps = report.steps.len(),
            failures = report.failures().len(),
            "Event dispatched"
        );
        let _ = self.reports.send(report.clone());
        report
    }

    async fn handle_coherence_change(&self, report: &mut DispatchReport, change: &CoherenceChange) {
        let snapshot =
            FieldStateSnapshot::capture(self.field.as_ref(), change.current, change.harmonies.clone());

        if let Some(remote) = &self.active.remote_store {
            self.invoke(report, IntegrationKind::RemoteStore, "record_field_state", remote.record_field_state(&snapshot))
                .await;
        }
        if let Some(backup) = &self.active.backup {
            self.invoke(report, IntegrationKind::LocalBackup, "backup_field_state", backup.backup_field_state(&snapshot))
                .await;
        }

        let magnitude = change.magnitude();
        if magnitude > FEED_DELTA {
            if let Some(feed) = &self.active.feed {
                self.invoke(report, IntegrationKind::Feed, "add_coherence_update", feed.add_coherence_update(change))
                    .await;
            }
        }

        if magnitude > CHAT_DELTA {
            let (arrow, color) = if change.delta() > 0.0 {
                ("📈", COLOR_RISING)
            } else {
                ("📉", COLOR_FALLING)
            };
            let body = format!(
                "Coherence moved from {:.1}% to {:.1}% ({:+.1}%)",
                change.previous,
                change.current,
                change.delta()
            );
            let notification = Notification::new(format!("{} Field Coherence Shift", arrow), body)
                .with_metric(change.current)
                .with_color(color);
            self.notify(report, notification).await;
        }

        for threshold in crossed_thresholds(change.previous, change.current) {
            let request = ArtifactRequest {
                name: format!("threshold-{:.0}", threshold),
                prompt: threshold_prompt(threshold, change),
                size: SizePreset::Landscape,
                metric: change.current,
            };
            self.visualize(report, request, format!("✨ Coherence Threshold {:.0}% Crossed", threshold))
                .await;
        }
    }

    /// Common persistence and feed steps, then the handling for the
    /// specific event type:
    ///
    /// - `ceremony.started`: remote and local ceremony rows, feed entry, chat
    /// - `ceremony.completed`: remote and local ceremony updates, feed entry,
    ///   chat, image when the coherence gain exceeds [`COMPLETION_VISION_GAIN`]
    /// - `oracle.consulted`: remote and local wisdom rows, feed entry, chat
    /// - `agent.joined`: presence upsert, agent snapshot, feed activity, chat
    /// - `collective.formed`: chat, image when the collective has more than
    ///   [`COLLECTIVE_VISION_MEMBERS`] members
    async fn handle_sacred_event(&self, report: &mut DispatchReport, event: &SacredEvent) {
        let record = SacredEventRecord::from_event(event);

        if let Some(remote) = &self.active.remote_store {
            self.invoke(report, IntegrationKind::RemoteStore, "record_sacred_event", remote.record_sacred_event(&record))
                .await;
        }
        if let Some(backup) = &self.active.backup {
            self.invoke(report, IntegrationKind::LocalBackup, "backup_sacred_event", backup.backup_sacred_event(&record))
                .await;
        }
        if let Some(feed) = &self.active.feed {
            self.invoke(report, IntegrationKind::Feed, "add_sacred_event", feed.add_sacred_event(&record))
                .await;
        }

        let kind = event.kind();
        match kind {
            SacredEventKind::CeremonyStarted => {
                if let Some(payload) = self.payload::<CeremonyPayload>(event) {
                    self.ceremony_started(report, payload).await;
                }
            }
            SacredEventKind::CeremonyCompleted => {
                if let Some(payload) = self.payload::<CeremonyPayload>(event) {
                    self.ceremony_completed(report, payload).await;
                }
            }
            SacredEventKind::OracleConsulted => {
                if let Some(payload) = self.payload::<OraclePayload>(event) {
                    self.oracle_consulted(report, event, payload).await;
                }
            }
            SacredEventKind::AgentJoined => {
                let agent = event
                    .agent
                    .clone()
                    .or_else(|| self.payload::<AgentJoinedPayload>(event).map(|p| p.agent));
                if let Some(agent) = agent {
                    self.agent_joined(report, agent).await;
                }
            }
            SacredEventKind::CollectiveFormed => {
                if let Some(payload) = self.payload::<CollectivePayload>(event) {
                    self.collective_formed(report, payload).await;
                }
            }
            SacredEventKind::Other(event_type) => {
                debug!(event_type = %event_type, "No dedicated handling for sacred event");
            }
        }
    }

    fn payload<T: serde::de::DeserializeOwned>(&self, event: &SacredEvent) -> Option<T> {
        match serde_json::from_value(event.data.clone()) {
            Ok(payload) => Some(payload),
            Err(e) => {
                warn!(event_type = %event.event_type, error = %e, "Malformed sacred event payload");
                None
            }
        }
    }

    async fn ceremony_started(&self, report: &mut DispatchReport, payload: CeremonyPayload) {
        let initial = payload.coherence.unwrap_or_else(|| self.field.coherence());
        let ceremony = Ceremony::started(
            payload.ceremony_id.clone(),
            payload.ceremony_type.clone(),
            payload.participants.clone(),
            Some(initial),
        );

        if let Some(remote) = &self.active.remote_store {
            self.invoke(report, IntegrationKind::RemoteStore, "record_ceremony", remote.record_ceremony(&ceremony))
                .await;
        }
        if let Some(backup) = &self.active.backup {
            self.invoke(report, IntegrationKind::LocalBackup, "backup_ceremony", backup.backup_ceremony(&ceremony))
                .await;
        }
        if let Some(feed) = &self.active.feed {
            let entry = CeremonyFeedEntry {
                ceremony_id: payload.ceremony_id.clone(),
                ceremony_type: payload.ceremony_type.clone(),
                status: "started".to_string(),
                participants: payload.participants.clone(),
                coherence_change: None,
                outcomes: serde_json::Value::Null,
            };
            self.invoke(report, IntegrationKind::Feed, "add_ceremony", feed.add_ceremony(&entry))
                .await;
        }

        let body = if payload.participants.is_empty() {
            "Sacred space opens.".to_string()
        } else {
            format!("Sacred space opens with {}.", payload.participants.join(", "))
        };
        let notification = Notification::new(format!("🎭 {} Ceremony Beginning", payload.ceremony_type), body)
            .with_metric(initial)
            .with_color(COLOR_CEREMONY);
        self.notify(report, notification).await;
    }

    async fn ceremony_completed(&self, report: &mut DispatchReport, payload: CeremonyPayload) {
        let final_coherence = payload.coherence.unwrap_or_else(|| self.field.coherence());
        let gain = payload.coherence_gain();
        let ceremony = Ceremony::started(
            payload.ceremony_id.clone(),
            payload.ceremony_type.clone(),
            payload.participants.clone(),
            None,
        )
        .complete(Some(final_coherence), payload.outcomes.clone());

        if let Some(remote) = &self.active.remote_store {
            self.invoke(report, IntegrationKind::RemoteStore, "complete_ceremony", remote.complete_ceremony(&ceremony))
                .await;
        }
        if let Some(backup) = &self.active.backup {
            self.invoke(report, IntegrationKind::LocalBackup, "backup_ceremony", backup.backup_ceremony(&ceremony))
                .await;
        }
        if let Some(feed) = &self.active.feed {
            let entry = CeremonyFeedEntry {
                ceremony_id: payload.ceremony_id.clone(),
                ceremony_type: payload.ceremony_type.clone(),
                status: "completed".to_string(),
                participants: payload.participants.clone(),
                coherence_change: gain,
                outcomes: payload.outcomes.clone(),
            };
            self.invoke(report, IntegrationKind::Feed, "add_ceremony", feed.add_ceremony(&entry))
                .await;
        }

        let body = match gain {
            Some(gain) => format!("The ceremony completes. Coherence gain: {:+.1}%", gain),
            None => "The ceremony completes, its blessings integrated into the field.".to_string(),
        };
        let notification = Notification::new(format!("✨ {} Ceremony Complete", payload.ceremony_type), body)
            .with_metric(final_coherence)
            .with_color(COLOR_CEREMONY);
        self.notify(report, notification).await;

        if let Some(gain) = gain.filter(|g| *g > COMPLETION_VISION_GAIN) {
            let request = ArtifactRequest {
                name: format!("ceremony-{}", payload.ceremony_type),
                prompt: completion_prompt(&payload.ceremony_type, gain),
                size: SizePreset::Square,
                metric: final_coherence,
            };
            self.visualize(report, request, format!("🌟 {} Ceremony Vision", payload.ceremony_type))
                .await;
        }
    }

    async fn oracle_consulted(&self, report: &mut DispatchReport, event: &SacredEvent, payload: OraclePayload) {
        let coherence = self.field.coherence();
        let mut record = OracleWisdomRecord::new(payload.question.clone(), payload.response.clone());
        record.coherence_at_time = Some(coherence);
        record.seeker_id = payload
            .seeker_id
            .clone()
            .or_else(|| event.agent.as_ref().map(|a| a.id.clone()));
        if let Some(wisdom_type) = payload.wisdom_type.clone() {
            record.wisdom_type = wisdom_type;
        }
        record.resonance_score = payload.resonance;
        record.tags = payload.tags.clone();

        if let Some(remote) = &self.active.remote_store {
            self.invoke(report, IntegrationKind::RemoteStore, "record_oracle_wisdom", remote.record_oracle_wisdom(&record))
                .await;
        }
        if let Some(backup) = &self.active.backup {
            self.invoke(report, IntegrationKind::LocalBackup, "backup_oracle_wisdom", backup.backup_oracle_wisdom(&record))
                .await;
        }
        if let Some(feed) = &self.active.feed {
            self.invoke(report, IntegrationKind::Feed, "add_oracle_wisdom", feed.add_oracle_wisdom(&record))
                .await;
        }

        let body = match &payload.question {
            Some(question) => format!("**{}**\n\n{}", question, payload.response),
            None => payload.response.clone(),
        };
        let notification = Notification::new("🔮 The Oracle Speaks", body)
            .with_metric(coherence)
            .with_color(COLOR_ORACLE);
        self.notify(report, notification).await;
    }

    async fn agent_joined(&self, report: &mut DispatchReport, agent: AgentInfo) {
        if let Some(remote) = &self.active.remote_store {
            self.invoke(report, IntegrationKind::RemoteStore, "upsert_agent_presence", remote.upsert_agent_presence(&agent))
                .await;
        }
        if let Some(backup) = &self.active.backup {
            let snapshot = AgentSnapshot::from(&agent);
            self.invoke(
                report,
                IntegrationKind::LocalBackup,
                "snapshot_agents",
                backup.snapshot_agents(std::slice::from_ref(&snapshot)),
            )
            .await;
        }
        if let Some(feed) = &self.active.feed {
            self.invoke(
                report,
                IntegrationKind::Feed,
                "add_agent_activity",
                feed.add_agent_activity(&agent, "joined The Weave", None),
            )
            .await;
        }

        let role = agent.role.as_deref().unwrap_or("agent");
        let notification = Notification::new(
            format!("🤖 {} Joined The Weave", agent.name),
            format!("A new {} adds their resonance to the field.", role),
        )
        .with_color(COLOR_AGENT);
        self.notify(report, notification).await;
    }

    async fn collective_formed(&self, report: &mut DispatchReport, collective: CollectivePayload) {
        let mut body = format!("{} members: {}", collective.members.len(), collective.members.join(", "));
        if let Some(purpose) = &collective.purpose {
            body.push_str(&format!("\nPurpose: {}", purpose));
        }
        let notification = Notification::new(format!("🌐 {} Collective Formed", collective.name), body)
            .with_color(COLOR_COLLECTIVE);
        self.notify(report, notification).await;

        if collective.members.len() > COLLECTIVE_VISION_MEMBERS {
            let request = ArtifactRequest {
                name: format!("collective-{}", collective.name),
                prompt: collective_prompt(&collective),
                size: SizePreset::Square,
                metric: self.field.coherence(),
            };
            self.visualize(report, request, format!("🌐 {} Collective Vision", collective.name))
                .await;
        }
    }

    async fn handle_commit(&self, report: &mut DispatchReport, commit: &CommitMade) {
        let Some(source_control) = &self.active.source_control else {
            return;
        };
        let coherence = self.field.coherence();
        self.invoke(
            report,
            IntegrationKind::SourceControl,
            "annotate_commit",
            source_control.annotate_commit(commit, coherence),
        )
        .await;
    }
}

// ============================================================================
// Bridge
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("Event bridge is already initialized")]
    AlreadyInitialized,

    #[error("Event bridge is not initialized")]
    NotInitialized,
}

pub struct EventBridge {
    config: BridgeConfig,
    manager: OnceLock<IntegrationManager>,
    dispatcher: OnceLock<Arc<Dispatcher>>,
    shutdown_token: CancellationToken,
    tasks: TaskTracker,
    listener: Mutex<Option<JoinHandle<()>>>,
    dropped: Arc<AtomicU64>,
}

impl EventBridge {
    pub fn new(config: BridgeConfig) -> Self {
        Self {
            config,
            manager: OnceLock::new(),
            dispatcher: OnceLock::new(),
            shutdown_token: CancellationToken::new(),
            tasks: TaskTracker::new(),
            listener: Mutex::new(None),
            dropped: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Bring up the integrations, hand them the field and start listening.
    pub async fn initialize(
        &self,
        field: Arc<dyn Field>,
        registrations: Vec<Registration>,
    ) -> Result<ActiveIntegrations, BridgeError> {
        if self.manager.set(IntegrationManager::new(registrations)).is_err() {
            return Err(BridgeError::AlreadyInitialized);
        }
        let manager = self.manager.get().ok_or(BridgeError::NotInitialized)?;
        let active = manager.initialize().await;

        for integration in active.all() {
            if let Err(e) = integration.connect_to_field(Arc::clone(&field)).await {
                warn!(integration = integration.name(), error = %e, "Failed to connect integration to field");
            }
        }

        // Subscribe before the listener starts so nothing emitted after
        // `initialize` returns is missed.
        let receiver = field.subscribe();
        let dispatcher = Arc::new(Dispatcher::new(active.clone(), field, &self.config));
        let _ = self.dispatcher.set(Arc::clone(&dispatcher));

        let handle = self.spawn_listener(dispatcher, receiver);
        *self.listener.lock() = Some(handle);

        info!(integrations = ?active.kinds(), "Event bridge listening");
        Ok(active)
    }

    fn spawn_listener(
        &self,
        dispatcher: Arc<Dispatcher>,
        mut receiver: broadcast::Receiver<FieldEvent>,
    ) -> JoinHandle<()> {
        let shutdown_token = self.shutdown_token.clone();
        let tasks = self.tasks.clone();
        let dropped = Arc::clone(&self.dropped);

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    received = receiver.recv() => match received {
                        Ok(event) => {
                            let dispatcher = Arc::clone(&dispatcher);
                            tasks.spawn(async move {
                                dispatcher.handle_event(&event).await;
                            });
                        }
                        Err(RecvError::Lagged(skipped)) => {
                            dropped.fetch_add(skipped, Ordering::Relaxed);
                            warn!(skipped, "Event bridge lagged behind the field, events dropped");
                        }
                        Err(RecvError::Closed) => {
                            info!("Field closed its event stream");
                            break;
                        }
                    },
                    _ = shutdown_token.cancelled() => {
                        debug!("Event bridge listener stopping");
                        break;
                    }
                }
            }
        })
    }

    pub fn active(&self) -> ActiveIntegrations {
        self.manager.get().map(IntegrationManager::active).unwrap_or_default()
    }

    /// Reports for every event the listener dispatches from now on.
    pub fn subscribe_reports(&self) -> Result<broadcast::Receiver<DispatchReport>, BridgeError> {
        self.dispatcher
            .get()
            .map(|d| d.subscribe_reports())
            .ok_or(BridgeError::NotInitialized)
    }

    /// Field events the listener lost to lag. These never produce a report.
    pub fn dropped_events(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Dispatch one event directly, bypassing the field subscription.
    pub async fn handle_event(&self, event: &FieldEvent) -> Result<DispatchReport, BridgeError> {
        let dispatcher = self.dispatcher.get().ok_or(BridgeError::NotInitialized)?;
        Ok(dispatcher.handle_event(event).await)
    }

    /// Wait for every in-flight event handler to finish.
    pub async fn drain(&self) {
        self.tasks.close();
        self.tasks.wait().await;
        self.tasks.reopen();
    }

    /// Stop listening, let in-flight handlers finish, then shut down every
    /// integration.
    pub async fn shutdown(&self) {
        self.shutdown_token.cancel();
        let listener = self.listener.lock().take();
        if let Some(handle) = listener {
            if let Err(e) = handle.await {
                warn!("Event bridge listener ended abnormally: {}", e);
            }
        }

        self.tasks.close();
        self.tasks.wait().await;

        if let Some(manager) = self.manager.get() {
            manager.shutdown().await;
        }
        info!("Event bridge shut down");
    }
}
