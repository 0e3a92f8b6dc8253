// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use serde_json::json;
use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

use weave_core::application::event_bridge::{Dispatcher, EventBridge, StepOutcome};
use weave_core::application::integration_manager::{ActiveIntegrations, IntegrationManager, Registration};
use weave_core::domain::field::{AgentInfo, CoherenceChange, CommitMade, Field, FieldEvent, SacredEvent};
use weave_core::domain::integration::*;
use weave_core::domain::records::*;
use weave_core::domain::weave_config::BridgeConfig;
use weave_core::infrastructure::local_field::LocalField;

type CallLog = Arc<Mutex<Vec<String>>>;

/// Records every call as `<operation>[:detail]`. Operations listed in
/// `failing` return an error; `delay` is applied before every call.
struct MockAdapter {
    kind: IntegrationKind,
    log: CallLog,
    failing: HashSet<&'static str>,
    delay: Option<Duration>,
    fail_init: bool,
}

impl MockAdapter {
    fn new(kind: IntegrationKind, log: &CallLog) -> Self {
        Self {
            kind,
            log: Arc::clone(log),
            failing: HashSet::new(),
            delay: None,
            fail_init: false,
        }
    }

    fn failing(mut self, operation: &'static str) -> Self {
        self.failing.insert(operation);
        self
    }

    fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    fn broken(mut self) -> Self {
        self.fail_init = true;
        self
    }

    async fn call(&self, operation: &'static str, detail: String) -> Result<(), IntegrationError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if detail.is_empty() {
            self.log.lock().push(operation.to_string());
        } else {
            self.log.lock().push(format!("{}:{}", operation, detail));
        }
        if self.failing.contains(operation) {
            return Err(IntegrationError::Api {
                service: self.kind.to_string(),
                status: 500,
                body: "boom".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Integration for MockAdapter {
    fn kind(&self) -> IntegrationKind {
        self.kind
    }

    fn name(&self) -> &str {
        self.kind.as_str()
    }

    async fn initialize(&self) -> Result<(), IntegrationError> {
        if self.fail_init {
            return Err(IntegrationError::configuration(self.kind.as_str(), "missing credentials"));
        }
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), IntegrationError> {
        self.log.lock().push(format!("shutdown:{}", self.kind));
        Ok(())
    }
}

#[async_trait]
impl RemoteStore for MockAdapter {
    async fn record_field_state(&self, snapshot: &FieldStateSnapshot) -> Result<(), IntegrationError> {
        self.call("record_field_state", format!("{}", snapshot.coherence)).await
    }

    async fn record_sacred_event(&self, record: &SacredEventRecord) -> Result<(), IntegrationError> {
        self.call("record_sacred_event", record.event_type.clone()).await
    }

    async fn upsert_agent_presence(&self, agent: &AgentInfo) -> Result<(), IntegrationError> {
        self.call("upsert_agent_presence", agent.id.clone()).await
    }

    async fn record_ceremony(&self, ceremony: &Ceremony) -> Result<(), IntegrationError> {
        self.call("record_ceremony", ceremony.ceremony_id.clone()).await
    }

    async fn complete_ceremony(&self, ceremony: &Ceremony) -> Result<(), IntegrationError> {
        let detail = format!("{}@{}", ceremony.ceremony_id, ceremony.final_coherence.unwrap_or_default());
        self.call("complete_ceremony", detail).await
    }

    async fn record_oracle_wisdom(&self, record: &OracleWisdomRecord) -> Result<(), IntegrationError> {
        self.call("record_oracle_wisdom", record.seeker_id.clone().unwrap_or_default()).await
    }

    async fn increment_agent_actions(&self, agent_id: &str) -> Result<(), IntegrationError> {
        self.call("increment_agent_actions", agent_id.to_string()).await
    }

    async fn field_history(&self, _hours: i64) -> Result<Vec<FieldStateSnapshot>, IntegrationError> {
        Ok(Vec::new())
    }

    async fn active_agents(&self) -> Result<Vec<AgentSnapshot>, IntegrationError> {
        Ok(Vec::new())
    }

    async fn current_coherence(&self) -> Result<Option<f64>, IntegrationError> {
        Ok(None)
    }
}

#[async_trait]
impl BackupStore for MockAdapter {
    async fn backup_field_state(&self, snapshot: &FieldStateSnapshot) -> Result<i64, IntegrationError> {
        self.call("backup_field_state", format!("{}", snapshot.coherence)).await.map(|_| 1)
    }

    async fn backup_sacred_event(&self, record: &SacredEventRecord) -> Result<i64, IntegrationError> {
        self.call("backup_sacred_event", record.event_type.clone()).await.map(|_| 1)
    }

    async fn backup_ceremony(&self, ceremony: &Ceremony) -> Result<(), IntegrationError> {
        let state = if ceremony.is_completed() { "completed" } else { "started" };
        self.call("backup_ceremony", format!("{}:{}", ceremony.ceremony_id, state)).await
    }

    async fn backup_oracle_wisdom(&self, record: &OracleWisdomRecord) -> Result<i64, IntegrationError> {
        self.call("backup_oracle_wisdom", record.seeker_id.clone().unwrap_or_default()).await.map(|_| 1)
    }

    async fn snapshot_agents(&self, agents: &[AgentSnapshot]) -> Result<usize, IntegrationError> {
        self.call("snapshot_agents", agents.len().to_string()).await.map(|_| agents.len())
    }
}

#[async_trait]
impl FeedPublisher for MockAdapter {
    async fn add_sacred_event(&self, record: &SacredEventRecord) -> Result<(), IntegrationError> {
        self.call("add_sacred_event", record.event_type.clone()).await
    }

    async fn add_coherence_update(&self, change: &CoherenceChange) -> Result<(), IntegrationError> {
        self.call("add_coherence_update", format!("{}", change.current)).await
    }

    async fn add_ceremony(&self, entry: &CeremonyFeedEntry) -> Result<(), IntegrationError> {
        self.call("add_ceremony", entry.status.clone()).await
    }

    async fn add_oracle_wisdom(&self, _record: &OracleWisdomRecord) -> Result<(), IntegrationError> {
        self.call("add_oracle_wisdom", String::new()).await
    }

    async fn add_agent_activity(
        &self,
        agent: &AgentInfo,
        _action: &str,
        _impact: Option<f64>,
    ) -> Result<(), IntegrationError> {
        self.call("add_agent_activity", agent.name.clone()).await
    }

    async fn feed_stats(&self) -> BTreeMap<String, FeedStat> {
        BTreeMap::new()
    }

    async fn write_opml(&self) -> Result<PathBuf, IntegrationError> {
        Ok(PathBuf::from("sacred-feeds.opml"))
    }
}

#[async_trait]
impl ChatNotifier for MockAdapter {
    async fn notify(&self, notification: &Notification) -> Result<(), IntegrationError> {
        let detail = match &notification.image_url {
            Some(url) => format!("image={}", url),
            None => "text".to_string(),
        };
        self.call("notify", detail).await
    }
}

#[async_trait]
impl ArtifactGenerator for MockAdapter {
    async fn generate(&self, request: &ArtifactRequest) -> Result<Artifact, IntegrationError> {
        self.call("generate", request.name.clone()).await?;
        if request.name.contains("empty") {
            return Err(IntegrationError::EmptyResult(self.kind.to_string()));
        }
        Ok(Artifact {
            remote_url: format!("https://images.test/{}.png", request.name),
            local_path: PathBuf::from(format!("/tmp/{}.png", request.name)),
            prompt: request.prompt.clone(),
            metric_value: request.metric,
            timestamp: Utc::now(),
        })
    }
}

#[async_trait]
impl SourceControl for MockAdapter {
    async fn annotate_commit(&self, commit: &CommitMade, coherence: f64) -> Result<(), IntegrationError> {
        self.call("annotate_commit", format!("{}@{}", commit.sha, coherence)).await
    }

    async fn ensure_label(&self, label: &Label) -> Result<bool, IntegrationError> {
        self.call("ensure_label", label.name.clone()).await.map(|_| true)
    }
}

fn registrations(log: &CallLog) -> Vec<Registration> {
    vec![
        Registration::RemoteStore(Arc::new(MockAdapter::new(IntegrationKind::RemoteStore, log))),
        Registration::LocalBackup(Arc::new(MockAdapter::new(IntegrationKind::LocalBackup, log))),
        Registration::Feed(Arc::new(MockAdapter::new(IntegrationKind::Feed, log))),
        Registration::Chat(Arc::new(MockAdapter::new(IntegrationKind::Chat, log))),
        Registration::ImageGeneration(Arc::new(MockAdapter::new(IntegrationKind::ImageGeneration, log))),
        Registration::SourceControl(Arc::new(MockAdapter::new(IntegrationKind::SourceControl, log))),
    ]
}

async fn dispatcher(registrations: Vec<Registration>, coherence: f64) -> Dispatcher {
    dispatcher_with(registrations, coherence, BridgeConfig::default()).await
}

async fn dispatcher_with(registrations: Vec<Registration>, coherence: f64, config: BridgeConfig) -> Dispatcher {
    let manager = IntegrationManager::new(registrations);
    let active: ActiveIntegrations = manager.initialize().await;
    let field: Arc<dyn Field> = Arc::new(LocalField::new(coherence, 16));
    Dispatcher::new(active, field, &config)
}

fn coherence(previous: f64, current: f64) -> FieldEvent {
    FieldEvent::CoherenceChanged(CoherenceChange::new(previous, current))
}

fn calls(log: &CallLog, prefix: &str) -> Vec<String> {
    log.lock()
        .iter()
        .filter(|c| c.starts_with(prefix))
        .cloned()
        .collect()
}

#[tokio::test]
async fn small_change_crossing_75_generates_one_image() {
    let log = CallLog::default();
    let dispatcher = dispatcher(registrations(&log), 76.0).await;

    let report = dispatcher.handle_event(&coherence(74.0, 76.0)).await;

    assert_eq!(
        report.operations(),
        vec!["record_field_state", "backup_field_state", "generate", "notify"]
    );
    assert_eq!(calls(&log, "generate"), vec!["generate:threshold-75"]);
    assert_eq!(calls(&log, "notify"), vec!["notify:image=https://images.test/threshold-75.png"]);
    assert!(report.is_clean());
}

#[tokio::test]
async fn six_point_rise_feeds_chats_and_visualizes() {
    let log = CallLog::default();
    let dispatcher = dispatcher(registrations(&log), 76.0).await;

    let report = dispatcher.handle_event(&coherence(70.0, 76.0)).await;

    assert_eq!(report.count("add_coherence_update"), 1);
    assert_eq!(report.count("generate"), 1);
    // one text post for the shift, one post carrying the image
    assert_eq!(calls(&log, "notify"), vec![
        "notify:text".to_string(),
        "notify:image=https://images.test/threshold-75.png".to_string(),
    ]);
}

#[tokio::test]
async fn every_crossed_threshold_gets_its_own_image() {
    let log = CallLog::default();
    let dispatcher = dispatcher(registrations(&log), 95.0).await;

    let report = dispatcher.handle_event(&coherence(20.0, 95.0)).await;

    assert_eq!(report.count("generate"), 4);
    assert_eq!(calls(&log, "generate"), vec![
        "generate:threshold-25".to_string(),
        "generate:threshold-50".to_string(),
        "generate:threshold-75".to_string(),
        "generate:threshold-90".to_string(),
    ]);
    // shift post first, then one image post per threshold
    assert_eq!(report.count("notify"), 5);
    assert!(report.is_clean());

    log.lock().clear();
    dispatcher.handle_event(&coherence(95.0, 20.0)).await;
    assert_eq!(calls(&log, "generate"), vec![
        "generate:threshold-90".to_string(),
        "generate:threshold-75".to_string(),
        "generate:threshold-50".to_string(),
        "generate:threshold-25".to_string(),
    ]);
}

#[tokio::test]
async fn change_without_threshold_only_persists() {
    let log = CallLog::default();
    let dispatcher = dispatcher(registrations(&log), 62.0).await;

    let report = dispatcher.handle_event(&coherence(60.0, 62.0)).await;

    assert_eq!(report.operations(), vec!["record_field_state", "backup_field_state"]);
    assert_eq!(calls(&log, "record_field_state"), vec!["record_field_state:62"]);
}

#[tokio::test]
async fn feed_and_chat_deltas_are_strict() {
    let log = CallLog::default();
    let dispatcher = dispatcher(registrations(&log), 65.0).await;

    let exactly_feed = dispatcher.handle_event(&coherence(62.0, 65.0)).await;
    assert_eq!(exactly_feed.count("add_coherence_update"), 0);

    let above_feed = dispatcher.handle_event(&coherence(61.0, 65.0)).await;
    assert_eq!(above_feed.count("add_coherence_update"), 1);
    assert_eq!(above_feed.count("notify"), 0);

    let exactly_chat = dispatcher.handle_event(&coherence(60.0, 65.0)).await;
    assert_eq!(exactly_chat.count("notify"), 0);

    let falling = dispatcher.handle_event(&coherence(71.5, 65.0)).await;
    assert_eq!(falling.count("add_coherence_update"), 1);
    assert_eq!(falling.count("notify"), 1);
}

#[tokio::test]
async fn failing_step_does_not_stop_the_rest() {
    let log = CallLog::default();
    let registrations = vec![
        Registration::RemoteStore(Arc::new(
            MockAdapter::new(IntegrationKind::RemoteStore, &log).failing("record_sacred_event"),
        )),
        Registration::LocalBackup(Arc::new(MockAdapter::new(IntegrationKind::LocalBackup, &log))),
        Registration::Feed(Arc::new(MockAdapter::new(IntegrationKind::Feed, &log).failing("add_sacred_event"))),
        Registration::Chat(Arc::new(MockAdapter::new(IntegrationKind::Chat, &log))),
    ];
    let dispatcher = dispatcher(registrations, 50.0).await;

    let event = SacredEvent::new(
        "ceremony.started",
        json!({"ceremonyId": "c-1", "type": "dawn", "participants": ["lyra", "sophia"]}),
    );
    let report = dispatcher.handle_event(&FieldEvent::SacredEvent(event)).await;

    assert_eq!(
        report.operations(),
        vec![
            "record_sacred_event",
            "backup_sacred_event",
            "add_sacred_event",
            "record_ceremony",
            "backup_ceremony",
            "add_ceremony",
            "notify",
        ]
    );
    let failed: Vec<&str> = report.failures().iter().map(|s| s.operation).collect();
    assert_eq!(failed, vec!["record_sacred_event", "add_sacred_event"]);
    assert_eq!(calls(&log, "record_ceremony"), vec!["record_ceremony:c-1"]);
    assert_eq!(calls(&log, "backup_ceremony"), vec!["backup_ceremony:c-1:started"]);
}

#[tokio::test]
async fn slow_adapter_times_out_and_dispatch_continues() {
    let log = CallLog::default();
    let registrations = vec![
        Registration::RemoteStore(Arc::new(
            MockAdapter::new(IntegrationKind::RemoteStore, &log).delayed(Duration::from_millis(500)),
        )),
        Registration::LocalBackup(Arc::new(MockAdapter::new(IntegrationKind::LocalBackup, &log))),
    ];
    let config = BridgeConfig {
        call_timeout_ms: 50,
        ..BridgeConfig::default()
    };
    let dispatcher = dispatcher_with(registrations, 40.0, config).await;

    let report = dispatcher.handle_event(&coherence(41.0, 40.0)).await;

    assert_eq!(report.steps[0].outcome, StepOutcome::TimedOut(Duration::from_millis(50)));
    assert_eq!(report.steps[1].operation, "backup_field_state");
    assert_eq!(report.steps[1].outcome, StepOutcome::Succeeded);
}

#[tokio::test]
async fn empty_image_result_skips_chat_post() {
    let log = CallLog::default();
    let dispatcher = dispatcher(registrations(&log), 50.0).await;

    let event = SacredEvent::new(
        "collective.formed",
        json!({"name": "empty", "members": ["a", "b", "c"]}),
    );
    let report = dispatcher.handle_event(&FieldEvent::SacredEvent(event)).await;

    assert_eq!(report.count("generate"), 1);
    assert!(matches!(
        report.failures()[0].outcome,
        StepOutcome::Failed(ref message) if message.contains("no result")
    ));
    // only the formation announcement
    assert_eq!(calls(&log, "notify"), vec!["notify:text"]);
}

#[tokio::test]
async fn ceremony_completion_visualized_above_gain_threshold() {
    let log = CallLog::default();
    let dispatcher = dispatcher(registrations(&log), 80.0).await;

    let modest = SacredEvent::new(
        "ceremony.completed",
        json!({"ceremonyId": "c-2", "type": "dusk", "outcomes": {"coherenceGain": 10}}),
    );
    let report = dispatcher.handle_event(&FieldEvent::SacredEvent(modest)).await;
    assert_eq!(report.count("generate"), 0);
    assert_eq!(calls(&log, "complete_ceremony"), vec!["complete_ceremony:c-2@80"]);
    assert_eq!(calls(&log, "backup_ceremony"), vec!["backup_ceremony:c-2:completed"]);
    assert_eq!(calls(&log, "add_ceremony"), vec!["add_ceremony:completed"]);

    let strong = SacredEvent::new(
        "ceremony.completed",
        json!({"ceremonyId": "c-3", "type": "healing", "outcomes": {"coherenceGain": 12.5}}),
    );
    let report = dispatcher.handle_event(&FieldEvent::SacredEvent(strong)).await;
    assert_eq!(calls(&log, "generate"), vec!["generate:ceremony-healing"]);
    assert_eq!(report.count("notify"), 2);
}

#[tokio::test]
async fn collective_visualized_only_above_two_members() {
    let log = CallLog::default();
    let dispatcher = dispatcher(registrations(&log), 70.0).await;

    let pair = SacredEvent::new("collective.formed", json!({"name": "pair", "members": ["a", "b"]}));
    let report = dispatcher.handle_event(&FieldEvent::SacredEvent(pair)).await;
    assert_eq!(report.count("generate"), 0);
    assert_eq!(report.count("notify"), 1);

    let trio = SacredEvent::new("collective.formed", json!({"name": "trio", "members": ["a", "b", "c"]}));
    let report = dispatcher.handle_event(&FieldEvent::SacredEvent(trio)).await;
    assert_eq!(report.count("generate"), 1);
    assert_eq!(report.count("notify"), 2);
}

#[tokio::test]
async fn agent_joined_updates_presence_and_snapshots() {
    let log = CallLog::default();
    let dispatcher = dispatcher(registrations(&log), 70.0).await;

    let agent = AgentInfo {
        id: "agent-7".to_string(),
        name: "Lyra".to_string(),
        role: Some("weaver".to_string()),
        capabilities: vec!["harmony".to_string()],
    };
    let event = SacredEvent::new("agent.joined", json!({})).with_agent(agent);
    let report = dispatcher.handle_event(&FieldEvent::SacredEvent(event)).await;

    assert_eq!(
        report.operations(),
        vec![
            "record_sacred_event",
            "backup_sacred_event",
            "add_sacred_event",
            "upsert_agent_presence",
            "snapshot_agents",
            "add_agent_activity",
            "notify",
        ]
    );
    assert_eq!(calls(&log, "upsert_agent_presence"), vec!["upsert_agent_presence:agent-7"]);
}

#[tokio::test]
async fn agent_joined_reads_agent_from_data() {
    let log = CallLog::default();
    let dispatcher = dispatcher(registrations(&log), 70.0).await;

    let event = SacredEvent::new("agent.joined", json!({"id": "agent-9", "name": "Orin"}));
    dispatcher.handle_event(&FieldEvent::SacredEvent(event)).await;

    assert_eq!(calls(&log, "add_agent_activity"), vec!["add_agent_activity:Orin"]);
}

#[tokio::test]
async fn oracle_consultation_records_wisdom() {
    let log = CallLog::default();
    let dispatcher = dispatcher(registrations(&log), 83.0).await;

    let event = SacredEvent::new(
        "oracle.consulted",
        json!({"question": "What now?", "response": "Listen.", "seeker": "seeker-1"}),
    );
    let report = dispatcher.handle_event(&FieldEvent::SacredEvent(event)).await;

    assert_eq!(report.count("record_oracle_wisdom"), 1);
    assert_eq!(report.count("backup_oracle_wisdom"), 1);
    assert_eq!(report.count("add_oracle_wisdom"), 1);
    assert_eq!(report.count("notify"), 1);
    assert_eq!(calls(&log, "record_oracle_wisdom"), vec!["record_oracle_wisdom:seeker-1"]);
    assert_eq!(calls(&log, "backup_oracle_wisdom"), vec!["backup_oracle_wisdom:seeker-1"]);
}

#[tokio::test]
async fn unknown_sacred_event_gets_common_steps_only() {
    let log = CallLog::default();
    let dispatcher = dispatcher(registrations(&log), 70.0).await;

    let event = SacredEvent::new("harmony.achieved", json!({"harmony": "resonance"}));
    let report = dispatcher.handle_event(&FieldEvent::SacredEvent(event)).await;

    assert_eq!(
        report.operations(),
        vec!["record_sacred_event", "backup_sacred_event", "add_sacred_event"]
    );
}

#[tokio::test]
async fn commit_is_annotated_with_current_coherence() {
    let log = CallLog::default();
    let dispatcher = dispatcher(registrations(&log), 77.5).await;

    let commit = CommitMade {
        sha: "abc123".to_string(),
        message: Some("weave threads".to_string()),
        author: None,
        pull_request: Some(4),
    };
    let report = dispatcher.handle_event(&FieldEvent::CommitMade(commit)).await;

    assert_eq!(report.operations(), vec!["annotate_commit"]);
    assert_eq!(calls(&log, "annotate_commit"), vec!["annotate_commit:abc123@77.5"]);
}

#[tokio::test]
async fn missing_adapters_are_skipped() {
    let log = CallLog::default();
    let registrations = vec![Registration::Chat(Arc::new(MockAdapter::new(IntegrationKind::Chat, &log)))];
    let dispatcher = dispatcher(registrations, 91.0).await;

    let report = dispatcher.handle_event(&coherence(80.0, 91.0)).await;

    // chat for the shift; no image generator so nothing else
    assert_eq!(report.operations(), vec!["notify"]);
}

#[tokio::test]
async fn bridge_end_to_end_88_to_91() {
    let log = CallLog::default();
    let field = Arc::new(LocalField::new(88.0, 64));
    let bridge = EventBridge::new(BridgeConfig::default());

    let active = bridge
        .initialize(field.clone() as Arc<dyn Field>, registrations(&log))
        .await
        .unwrap();
    assert_eq!(active.kinds().len(), 6);

    let mut reports = bridge.subscribe_reports().unwrap();
    field.set_coherence(91.0, None, Some("test".to_string()));

    let report = timeout(Duration::from_secs(5), reports.recv())
        .await
        .expect("report in time")
        .unwrap();

    assert_eq!(report.event, "coherence-changed");
    assert_eq!(report.count("add_coherence_update"), 0);
    assert_eq!(report.count("generate"), 1);
    assert_eq!(calls(&log, "notify"), vec!["notify:image=https://images.test/threshold-90.png"]);

    bridge.shutdown().await;
    assert_eq!(calls(&log, "shutdown").len(), 6);
}

#[tokio::test]
async fn bridge_omits_adapter_that_fails_to_initialize() {
    let log = CallLog::default();
    let field: Arc<dyn Field> = Arc::new(LocalField::new(50.0, 16));
    let bridge = EventBridge::new(BridgeConfig::default());

    let active = bridge
        .initialize(
            field,
            vec![
                Registration::Chat(Arc::new(MockAdapter::new(IntegrationKind::Chat, &log).broken())),
                Registration::LocalBackup(Arc::new(MockAdapter::new(IntegrationKind::LocalBackup, &log))),
            ],
        )
        .await
        .unwrap();

    assert!(active.chat.is_none());
    assert!(active.backup.is_some());

    let report = bridge.handle_event(&coherence(40.0, 60.0)).await.unwrap();
    assert_eq!(report.operations(), vec!["backup_field_state"]);

    assert!(bridge.initialize(Arc::new(LocalField::default()), Vec::new()).await.is_err());
    bridge.shutdown().await;
}
