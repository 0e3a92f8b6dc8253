// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use serde_json::json;
use std::collections::BTreeMap;
use tempfile::TempDir;

use weave_core::domain::field::SacredEvent;
use weave_core::domain::integration::{BackupStore, Integration};
use weave_core::domain::records::*;
use weave_core::domain::weave_config::SqliteConfig;
use weave_core::infrastructure::db::Database;
use weave_core::infrastructure::integrations::SqliteIntegration;
use weave_core::infrastructure::repositories::SqliteBackupRepository;

async fn repository() -> SqliteBackupRepository {
    let db = Database::in_memory().await.unwrap();
    let repo = SqliteBackupRepository::new(db.get_pool().clone());
    repo.migrate().await.unwrap();
    repo
}

#[tokio::test]
async fn ceremony_upsert_never_duplicates() {
    let repo = repository().await;

    let started = Ceremony::started("c-1", "dawn", vec!["lyra".into(), "sophia".into()], Some(61.0));
    repo.backup_ceremony(&started).await.unwrap();
    // a repeated start is a no-op for the stored row
    repo.backup_ceremony(&started).await.unwrap();

    let completed = started.clone().complete(Some(74.0), json!({"coherenceGain": 13}));
    repo.backup_ceremony(&completed).await.unwrap();

    let history = repo.ceremony_history(10).await.unwrap();
    assert_eq!(history.len(), 1);

    let stored = repo.find_ceremony("c-1").await.unwrap().unwrap().record;
    assert!(stored.is_completed());
    assert_eq!(stored.initial_coherence, Some(61.0));
    assert_eq!(stored.final_coherence, Some(74.0));
    assert_eq!(stored.outcomes["coherenceGain"], 13);
    assert_eq!(stored.participants, vec!["lyra", "sophia"]);
}

#[tokio::test]
async fn ceremony_update_keeps_completion_when_absent() {
    let repo = repository().await;

    let completed = Ceremony::started("c-2", "dusk", vec![], Some(40.0))
        .complete(Some(55.0), json!({"coherenceGain": 15}));
    repo.backup_ceremony(&completed).await.unwrap();

    // late duplicate of the start event
    let restarted = Ceremony::started("c-2", "dusk", vec![], Some(40.0));
    repo.backup_ceremony(&restarted).await.unwrap();

    let stored = repo.find_ceremony("c-2").await.unwrap().unwrap().record;
    assert!(stored.completed_at.is_some());
    assert_eq!(stored.final_coherence, Some(55.0));
    assert_eq!(stored.outcomes["coherenceGain"], 15);
}

#[tokio::test]
async fn field_state_round_trips_harmonies() {
    let repo = repository().await;

    let harmonies = BTreeMap::from([
        ("resonance".to_string(), 0.82),
        ("sacred-reciprocity".to_string(), 0.64),
    ]);
    let snapshot = FieldStateSnapshot::new(72.5, harmonies.clone())
        .with_active_agents(3)
        .with_ceremonies(vec!["c-1".to_string()])
        .with_geometry("flower-of-life");
    repo.backup_field_state(&snapshot).await.unwrap();

    let stored = repo.field_states(1).await.unwrap();
    let record = &stored[0].record;
    assert_eq!(record.coherence, 72.5);
    assert_eq!(record.harmonies, harmonies);
    assert_eq!(record.active_agents, 3);
    assert_eq!(record.active_ceremonies, vec!["c-1"]);
    assert_eq!(record.sacred_geometry.as_deref(), Some("flower-of-life"));
}

#[tokio::test]
async fn repository_stores_coherence_unclamped() {
    let repo = repository().await;

    // bypass the clamping constructor
    let mut snapshot = FieldStateSnapshot::new(50.0, BTreeMap::new());
    snapshot.coherence = 140.0;
    repo.backup_field_state(&snapshot).await.unwrap();

    let stored = repo.field_states(1).await.unwrap();
    assert_eq!(stored[0].record.coherence, 140.0);
}

#[tokio::test]
async fn empty_auto_backup_still_records_metadata() {
    let repo = repository().await;

    let report = repo.perform_auto_backup(&AutoBackupBatch::empty("manual")).await.unwrap();
    assert!(report.success);
    assert_eq!(report.records_backed_up, 0);

    let history = repo.backup_history(10).await.unwrap();
    assert_eq!(history.len(), 1);
    let metadata = &history[0].record;
    assert_eq!(metadata.backup_type, "auto");
    assert_eq!(metadata.source, "manual");
    assert_eq!(metadata.records_backed_up, 0);
    assert!(metadata.success);
}

#[tokio::test]
async fn auto_backup_copies_states_then_events() {
    let repo = repository().await;

    let batch = AutoBackupBatch {
        field_states: vec![
            FieldStateSnapshot::new(60.0, BTreeMap::new()),
            FieldStateSnapshot::new(61.0, BTreeMap::new()),
        ],
        events: vec![SacredEventRecord::from_event(&SacredEvent::new(
            "harmony.achieved",
            json!({"tags": ["harmony"]}),
        ))],
        source: "timer".to_string(),
    };

    let report = repo.perform_auto_backup(&batch).await.unwrap();
    assert_eq!(report.records_backed_up, 3);

    let stats = repo.backup_stats().await.unwrap();
    assert_eq!(stats.tables["field_state"], 2);
    assert_eq!(stats.tables["sacred_events"], 1);
    assert_eq!(stats.tables["backup_metadata"], 1);
    assert!(stats.oldest.is_some());
    assert!(stats.size_bytes > 0);
}

#[tokio::test]
async fn export_writes_every_table() {
    let dir = TempDir::new().unwrap();
    let repo = repository().await;

    repo.backup_field_state(&FieldStateSnapshot::new(55.0, BTreeMap::new())).await.unwrap();
    repo.backup_oracle_wisdom(&OracleWisdomRecord::new(Some("why?".into()), "because"))
        .await
        .unwrap();
    repo.backup_ceremony(&Ceremony::started("c-9", "healing", vec![], None))
        .await
        .unwrap();

    let path = dir.path().join("exports").join("backup.json");
    let rows = repo.export_backup(&path).await.unwrap();
    assert_eq!(rows, 3);

    let exported: serde_json::Value = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
    assert_eq!(exported["fieldStates"].as_array().unwrap().len(), 1);
    assert_eq!(exported["oracleWisdom"][0]["response"], "because");
    assert_eq!(exported["ceremonies"][0]["ceremonyId"], "c-9");
    assert_eq!(exported["stats"]["tables"]["ceremonies"], 1);
}

#[tokio::test]
async fn integration_creates_database_file() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("nested").join("weave-backup.db");
    let adapter = SqliteIntegration::new(SqliteConfig {
        db_path: Some(db_path.clone()),
        auto_backup: false,
        ..SqliteConfig::default()
    });

    adapter.initialize().await.unwrap();
    assert!(db_path.exists());

    let id = adapter
        .backup_sacred_event(&SacredEventRecord::from_event(&SacredEvent::new(
            "oracle.consulted",
            json!({"response": "listen"}),
        )))
        .await
        .unwrap();
    assert!(id > 0);

    let events = adapter.repository().unwrap().recent_sacred_events(5).await.unwrap();
    assert_eq!(events[0].record.event_type, "oracle.consulted");

    adapter.shutdown().await.unwrap();
}
