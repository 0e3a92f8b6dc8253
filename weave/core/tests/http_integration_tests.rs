// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use mockito::{Matcher, Server};
use serde_json::json;
use std::collections::BTreeMap;
use tempfile::TempDir;

use weave_core::domain::field::{AgentInfo, CommitMade, SacredEvent};
use weave_core::domain::integration::*;
use weave_core::domain::records::{Ceremony, FieldStateSnapshot, OracleWisdomRecord, SacredEventRecord};
use weave_core::domain::weave_config::{DiscordConfig, GitHubConfig, ReplicateConfig, SupabaseConfig};
use weave_core::infrastructure::integrations::{
    DiscordIntegration, GitHubIntegration, ReplicateIntegration, SupabaseIntegration,
};

// ============================================================================
// Supabase
// ============================================================================

async fn supabase(server: &Server) -> SupabaseIntegration {
    let adapter = SupabaseIntegration::new(SupabaseConfig {
        enabled: true,
        url: Some(server.url()),
        service_key: Some("service-key".to_string()),
        ..SupabaseConfig::default()
    });
    adapter.initialize().await.unwrap();
    adapter
}

#[tokio::test]
async fn supabase_inserts_field_state_into_prefixed_table() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/rest/v1/weave_field_state")
        .match_header("apikey", "service-key")
        .match_header("authorization", "Bearer service-key")
        .match_header("prefer", "return=minimal")
        .match_body(Matcher::PartialJson(json!({"coherence": 72.5, "active_agents": 2})))
        .with_status(201)
        .create_async()
        .await;

    let adapter = supabase(&server).await;
    let snapshot = FieldStateSnapshot::new(72.5, BTreeMap::new()).with_active_agents(2);
    adapter.record_field_state(&snapshot).await.unwrap();

    mock.assert_async().await;
}

#[tokio::test]
async fn supabase_upserts_agent_presence() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/rest/v1/weave_agent_presence")
        .match_query(Matcher::UrlEncoded("on_conflict".into(), "agent_id".into()))
        .match_header("prefer", "resolution=merge-duplicates,return=minimal")
        .match_body(Matcher::PartialJson(json!({"agent_id": "agent-7", "name": "Lyra"})))
        .with_status(201)
        .create_async()
        .await;

    let adapter = supabase(&server).await;
    let agent = AgentInfo {
        id: "agent-7".to_string(),
        name: "Lyra".to_string(),
        role: None,
        capabilities: vec![],
    };
    adapter.upsert_agent_presence(&agent).await.unwrap();

    mock.assert_async().await;
}

#[tokio::test]
async fn supabase_surfaces_http_errors() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/rest/v1/weave_field_state")
        .with_status(401)
        .with_body(r#"{"message":"Invalid API key"}"#)
        .create_async()
        .await;

    let adapter = supabase(&server).await;
    let err = adapter
        .record_field_state(&FieldStateSnapshot::new(10.0, BTreeMap::new()))
        .await
        .unwrap_err();

    match err {
        IntegrationError::Api { status, body, .. } => {
            assert_eq!(status, 401);
            assert!(body.contains("Invalid API key"));
        }
        other => panic!("unexpected error {:?}", other),
    }
}

#[tokio::test]
async fn supabase_records_and_completes_ceremony() {
    let mut server = Server::new_async().await;
    let insert = server
        .mock("POST", "/rest/v1/weave_ceremonies")
        .match_header("prefer", "return=minimal")
        .match_body(Matcher::PartialJson(json!({
            "ceremony_id": "c-1",
            "type": "dawn",
            "participants": ["lyra", "orin"],
            "initial_coherence": 61.0
        })))
        .with_status(201)
        .create_async()
        .await;
    let complete = server
        .mock("PATCH", "/rest/v1/weave_ceremonies")
        .match_query(Matcher::UrlEncoded("ceremony_id".into(), "eq.c-1".into()))
        .match_body(Matcher::PartialJson(json!({
            "final_coherence": 74.0,
            "outcomes": {"coherenceGain": 13}
        })))
        .with_status(204)
        .create_async()
        .await;

    let adapter = supabase(&server).await;
    let ceremony = Ceremony::started("c-1", "dawn", vec!["lyra".into(), "orin".into()], Some(61.0));
    adapter.record_ceremony(&ceremony).await.unwrap();
    adapter
        .complete_ceremony(&ceremony.complete(Some(74.0), json!({"coherenceGain": 13})))
        .await
        .unwrap();

    insert.assert_async().await;
    complete.assert_async().await;
}

#[tokio::test]
async fn supabase_records_oracle_wisdom() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/rest/v1/weave_oracle_wisdom")
        .match_body(Matcher::PartialJson(json!({
            "question": "What now?",
            "response": "Listen.",
            "coherence_at_time": 83.0,
            "seeker_id": "seeker-1"
        })))
        .with_status(201)
        .create_async()
        .await;

    let adapter = supabase(&server).await;
    let mut record = OracleWisdomRecord::new(Some("What now?".to_string()), "Listen.");
    record.coherence_at_time = Some(83.0);
    record.seeker_id = Some("seeker-1".to_string());
    adapter.record_oracle_wisdom(&record).await.unwrap();

    mock.assert_async().await;
}

#[tokio::test]
async fn supabase_counts_agent_actions_through_rpc() {
    let mut server = Server::new_async().await;
    let event = server
        .mock("POST", "/rest/v1/weave_sacred_events")
        .with_status(201)
        .create_async()
        .await;
    let increment = server
        .mock("POST", "/rest/v1/rpc/increment")
        .match_body(Matcher::Json(json!({
            "table_name": "weave_agent_presence",
            "column_name": "sacred_actions",
            "row_id": "agent-7"
        })))
        .with_status(200)
        .expect(2)
        .create_async()
        .await;

    let adapter = supabase(&server).await;
    adapter.increment_agent_actions("agent-7").await.unwrap();

    let agent = AgentInfo {
        id: "agent-7".to_string(),
        name: "Lyra".to_string(),
        role: None,
        capabilities: vec![],
    };
    let record = SacredEventRecord::from_event(&SacredEvent::new("harmony.achieved", json!({})).with_agent(agent));
    adapter.record_sacred_event(&record).await.unwrap();

    event.assert_async().await;
    increment.assert_async().await;
}

#[tokio::test]
async fn supabase_failed_action_count_does_not_fail_event() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/rest/v1/weave_sacred_events")
        .with_status(201)
        .create_async()
        .await;
    server
        .mock("POST", "/rest/v1/rpc/increment")
        .with_status(404)
        .create_async()
        .await;

    let adapter = supabase(&server).await;
    let event = SacredEvent::new("agent.left", json!({})).with_agent(AgentInfo {
        id: "agent-9".to_string(),
        name: "Orin".to_string(),
        role: None,
        capabilities: vec![],
    });
    adapter
        .record_sacred_event(&SacredEventRecord::from_event(&event))
        .await
        .unwrap();
}

#[tokio::test]
async fn supabase_reads_field_history_oldest_first() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/rest/v1/weave_field_state")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("select".into(), "*".into()),
            Matcher::UrlEncoded("order".into(), "timestamp.asc".into()),
            Matcher::Regex(r"timestamp=gte\.".to_string()),
        ]))
        .with_status(200)
        .with_body(
            json!([
                {"id": 1, "timestamp": "2026-10-14T08:00:00Z", "coherence": 61.5, "harmonies": {"water": 0.4}},
                {"id": 2, "timestamp": "2026-10-14T09:00:00Z", "coherence": 64.0, "active_agents": 3,
                 "active_ceremonies": ["c-1"], "metadata": null}
            ])
            .to_string(),
        )
        .create_async()
        .await;

    let adapter = supabase(&server).await;
    let history = adapter.field_history(24).await.unwrap();

    mock.assert_async().await;
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].coherence, 61.5);
    assert_eq!(history[0].harmonies.get("water"), Some(&0.4));
    assert_eq!(history[1].active_agents, 3);
    assert_eq!(history[1].active_ceremonies, vec!["c-1"]);
    assert!(history[0].captured_at < history[1].captured_at);
}

#[tokio::test]
async fn supabase_lists_recently_seen_agents() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/rest/v1/weave_agent_presence")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("order".into(), "coherence_contribution.desc".into()),
            Matcher::Regex(r"last_seen=gte\.".to_string()),
        ]))
        .with_status(200)
        .with_body(
            json!([
                {"agent_id": "a-1", "name": "Sophia", "capabilities": ["wisdom"],
                 "coherence_contribution": 4.5, "sacred_actions": 12, "last_seen": "2026-10-15T10:00:00Z"},
                {"agent_id": "a-2", "last_seen": "2026-10-15T10:01:00Z"}
            ])
            .to_string(),
        )
        .create_async()
        .await;

    let adapter = supabase(&server).await;
    let agents = adapter.active_agents().await.unwrap();

    mock.assert_async().await;
    assert_eq!(agents.len(), 2);
    assert_eq!(agents[0].name, "Sophia");
    assert_eq!(agents[0].sacred_actions, 12);
    assert_eq!(agents[1].name, "a-2");
}

#[tokio::test]
async fn supabase_current_coherence_is_latest_state() {
    let mut server = Server::new_async().await;
    let latest = server
        .mock("GET", "/rest/v1/weave_field_state")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("select".into(), "coherence".into()),
            Matcher::UrlEncoded("order".into(), "timestamp.desc".into()),
            Matcher::UrlEncoded("limit".into(), "1".into()),
        ]))
        .with_status(200)
        .with_body(r#"[{"coherence": 77.7}]"#)
        .create_async()
        .await;

    let adapter = supabase(&server).await;
    assert_eq!(adapter.current_coherence().await.unwrap(), Some(77.7));
    latest.assert_async().await;

    let mut empty = Server::new_async().await;
    empty
        .mock("GET", "/rest/v1/weave_field_state")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body("[]")
        .create_async()
        .await;
    let adapter = supabase(&empty).await;
    assert_eq!(adapter.current_coherence().await.unwrap(), None);
}

// ============================================================================
// Discord
// ============================================================================

#[tokio::test]
async fn discord_posts_embed_to_webhook() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/api/webhooks/1/token")
        .match_body(Matcher::PartialJson(json!({"username": "The Weave"})))
        .with_status(204)
        .create_async()
        .await;

    let adapter = DiscordIntegration::new(DiscordConfig {
        enabled: true,
        webhook_url: Some(format!("{}/api/webhooks/1/token", server.url())),
        ..DiscordConfig::default()
    });
    adapter.initialize().await.unwrap();

    let notification = Notification::new("Threshold crossed", "The field passed 75%").with_metric(76.0);
    adapter.notify(&notification).await.unwrap();

    mock.assert_async().await;
}

#[tokio::test]
async fn discord_reports_rejected_post() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/hook")
        .with_status(500)
        .create_async()
        .await;

    let adapter = DiscordIntegration::new(DiscordConfig {
        enabled: true,
        webhook_url: Some(format!("{}/hook", server.url())),
        ..DiscordConfig::default()
    });
    adapter.initialize().await.unwrap();

    let err = adapter.notify(&Notification::new("t", "b")).await.unwrap_err();
    assert!(matches!(err, IntegrationError::Api { status: 500, .. }));
}

// ============================================================================
// Replicate
// ============================================================================

fn replicate(server: &Server, visions: &TempDir) -> ReplicateIntegration {
    ReplicateIntegration::new(ReplicateConfig {
        enabled: true,
        api_token: Some("r8_test".to_string()),
        api_url: server.url(),
        model: "owner/model".to_string(),
        style_suffix: "luminous".to_string(),
        visions_dir: Some(visions.path().to_path_buf()),
        poll_interval_ms: 10,
        max_polls: 3,
    })
}

fn request() -> ArtifactRequest {
    ArtifactRequest {
        name: "threshold-90".to_string(),
        prompt: "unity".to_string(),
        size: SizePreset::Landscape,
        metric: 91.2,
    }
}

#[tokio::test]
async fn replicate_downloads_first_output() {
    let mut server = Server::new_async().await;
    let visions = TempDir::new().unwrap();

    let create = server
        .mock("POST", "/models/owner/model/predictions")
        .match_header("authorization", "Bearer r8_test")
        .match_header("prefer", "wait")
        .match_body(Matcher::PartialJson(json!({
            "input": {"prompt": "unity, luminous", "width": 1344, "height": 768, "num_outputs": 1}
        })))
        .with_status(201)
        .with_body(
            json!({
                "id": "p-1",
                "status": "succeeded",
                "output": [format!("{}/files/vision.png", server.url())]
            })
            .to_string(),
        )
        .create_async()
        .await;
    server
        .mock("GET", "/files/vision.png")
        .with_status(200)
        .with_body(b"PNGDATA".as_slice())
        .create_async()
        .await;

    let adapter = replicate(&server, &visions);
    adapter.initialize().await.unwrap();
    let artifact = adapter.generate(&request()).await.unwrap();

    create.assert_async().await;
    assert_eq!(artifact.remote_url, format!("{}/files/vision.png", server.url()));
    assert_eq!(artifact.prompt, "unity, luminous");
    assert_eq!(artifact.metric_value, 91.2);
    assert!(artifact.local_path.starts_with(visions.path()));

    let filename = artifact.local_path.file_name().unwrap().to_string_lossy().to_string();
    assert!(filename.starts_with("threshold-90-91pct-"));
    assert!(filename.ends_with(".png"));
    assert_eq!(std::fs::read(&artifact.local_path).unwrap(), b"PNGDATA");
}

#[tokio::test]
async fn replicate_polls_until_terminal() {
    let mut server = Server::new_async().await;
    let visions = TempDir::new().unwrap();

    server
        .mock("POST", "/models/owner/model/predictions")
        .with_status(201)
        .with_body(
            json!({
                "id": "p-2",
                "status": "starting",
                "urls": {"get": format!("{}/predictions/p-2", server.url())}
            })
            .to_string(),
        )
        .create_async()
        .await;
    let poll = server
        .mock("GET", "/predictions/p-2")
        .with_status(200)
        .with_body(
            json!({
                "id": "p-2",
                "status": "succeeded",
                "output": format!("{}/files/p-2.png", server.url())
            })
            .to_string(),
        )
        .create_async()
        .await;
    server
        .mock("GET", "/files/p-2.png")
        .with_body(b"IMG".as_slice())
        .create_async()
        .await;

    let adapter = replicate(&server, &visions);
    adapter.initialize().await.unwrap();
    let artifact = adapter.generate(&request()).await.unwrap();

    poll.assert_async().await;
    assert!(artifact.local_path.exists());
}

#[tokio::test]
async fn replicate_empty_output_is_empty_result() {
    let mut server = Server::new_async().await;
    let visions = TempDir::new().unwrap();

    server
        .mock("POST", "/models/owner/model/predictions")
        .with_status(201)
        .with_body(json!({"id": "p-3", "status": "succeeded", "output": []}).to_string())
        .create_async()
        .await;

    let adapter = replicate(&server, &visions);
    adapter.initialize().await.unwrap();
    let err = adapter.generate(&request()).await.unwrap_err();

    assert!(matches!(err, IntegrationError::EmptyResult(_)));
    assert_eq!(std::fs::read_dir(visions.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn replicate_failed_prediction_is_api_error() {
    let mut server = Server::new_async().await;
    let visions = TempDir::new().unwrap();

    server
        .mock("POST", "/models/owner/model/predictions")
        .with_status(201)
        .with_body(json!({"id": "p-4", "status": "failed", "error": "model crashed"}).to_string())
        .create_async()
        .await;

    let adapter = replicate(&server, &visions);
    adapter.initialize().await.unwrap();
    let err = adapter.generate(&request()).await.unwrap_err();

    match err {
        IntegrationError::Api { status, body, .. } => {
            assert_eq!(status, 201);
            assert!(body.contains("model crashed"));
        }
        other => panic!("unexpected error {:?}", other),
    }
}

#[tokio::test]
async fn replicate_gives_up_after_max_polls() {
    let mut server = Server::new_async().await;
    let visions = TempDir::new().unwrap();

    server
        .mock("POST", "/models/owner/model/predictions")
        .with_status(201)
        .with_body(
            json!({
                "id": "p-5",
                "status": "processing",
                "urls": {"get": format!("{}/predictions/p-5", server.url())}
            })
            .to_string(),
        )
        .create_async()
        .await;
    server
        .mock("GET", "/predictions/p-5")
        .with_body(json!({"id": "p-5", "status": "processing"}).to_string())
        .expect(3)
        .create_async()
        .await;

    let adapter = replicate(&server, &visions);
    adapter.initialize().await.unwrap();
    let err = adapter.generate(&request()).await.unwrap_err();

    assert!(matches!(err, IntegrationError::Timeout(_)));
}

// ============================================================================
// GitHub
// ============================================================================

async fn github(server: &Server) -> GitHubIntegration {
    let adapter = GitHubIntegration::new(GitHubConfig {
        enabled: true,
        token: Some("ghp_test".to_string()),
        repository: Some("owner/repo".to_string()),
        api_url: server.url(),
    });
    adapter.initialize().await.unwrap();
    adapter
}

#[tokio::test]
async fn github_annotates_commit_and_labels_pull_request() {
    let mut server = Server::new_async().await;

    let status = server
        .mock("POST", "/repos/owner/repo/statuses/abc123")
        .match_header("authorization", "Bearer ghp_test")
        .match_body(Matcher::PartialJson(json!({"state": "success", "context": "weave/coherence"})))
        .with_status(201)
        .create_async()
        .await;
    let lookup = server
        .mock("GET", Matcher::Regex(r"^/repos/owner/repo/labels/coherence.+high$".to_string()))
        .with_status(404)
        .create_async()
        .await;
    let create = server
        .mock("POST", "/repos/owner/repo/labels")
        .match_body(Matcher::PartialJson(json!({"name": "coherence: high", "color": "2ecc71"})))
        .with_status(201)
        .create_async()
        .await;
    let apply = server
        .mock("POST", "/repos/owner/repo/issues/7/labels")
        .match_body(Matcher::Json(json!({"labels": ["coherence: high"]})))
        .with_status(200)
        .create_async()
        .await;

    let adapter = github(&server).await;
    let commit = CommitMade {
        sha: "abc123".to_string(),
        message: None,
        author: None,
        pull_request: Some(7),
    };
    adapter.annotate_commit(&commit, 82.0).await.unwrap();

    status.assert_async().await;
    lookup.assert_async().await;
    create.assert_async().await;
    apply.assert_async().await;
}

#[tokio::test]
async fn github_commit_without_pull_request_only_sets_status() {
    let mut server = Server::new_async().await;

    let status = server
        .mock("POST", "/repos/owner/repo/statuses/def456")
        .match_body(Matcher::PartialJson(json!({"state": "pending"})))
        .with_status(201)
        .create_async()
        .await;
    let labels = server
        .mock("GET", Matcher::Regex(r"^/repos/owner/repo/labels/.*".to_string()))
        .expect(0)
        .create_async()
        .await;

    let adapter = github(&server).await;
    let commit = CommitMade {
        sha: "def456".to_string(),
        message: None,
        author: None,
        pull_request: None,
    };
    adapter.annotate_commit(&commit, 31.0).await.unwrap();

    status.assert_async().await;
    labels.assert_async().await;
}

#[tokio::test]
async fn github_existing_label_is_not_recreated() {
    let mut server = Server::new_async().await;

    server
        .mock("GET", Matcher::Regex(r"^/repos/owner/repo/labels/coherence.+seeking$".to_string()))
        .with_status(200)
        .with_body(json!({"name": "coherence: seeking"}).to_string())
        .create_async()
        .await;
    let create = server
        .mock("POST", "/repos/owner/repo/labels")
        .expect(0)
        .create_async()
        .await;

    let adapter = github(&server).await;
    let created = adapter
        .ensure_label(&weave_core::infrastructure::integrations::github::coherence_label(20.0))
        .await
        .unwrap();

    assert!(!created);
    create.assert_async().await;
}
