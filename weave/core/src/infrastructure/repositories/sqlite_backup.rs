// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! SQLite backup repository
//!
//! Local durable copy of everything the field produces. Six tables, all
//! append-only except `ceremonies`, which is upserted by `ceremony_id`.
//! Structured columns (harmonies, tags, participants, ...) are stored as
//! JSON text and decoded on read. Coherence is stored exactly as given.

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use sqlx::sqlite::SqliteRow;
use sqlx::{Executor, Row, Sqlite, SqlitePool};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, error, info};

use crate::domain::records::{
    AgentSnapshot, AutoBackupBatch, BackupMetadata, BackupReport, BackupStats, Ceremony,
    FieldStateSnapshot, OracleWisdomRecord, SacredEventRecord, Stored,
};
use crate::domain::repository::RepositoryError;

pub const TABLES: [&str; 6] = [
    "field_state",
    "sacred_events",
    "ceremonies",
    "oracle_wisdom",
    "agent_snapshots",
    "backup_metadata",
];

const SCHEMA: [&str; 10] = [
    r#"CREATE TABLE IF NOT EXISTS field_state (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        timestamp DATETIME DEFAULT CURRENT_TIMESTAMP,
        coherence REAL NOT NULL,
        harmonies TEXT NOT NULL,
        active_agents INTEGER DEFAULT 0,
        active_ceremonies TEXT,
        sacred_geometry TEXT,
        metadata TEXT
    )"#,
    r#"CREATE TABLE IF NOT EXISTS sacred_events (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        timestamp DATETIME DEFAULT CURRENT_TIMESTAMP,
        event_type TEXT NOT NULL,
        agent_id TEXT,
        agent_name TEXT,
        data TEXT NOT NULL,
        field_impact REAL,
        tags TEXT
    )"#,
    r#"CREATE TABLE IF NOT EXISTS ceremonies (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        ceremony_id TEXT UNIQUE NOT NULL,
        type TEXT NOT NULL,
        started_at DATETIME DEFAULT CURRENT_TIMESTAMP,
        completed_at DATETIME,
        participants TEXT,
        initial_coherence REAL,
        final_coherence REAL,
        sacred_moments TEXT,
        outcomes TEXT
    )"#,
    r#"CREATE TABLE IF NOT EXISTS oracle_wisdom (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        timestamp DATETIME DEFAULT CURRENT_TIMESTAMP,
        question TEXT,
        response TEXT NOT NULL,
        coherence_at_time REAL,
        seeker_id TEXT,
        wisdom_type TEXT,
        resonance_score REAL,
        tags TEXT
    )"#,
    r#"CREATE TABLE IF NOT EXISTS agent_snapshots (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        snapshot_time DATETIME DEFAULT CURRENT_TIMESTAMP,
        agent_id TEXT NOT NULL,
        name TEXT NOT NULL,
        role TEXT,
        capabilities TEXT,
        coherence_contribution REAL DEFAULT 0,
        sacred_actions INTEGER DEFAULT 0,
        state TEXT
    )"#,
    r#"CREATE TABLE IF NOT EXISTS backup_metadata (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        backup_time DATETIME DEFAULT CURRENT_TIMESTAMP,
        records_backed_up INTEGER,
        backup_type TEXT,
        source TEXT,
        success BOOLEAN DEFAULT 1
    )"#,
    "CREATE INDEX IF NOT EXISTS idx_field_state_timestamp ON field_state(timestamp DESC)",
    "CREATE INDEX IF NOT EXISTS idx_sacred_events_type ON sacred_events(event_type)",
    "CREATE INDEX IF NOT EXISTS idx_ceremonies_type ON ceremonies(type)",
    "CREATE INDEX IF NOT EXISTS idx_oracle_wisdom_timestamp ON oracle_wisdom(timestamp DESC)",
];

const INSERT_FIELD_STATE: &str = r#"
    INSERT INTO field_state
        (timestamp, coherence, harmonies, active_agents, active_ceremonies, sacred_geometry, metadata)
    VALUES (?, ?, ?, ?, ?, ?, ?)
"#;

const INSERT_SACRED_EVENT: &str = r#"
    INSERT INTO sacred_events
        (timestamp, event_type, agent_id, agent_name, data, field_impact, tags)
    VALUES (?, ?, ?, ?, ?, ?, ?)
"#;

// A repeated start keeps the original row; completion fields only
// overwrite when present.
const UPSERT_CEREMONY: &str = r#"
    INSERT INTO ceremonies
        (ceremony_id, type, started_at, completed_at, participants,
         initial_coherence, final_coherence, sacred_moments, outcomes)
    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
    ON CONFLICT(ceremony_id) DO UPDATE SET
        completed_at = COALESCE(excluded.completed_at, ceremonies.completed_at),
        final_coherence = COALESCE(excluded.final_coherence, ceremonies.final_coherence),
        sacred_moments = COALESCE(excluded.sacred_moments, ceremonies.sacred_moments),
        outcomes = COALESCE(excluded.outcomes, ceremonies.outcomes)
"#;

const INSERT_ORACLE_WISDOM: &str = r#"
    INSERT INTO oracle_wisdom
        (timestamp, question, response, coherence_at_time, seeker_id, wisdom_type, resonance_score, tags)
    VALUES (?, ?, ?, ?, ?, ?, ?, ?)
"#;

const INSERT_AGENT_SNAPSHOT: &str = r#"
    INSERT INTO agent_snapshots
        (snapshot_time, agent_id, name, role, capabilities, coherence_contribution, sacred_actions, state)
    VALUES (?, ?, ?, ?, ?, ?, ?, ?)
"#;

const INSERT_BACKUP_METADATA: &str = r#"
    INSERT INTO backup_metadata (backup_time, records_backed_up, backup_type, source, success)
    VALUES (?, ?, ?, ?, ?)
"#;

/// Full dump written by `export_backup`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BackupExport {
    exported_at: DateTime<Utc>,
    stats: BackupStats,
    field_states: Vec<Stored<FieldStateSnapshot>>,
    sacred_events: Vec<Stored<SacredEventRecord>>,
    ceremonies: Vec<Stored<Ceremony>>,
    oracle_wisdom: Vec<Stored<OracleWisdomRecord>>,
    agent_snapshots: Vec<Stored<AgentSnapshot>>,
    backup_metadata: Vec<Stored<BackupMetadata>>,
}

pub struct SqliteBackupRepository {
    pool: SqlitePool,
}

impl SqliteBackupRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create every table and index that does not exist yet.
    pub async fn migrate(&self) -> Result<(), RepositoryError> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        debug!("SQLite backup schema ready");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------

    pub async fn backup_field_state(&self, snapshot: &FieldStateSnapshot) -> Result<i64, RepositoryError> {
        insert_field_state(&self.pool, snapshot).await
    }

    pub async fn backup_sacred_event(&self, record: &SacredEventRecord) -> Result<i64, RepositoryError> {
        insert_sacred_event(&self.pool, record).await
    }

    pub async fn backup_ceremony(&self, ceremony: &Ceremony) -> Result<(), RepositoryError> {
        let participants = serde_json::to_string(&ceremony.participants)?;
        let sacred_moments = if ceremony.sacred_moments.is_empty() {
            None
        } else {
            Some(serde_json::to_string(&ceremony.sacred_moments)?)
        };

        sqlx::query(UPSERT_CEREMONY)
            .bind(&ceremony.ceremony_id)
            .bind(&ceremony.ceremony_type)
            .bind(ceremony.started_at)
            .bind(ceremony.completed_at)
            .bind(participants)
            .bind(ceremony.initial_coherence)
            .bind(ceremony.final_coherence)
            .bind(sacred_moments)
            .bind(json_or_null(&ceremony.outcomes)?)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    pub async fn backup_oracle_wisdom(&self, record: &OracleWisdomRecord) -> Result<i64, RepositoryError> {
        let result = sqlx::query(INSERT_ORACLE_WISDOM)
            .bind(record.captured_at)
            .bind(record.question.as_deref())
            .bind(&record.response)
            .bind(record.coherence_at_time)
            .bind(record.seeker_id.as_deref())
            .bind(&record.wisdom_type)
            .bind(record.resonance_score)
            .bind(serde_json::to_string(&record.tags)?)
            .execute(&self.pool)
            .await?;

        Ok(result.last_insert_rowid())
    }

    /// Bulk insert inside one transaction.
    pub async fn snapshot_agents(&self, agents: &[AgentSnapshot]) -> Result<usize, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        for agent in agents {
            sqlx::query(INSERT_AGENT_SNAPSHOT)
                .bind(agent.snapshot_time)
                .bind(&agent.agent_id)
                .bind(&agent.name)
                .bind(agent.role.as_deref())
                .bind(serde_json::to_string(&agent.capabilities)?)
                .bind(agent.coherence_contribution)
                .bind(agent.sacred_actions)
                .bind(json_or_null(&agent.state)?)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(agents.len())
    }

    pub async fn record_backup_metadata(&self, metadata: &BackupMetadata) -> Result<i64, RepositoryError> {
        let result = sqlx::query(INSERT_BACKUP_METADATA)
            .bind(metadata.backup_time)
            .bind(metadata.records_backed_up)
            .bind(&metadata.backup_type)
            .bind(&metadata.source)
            .bind(metadata.success)
            .execute(&self.pool)
            .await?;

        Ok(result.last_insert_rowid())
    }

    /// Copy a batch of field states and events, then record the outcome in
    /// `backup_metadata`. A failed copy is rolled back and recorded with
    /// zero records and `success = false`; the report carries the error.
    pub async fn perform_auto_backup(&self, batch: &AutoBackupBatch) -> Result<BackupReport, RepositoryError> {
        let started = Instant::now();
        let outcome = self.copy_batch(batch).await;

        let (records, success, error) = match outcome {
            Ok(count) => (count, true, None),
            Err(e) => {
                error!(source = %batch.source, error = %e, "Auto-backup failed");
                (0, false, Some(e.to_string()))
            }
        };

        self.record_backup_metadata(&BackupMetadata {
            backup_time: Utc::now(),
            records_backed_up: records,
            backup_type: "auto".to_string(),
            source: batch.source.clone(),
            success,
        })
        .await?;

        let report = BackupReport {
            records_backed_up: records,
            source: batch.source.clone(),
            success,
            duration_ms: started.elapsed().as_millis() as u64,
            error,
        };

        if report.success {
            info!(
                source = %report.source,
                records = report.records_backed_up,
                duration_ms = report.duration_ms,
                "Auto-backup complete"
            );
        }

        Ok(report)
    }

    async fn copy_batch(&self, batch: &AutoBackupBatch) -> Result<i64, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let mut count = 0i64;

        for snapshot in &batch.field_states {
            insert_field_state(&mut *tx, snapshot).await?;
            count += 1;
        }
        for event in &batch.events {
            insert_sacred_event(&mut *tx, event).await?;
            count += 1;
        }

        tx.commit().await?;
        Ok(count)
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    /// Field states captured within the last `hours`, newest first. A window
    /// reaching past the epoch returns everything.
    pub async fn recent_field_states(&self, hours: i64) -> Result<Vec<Stored<FieldStateSnapshot>>, RepositoryError> {
        let since = TimeDelta::try_hours(hours.max(0))
            .and_then(|window| Utc::now().checked_sub_signed(window))
            .map_or(DateTime::<Utc>::UNIX_EPOCH, |since| since.max(DateTime::<Utc>::UNIX_EPOCH));
        let rows = sqlx::query("SELECT * FROM field_state WHERE timestamp >= ? ORDER BY timestamp DESC, id DESC")
            .bind(since)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(field_state_from_row).collect()
    }

    /// Newest first. A negative `limit` means no limit.
    pub async fn field_states(&self, limit: i64) -> Result<Vec<Stored<FieldStateSnapshot>>, RepositoryError> {
        let rows = sqlx::query("SELECT * FROM field_state ORDER BY timestamp DESC, id DESC LIMIT ?")
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(field_state_from_row).collect()
    }

    pub async fn recent_sacred_events(&self, limit: i64) -> Result<Vec<Stored<SacredEventRecord>>, RepositoryError> {
        let rows = sqlx::query("SELECT * FROM sacred_events ORDER BY timestamp DESC, id DESC LIMIT ?")
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(sacred_event_from_row).collect()
    }

    /// Most recently started ceremonies first.
    pub async fn ceremony_history(&self, limit: i64) -> Result<Vec<Stored<Ceremony>>, RepositoryError> {
        let rows = sqlx::query("SELECT * FROM ceremonies ORDER BY started_at DESC, id DESC LIMIT ?")
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(ceremony_from_row).collect()
    }

    pub async fn find_ceremony(&self, ceremony_id: &str) -> Result<Option<Stored<Ceremony>>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM ceremonies WHERE ceremony_id = ?")
            .bind(ceremony_id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(ceremony_from_row).transpose()
    }

    /// Substring match on question or response, highest resonance first,
    /// then most recent.
    pub async fn search_wisdom(&self, query: &str, limit: i64) -> Result<Vec<Stored<OracleWisdomRecord>>, RepositoryError> {
        let pattern = format!("%{}%", query);
        let rows = sqlx::query(
            r#"
            SELECT * FROM oracle_wisdom
            WHERE question LIKE ? OR response LIKE ?
            ORDER BY resonance_score DESC, timestamp DESC
            LIMIT ?
            "#,
        )
        .bind(&pattern)
        .bind(&pattern)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(oracle_wisdom_from_row).collect()
    }

    pub async fn agent_snapshots(&self, limit: i64) -> Result<Vec<Stored<AgentSnapshot>>, RepositoryError> {
        let rows = sqlx::query("SELECT * FROM agent_snapshots ORDER BY snapshot_time DESC, id DESC LIMIT ?")
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(agent_snapshot_from_row).collect()
    }

    pub async fn backup_history(&self, limit: i64) -> Result<Vec<Stored<BackupMetadata>>, RepositoryError> {
        let rows = sqlx::query("SELECT * FROM backup_metadata ORDER BY backup_time DESC, id DESC LIMIT ?")
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(backup_metadata_from_row).collect()
    }

    /// Row count per table, `field_state` date range and database size.
    pub async fn backup_stats(&self) -> Result<BackupStats, RepositoryError> {
        let mut tables = BTreeMap::new();
        for table in TABLES {
            let count: i64 = sqlx::query(&format!("SELECT COUNT(*) AS count FROM {}", table))
                .fetch_one(&self.pool)
                .await?
                .try_get("count")?;
            tables.insert(table.to_string(), count);
        }

        let range = sqlx::query("SELECT MIN(timestamp) AS oldest, MAX(timestamp) AS newest FROM field_state")
            .fetch_one(&self.pool)
            .await?;
        let oldest: Option<String> = range.try_get("oldest")?;
        let newest: Option<String> = range.try_get("newest")?;

        let size_bytes: i64 = sqlx::query(
            "SELECT page_count * page_size AS size FROM pragma_page_count(), pragma_page_size()",
        )
        .fetch_one(&self.pool)
        .await?
        .try_get("size")?;

        Ok(BackupStats {
            tables,
            oldest: oldest.as_deref().and_then(parse_timestamp),
            newest: newest.as_deref().and_then(parse_timestamp),
            size_bytes,
            size_mb: (size_bytes as f64 / 1024.0 / 1024.0 * 100.0).round() / 100.0,
        })
    }

    // ------------------------------------------------------------------
    // Maintenance
    // ------------------------------------------------------------------

    /// Dump every table as one JSON document. Returns the number of rows
    /// written.
    pub async fn export_backup(&self, path: impl AsRef<Path>) -> Result<usize, RepositoryError> {
        let export = BackupExport {
            exported_at: Utc::now(),
            stats: self.backup_stats().await?,
            field_states: self.field_states(-1).await?,
            sacred_events: self.recent_sacred_events(-1).await?,
            ceremonies: self.ceremony_history(-1).await?,
            oracle_wisdom: self.search_wisdom("", -1).await?,
            agent_snapshots: self.agent_snapshots(-1).await?,
            backup_metadata: self.backup_history(-1).await?,
        };

        let rows = export.field_states.len()
            + export.sacred_events.len()
            + export.ceremonies.len()
            + export.oracle_wisdom.len()
            + export.agent_snapshots.len()
            + export.backup_metadata.len();

        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        tokio::fs::write(path, serde_json::to_vec_pretty(&export)?).await?;

        info!(path = %path.display(), rows, "Backup exported");
        Ok(rows)
    }

    pub async fn vacuum(&self) -> Result<(), RepositoryError> {
        sqlx::query("VACUUM").execute(&self.pool).await?;
        info!("Backup database vacuumed");
        Ok(())
    }
}

async fn insert_field_state<'e, E>(executor: E, snapshot: &FieldStateSnapshot) -> Result<i64, RepositoryError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(INSERT_FIELD_STATE)
        .bind(snapshot.captured_at)
        .bind(snapshot.coherence)
        .bind(serde_json::to_string(&snapshot.harmonies)?)
        .bind(snapshot.active_agents as i64)
        .bind(serde_json::to_string(&snapshot.active_ceremonies)?)
        .bind(snapshot.sacred_geometry.as_deref())
        .bind(json_or_null(&snapshot.metadata)?)
        .execute(executor)
        .await?;

    Ok(result.last_insert_rowid())
}

async fn insert_sacred_event<'e, E>(executor: E, record: &SacredEventRecord) -> Result<i64, RepositoryError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(INSERT_SACRED_EVENT)
        .bind(record.captured_at)
        .bind(&record.event_type)
        .bind(record.agent_id.as_deref())
        .bind(record.agent_name.as_deref())
        .bind(serde_json::to_string(&record.payload)?)
        .bind(record.field_impact)
        .bind(serde_json::to_string(&record.tags)?)
        .execute(executor)
        .await?;

    Ok(result.last_insert_rowid())
}

fn json_or_null(value: &serde_json::Value) -> Result<Option<String>, RepositoryError> {
    if value.is_null() {
        Ok(None)
    } else {
        Ok(Some(serde_json::to_string(value)?))
    }
}

/// Decode an optional JSON text column, falling back to the type's default
/// when the column is NULL.
fn json_column<T>(row: &SqliteRow, column: &str) -> Result<T, RepositoryError>
where
    T: serde::de::DeserializeOwned + Default,
{
    let raw: Option<String> = row.try_get(column)?;
    match raw {
        Some(text) if !text.is_empty() => Ok(serde_json::from_str(&text)?),
        _ => Ok(T::default()),
    }
}

fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            chrono::NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S")
                .ok()
                .map(|naive| naive.and_utc())
        })
}

fn field_state_from_row(row: &SqliteRow) -> Result<Stored<FieldStateSnapshot>, RepositoryError> {
    Ok(Stored {
        id: row.try_get("id")?,
        record: FieldStateSnapshot {
            coherence: row.try_get("coherence")?,
            harmonies: json_column(row, "harmonies")?,
            active_agents: row.try_get::<Option<i64>, _>("active_agents")?.unwrap_or(0) as u32,
            active_ceremonies: json_column(row, "active_ceremonies")?,
            sacred_geometry: row.try_get("sacred_geometry")?,
            metadata: json_column(row, "metadata")?,
            captured_at: row.try_get("timestamp")?,
        },
    })
}

fn sacred_event_from_row(row: &SqliteRow) -> Result<Stored<SacredEventRecord>, RepositoryError> {
    Ok(Stored {
        id: row.try_get("id")?,
        record: SacredEventRecord {
            event_type: row.try_get("event_type")?,
            agent_id: row.try_get("agent_id")?,
            agent_name: row.try_get("agent_name")?,
            payload: json_column(row, "data")?,
            field_impact: row.try_get("field_impact")?,
            tags: json_column(row, "tags")?,
            captured_at: row.try_get("timestamp")?,
        },
    })
}

fn ceremony_from_row(row: &SqliteRow) -> Result<Stored<Ceremony>, RepositoryError> {
    Ok(Stored {
        id: row.try_get("id")?,
        record: Ceremony {
            ceremony_id: row.try_get("ceremony_id")?,
            ceremony_type: row.try_get("type")?,
            started_at: row.try_get("started_at")?,
            completed_at: row.try_get("completed_at")?,
            participants: json_column(row, "participants")?,
            initial_coherence: row.try_get("initial_coherence")?,
            final_coherence: row.try_get("final_coherence")?,
            sacred_moments: json_column(row, "sacred_moments")?,
            outcomes: json_column(row, "outcomes")?,
        },
    })
}

fn oracle_wisdom_from_row(row: &SqliteRow) -> Result<Stored<OracleWisdomRecord>, RepositoryError> {
    let wisdom_type: Option<String> = row.try_get("wisdom_type")?;
    Ok(Stored {
        id: row.try_get("id")?,
        record: OracleWisdomRecord {
            question: row.try_get("question")?,
            response: row.try_get("response")?,
            coherence_at_time: row.try_get("coherence_at_time")?,
            seeker_id: row.try_get("seeker_id")?,
            wisdom_type: wisdom_type.unwrap_or_else(crate::domain::records::default_wisdom_type),
            resonance_score: row.try_get("resonance_score")?,
            tags: json_column(row, "tags")?,
            captured_at: row.try_get("timestamp")?,
        },
    })
}

fn agent_snapshot_from_row(row: &SqliteRow) -> Result<Stored<AgentSnapshot>, RepositoryError> {
    Ok(Stored {
        id: row.try_get("id")?,
        record: AgentSnapshot {
            agent_id: row.try_get("agent_id")?,
            name: row.try_get("name")?,
            role: row.try_get("role")?,
            capabilities: json_column(row, "capabilities")?,
            coherence_contribution: row.try_get::<Option<f64>, _>("coherence_contribution")?.unwrap_or(0.0),
            sacred_actions: row.try_get::<Option<i64>, _>("sacred_actions")?.unwrap_or(0),
            state: json_column(row, "state")?,
            snapshot_time: row.try_get("snapshot_time")?,
        },
    })
}

fn backup_metadata_from_row(row: &SqliteRow) -> Result<Stored<BackupMetadata>, RepositoryError> {
    Ok(Stored {
        id: row.try_get("id")?,
        record: BackupMetadata {
            backup_time: row.try_get("backup_time")?,
            records_backed_up: row.try_get::<Option<i64>, _>("records_backed_up")?.unwrap_or(0),
            backup_type: row.try_get::<Option<String>, _>("backup_type")?.unwrap_or_default(),
            source: row.try_get::<Option<String>, _>("source")?.unwrap_or_default(),
            success: row.try_get::<Option<bool>, _>("success")?.unwrap_or(true),
        },
    })
}
