// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! SQLite Local Backup Adapter
//!
//! Owns the backup database file (single writer) and, when auto-backup is
//! enabled, a background timer that snapshots the connected field every
//! `backup_interval_ms`. The timer is independent of the event path.
//! Initializing twice is a no-op.

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn, Level};

use crate::domain::field::Field;
use crate::domain::integration::{BackupStore, Integration, IntegrationError, IntegrationKind};
use crate::domain::records::{
    AgentSnapshot, AutoBackupBatch, BackupReport, Ceremony, FieldStateSnapshot, OracleWisdomRecord,
    SacredEventRecord,
};
use crate::domain::weave_config::SqliteConfig;
use crate::infrastructure::db::Database;
use crate::infrastructure::repositories::SqliteBackupRepository;

const NAME: &str = "SQLite";

/// Source recorded for timer-driven backups.
pub const TIMER_SOURCE: &str = "timer";

type SharedField = Arc<RwLock<Option<Arc<dyn Field>>>>;

pub struct SqliteIntegration {
    config: SqliteConfig,
    db_path: PathBuf,
    database: OnceLock<Database>,
    repository: OnceLock<Arc<SqliteBackupRepository>>,
    field: SharedField,
    shutdown_token: CancellationToken,
    timer: Mutex<Option<JoinHandle<()>>>,
}

impl SqliteIntegration {
    pub fn new(config: SqliteConfig) -> Self {
        let db_path = config.resolved_db_path();
        Self {
            config,
            db_path,
            database: OnceLock::new(),
            repository: OnceLock::new(),
            field: Arc::new(RwLock::new(None)),
            shutdown_token: CancellationToken::new(),
            timer: Mutex::new(None),
        }
    }

    /// Adapter over an already opened database, e.g. `Database::in_memory()`.
    pub fn with_database(config: SqliteConfig, database: Database) -> Self {
        let adapter = Self::new(config);
        let _ = adapter.database.set(database);
        adapter
    }

    pub fn db_path(&self) -> &PathBuf {
        &self.db_path
    }

    /// Repository behind the adapter, available after `initialize`.
    pub fn repository(&self) -> Option<Arc<SqliteBackupRepository>> {
        self.repository.get().cloned()
    }

    fn repo(&self) -> Result<&SqliteBackupRepository, IntegrationError> {
        self.repository
            .get()
            .map(Arc::as_ref)
            .ok_or_else(|| IntegrationError::NotInitialized(NAME.to_string()))
    }

    pub async fn perform_auto_backup(&self, batch: &AutoBackupBatch) -> Result<BackupReport, IntegrationError> {
        Ok(self.repo()?.perform_auto_backup(batch).await?)
    }

    fn start_timer(&self, repository: Arc<SqliteBackupRepository>) {
        let period = Duration::from_millis(self.config.backup_interval_ms);
        let field = Arc::clone(&self.field);
        let shutdown_token = self.shutdown_token.clone();

        info!(interval_ms = self.config.backup_interval_ms, "Starting auto-backup timer");

        let handle = tokio::spawn(async move {
            let mut tick = interval_at(Instant::now() + period, period);
            loop {
                tokio::select! {
                    _ = tick.tick() => {
                        let batch = timer_batch(&field);
                        match repository.perform_auto_backup(&batch).await {
                            Ok(report) if report.success => debug!(
                                records = report.records_backed_up,
                                duration_ms = report.duration_ms,
                                "Auto-backup completed"
                            ),
                            Ok(report) => warn!(
                                error = report.error.as_deref().unwrap_or("unknown"),
                                "Auto-backup failed"
                            ),
                            Err(e) => warn!("Auto-backup could not run: {}", e),
                        }
                    }
                    _ = shutdown_token.cancelled() => {
                        debug!("Auto-backup timer stopped");
                        break;
                    }
                }
            }
        });

        *self.timer.lock() = Some(handle);
    }
}

/// One current snapshot when a field is connected, otherwise empty.
fn timer_batch(field: &SharedField) -> AutoBackupBatch {
    let mut batch = AutoBackupBatch::empty(TIMER_SOURCE);
    if let Some(field) = field.read().as_ref() {
        batch
            .field_states
            .push(FieldStateSnapshot::capture(field.as_ref(), field.coherence(), BTreeMap::new()));
    }
    batch
}

#[async_trait]
impl Integration for SqliteIntegration {
    fn kind(&self) -> IntegrationKind {
        IntegrationKind::LocalBackup
    }

    fn name(&self) -> &str {
        NAME
    }

    async fn initialize(&self) -> Result<(), IntegrationError> {
        if self.repository.get().is_some() {
            debug!("Backup store already initialized");
            return Ok(());
        }

        let database = match self.database.get() {
            Some(database) => database.clone(),
            None => {
                let database = Database::open(&self.db_path)
                    .await
                    .map_err(|e| IntegrationError::Database(format!("{:#}", e)))?;
                let _ = self.database.set(database.clone());
                database
            }
        };

        let repository = Arc::new(SqliteBackupRepository::new(database.get_pool().clone()));
        repository.migrate().await?;
        let _ = self.repository.set(Arc::clone(&repository));

        if self.config.auto_backup {
            self.start_timer(repository);
        }

        self.log(Level::INFO, &format!("Backup store ready at {}", self.db_path.display()));
        Ok(())
    }

    async fn connect_to_field(&self, field: Arc<dyn Field>) -> Result<(), IntegrationError> {
        *self.field.write() = Some(field);
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), IntegrationError> {
        self.shutdown_token.cancel();
        let timer = self.timer.lock().take();
        if let Some(handle) = timer {
            if let Err(e) = handle.await {
                self.log(Level::WARN, &format!("Auto-backup timer ended abnormally: {}", e));
            }
        }

        if let Some(database) = self.database.get() {
            database.close().await;
        }
        Ok(())
    }
}

#[async_trait]
impl BackupStore for SqliteIntegration {
    async fn backup_field_state(&self, snapshot: &FieldStateSnapshot) -> Result<i64, IntegrationError> {
        Ok(self.repo()?.backup_field_state(snapshot).await?)
    }

    async fn backup_sacred_event(&self, record: &SacredEventRecord) -> Result<i64, IntegrationError> {
        Ok(self.repo()?.backup_sacred_event(record).await?)
    }

    async fn backup_ceremony(&self, ceremony: &Ceremony) -> Result<(), IntegrationError> {
        Ok(self.repo()?.backup_ceremony(ceremony).await?)
    }

    async fn backup_oracle_wisdom(&self, record: &OracleWisdomRecord) -> Result<i64, IntegrationError> {
        Ok(self.repo()?.backup_oracle_wisdom(record).await?)
    }

    async fn snapshot_agents(&self, agents: &[AgentSnapshot]) -> Result<usize, IntegrationError> {
        Ok(self.repo()?.snapshot_agents(agents).await?)
    }
}
