// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Repository Implementations
//!
//! - **SqliteBackupRepository** - local durable backup of field state,
//!   sacred events, ceremonies, oracle wisdom and agent snapshots
//!
//! # Usage
//!
//! ```no_run
//! use weave_core::infrastructure::db::Database;
//! use weave_core::infrastructure::repositories::SqliteBackupRepository;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let db = Database::open(".sacred/weave-backup.db").await?;
//! let repo = SqliteBackupRepository::new(db.get_pool().clone());
//! repo.migrate().await?;
//! # Ok(())
//! # }
//! ```

pub mod sqlite_backup;

pub use sqlite_backup::SqliteBackupRepository;
