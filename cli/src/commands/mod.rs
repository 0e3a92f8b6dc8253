// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Command implementations for the Weave CLI

pub mod backup;
pub mod config;
pub mod feeds;
pub mod remote;
pub mod run;
pub mod visions;

pub use self::backup::BackupCommand;
pub use self::config::ConfigCommand;
pub use self::feeds::FeedsCommand;
pub use self::remote::RemoteCommand;
pub use self::run::RunArgs;
pub use self::visions::VisionsCommand;

use anyhow::{Context, Result};
use std::path::PathBuf;

use weave_core::domain::weave_config::WeaveConfig;

/// Load, override and validate the configuration every command runs with.
pub fn load_config(config_path: Option<PathBuf>) -> Result<WeaveConfig> {
    let config = WeaveConfig::load_or_default(config_path).context("Failed to load configuration")?;
    config.validate().context("Configuration validation failed")?;
    Ok(config)
}
