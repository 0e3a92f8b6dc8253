// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Integration adapters, one per external service.
//!
//! [`registrations_from_config`] builds the adapter set for the bridge from
//! a [`WeaveConfigSpec`], skipping every disabled section.

pub mod discord;
pub mod github;
pub mod http;
pub mod replicate;
pub mod rss;
pub mod sqlite;
pub mod supabase;

use std::sync::Arc;
use tracing::debug;

use crate::application::integration_manager::Registration;
use crate::domain::weave_config::WeaveConfigSpec;

pub use discord::DiscordIntegration;
pub use github::GitHubIntegration;
pub use replicate::ReplicateIntegration;
pub use rss::RssIntegration;
pub use sqlite::SqliteIntegration;
pub use supabase::SupabaseIntegration;

/// Registrations for every enabled integration, in initialization order.
pub fn registrations_from_config(spec: &WeaveConfigSpec) -> Vec<Registration> {
    let mut registrations = Vec::new();

    if spec.supabase.enabled {
        registrations.push(Registration::RemoteStore(Arc::new(SupabaseIntegration::new(
            spec.supabase.clone(),
        ))));
    }
    if spec.sqlite.enabled {
        registrations.push(Registration::LocalBackup(Arc::new(SqliteIntegration::new(
            spec.sqlite.clone(),
        ))));
    }
    if spec.rss.enabled {
        registrations.push(Registration::Feed(Arc::new(RssIntegration::new(spec.rss.clone()))));
    }
    if spec.discord.enabled {
        registrations.push(Registration::Chat(Arc::new(DiscordIntegration::new(
            spec.discord.clone(),
        ))));
    }
    if spec.replicate.enabled {
        registrations.push(Registration::ImageGeneration(Arc::new(ReplicateIntegration::new(
            spec.replicate.clone(),
        ))));
    }
    if spec.github.enabled {
        registrations.push(Registration::SourceControl(Arc::new(GitHubIntegration::new(
            spec.github.clone(),
        ))));
    }

    debug!(count = registrations.len(), "Built integration registrations");
    registrations
}
