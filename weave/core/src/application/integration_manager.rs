// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Integration Manager
//!
//! Owns the registered adapters. `initialize` brings every adapter up
//! independently: one that fails is logged and left out of the active set
//! while the others carry on. The resulting [`ActiveIntegrations`] is fixed
//! for the lifetime of the manager.

use futures::future::join_all;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::domain::integration::{
    ArtifactGenerator, BackupStore, ChatNotifier, FeedPublisher, Integration, IntegrationKind,
    RemoteStore, SourceControl,
};

/// An adapter together with the capability it provides.
#[derive(Clone)]
pub enum Registration {
    RemoteStore(Arc<dyn RemoteStore>),
    LocalBackup(Arc<dyn BackupStore>),
    Feed(Arc<dyn FeedPublisher>),
    Chat(Arc<dyn ChatNotifier>),
    ImageGeneration(Arc<dyn ArtifactGenerator>),
    SourceControl(Arc<dyn SourceControl>),
}

impl Registration {
    pub fn kind(&self) -> IntegrationKind {
        match self {
            Registration::RemoteStore(_) => IntegrationKind::RemoteStore,
            Registration::LocalBackup(_) => IntegrationKind::LocalBackup,
            Registration::Feed(_) => IntegrationKind::Feed,
            Registration::Chat(_) => IntegrationKind::Chat,
            Registration::ImageGeneration(_) => IntegrationKind::ImageGeneration,
            Registration::SourceControl(_) => IntegrationKind::SourceControl,
        }
    }

    pub fn integration(&self) -> Arc<dyn Integration> {
        match self {
            Registration::RemoteStore(a) => a.clone(),
            Registration::LocalBackup(a) => a.clone(),
            Registration::Feed(a) => a.clone(),
            Registration::Chat(a) => a.clone(),
            Registration::ImageGeneration(a) => a.clone(),
            Registration::SourceControl(a) => a.clone(),
        }
    }
}

/// Initialized adapters, at most one per capability.
#[derive(Clone, Default)]
pub struct ActiveIntegrations {
    pub remote_store: Option<Arc<dyn RemoteStore>>,
    pub backup: Option<Arc<dyn BackupStore>>,
    pub feed: Option<Arc<dyn FeedPublisher>>,
    pub chat: Option<Arc<dyn ChatNotifier>>,
    pub image: Option<Arc<dyn ArtifactGenerator>>,
    pub source_control: Option<Arc<dyn SourceControl>>,
}

impl ActiveIntegrations {
    /// Returns `false` when the capability is already filled.
    fn insert(&mut self, registration: Registration) -> bool {
        fn fill<T: ?Sized>(slot: &mut Option<Arc<T>>, adapter: Arc<T>) -> bool {
            if slot.is_some() {
                return false;
            }
            *slot = Some(adapter);
            true
        }

        match registration {
            Registration::RemoteStore(a) => fill(&mut self.remote_store, a),
            Registration::LocalBackup(a) => fill(&mut self.backup, a),
            Registration::Feed(a) => fill(&mut self.feed, a),
            Registration::Chat(a) => fill(&mut self.chat, a),
            Registration::ImageGeneration(a) => fill(&mut self.image, a),
            Registration::SourceControl(a) => fill(&mut self.source_control, a),
        }
    }

    /// Every active adapter through its lifecycle trait.
    pub fn all(&self) -> Vec<Arc<dyn Integration>> {
        let mut all: Vec<Arc<dyn Integration>> = Vec::new();
        if let Some(a) = &self.remote_store {
            all.push(a.clone());
        }
        if let Some(a) = &self.backup {
            all.push(a.clone());
        }
        if let Some(a) = &self.feed {
            all.push(a.clone());
        }
        if let Some(a) = &self.chat {
            all.push(a.clone());
        }
        if let Some(a) = &self.image {
            all.push(a.clone());
        }
        if let Some(a) = &self.source_control {
            all.push(a.clone());
        }
        all
    }

    pub fn kinds(&self) -> Vec<IntegrationKind> {
        self.all().iter().map(|a| a.kind()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.all().is_empty()
    }
}

pub struct IntegrationManager {
    registrations: Vec<Registration>,
    active: RwLock<ActiveIntegrations>,
}

impl IntegrationManager {
    pub fn new(registrations: Vec<Registration>) -> Self {
        Self {
            registrations,
            active: RwLock::new(ActiveIntegrations::default()),
        }
    }

    pub fn registrations(&self) -> &[Registration] {
        &self.registrations
    }

    /// Initialize every registration concurrently and publish the ones
    /// that came up.
    pub async fn initialize(&self) -> ActiveIntegrations {
        let results = join_all(self.registrations.iter().map(|registration| async move {
            let integration = registration.integration();
            (registration, integration.initialize().await)
        }))
        .await;

        let mut active = ActiveIntegrations::default();
        for (registration, result) in results {
            let integration = registration.integration();
            match result {
                Ok(()) => {
                    if active.insert(registration.clone()) {
                        info!(
                            integration = integration.name(),
                            kind = %registration.kind(),
                            "Integration initialized"
                        );
                    } else {
                        warn!(
                            integration = integration.name(),
                            kind = %registration.kind(),
                            "Capability already provided, ignoring duplicate integration"
                        );
                    }
                }
                Err(e) => {
                    warn!(
                        integration = integration.name(),
                        kind = %registration.kind(),
                        error = %e,
                        "Integration failed to initialize and will be skipped"
                    );
                }
            }
        }

        info!(active = ?active.kinds(), "Integrations ready");
        *self.active.write() = active.clone();
        active
    }

    pub fn active(&self) -> ActiveIntegrations {
        self.active.read().clone()
    }

    /// Shut down every registered adapter, including those that failed to
    /// initialize.
    pub async fn shutdown(&self) {
        let results = join_all(self.registrations.iter().map(|registration| async move {
            let integration = registration.integration();
            let result = integration.shutdown().await;
            (integration, result)
        }))
        .await;

        for (integration, result) in results {
            if let Err(e) = result {
                error!(integration = integration.name(), error = %e, "Integration shutdown failed");
            }
        }

        *self.active.write() = ActiveIntegrations::default();
        info!("Integrations shut down");
    }
}
