// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! In-process field.
//!
//! Keeps the current coherence, harmonies, active agents and open
//! ceremonies, and publishes every change on a [`FieldEventBus`]. Hosts use
//! it to drive the bridge from their own event source.

use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet};
use tokio::sync::broadcast;

use crate::domain::field::{
    clamp_coherence, CoherenceChange, CommitMade, Field, FieldEvent, SacredEvent, SacredEventKind,
};
use crate::domain::payloads::CeremonyPayload;
use crate::infrastructure::event_bus::FieldEventBus;

#[derive(Debug, Default)]
struct FieldState {
    coherence: f64,
    harmonies: BTreeMap<String, f64>,
    agents: BTreeSet<String>,
    ceremonies: Vec<String>,
}

pub struct LocalField {
    state: RwLock<FieldState>,
    bus: FieldEventBus,
}

impl LocalField {
    pub fn new(initial_coherence: f64, capacity: usize) -> Self {
        Self {
            state: RwLock::new(FieldState {
                coherence: clamp_coherence(initial_coherence),
                ..Default::default()
            }),
            bus: FieldEventBus::new(capacity),
        }
    }

    pub fn harmonies(&self) -> BTreeMap<String, f64> {
        self.state.read().harmonies.clone()
    }

    /// Move coherence to `value` (clamped) and announce the change.
    pub fn set_coherence(
        &self,
        value: f64,
        harmonies: Option<BTreeMap<String, f64>>,
        trigger: Option<String>,
    ) -> CoherenceChange {
        let change = {
            let mut state = self.state.write();
            let previous = state.coherence;
            state.coherence = clamp_coherence(value);
            if let Some(harmonies) = harmonies {
                state.harmonies = harmonies;
            }
            CoherenceChange {
                current: state.coherence,
                previous,
                harmonies: state.harmonies.clone(),
                trigger,
            }
        };

        self.bus.publish(FieldEvent::CoherenceChanged(change.clone()));
        change
    }

    pub fn emit_sacred(&self, event: SacredEvent) {
        self.track(&event);
        self.bus.publish(FieldEvent::SacredEvent(event));
    }

    pub fn emit_commit(&self, commit: CommitMade) {
        self.bus.publish(FieldEvent::CommitMade(commit));
    }

    /// Publish an event received from outside, updating local state first.
    /// A coherence change is published exactly as given.
    pub fn emit(&self, event: FieldEvent) -> usize {
        match &event {
            FieldEvent::CoherenceChanged(change) => {
                let mut state = self.state.write();
                state.coherence = clamp_coherence(change.current);
                if !change.harmonies.is_empty() {
                    state.harmonies = change.harmonies.clone();
                }
            }
            FieldEvent::SacredEvent(sacred) => self.track(sacred),
            FieldEvent::CommitMade(_) => {}
        }
        self.bus.publish(event)
    }

    fn track(&self, event: &SacredEvent) {
        match event.kind() {
            SacredEventKind::AgentJoined => {
                let id = event
                    .agent
                    .as_ref()
                    .map(|a| a.id.clone())
                    .or_else(|| event.data.get("id").and_then(|v| v.as_str()).map(str::to_string));
                if let Some(id) = id {
                    self.state.write().agents.insert(id);
                }
            }
            SacredEventKind::CeremonyStarted => {
                if let Ok(payload) = serde_json::from_value::<CeremonyPayload>(event.data.clone()) {
                    let mut state = self.state.write();
                    if !state.ceremonies.contains(&payload.ceremony_id) {
                        state.ceremonies.push(payload.ceremony_id);
                    }
                }
            }
            SacredEventKind::CeremonyCompleted => {
                if let Ok(payload) = serde_json::from_value::<CeremonyPayload>(event.data.clone()) {
                    self.state
                        .write()
                        .ceremonies
                        .retain(|id| id != &payload.ceremony_id);
                }
            }
            _ => {}
        }
    }
}

impl Default for LocalField {
    fn default() -> Self {
        Self::new(0.0, 1000)
    }
}

impl Field for LocalField {
    fn coherence(&self) -> f64 {
        self.state.read().coherence
    }

    fn active_agents(&self) -> Option<usize> {
        Some(self.state.read().agents.len())
    }

    fn active_ceremonies(&self) -> Vec<String> {
        self.state.read().ceremonies.clone()
    }

    fn subscribe(&self) -> broadcast::Receiver<FieldEvent> {
        self.bus.raw_subscribe()
    }
}
