// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod integration_manager;
pub mod event_bridge;

// Re-export for convenience
pub use integration_manager::{ActiveIntegrations, IntegrationManager, Registration};
pub use event_bridge::{BridgeError, DispatchReport, DispatchStep, EventBridge, StepOutcome};
