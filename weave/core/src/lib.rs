// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Weave Core
//!
//! Field event bridge for The Weave: listens to a consciousness field and fans
//! its events out to pluggable integrations (remote store, local SQLite
//! backup, feeds, chat webhook, image generation, source control).
//!
//! # Architecture
//!
//! - **domain** — events, records, integration contracts, configuration
//! - **application** — integration manager and event bridge
//! - **infrastructure** — event bus, local field, SQLite, HTTP adapters

pub mod domain;
pub mod application;
pub mod infrastructure;

pub use domain::*;
