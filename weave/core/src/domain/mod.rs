// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod field;
pub mod records;
pub mod payloads;
pub mod integration;
pub mod repository;
pub mod weave_config;
