// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Application Layer
//!
//! Services that orchestrate the domain: configuration serialization, task
//! trees, cluster locking and the exposed environment operations.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Use-case services over the domain model

pub mod serializer;
pub mod lock_manager;
pub mod orchestrator;
pub mod environment_service;
pub mod exporter;
