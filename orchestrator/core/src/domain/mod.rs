// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Domain Layer
//!
//! Entities, value objects and contracts for the deployment manager.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Environment/Node/Role model, task trees, document keys

pub mod environment;
pub mod task;
pub mod document;
pub mod events;
pub mod repository;
