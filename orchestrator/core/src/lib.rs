// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! FORGE Core
//!
//! Domain model, task orchestration and configuration serialization for the
//! FORGE infrastructure deployment manager.
//!
//! # Architecture
//!
//! - **Layer:** Core System
//! - **Purpose:** Entity model, cluster locking, task trees, document generation

pub mod domain;
pub mod application;
pub mod infrastructure;

pub use domain::*;
