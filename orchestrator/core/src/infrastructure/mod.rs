// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Infrastructure Layer
//!
//! Adapters behind the domain's seams: backend executors, in-memory
//! persistence, the event bus and the filesystem document writer.

pub mod executor;
pub mod repositories;
pub mod event_bus;
pub mod document_writer;
