// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Domain Repository Interfaces
//!
//! Persistence contract for the Environment aggregate, following the DDD
//! Repository pattern: interface defined in the domain layer, implemented in
//! `crate::infrastructure::repositories`.
//!
//! The durable store itself is an external collaborator; this core treats it
//! as a synchronous read/write store behind this trait. Task trees are NOT
//! behind a repository — they are exclusively owned by the orchestrator's
//! in-memory arena and referenced from environments by id only.

use async_trait::async_trait;

use crate::domain::environment::{Environment, EnvironmentId, Node, NodeId};

/// Repository interface for the Environment aggregate and its owned nodes.
#[async_trait]
pub trait EnvironmentRepository: Send + Sync {
    /// Create an environment, allocating its id. Fails with `DuplicateName`
    /// if the name is taken.
    async fn insert(&self, name: &str, release: u32) -> Result<Environment, RepositoryError>;

    async fn get(&self, id: EnvironmentId) -> Result<Environment, RepositoryError>;

    async fn find_by_name(&self, name: &str) -> Result<Option<Environment>, RepositoryError>;

    /// Persist environment changes. Fails with `DuplicateName` if a rename
    /// collides with another environment.
    async fn update(&self, environment: &Environment) -> Result<(), RepositoryError>;

    /// Delete the environment and release its member nodes.
    async fn delete(&self, id: EnvironmentId) -> Result<(), RepositoryError>;

    async fn list(&self) -> Result<Vec<Environment>, RepositoryError>;

    /// Register a discovered node, allocating its id.
    async fn insert_node(&self, name: &str, mac: &str) -> Result<Node, RepositoryError>;

    async fn get_node(&self, id: NodeId) -> Result<Node, RepositoryError>;

    async fn update_node(&self, node: &Node) -> Result<(), RepositoryError>;

    /// Member nodes of an environment, ordered by node id.
    async fn nodes_of(&self, id: EnvironmentId) -> Result<Vec<Node>, RepositoryError>;
}

/// Repository errors
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("entity not found: {0}")]
    NotFound(String),

    #[error("environment name '{0}' is already taken")]
    DuplicateName(String),

    #[error("conflict: {0}")]
    Conflict(String),
}
