// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Repository Implementations
//!
//! In-memory implementation of the domain repository abstraction, used for
//! development, testing and the CLI's embedded mode. Production persistence
//! is an external collaborator plugged in behind the same trait.
//!
//! Ids are allocated sequentially starting at 1 because environment and node
//! ids are embedded in configuration document path keys.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::domain::environment::{Environment, EnvironmentId, Node, NodeId};
use crate::domain::repository::{EnvironmentRepository, RepositoryError};

#[derive(Debug, Default, Serialize, Deserialize)]
struct Inner {
    environments: HashMap<EnvironmentId, Environment>,
    nodes: HashMap<NodeId, Node>,
    next_environment: u32,
    next_node: u32,
}

/// Point-in-time copy of the repository contents, for callers that persist
/// state themselves between runs (e.g. the CLI's local state file).
#[derive(Debug, Serialize, Deserialize)]
pub struct RepositorySnapshot {
    environments: Vec<Environment>,
    nodes: Vec<Node>,
    next_environment: u32,
    next_node: u32,
}

#[derive(Clone, Default)]
pub struct InMemoryEnvironmentRepository {
    inner: Arc<RwLock<Inner>>,
}

impl InMemoryEnvironmentRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> RepositorySnapshot {
        let inner = self.inner.read();
        let mut environments: Vec<Environment> = inner.environments.values().cloned().collect();
        environments.sort_by_key(|e| e.id);
        let mut nodes: Vec<Node> = inner.nodes.values().cloned().collect();
        nodes.sort_by_key(|n| n.id);
        RepositorySnapshot {
            environments,
            nodes,
            next_environment: inner.next_environment,
            next_node: inner.next_node,
        }
    }

    pub fn restore(snapshot: RepositorySnapshot) -> Self {
        let inner = Inner {
            environments: snapshot.environments.into_iter().map(|e| (e.id, e)).collect(),
            nodes: snapshot.nodes.into_iter().map(|n| (n.id, n)).collect(),
            next_environment: snapshot.next_environment,
            next_node: snapshot.next_node,
        };
        Self {
            inner: Arc::new(RwLock::new(inner)),
        }
    }
}

#[async_trait]
impl EnvironmentRepository for InMemoryEnvironmentRepository {
    async fn insert(&self, name: &str, release: u32) -> Result<Environment, RepositoryError> {
        let mut inner = self.inner.write();
        if inner.environments.values().any(|e| e.name == name) {
            return Err(RepositoryError::DuplicateName(name.to_string()));
        }
        inner.next_environment += 1;
        let id = EnvironmentId(inner.next_environment);
        let environment = Environment::new(id, name, release)
            .map_err(|e| RepositoryError::Conflict(e.to_string()))?;
        inner.environments.insert(id, environment.clone());
        Ok(environment)
    }

    async fn get(&self, id: EnvironmentId) -> Result<Environment, RepositoryError> {
        self.inner
            .read()
            .environments
            .get(&id)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound(format!("environment {id}")))
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Environment>, RepositoryError> {
        Ok(self
            .inner
            .read()
            .environments
            .values()
            .find(|e| e.name == name)
            .cloned())
    }

    async fn update(&self, environment: &Environment) -> Result<(), RepositoryError> {
        let mut inner = self.inner.write();
        if !inner.environments.contains_key(&environment.id) {
            return Err(RepositoryError::NotFound(format!(
                "environment {}",
                environment.id
            )));
        }
        if inner
            .environments
            .values()
            .any(|e| e.id != environment.id && e.name == environment.name)
        {
            return Err(RepositoryError::DuplicateName(environment.name.clone()));
        }
        inner.environments.insert(environment.id, environment.clone());
        Ok(())
    }

    async fn delete(&self, id: EnvironmentId) -> Result<(), RepositoryError> {
        let mut inner = self.inner.write();
        let environment = inner
            .environments
            .remove(&id)
            .ok_or_else(|| RepositoryError::NotFound(format!("environment {id}")))?;
        // The environment owns its nodes: membership dies with it.
        for node_id in environment.nodes {
            if let Some(node) = inner.nodes.get_mut(&node_id) {
                node.release();
            }
        }
        Ok(())
    }

    async fn list(&self) -> Result<Vec<Environment>, RepositoryError> {
        let mut environments: Vec<Environment> =
            self.inner.read().environments.values().cloned().collect();
        environments.sort_by_key(|e| e.id);
        Ok(environments)
    }

    async fn insert_node(&self, name: &str, mac: &str) -> Result<Node, RepositoryError> {
        let mut inner = self.inner.write();
        if inner.nodes.values().any(|n| n.mac == mac) {
            return Err(RepositoryError::Conflict(format!(
                "node with mac '{mac}' already registered"
            )));
        }
        inner.next_node += 1;
        let node = Node::new(NodeId(inner.next_node), name, mac);
        inner.nodes.insert(node.id, node.clone());
        Ok(node)
    }

    async fn get_node(&self, id: NodeId) -> Result<Node, RepositoryError> {
        self.inner
            .read()
            .nodes
            .get(&id)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound(format!("node {id}")))
    }

    async fn update_node(&self, node: &Node) -> Result<(), RepositoryError> {
        let mut inner = self.inner.write();
        if !inner.nodes.contains_key(&node.id) {
            return Err(RepositoryError::NotFound(format!("node {}", node.id)));
        }
        inner.nodes.insert(node.id, node.clone());
        Ok(())
    }

    async fn nodes_of(&self, id: EnvironmentId) -> Result<Vec<Node>, RepositoryError> {
        let inner = self.inner.read();
        let environment = inner
            .environments
            .get(&id)
            .ok_or_else(|| RepositoryError::NotFound(format!("environment {id}")))?;
        let mut nodes: Vec<Node> = environment
            .nodes
            .iter()
            .filter_map(|node_id| inner.nodes.get(node_id).cloned())
            .collect();
        nodes.sort_by_key(|n| n.id);
        Ok(nodes)
    }
}
