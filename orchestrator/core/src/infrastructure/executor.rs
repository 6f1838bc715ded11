//! Backend Executor Interface
//!
//! The orchestrator dispatches serialized configuration documents to opaque
//! asynchronous workers through this capability interface and observes their
//! progress by polling. Variants per backend (provisioning engine, deployment
//! engine, network-check engine) are implementations of the trait; the
//! orchestrator neither knows nor cares how execution happens.
//!
//! `poll` must be idempotent-safe to retry: the orchestrator retries
//! transient poll failures with bounded backoff.

use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;
use uuid::Uuid;

use crate::domain::document::ConfigurationDocument;

/// Opaque handle to a dispatched execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExecutionHandle(pub Uuid);

impl ExecutionHandle {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ExecutionHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ExecutionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Observed state of a dispatched execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionState {
    Running,
    Succeeded,
    Failed(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ExecutorError {
    #[error("backend unreachable: {0}")]
    Unreachable(String),

    #[error("unknown execution handle {0}")]
    UnknownHandle(ExecutionHandle),
}

/// Capability interface of a provisioning/deployment backend.
#[async_trait]
pub trait BackendExecutor: Send + Sync {
    /// Hand a document to the backend. Returns a handle for polling.
    async fn execute(&self, document: &ConfigurationDocument)
        -> Result<ExecutionHandle, ExecutorError>;

    /// Observe the current state of a dispatched execution.
    async fn poll(&self, handle: &ExecutionHandle) -> Result<ExecutionState, ExecutorError>;
}

/// Demo backend that "executes" every document by waiting out a fixed work
/// duration. Used by the CLI's embedded mode.
pub struct SleepExecutor {
    work_duration: Duration,
    deadlines: dashmap::DashMap<ExecutionHandle, Instant>,
}

impl SleepExecutor {
    pub fn new(work_duration: Duration) -> Self {
        Self {
            work_duration,
            deadlines: dashmap::DashMap::new(),
        }
    }
}

#[async_trait]
impl BackendExecutor for SleepExecutor {
    async fn execute(
        &self,
        _document: &ConfigurationDocument,
    ) -> Result<ExecutionHandle, ExecutorError> {
        let handle = ExecutionHandle::new();
        self.deadlines.insert(handle, Instant::now() + self.work_duration);
        Ok(handle)
    }

    async fn poll(&self, handle: &ExecutionHandle) -> Result<ExecutionState, ExecutorError> {
        let deadline = self
            .deadlines
            .get(handle)
            .map(|entry| *entry.value())
            .ok_or(ExecutorError::UnknownHandle(*handle))?;
        if Instant::now() >= deadline {
            Ok(ExecutionState::Succeeded)
        } else {
            Ok(ExecutionState::Running)
        }
    }
}
