//! Task Orchestrator Application Service
//!
//! Creates task trees for provisioning/deployment requests, dispatches leaf
//! work to backend executors, aggregates child status into parent status and
//! exposes polling and cancellation.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Drive long-running deployment-class operations
//! - **Dependencies:** Domain (Task, Environment), Infrastructure (executor,
//!   event bus, repositories)
//!
//! # Concurrency model
//!
//! Task records live in an arena keyed by id, with parent/children stored as
//! id lists. Reads (status aggregation, lock derivation) take a shared lock;
//! updates take an exclusive lock for the duration of a single record change.
//! Submissions for the same environment are serialized through a
//! per-environment mutex so the lock-state read and the tree creation form
//! one critical section; different environments proceed fully in parallel.
//! Leaf execution runs on spawned tokio tasks and never blocks a submitter.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::application::serializer::{ConfigurationSerializer, SerializationError};
use crate::domain::document::{ConfigurationDocument, SerializationScope};
use crate::domain::environment::{EnvironmentId, Node, NodeId, NodeState};
use crate::domain::events::TaskEvent;
use crate::domain::repository::{EnvironmentRepository, RepositoryError};
use crate::domain::task::{aggregate, FailureReason, Task, TaskId, TaskKind, TaskStatus};
use crate::infrastructure::event_bus::EventBus;
use crate::infrastructure::executor::{BackendExecutor, ExecutionState};

/// Interval between executor polls for an in-flight leaf.
const LEAF_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Transient poll failures tolerated before a leaf fails `ExecutorUnreachable`.
const MAX_POLL_RETRIES: u32 = 5;

/// Backoff base for transient poll failures.
const POLL_RETRY_BACKOFF: Duration = Duration::from_millis(25);

/// Initial and maximum intervals for `await_terminal`'s cooperative polling.
const AWAIT_POLL_INITIAL: Duration = Duration::from_millis(20);
const AWAIT_POLL_MAX: Duration = Duration::from_millis(500);

// ============================================================================
// Task Arena
// ============================================================================

/// Arena of task records keyed by id.
///
/// Exclusively owned by the orchestrator; the lock manager holds a clone to
/// derive cluster lock state from the same records. Status of a non-leaf
/// task is always recomputed from the current child snapshot.
#[derive(Clone, Default)]
pub struct TaskArena {
    tasks: Arc<parking_lot::RwLock<HashMap<TaskId, Task>>>,
    /// Roots whose terminal event has already been published.
    finished: Arc<parking_lot::Mutex<HashSet<TaskId>>>,
}

impl TaskArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, task: Task) {
        self.tasks.write().insert(task.id, task);
    }

    /// Insert a root and its leaves as one arena update, so no reader can
    /// observe a root whose child ids do not resolve yet.
    pub fn insert_tree(&self, root: Task, leaves: Vec<Task>) {
        let mut tasks = self.tasks.write();
        for leaf in leaves {
            tasks.insert(leaf.id, leaf);
        }
        tasks.insert(root.id, root);
    }

    pub fn get(&self, id: TaskId) -> Option<Task> {
        self.tasks.read().get(&id).cloned()
    }

    /// Effective status: stored status for leaves, aggregation over the
    /// current child snapshot for non-leaf tasks.
    pub fn status_of(&self, id: TaskId) -> Option<TaskStatus> {
        let tasks = self.tasks.read();
        Self::status_locked(&tasks, id)
    }

    fn status_locked(tasks: &HashMap<TaskId, Task>, id: TaskId) -> Option<TaskStatus> {
        let task = tasks.get(&id)?;
        if task.is_leaf() {
            return Some(task.status);
        }
        // A child id that does not resolve counts as pending, so a tree
        // under construction never reads as terminal.
        let children: Vec<TaskStatus> = task
            .children
            .iter()
            .map(|child| Self::status_locked(tasks, *child).unwrap_or(TaskStatus::Pending))
            .collect();
        Some(aggregate(&children))
    }

    /// True iff the environment has a lock-bearing root task whose derived
    /// status is non-terminal. Recomputed on every call; never cached.
    pub fn has_active_lock(&self, environment: EnvironmentId) -> bool {
        let tasks = self.tasks.read();
        tasks.values().any(|task| {
            task.parent.is_none()
                && task.environment == environment
                && task.kind.bears_lock()
                && Self::status_locked(&tasks, task.id)
                    .map(|status| !status.is_terminal())
                    .unwrap_or(false)
        })
    }

    /// Root tasks for an environment, newest first.
    pub fn roots_for(&self, environment: EnvironmentId) -> Vec<Task> {
        let tasks = self.tasks.read();
        let mut roots: Vec<Task> = tasks
            .values()
            .filter(|t| t.parent.is_none() && t.environment == environment)
            .cloned()
            .collect();
        roots.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        roots
    }

    /// True the first time it is called for a given root, false afterwards.
    /// Serializes the terminal announcement when several leaves finish at
    /// once.
    pub fn claim_finished(&self, id: TaskId) -> bool {
        self.finished.lock().insert(id)
    }

    pub fn start(&self, id: TaskId) {
        if let Some(task) = self.tasks.write().get_mut(&id) {
            task.start();
        }
    }

    pub fn succeed(&self, id: TaskId) {
        if let Some(task) = self.tasks.write().get_mut(&id) {
            task.succeed();
        }
    }

    pub fn fail(&self, id: TaskId, reason: FailureReason) {
        if let Some(task) = self.tasks.write().get_mut(&id) {
            task.fail(reason);
        }
    }

    /// Cancel a subtree top-down: every non-terminal task in it moves to
    /// `error` with reason `cancelled`. Terminal tasks are left untouched.
    /// Returns the leaf tasks that were actually cancelled.
    pub fn cancel(&self, id: TaskId) -> Vec<Task> {
        let mut tasks = self.tasks.write();
        let mut cancelled = Vec::new();
        let mut queue = vec![id];
        while let Some(current) = queue.pop() {
            let Some(task) = tasks.get_mut(&current) else { continue };
            queue.extend(task.children.iter().copied());
            if !task.status.is_terminal() {
                task.fail(FailureReason::Cancelled);
                if task.is_leaf() {
                    cancelled.push(task.clone());
                }
            }
        }
        cancelled
    }
}

// ============================================================================
// Application Service: TaskOrchestrator
// ============================================================================

/// Orchestrates deployment-class task trees.
#[derive(Clone)]
pub struct TaskOrchestrator {
    repository: Arc<dyn EnvironmentRepository>,
    executor: Arc<dyn BackendExecutor>,
    event_bus: Arc<EventBus>,
    arena: TaskArena,
    /// Per-environment critical sections for submit.
    gates: Arc<DashMap<EnvironmentId, Arc<tokio::sync::Mutex<()>>>>,
}

impl TaskOrchestrator {
    pub fn new(
        repository: Arc<dyn EnvironmentRepository>,
        executor: Arc<dyn BackendExecutor>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            repository,
            executor,
            event_bus,
            arena: TaskArena::new(),
            gates: Arc::new(DashMap::new()),
        }
    }

    /// The arena, shared with the cluster lock manager.
    pub fn arena(&self) -> TaskArena {
        self.arena.clone()
    }

    // ========================================================================
    // Submission
    // ========================================================================

    /// Create and dispatch a task tree for `kind` over `node_ids`.
    ///
    /// Returns the supertask id immediately; leaf execution continues on
    /// spawned tasks. Fails with `AlreadyInProgress` if a lock-bearing tree
    /// for the environment is still non-terminal, or `InvalidNodeState` if a
    /// referenced node is not eligible for the requested kind.
    pub async fn submit(
        &self,
        environment_id: EnvironmentId,
        kind: TaskKind,
        node_ids: &[NodeId],
    ) -> Result<TaskId, OrchestrationError> {
        let gate = self
            .gates
            .entry(environment_id)
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone();
        let _guard = gate.lock().await;

        if kind.bears_lock() && self.arena.has_active_lock(environment_id) {
            return Err(OrchestrationError::AlreadyInProgress(environment_id));
        }

        let environment = self.repository.get(environment_id).await?;
        let mut nodes = Vec::with_capacity(node_ids.len());
        for id in node_ids {
            let node = self.repository.get_node(*id).await?;
            if node.environment != Some(environment_id) {
                return Err(OrchestrationError::InvalidNodeState {
                    node: *id,
                    state: node.state,
                    kind,
                });
            }
            Self::check_node_eligible(&node, kind)?;
            nodes.push(node);
        }

        let (scope, running_state) = match kind {
            TaskKind::Provision => (SerializationScope::Provisioning, NodeState::Provisioning),
            TaskKind::Deploy => (SerializationScope::Deployment, NodeState::Deploying),
            TaskKind::CheckNetworks => (SerializationScope::Network, NodeState::Ready),
        };
        let documents = ConfigurationSerializer::serialize(&environment, &nodes, scope)?;

        // Build the tree: one leaf per document. For provisioning the engine
        // document becomes the shared, node-less child.
        let mut root = Task::root(kind, environment_id);
        let supertask = root.id;
        let mut leaves = Vec::with_capacity(documents.len());
        for document in documents {
            let node = Self::document_node(&document);
            let leaf = Task::leaf(kind, environment_id, supertask, node);
            root.children.push(leaf.id);
            leaves.push((leaf, document));
        }
        // Persist node states before the tree lands in the arena: a failure
        // here must not leave a lock-bearing root behind.
        if kind != TaskKind::CheckNetworks {
            for node in &mut nodes {
                // A pending deletion keeps its mark while executing so the
                // post-deployment transition can resolve it.
                if node.state != NodeState::PendingDeletion {
                    node.state = running_state;
                }
                self.repository.update_node(node).await?;
            }
        }

        root.start();
        self.arena
            .insert_tree(root, leaves.iter().map(|(leaf, _)| leaf.clone()).collect());

        info!(
            supertask = %supertask,
            environment = %environment_id,
            kind = %kind,
            nodes = ?node_ids,
            "Created task tree"
        );
        self.event_bus.publish_task_event(TaskEvent::TreeCreated {
            supertask,
            environment: environment_id,
            kind,
            nodes: node_ids.to_vec(),
            created_at: Utc::now(),
        });

        for (leaf, document) in leaves {
            let this = self.clone();
            tokio::spawn(async move {
                this.run_leaf(leaf, document).await;
            });
        }

        Ok(supertask)
    }

    fn check_node_eligible(node: &Node, kind: TaskKind) -> Result<(), OrchestrationError> {
        if kind == TaskKind::CheckNetworks {
            return Ok(());
        }
        let ineligible = OrchestrationError::InvalidNodeState {
            node: node.id,
            state: node.state,
            kind,
        };
        if !node.has_role() {
            return Err(ineligible);
        }
        let allowed = match kind {
            TaskKind::Provision => matches!(
                node.state,
                NodeState::PendingAddition | NodeState::PendingDeletion | NodeState::Error
            ),
            TaskKind::Deploy => matches!(
                node.state,
                NodeState::PendingAddition
                    | NodeState::PendingDeletion
                    | NodeState::Provisioned
                    | NodeState::Ready
                    | NodeState::Error
            ),
            TaskKind::CheckNetworks => true,
        };
        if allowed {
            Ok(())
        } else {
            Err(ineligible)
        }
    }

    fn document_node(document: &ConfigurationDocument) -> Option<NodeId> {
        use crate::domain::document::DocumentKey::*;
        match &document.key {
            Deployment { node, .. }
            | ProvisioningNode { node, .. }
            | NodeDisks { node }
            | NodeInterfaces { node } => Some(*node),
            Network { .. } | Settings { .. } | ProvisioningEngine { .. } => None,
        }
    }

    // ========================================================================
    // Leaf execution
    // ========================================================================

    /// Hand a leaf's document to the backend executor and track it until
    /// terminal. Transient poll failures are retried with backoff; exhaustion
    /// surfaces as `ExecutorUnreachable` on the leaf, never to the submitter.
    async fn run_leaf(&self, leaf: Task, document: ConfigurationDocument) {
        let supertask = leaf.parent.unwrap_or(leaf.id);
        self.arena.start(leaf.id);
        self.event_bus.publish_task_event(TaskEvent::LeafStarted {
            task: leaf.id,
            supertask,
            node: leaf.node,
            started_at: Utc::now(),
        });

        let handle = match self.executor.execute(&document).await {
            Ok(handle) => handle,
            Err(err) => {
                warn!(task = %leaf.id, error = %err, "Backend rejected document");
                self.finish_leaf(&leaf, supertask, Err(FailureReason::ExecutorUnreachable))
                    .await;
                return;
            }
        };

        let mut retries = 0u32;
        let outcome = loop {
            tokio::time::sleep(LEAF_POLL_INTERVAL).await;

            // A cancellation may have landed while we slept.
            if let Some(task) = self.arena.get(leaf.id) {
                if task.status.is_terminal() {
                    debug!(task = %leaf.id, "Leaf reached terminal state externally, stop polling");
                    return;
                }
            }

            match self.executor.poll(&handle).await {
                Ok(ExecutionState::Running) => {
                    retries = 0;
                }
                Ok(ExecutionState::Succeeded) => break Ok(()),
                Ok(ExecutionState::Failed(message)) => {
                    break Err(FailureReason::Backend(message))
                }
                Err(err) => {
                    retries += 1;
                    if retries >= MAX_POLL_RETRIES {
                        warn!(task = %leaf.id, error = %err, "Executor unreachable, giving up");
                        break Err(FailureReason::ExecutorUnreachable);
                    }
                    let backoff = POLL_RETRY_BACKOFF * 2u32.pow(retries - 1);
                    debug!(task = %leaf.id, attempt = retries, "Poll failed, backing off");
                    tokio::time::sleep(backoff).await;
                }
            }
        };

        self.finish_leaf(&leaf, supertask, outcome).await;
    }

    async fn finish_leaf(
        &self,
        leaf: &Task,
        supertask: TaskId,
        outcome: Result<(), FailureReason>,
    ) {
        match &outcome {
            Ok(()) => {
                self.arena.succeed(leaf.id);
                self.event_bus.publish_task_event(TaskEvent::LeafCompleted {
                    task: leaf.id,
                    supertask,
                    node: leaf.node,
                    completed_at: Utc::now(),
                });
            }
            Err(reason) => {
                self.arena.fail(leaf.id, reason.clone());
                self.event_bus.publish_task_event(TaskEvent::LeafFailed {
                    task: leaf.id,
                    supertask,
                    node: leaf.node,
                    reason: reason.clone(),
                    failed_at: Utc::now(),
                });
            }
        }

        if let Some(node) = leaf.node {
            if let Err(err) = self.advance_node(node, leaf.kind, outcome.is_ok()).await {
                warn!(node = %node, error = %err, "Failed to record node state");
            }
        }

        if let Some(status) = self.arena.status_of(supertask) {
            // Concurrent leaves can both observe the terminal status; only
            // the claim winner announces it.
            if status.is_terminal() && self.arena.claim_finished(supertask) {
                self.event_bus
                    .publish_task_event(TaskEvent::SupertaskFinished {
                        supertask,
                        environment: leaf.environment,
                        status,
                        finished_at: Utc::now(),
                    });
            }
        }
    }

    /// Move a node to its post-execution membership state.
    async fn advance_node(
        &self,
        id: NodeId,
        kind: TaskKind,
        succeeded: bool,
    ) -> Result<(), RepositoryError> {
        let mut node = self.repository.get_node(id).await?;
        if !succeeded {
            node.state = NodeState::Error;
            return self.repository.update_node(&node).await;
        }
        match kind {
            TaskKind::Provision => {
                node.state = NodeState::Provisioned;
                self.repository.update_node(&node).await
            }
            TaskKind::Deploy => {
                // Deployment resolves pending deletions by releasing the node.
                if node.state == NodeState::PendingDeletion {
                    if let Some(env_id) = node.environment {
                        let mut environment = self.repository.get(env_id).await?;
                        environment.nodes.retain(|n| *n != id);
                        self.repository.update(&environment).await?;
                    }
                    node.release();
                } else {
                    node.state = NodeState::Ready;
                }
                self.repository.update_node(&node).await
            }
            TaskKind::CheckNetworks => Ok(()),
        }
    }

    // ========================================================================
    // Observation and cancellation
    // ========================================================================

    /// Current status of a task. Non-blocking; aggregation is recomputed
    /// from the current child snapshot on every call.
    pub fn status(&self, id: TaskId) -> Result<TaskStatus, OrchestrationError> {
        self.arena
            .status_of(id)
            .ok_or(OrchestrationError::TaskNotFound(id))
    }

    /// Block (cooperatively) until the task reaches `ready`/`error`, polling
    /// at a bounded, backing-off interval. Fails with `Timeout` once the
    /// budget is exhausted; the task itself is left running.
    pub async fn await_terminal(
        &self,
        id: TaskId,
        timeout: Duration,
    ) -> Result<TaskStatus, OrchestrationError> {
        let deadline = Instant::now() + timeout;
        let mut interval = AWAIT_POLL_INITIAL;
        loop {
            let status = self.status(id)?;
            if status.is_terminal() {
                return Ok(status);
            }
            if Instant::now() >= deadline {
                return Err(OrchestrationError::Timeout(id));
            }
            tokio::time::sleep(interval).await;
            interval = (interval * 2).min(AWAIT_POLL_MAX);
        }
    }

    /// Cancel a task tree top-down. Cancelling an already-terminal task is a
    /// no-op. A child's own failure propagates upward via aggregation, never
    /// via cancellation.
    pub async fn cancel(&self, id: TaskId) -> Result<(), OrchestrationError> {
        if self.arena.get(id).is_none() {
            return Err(OrchestrationError::TaskNotFound(id));
        }
        let cancelled = self.arena.cancel(id);
        for leaf in &cancelled {
            if let Some(node) = leaf.node {
                if let Err(err) = self.advance_node(node, leaf.kind, false).await {
                    warn!(node = %node, error = %err, "Failed to record node state");
                }
            }
        }
        if !cancelled.is_empty() {
            info!(task = %id, leaves = cancelled.len(), "Cancelled task tree");
            self.event_bus.publish_task_event(TaskEvent::Cancelled {
                task: id,
                cancelled_at: Utc::now(),
            });
        }
        Ok(())
    }
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum OrchestrationError {
    #[error("task {0} not found")]
    TaskNotFound(TaskId),

    #[error("a deployment is already in progress for environment {0}")]
    AlreadyInProgress(EnvironmentId),

    #[error("node {node} in state '{state}' is not eligible for {kind}")]
    InvalidNodeState {
        node: NodeId,
        state: NodeState,
        kind: TaskKind,
    },

    #[error("timed out waiting for task {0}")]
    Timeout(TaskId),

    #[error(transparent)]
    Serialization(#[from] SerializationError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}
