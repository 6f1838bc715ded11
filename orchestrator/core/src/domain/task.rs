//! Task Domain Model
//!
//! A Task is a unit of asynchronous provisioning/deployment work. Tasks
//! compose into trees: a supertask (root) owns ordered child tasks, linked by
//! id rather than by pointer so the tree can live in an arena and be read
//! concurrently while updates happen under a per-environment critical section.
//!
//! # Invariants
//!
//! - A task is created `pending` and only ever moves forward to `running`,
//!   then to a terminal `ready`/`error`
//! - A parent's status is a pure function of its children's statuses
//!   (see [`aggregate`]), recomputed on every read and never cached

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::environment::{EnvironmentId, NodeId};

/// Unique identifier for a Task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskId(pub Uuid);

impl TaskId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of work a task performs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    Provision,
    Deploy,
    CheckNetworks,
}

impl TaskKind {
    /// Deployment-class kinds lock their environment against conflicting
    /// mutation while non-terminal. `check_networks` does not.
    pub fn bears_lock(&self) -> bool {
        matches!(self, Self::Provision | Self::Deploy)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Provision => "provision",
            Self::Deploy => "deploy",
            Self::CheckNetworks => "check_networks",
        }
    }
}

impl std::fmt::Display for TaskKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TaskKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "provision" => Ok(Self::Provision),
            "deploy" => Ok(Self::Deploy),
            "check_networks" => Ok(Self::CheckNetworks),
            other => Err(format!("unknown task kind '{other}'")),
        }
    }
}

/// Task status lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Running,
    Ready,
    Error,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Ready | Self::Error)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Ready => "ready",
            Self::Error => "error",
        };
        f.write_str(s)
    }
}

/// Why a task ended in `error`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    Cancelled,
    ExecutorUnreachable,
    Backend(String),
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cancelled => f.write_str("cancelled"),
            Self::ExecutorUnreachable => f.write_str("executor unreachable"),
            Self::Backend(msg) => write!(f, "backend failure: {msg}"),
        }
    }
}

/// A node in the task tree. Leaf iff `children` is empty.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub kind: TaskKind,
    /// Stored status. Authoritative for leaves; for non-leaf tasks the
    /// effective status is derived from the children via [`aggregate`].
    pub status: TaskStatus,
    pub environment: EnvironmentId,
    pub parent: Option<TaskId>,
    pub children: Vec<TaskId>,
    /// For leaf tasks that target a single node. The shared provisioning
    /// engine task has no node.
    pub node: Option<NodeId>,
    pub failure: Option<FailureReason>,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl Task {
    /// Create a supertask (tree root).
    pub fn root(kind: TaskKind, environment: EnvironmentId) -> Self {
        Self {
            id: TaskId::new(),
            kind,
            status: TaskStatus::Pending,
            environment,
            parent: None,
            children: Vec::new(),
            node: None,
            failure: None,
            created_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Create a leaf task under `parent`.
    pub fn leaf(
        kind: TaskKind,
        environment: EnvironmentId,
        parent: TaskId,
        node: Option<NodeId>,
    ) -> Self {
        Self {
            id: TaskId::new(),
            kind,
            status: TaskStatus::Pending,
            environment,
            parent: Some(parent),
            children: Vec::new(),
            node,
            failure: None,
            created_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    pub fn start(&mut self) {
        if self.status == TaskStatus::Pending {
            self.status = TaskStatus::Running;
        }
    }

    pub fn succeed(&mut self) {
        self.status = TaskStatus::Ready;
        self.finished_at = Some(Utc::now());
    }

    pub fn fail(&mut self, reason: FailureReason) {
        self.status = TaskStatus::Error;
        self.failure = Some(reason);
        self.finished_at = Some(Utc::now());
    }
}

/// Aggregate child statuses into a parent status.
///
/// `error` if any child is `error`; else `running` if any child is `pending`
/// or `running`; else `ready`. Callers with no children use the task's own
/// leaf status instead of calling this.
pub fn aggregate(children: &[TaskStatus]) -> TaskStatus {
    debug_assert!(!children.is_empty(), "aggregate is for non-leaf tasks");
    if children.iter().any(|s| *s == TaskStatus::Error) {
        TaskStatus::Error
    } else if children
        .iter()
        .any(|s| matches!(s, TaskStatus::Pending | TaskStatus::Running))
    {
        TaskStatus::Running
    } else {
        TaskStatus::Ready
    }
}
