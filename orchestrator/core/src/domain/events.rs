// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::environment::{EnvironmentId, NodeId, RoleName};
use crate::domain::task::{FailureReason, TaskId, TaskKind};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EnvironmentEvent {
    EnvironmentCreated {
        environment: EnvironmentId,
        name: String,
        created_at: DateTime<Utc>,
    },
    EnvironmentRenamed {
        environment: EnvironmentId,
        old_name: String,
        new_name: String,
        renamed_at: DateTime<Utc>,
    },
    ModeChanged {
        environment: EnvironmentId,
        mode: String,
        changed_at: DateTime<Utc>,
    },
    NetworkModeChanged {
        environment: EnvironmentId,
        mode: String,
        changed_at: DateTime<Utc>,
    },
    RolesAssigned {
        environment: EnvironmentId,
        nodes: Vec<NodeId>,
        role: RoleName,
        assigned_at: DateTime<Utc>,
    },
    NodesChanged {
        environment: EnvironmentId,
        added: Vec<NodeId>,
        removed: Vec<NodeId>,
        changed_at: DateTime<Utc>,
    },
    AttributesEdited {
        environment: EnvironmentId,
        edited_at: DateTime<Utc>,
    },
    EnvironmentDeleted {
        environment: EnvironmentId,
        deleted_at: DateTime<Utc>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TaskEvent {
    TreeCreated {
        supertask: TaskId,
        environment: EnvironmentId,
        kind: TaskKind,
        nodes: Vec<NodeId>,
        created_at: DateTime<Utc>,
    },
    LeafStarted {
        task: TaskId,
        supertask: TaskId,
        node: Option<NodeId>,
        started_at: DateTime<Utc>,
    },
    LeafCompleted {
        task: TaskId,
        supertask: TaskId,
        node: Option<NodeId>,
        completed_at: DateTime<Utc>,
    },
    LeafFailed {
        task: TaskId,
        supertask: TaskId,
        node: Option<NodeId>,
        reason: FailureReason,
        failed_at: DateTime<Utc>,
    },
    Cancelled {
        task: TaskId,
        cancelled_at: DateTime<Utc>,
    },
    SupertaskFinished {
        supertask: TaskId,
        environment: EnvironmentId,
        status: crate::domain::task::TaskStatus,
        finished_at: DateTime<Utc>,
    },
}
