//! Cluster Lock Manager
//!
//! Derives a lock state from the set of active tasks for an environment and
//! rejects disallowed mutating operations while locked.
//!
//! There is no stored lock flag: lock state is recomputed from task-tree
//! status on every check, so it can never go stale when a deployment fails
//! or finishes. `Unlocked -> Locked` happens when a lock-bearing tree's root
//! enters `pending`/`running`; `Locked -> Unlocked` when that root reaches
//! `ready`/`error`.

use tracing::debug;

use crate::application::orchestrator::TaskArena;
use crate::domain::environment::EnvironmentId;

/// What an incoming request wants to do to an environment.
///
/// Deployment triggers always pass the lock check: a new submission may be
/// rejected for other reasons (overlap, node state), but not by the lock
/// itself. Read-only operations always pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    DeploymentTrigger,
    NetworkEdit,
    AttributeEdit,
    RoleEdit,
    NodeMembershipEdit,
    Read,
}

impl OperationKind {
    pub fn is_mutating(&self) -> bool {
        matches!(
            self,
            Self::NetworkEdit | Self::AttributeEdit | Self::RoleEdit | Self::NodeMembershipEdit
        )
    }
}

/// Errors from the lock check.
#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error("environment {0} is locked by an active deployment")]
    EnvironmentLocked(EnvironmentId),
}

/// Derived-lock gatekeeper over the orchestrator's task arena.
pub struct ClusterLockManager {
    arena: TaskArena,
}

impl ClusterLockManager {
    pub fn new(arena: TaskArena) -> Self {
        Self { arena }
    }

    /// Allow or deny `operation` against `environment`.
    ///
    /// The lock check runs before any payload validation: while locked, a
    /// mutating request is denied `EnvironmentLocked` even if its payload
    /// would also fail validation.
    pub fn check(
        &self,
        environment: EnvironmentId,
        operation: OperationKind,
    ) -> Result<(), LockError> {
        if operation.is_mutating() && self.arena.has_active_lock(environment) {
            debug!(environment = %environment, ?operation, "Denied by cluster lock");
            return Err(LockError::EnvironmentLocked(environment));
        }
        Ok(())
    }

    /// Current derived lock state.
    pub fn is_locked(&self, environment: EnvironmentId) -> bool {
        self.arena.has_active_lock(environment)
    }
}
