//! Environment Application Service
//!
//! The exposed mutating and read operations over the entity model. Every
//! mutating operation consults the cluster lock manager first; only when the
//! lock check passes does payload validation run, so a locked environment
//! reports `Locked` even for payloads that would also fail validation.

use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use crate::application::lock_manager::{ClusterLockManager, LockError, OperationKind};
use crate::domain::environment::{
    DeploymentMode, Environment, EnvironmentError, EnvironmentId, NetworkMode, Node, NodeId,
    NodeState, RoleName,
};
use crate::domain::events::EnvironmentEvent;
use crate::domain::repository::{EnvironmentRepository, RepositoryError};
use crate::infrastructure::event_bus::EventBus;

/// Partial update for `set_environment`.
#[derive(Debug, Clone, Default)]
pub struct SetEnvironment {
    pub name: Option<String>,
    pub mode: Option<DeploymentMode>,
}

pub struct EnvironmentService {
    repository: Arc<dyn EnvironmentRepository>,
    lock_manager: Arc<ClusterLockManager>,
    event_bus: Arc<EventBus>,
}

impl EnvironmentService {
    pub fn new(
        repository: Arc<dyn EnvironmentRepository>,
        lock_manager: Arc<ClusterLockManager>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            repository,
            lock_manager,
            event_bus,
        }
    }

    // ========================================================================
    // Environment lifecycle
    // ========================================================================

    pub async fn create_environment(
        &self,
        name: &str,
        release: u32,
    ) -> Result<Environment, EnvironmentError> {
        Environment::validate_name(name)?;
        if self.repository.find_by_name(name).await?.is_some() {
            return Err(EnvironmentError::DuplicateName(name.to_string()));
        }
        let environment = self.repository.insert(name, release).await?;
        info!(environment = %environment.id, name, "Created environment");
        self.event_bus
            .publish_environment_event(EnvironmentEvent::EnvironmentCreated {
                environment: environment.id,
                name: name.to_string(),
                created_at: Utc::now(),
            });
        Ok(environment)
    }

    pub async fn set_environment(
        &self,
        id: EnvironmentId,
        update: SetEnvironment,
    ) -> Result<Environment, EnvironmentError> {
        self.lock_manager.check(id, OperationKind::AttributeEdit)?;
        let mut environment = self.repository.get(id).await?;

        if let Some(name) = update.name {
            let old_name = environment.name.clone();
            environment.rename(&name)?;
            self.repository.update(&environment).await?;
            info!(environment = %id, old_name, new_name = name, "Renamed environment");
            self.event_bus
                .publish_environment_event(EnvironmentEvent::EnvironmentRenamed {
                    environment: id,
                    old_name,
                    new_name: name,
                    renamed_at: Utc::now(),
                });
        }

        if let Some(mode) = update.mode {
            environment.deployment_mode = mode;
            self.repository.update(&environment).await?;
            info!(environment = %id, mode = %mode, "Changed deployment mode");
            self.event_bus
                .publish_environment_event(EnvironmentEvent::ModeChanged {
                    environment: id,
                    mode: mode.to_string(),
                    changed_at: Utc::now(),
                });
        }

        Ok(environment)
    }

    /// Switch the network mode. Existing network settings are reset to the
    /// new mode's defaults; subsequent network edits must target it.
    pub async fn set_network_mode(
        &self,
        id: EnvironmentId,
        mode: NetworkMode,
    ) -> Result<Environment, EnvironmentError> {
        self.lock_manager.check(id, OperationKind::NetworkEdit)?;
        let mut environment = self.repository.get(id).await?;
        environment.set_network_mode(mode);
        self.repository.update(&environment).await?;
        info!(environment = %id, mode = %mode, "Changed network mode");
        self.event_bus
            .publish_environment_event(EnvironmentEvent::NetworkModeChanged {
                environment: id,
                mode: mode.to_string(),
                changed_at: Utc::now(),
            });
        Ok(environment)
    }

    pub async fn delete_environment(&self, id: EnvironmentId) -> Result<(), EnvironmentError> {
        self.lock_manager.check(id, OperationKind::NodeMembershipEdit)?;
        self.repository.delete(id).await?;
        info!(environment = %id, "Deleted environment");
        self.event_bus
            .publish_environment_event(EnvironmentEvent::EnvironmentDeleted {
                environment: id,
                deleted_at: Utc::now(),
            });
        Ok(())
    }

    // ========================================================================
    // Node membership and roles
    // ========================================================================

    /// Attach unassigned nodes to the environment as `pending_addition`.
    pub async fn add_nodes(
        &self,
        id: EnvironmentId,
        node_ids: &[NodeId],
    ) -> Result<(), EnvironmentError> {
        self.lock_manager.check(id, OperationKind::NodeMembershipEdit)?;
        let mut environment = self.repository.get(id).await?;

        for node_id in node_ids {
            let mut node = self.repository.get_node(*node_id).await?;
            if node.environment.is_some() {
                return Err(EnvironmentError::ValidationFailed(format!(
                    "node {node_id} is already a member of an environment"
                )));
            }
            node.environment = Some(id);
            node.state = NodeState::PendingAddition;
            self.repository.update_node(&node).await?;
            environment.nodes.push(*node_id);
        }
        self.repository.update(&environment).await?;

        info!(environment = %id, nodes = ?node_ids, "Scheduled nodes for addition");
        self.event_bus
            .publish_environment_event(EnvironmentEvent::NodesChanged {
                environment: id,
                added: node_ids.to_vec(),
                removed: Vec::new(),
                changed_at: Utc::now(),
            });
        Ok(())
    }

    /// Schedule member nodes for deletion (`pending_deletion`). The node
    /// leaves the environment when the next deployment resolves it.
    pub async fn remove_nodes(
        &self,
        id: EnvironmentId,
        node_ids: &[NodeId],
    ) -> Result<(), EnvironmentError> {
        self.lock_manager.check(id, OperationKind::NodeMembershipEdit)?;
        let environment = self.repository.get(id).await?;

        for node_id in node_ids {
            if !environment.contains_node(*node_id) {
                return Err(EnvironmentError::NodeNotFound(*node_id));
            }
            let mut node = self.repository.get_node(*node_id).await?;
            node.state = NodeState::PendingDeletion;
            self.repository.update_node(&node).await?;
        }

        info!(environment = %id, nodes = ?node_ids, "Scheduled nodes for deletion");
        self.event_bus
            .publish_environment_event(EnvironmentEvent::NodesChanged {
                environment: id,
                added: Vec::new(),
                removed: node_ids.to_vec(),
                changed_at: Utc::now(),
            });
        Ok(())
    }

    /// Assign `role` to each of `node_ids`. Many nodes may share a role;
    /// `primary-controller` stays unique per environment under `ha_compact`.
    pub async fn assign_role(
        &self,
        id: EnvironmentId,
        node_ids: &[NodeId],
        role: &str,
    ) -> Result<(), EnvironmentError> {
        self.lock_manager.check(id, OperationKind::RoleEdit)?;
        let environment = self.repository.get(id).await?;
        let role = RoleName::new(role)?;

        if role.is_primary_controller() && environment.deployment_mode == DeploymentMode::HaCompact
        {
            if node_ids.len() > 1 {
                return Err(EnvironmentError::ValidationFailed(
                    "'primary-controller' can only be assigned to a single node".to_string(),
                ));
            }
            for member in self.repository.nodes_of(id).await? {
                if member.role.as_ref() == Some(&role) && !node_ids.contains(&member.id) {
                    return Err(EnvironmentError::RoleConflict { role, node: member.id });
                }
            }
        }

        for node_id in node_ids {
            if !environment.contains_node(*node_id) {
                return Err(EnvironmentError::NodeNotFound(*node_id));
            }
            let mut node = self.repository.get_node(*node_id).await?;
            node.role = Some(role.clone());
            self.repository.update_node(&node).await?;
        }

        info!(environment = %id, nodes = ?node_ids, role = %role, "Assigned role");
        self.event_bus
            .publish_environment_event(EnvironmentEvent::RolesAssigned {
                environment: id,
                nodes: node_ids.to_vec(),
                role,
                assigned_at: Utc::now(),
            });
        Ok(())
    }

    // ========================================================================
    // Network and attribute edits
    // ========================================================================

    /// Replace network settings. Lock first; then the payload must target
    /// the environment's current network mode.
    pub async fn edit_network(
        &self,
        id: EnvironmentId,
        payload: serde_json::Value,
    ) -> Result<(), EnvironmentError> {
        self.lock_manager.check(id, OperationKind::NetworkEdit)?;
        let mut environment = self.repository.get(id).await?;

        let provider = payload
            .get("net_provider")
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                EnvironmentError::ValidationFailed(
                    "network payload must carry a 'net_provider'".to_string(),
                )
            })?;
        if provider != environment.network_mode.as_str() {
            return Err(EnvironmentError::ValidationFailed(format!(
                "network payload targets '{provider}' but the environment uses '{}'",
                environment.network_mode
            )));
        }
        let networks = payload.get("networks").cloned().ok_or_else(|| {
            EnvironmentError::ValidationFailed(
                "network payload must carry a 'networks' section".to_string(),
            )
        })?;

        environment.network_settings = networks;
        self.repository.update(&environment).await?;
        info!(environment = %id, "Updated network settings");
        self.event_bus
            .publish_environment_event(EnvironmentEvent::AttributesEdited {
                environment: id,
                edited_at: Utc::now(),
            });
        Ok(())
    }

    /// Replace editable cluster attributes. Lock first; the payload must be
    /// an object with an `editable` object inside.
    pub async fn edit_attributes(
        &self,
        id: EnvironmentId,
        payload: serde_json::Value,
    ) -> Result<(), EnvironmentError> {
        self.lock_manager.check(id, OperationKind::AttributeEdit)?;
        let mut environment = self.repository.get(id).await?;

        if !payload.get("editable").map(|v| v.is_object()).unwrap_or(false) {
            return Err(EnvironmentError::ValidationFailed(
                "attribute payload must carry an 'editable' object".to_string(),
            ));
        }

        environment.editable_attributes = payload;
        self.repository.update(&environment).await?;
        info!(environment = %id, "Updated editable attributes");
        self.event_bus
            .publish_environment_event(EnvironmentEvent::AttributesEdited {
                environment: id,
                edited_at: Utc::now(),
            });
        Ok(())
    }

    // ========================================================================
    // Reads (never lock-gated)
    // ========================================================================

    pub async fn get_environment(&self, id: EnvironmentId) -> Result<Environment, EnvironmentError> {
        Ok(self.repository.get(id).await?)
    }

    pub async fn list_environments(&self) -> Result<Vec<Environment>, EnvironmentError> {
        Ok(self.repository.list().await?)
    }

    pub async fn list_nodes(&self, id: EnvironmentId) -> Result<Vec<Node>, EnvironmentError> {
        Ok(self.repository.nodes_of(id).await?)
    }

    /// Register a discovered node (outside any environment).
    pub async fn register_node(&self, name: &str, mac: &str) -> Result<Node, EnvironmentError> {
        Ok(self.repository.insert_node(name, mac).await?)
    }

    pub async fn get_node(&self, id: NodeId) -> Result<Node, EnvironmentError> {
        Ok(self.repository.get_node(id).await?)
    }
}

impl From<RepositoryError> for EnvironmentError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound(what) => EnvironmentError::NotFound(what),
            RepositoryError::DuplicateName(name) => EnvironmentError::DuplicateName(name),
            RepositoryError::Conflict(detail) => EnvironmentError::ValidationFailed(detail),
        }
    }
}

impl From<LockError> for EnvironmentError {
    fn from(_: LockError) -> Self {
        EnvironmentError::Locked
    }
}
