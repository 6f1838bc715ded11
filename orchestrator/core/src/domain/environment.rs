//! Environment Domain Model
//!
//! This module defines the core domain entities for a declared environment:
//! a named cluster of nodes with assigned roles and network topology.
//!
//! # Architectural Context
//!
//! - **Bounded Context:** Cluster Definition Context
//! - **Aggregate Root:** Environment (exclusively owns its member Nodes)
//!
//! # Design Principles
//!
//! 1. **Self-Validating:** Constructors enforce invariants (non-empty names)
//! 2. **Explicit membership:** A node is in exactly one membership state
//! 3. **Deterministic identity:** Integer ids, because ids are embedded in
//!    configuration document path keys (`deployment_1/compute_2`)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

// ============================================================================
// Value Objects: Identifiers
// ============================================================================

/// Unique identifier for an Environment
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct EnvironmentId(pub u32);

impl std::fmt::Display for EnvironmentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a Node
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct NodeId(pub u32);

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Value Objects: Modes
// ============================================================================

/// Deployment mode of an environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentMode {
    HaCompact,
    Multinode,
}

impl Default for DeploymentMode {
    fn default() -> Self {
        Self::HaCompact
    }
}

impl DeploymentMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HaCompact => "ha_compact",
            Self::Multinode => "multinode",
        }
    }
}

impl std::fmt::Display for DeploymentMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeploymentMode {
    type Err = EnvironmentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ha_compact" => Ok(Self::HaCompact),
            "multinode" => Ok(Self::Multinode),
            other => Err(EnvironmentError::ValidationFailed(format!(
                "unknown deployment mode '{other}'"
            ))),
        }
    }
}

/// Network mode of an environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkMode {
    NovaNetwork,
    Neutron,
}

impl Default for NetworkMode {
    fn default() -> Self {
        Self::NovaNetwork
    }
}

impl NetworkMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NovaNetwork => "nova_network",
            Self::Neutron => "neutron",
        }
    }
}

impl std::fmt::Display for NetworkMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NetworkMode {
    type Err = EnvironmentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "nova_network" => Ok(Self::NovaNetwork),
            "neutron" => Ok(Self::Neutron),
            other => Err(EnvironmentError::ValidationFailed(format!(
                "unknown network mode '{other}'"
            ))),
        }
    }
}

// ============================================================================
// Value Objects: Roles
// ============================================================================

/// Roles with a configuration generation rule. Assigning anything outside
/// this catalog fails with `UnknownRole`.
pub const ROLE_CATALOG: &[&str] = &["controller", "primary-controller", "compute", "cinder"];

/// The role that must be unique per environment under `ha_compact`.
pub const PRIMARY_CONTROLLER: &str = "primary-controller";

/// Name of a role assigned to a node (e.g. "compute")
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RoleName(String);

impl RoleName {
    /// Create a RoleName, rejecting names outside the role catalog.
    pub fn new(name: impl Into<String>) -> Result<Self, EnvironmentError> {
        let name = name.into();
        if !ROLE_CATALOG.contains(&name.as_str()) {
            return Err(EnvironmentError::UnknownRole(name));
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_primary_controller(&self) -> bool {
        self.0 == PRIMARY_CONTROLLER
    }
}

impl std::fmt::Display for RoleName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Entity: Node
// ============================================================================

/// Membership state of a node. A node is in exactly one state;
/// `pending_addition` and `pending_deletion` are mutually exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeState {
    Unassigned,
    PendingAddition,
    PendingDeletion,
    Provisioning,
    Provisioned,
    Deploying,
    Ready,
    Error,
}

impl NodeState {
    /// Node is scheduled for a membership change but not yet acted on.
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::PendingAddition | Self::PendingDeletion)
    }
}

impl std::fmt::Display for NodeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Unassigned => "unassigned",
            Self::PendingAddition => "pending_addition",
            Self::PendingDeletion => "pending_deletion",
            Self::Provisioning => "provisioning",
            Self::Provisioned => "provisioned",
            Self::Deploying => "deploying",
            Self::Ready => "ready",
            Self::Error => "error",
        };
        f.write_str(s)
    }
}

/// A discovered node. Owned by its environment once assigned; the `disks`
/// and `interfaces` overrides are nullable, with defaults generated from the
/// environment template at serialization time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub name: String,
    pub mac: String,
    pub state: NodeState,
    pub role: Option<RoleName>,
    pub environment: Option<EnvironmentId>,
    pub disks: Option<serde_json::Value>,
    pub interfaces: Option<serde_json::Value>,
}

impl Node {
    pub fn new(id: NodeId, name: impl Into<String>, mac: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            mac: mac.into(),
            state: NodeState::Unassigned,
            role: None,
            environment: None,
            disks: None,
            interfaces: None,
        }
    }

    pub fn has_role(&self) -> bool {
        self.role.is_some()
    }

    /// Detach the node from its environment, clearing role and overrides.
    pub fn release(&mut self) {
        self.environment = None;
        self.role = None;
        self.state = NodeState::Unassigned;
        self.disks = None;
        self.interfaces = None;
    }
}

// ============================================================================
// Aggregate Root: Environment
// ============================================================================

/// Environment Aggregate Root
///
/// A named, versioned cluster definition comprising nodes, roles and network
/// configuration.
///
/// # Invariants
/// - Name is non-empty; uniqueness among environments is enforced by the
///   repository at create/rename time
/// - Member node ids are unique and each member node points back at this
///   environment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Environment {
    pub id: EnvironmentId,
    pub name: String,
    pub release: u32,
    pub deployment_mode: DeploymentMode,
    pub network_mode: NetworkMode,
    pub nodes: Vec<NodeId>,
    /// Network settings for the current network mode.
    pub network_settings: serde_json::Value,
    /// Free-form editable cluster attributes (`{"editable": {...}}`).
    pub editable_attributes: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl Environment {
    /// Create a new Environment with default modes (`ha_compact`,
    /// `nova_network`) and template-derived network settings.
    pub fn new(
        id: EnvironmentId,
        name: impl Into<String>,
        release: u32,
    ) -> Result<Self, EnvironmentError> {
        let name = name.into();
        Self::validate_name(&name)?;

        let network_mode = NetworkMode::default();
        Ok(Self {
            id,
            name,
            release,
            deployment_mode: DeploymentMode::default(),
            network_mode,
            nodes: Vec::new(),
            network_settings: default_network_settings(network_mode),
            editable_attributes: serde_json::json!({ "editable": {} }),
            created_at: Utc::now(),
        })
    }

    /// Validate an environment name.
    pub fn validate_name(name: &str) -> Result<(), EnvironmentError> {
        if name.is_empty() {
            return Err(EnvironmentError::ValidationFailed(
                "environment name cannot be empty".to_string(),
            ));
        }
        if name.len() > 100 {
            return Err(EnvironmentError::ValidationFailed(
                "environment name must be at most 100 characters".to_string(),
            ));
        }
        Ok(())
    }

    pub fn rename(&mut self, name: impl Into<String>) -> Result<(), EnvironmentError> {
        let name = name.into();
        Self::validate_name(&name)?;
        self.name = name;
        Ok(())
    }

    /// Switch network mode, regenerating the settings template for the new
    /// mode. Old settings are discarded; they describe a different topology.
    pub fn set_network_mode(&mut self, mode: NetworkMode) {
        if self.network_mode != mode {
            self.network_mode = mode;
            self.network_settings = default_network_settings(mode);
        }
    }

    pub fn contains_node(&self, id: NodeId) -> bool {
        self.nodes.contains(&id)
    }
}

/// Template network settings for a freshly created environment.
pub fn default_network_settings(mode: NetworkMode) -> serde_json::Value {
    match mode {
        NetworkMode::NovaNetwork => serde_json::json!({
            "fixed_networks_cidr": "10.0.0.0/16",
            "fixed_networks_vlan_start": 103,
            "floating_ranges": [["172.16.0.128", "172.16.0.254"]],
            "net_manager": "FlatDHCPManager",
        }),
        NetworkMode::Neutron => serde_json::json!({
            "base_mac": "fa:16:3e:00:00:00",
            "internal_cidr": "192.168.111.0/24",
            "internal_gateway": "192.168.111.1",
            "segmentation_type": "gre",
        }),
    }
}

// ============================================================================
// Domain Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum EnvironmentError {
    #[error("environment not found: {0}")]
    NotFound(String),

    #[error("node not found: {0}")]
    NodeNotFound(NodeId),

    #[error("environment name '{0}' is already taken")]
    DuplicateName(String),

    #[error("unknown role '{0}'")]
    UnknownRole(String),

    #[error("role '{role}' is already assigned to node {node} in this environment")]
    RoleConflict { role: RoleName, node: NodeId },

    #[error("environment is locked by an active deployment")]
    Locked,

    #[error("validation failed: {0}")]
    ValidationFailed(String),
}
