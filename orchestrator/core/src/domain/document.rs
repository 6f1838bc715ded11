//! Configuration Document Model
//!
//! A configuration document is a deterministic, keyed unit of generated
//! configuration consumed by a provisioning/deployment backend. The path key
//! scheme is part of the external contract: downstream consumers diff
//! exported trees, so keys and rendered bytes must be stable for unchanged
//! entity state.

use serde::{Deserialize, Serialize};

use crate::domain::environment::{EnvironmentId, NodeId, RoleName};

// ============================================================================
// Value Objects: Document Keys
// ============================================================================

/// Deterministic path key of a configuration document.
///
/// Rendered forms:
/// - `network_<env>`
/// - `settings_<env>`
/// - `deployment_<env>/<role>_<node>`
/// - `provisioning_<env>/engine`
/// - `provisioning_<env>/node-<node>`
/// - `node_<node>/disks`
/// - `node_<node>/interfaces`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DocumentKey {
    Network { environment: EnvironmentId },
    Settings { environment: EnvironmentId },
    Deployment { environment: EnvironmentId, role: RoleName, node: NodeId },
    ProvisioningEngine { environment: EnvironmentId },
    ProvisioningNode { environment: EnvironmentId, node: NodeId },
    NodeDisks { node: NodeId },
    NodeInterfaces { node: NodeId },
}

impl DocumentKey {
    /// Render the path key.
    pub fn path(&self) -> String {
        match self {
            Self::Network { environment } => format!("network_{environment}"),
            Self::Settings { environment } => format!("settings_{environment}"),
            Self::Deployment { environment, role, node } => {
                format!("deployment_{environment}/{role}_{node}")
            }
            Self::ProvisioningEngine { environment } => {
                format!("provisioning_{environment}/engine")
            }
            Self::ProvisioningNode { environment, node } => {
                format!("provisioning_{environment}/node-{node}")
            }
            Self::NodeDisks { node } => format!("node_{node}/disks"),
            Self::NodeInterfaces { node } => format!("node_{node}/interfaces"),
        }
    }
}

impl std::fmt::Display for DocumentKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.path())
    }
}

// ============================================================================
// Entity: Configuration Document
// ============================================================================

/// A generated configuration document.
///
/// Content is a `serde_json::Value` whose object maps are BTree-ordered, so
/// rendering the same entity state twice yields byte-identical output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigurationDocument {
    pub key: DocumentKey,
    pub content: serde_json::Value,
}

impl ConfigurationDocument {
    pub fn new(key: DocumentKey, content: serde_json::Value) -> Self {
        Self { key, content }
    }

    /// Render the document body as YAML.
    pub fn render_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(&self.content)
    }
}

/// Selects which document set a serialization request produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SerializationScope {
    /// Whole-network settings document.
    Network,
    /// Whole-settings (editable attributes) document.
    Settings,
    /// Per-role deployment set: one document per role+node pair.
    Deployment,
    /// Per-node provisioning set plus the shared engine document.
    Provisioning,
    /// Disk layout for one node.
    Disks(NodeId),
    /// Network interfaces for one node.
    Interfaces(NodeId),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::environment::RoleName;

    #[test]
    fn test_key_paths_match_contract() {
        let env = EnvironmentId(1);
        assert_eq!(DocumentKey::Network { environment: env }.path(), "network_1");
        assert_eq!(DocumentKey::Settings { environment: env }.path(), "settings_1");
        assert_eq!(
            DocumentKey::Deployment {
                environment: env,
                role: RoleName::new("primary-controller").unwrap(),
                node: NodeId(1),
            }
            .path(),
            "deployment_1/primary-controller_1"
        );
        assert_eq!(
            DocumentKey::ProvisioningEngine { environment: env }.path(),
            "provisioning_1/engine"
        );
        assert_eq!(
            DocumentKey::ProvisioningNode { environment: env, node: NodeId(3) }.path(),
            "provisioning_1/node-3"
        );
        assert_eq!(DocumentKey::NodeDisks { node: NodeId(1) }.path(), "node_1/disks");
        assert_eq!(
            DocumentKey::NodeInterfaces { node: NodeId(1) }.path(),
            "node_1/interfaces"
        );
    }

    #[test]
    fn test_render_is_deterministic() {
        let doc = ConfigurationDocument::new(
            DocumentKey::Settings { environment: EnvironmentId(1) },
            serde_json::json!({"b": 2, "a": 1, "nested": {"z": true, "a": false}}),
        );
        assert_eq!(doc.render_yaml().unwrap(), doc.render_yaml().unwrap());
    }
}
