//! Configuration Serializer
//!
//! Transforms the entity model into a deterministic set of named
//! configuration documents, organized per environment / per role / per node.
//!
//! # Contract
//!
//! - Pure function of entity state: no side effects, no I/O
//! - Identical Environment/Node/Role state produces byte-identical documents
//!   (downstream consumers diff outputs; re-deployment must be idempotent
//!   for unchanged state)
//! - Returned documents are sorted by key
//!
//! Writing documents to a destination is the exporter's concern, not this
//! component's.

use serde_json::{json, Value};

use crate::domain::document::{ConfigurationDocument, DocumentKey, SerializationScope};
use crate::domain::environment::{Environment, Node, NodeId, RoleName, ROLE_CATALOG};

/// Stateless serialization service.
pub struct ConfigurationSerializer;

impl ConfigurationSerializer {
    /// Serialize `environment` under `scope`.
    ///
    /// `nodes` are the member nodes the scope should cover; callers pass the
    /// full membership for whole-environment scopes or a selected subset for
    /// a partial deployment.
    pub fn serialize(
        environment: &Environment,
        nodes: &[Node],
        scope: SerializationScope,
    ) -> Result<Vec<ConfigurationDocument>, SerializationError> {
        let mut nodes: Vec<&Node> = nodes.iter().collect();
        nodes.sort_by_key(|n| n.id);

        let mut documents = match scope {
            SerializationScope::Network => vec![Self::network_document(environment)],
            SerializationScope::Settings => vec![Self::settings_document(environment)],
            SerializationScope::Deployment => nodes
                .iter()
                .map(|node| Self::deployment_document(environment, node))
                .collect::<Result<Vec<_>, _>>()?,
            SerializationScope::Provisioning => {
                let mut docs = vec![Self::engine_document(environment)];
                for node in &nodes {
                    docs.push(Self::provisioning_document(environment, node));
                }
                docs
            }
            SerializationScope::Disks(id) => {
                let node = Self::find_node(&nodes, id)?;
                vec![ConfigurationDocument::new(
                    DocumentKey::NodeDisks { node: id },
                    Self::disks_content(node),
                )]
            }
            SerializationScope::Interfaces(id) => {
                let node = Self::find_node(&nodes, id)?;
                vec![ConfigurationDocument::new(
                    DocumentKey::NodeInterfaces { node: id },
                    Self::interfaces_content(node),
                )]
            }
        };

        documents.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(documents)
    }

    fn find_node<'a>(nodes: &[&'a Node], id: NodeId) -> Result<&'a Node, SerializationError> {
        nodes
            .iter()
            .find(|n| n.id == id)
            .copied()
            .ok_or(SerializationError::NodeNotFound { node: id })
    }

    // ========================================================================
    // Per-scope document builders
    // ========================================================================

    fn network_document(environment: &Environment) -> ConfigurationDocument {
        ConfigurationDocument::new(
            DocumentKey::Network { environment: environment.id },
            json!({
                "net_provider": environment.network_mode,
                "networks": environment.network_settings,
            }),
        )
    }

    fn settings_document(environment: &Environment) -> ConfigurationDocument {
        ConfigurationDocument::new(
            DocumentKey::Settings { environment: environment.id },
            environment.editable_attributes.clone(),
        )
    }

    /// One deployment document per role+node pair. A role's document may
    /// differ by node, so the node id is part of the key.
    fn deployment_document(
        environment: &Environment,
        node: &Node,
    ) -> Result<ConfigurationDocument, SerializationError> {
        let role = node
            .role
            .as_ref()
            .ok_or(SerializationError::IncompleteTopology { node: node.id })?;
        Self::ensure_known(role)?;

        Ok(ConfigurationDocument::new(
            DocumentKey::Deployment {
                environment: environment.id,
                role: role.clone(),
                node: node.id,
            },
            json!({
                "uid": node.id,
                "fqdn": format!("node-{}.{}", node.id, environment.name.to_lowercase()),
                "role": role,
                "deployment_mode": environment.deployment_mode,
                "net_provider": environment.network_mode,
                "network_data": environment.network_settings,
                "interfaces": Self::interfaces_content(node),
            }),
        ))
    }

    /// The provisioning engine document is environment-scoped, not per-node.
    fn engine_document(environment: &Environment) -> ConfigurationDocument {
        ConfigurationDocument::new(
            DocumentKey::ProvisioningEngine { environment: environment.id },
            json!({
                "url": "http://localhost/cobbler_api",
                "username": "cobbler",
                "password": "cobbler",
                "master_ip": "10.20.0.2",
                "release": environment.release,
            }),
        )
    }

    fn provisioning_document(environment: &Environment, node: &Node) -> ConfigurationDocument {
        ConfigurationDocument::new(
            DocumentKey::ProvisioningNode { environment: environment.id, node: node.id },
            json!({
                "uid": node.id,
                "name": node.name,
                "mac": node.mac,
                "power_type": "ssh",
                "profile": format!("release_{}", environment.release),
                "interfaces": Self::interfaces_content(node),
                "ks_meta": { "disks": Self::disks_content(node) },
            }),
        )
    }

    // ========================================================================
    // Per-node overrides and template defaults
    // ========================================================================

    fn disks_content(node: &Node) -> Value {
        node.disks.clone().unwrap_or_else(|| Self::default_disks(node))
    }

    fn interfaces_content(node: &Node) -> Value {
        node.interfaces
            .clone()
            .unwrap_or_else(|| Self::default_interfaces(node))
    }

    /// Default disk layout generated from the environment template.
    fn default_disks(node: &Node) -> Value {
        json!([
            {
                "id": format!("disk/by-id/node-{}-sda", node.id),
                "size": 953869,
                "volumes": [
                    { "name": "os", "size": 20000 },
                    { "name": "vm", "size": 933869 },
                ],
            }
        ])
    }

    /// Default interface layout generated from the environment template.
    fn default_interfaces(node: &Node) -> Value {
        json!([
            {
                "name": "eth0",
                "mac": node.mac,
                "assigned_networks": ["management", "storage"],
            }
        ])
    }

    fn ensure_known(role: &RoleName) -> Result<(), SerializationError> {
        // RoleName construction already enforces the catalog; this guards
        // records deserialized from an older store with a retired role.
        if ROLE_CATALOG.contains(&role.as_str()) {
            Ok(())
        } else {
            Err(SerializationError::UnknownRole { role: role.to_string() })
        }
    }
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum SerializationError {
    #[error("node {node} has no role assigned but the requested scope requires one")]
    IncompleteTopology { node: NodeId },

    #[error("role '{role}' has no configuration generation rule")]
    UnknownRole { role: String },

    #[error("node {node} is not a member of the serialized environment")]
    NodeNotFound { node: NodeId },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::environment::{EnvironmentId, NodeState};

    fn environment() -> Environment {
        Environment::new(EnvironmentId(1), "TestEnv", 1).unwrap()
    }

    fn node(id: u32, role: Option<&str>) -> Node {
        let mut node = Node::new(NodeId(id), format!("node-{id}"), format!("9f:b7:00:00:00:{id:02x}"));
        node.environment = Some(EnvironmentId(1));
        node.state = NodeState::PendingAddition;
        node.role = role.map(|r| RoleName::new(r).unwrap());
        node
    }

    fn paths(docs: &[ConfigurationDocument]) -> Vec<String> {
        docs.iter().map(|d| d.key.path()).collect()
    }

    #[test]
    fn test_deployment_scope_yields_one_document_per_role_node_pair() {
        let env = environment();
        let nodes = vec![
            node(1, Some("primary-controller")),
            node(2, Some("compute")),
            node(3, Some("compute")),
        ];
        let docs = ConfigurationSerializer::serialize(&env, &nodes, SerializationScope::Deployment)
            .unwrap();
        assert_eq!(
            paths(&docs),
            vec![
                "deployment_1/compute_2",
                "deployment_1/compute_3",
                "deployment_1/primary-controller_1",
            ]
        );
    }

    #[test]
    fn test_provisioning_scope_includes_shared_engine_document() {
        let env = environment();
        let nodes = vec![
            node(1, Some("primary-controller")),
            node(2, Some("compute")),
            node(3, Some("compute")),
        ];
        let docs =
            ConfigurationSerializer::serialize(&env, &nodes, SerializationScope::Provisioning)
                .unwrap();
        assert_eq!(
            paths(&docs),
            vec![
                "provisioning_1/engine",
                "provisioning_1/node-1",
                "provisioning_1/node-2",
                "provisioning_1/node-3",
            ]
        );
    }

    #[test]
    fn test_deployment_scope_requires_roles() {
        let env = environment();
        let nodes = vec![node(1, None)];
        let err = ConfigurationSerializer::serialize(&env, &nodes, SerializationScope::Deployment)
            .unwrap_err();
        assert!(matches!(err, SerializationError::IncompleteTopology { node } if node == NodeId(1)));
    }

    #[test]
    fn test_serialization_is_deterministic() {
        let env = environment();
        let nodes = vec![node(1, Some("controller")), node(2, Some("compute"))];
        let first = ConfigurationSerializer::serialize(&env, &nodes, SerializationScope::Deployment)
            .unwrap();
        let second =
            ConfigurationSerializer::serialize(&env, &nodes, SerializationScope::Deployment)
                .unwrap();
        let first: Vec<String> = first.iter().map(|d| d.render_yaml().unwrap()).collect();
        let second: Vec<String> = second.iter().map(|d| d.render_yaml().unwrap()).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_node_order_does_not_affect_output() {
        let env = environment();
        let forward = vec![node(1, Some("controller")), node(2, Some("compute"))];
        let reversed = vec![node(2, Some("compute")), node(1, Some("controller"))];
        assert_eq!(
            ConfigurationSerializer::serialize(&env, &forward, SerializationScope::Provisioning)
                .unwrap(),
            ConfigurationSerializer::serialize(&env, &reversed, SerializationScope::Provisioning)
                .unwrap(),
        );
    }

    #[test]
    fn test_disk_override_takes_precedence_over_template() {
        let env = environment();
        let mut overridden = node(1, Some("compute"));
        overridden.disks = Some(serde_json::json!([{"id": "sda", "size": 42}]));
        let docs = ConfigurationSerializer::serialize(
            &env,
            std::slice::from_ref(&overridden),
            SerializationScope::Disks(NodeId(1)),
        )
        .unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].key.path(), "node_1/disks");
        assert_eq!(docs[0].content, serde_json::json!([{"id": "sda", "size": 42}]));
    }

    #[test]
    fn test_disks_scope_unknown_node() {
        let env = environment();
        let err = ConfigurationSerializer::serialize(&env, &[], SerializationScope::Disks(NodeId(9)))
            .unwrap_err();
        assert!(matches!(err, SerializationError::NodeNotFound { node } if node == NodeId(9)));
    }

    #[test]
    fn test_network_and_settings_scopes() {
        let env = environment();
        let docs =
            ConfigurationSerializer::serialize(&env, &[], SerializationScope::Network).unwrap();
        assert_eq!(paths(&docs), vec!["network_1"]);
        assert_eq!(docs[0].content["net_provider"], serde_json::json!("nova_network"));

        let docs =
            ConfigurationSerializer::serialize(&env, &[], SerializationScope::Settings).unwrap();
        assert_eq!(paths(&docs), vec!["settings_1"]);
    }
}
