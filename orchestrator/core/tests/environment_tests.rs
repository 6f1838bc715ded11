// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Integration tests for the environment lifecycle: create, rename, mode
//! changes, node membership and role assignment.

use std::sync::Arc;

use forge_core::application::environment_service::{EnvironmentService, SetEnvironment};
use forge_core::application::lock_manager::ClusterLockManager;
use forge_core::application::orchestrator::TaskArena;
use forge_core::domain::environment::{
    DeploymentMode, EnvironmentError, EnvironmentId, NetworkMode, NodeState,
};
use forge_core::domain::repository::EnvironmentRepository;
use forge_core::infrastructure::event_bus::EventBus;
use forge_core::infrastructure::repositories::InMemoryEnvironmentRepository;

fn service() -> (EnvironmentService, Arc<InMemoryEnvironmentRepository>) {
    let repository = Arc::new(InMemoryEnvironmentRepository::new());
    let lock_manager = Arc::new(ClusterLockManager::new(TaskArena::new()));
    let event_bus = Arc::new(EventBus::with_default_capacity());
    (
        EnvironmentService::new(repository.clone(), lock_manager, event_bus),
        repository,
    )
}

#[tokio::test]
async fn test_create_rename_and_change_mode() {
    let (service, _) = service();

    let env = service.create_environment("TestEnv", 1).await.unwrap();
    assert_eq!(env.id, EnvironmentId(1));
    assert_eq!(env.name, "TestEnv");
    assert_eq!(env.deployment_mode, DeploymentMode::HaCompact);
    assert_eq!(env.network_mode, NetworkMode::NovaNetwork);

    let env = service
        .set_environment(
            env.id,
            SetEnvironment {
                name: Some("NewEnv".to_string()),
                mode: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(env.name, "NewEnv");

    let env = service
        .set_environment(
            env.id,
            SetEnvironment {
                name: None,
                mode: Some(DeploymentMode::Multinode),
            },
        )
        .await
        .unwrap();
    assert_eq!(env.deployment_mode, DeploymentMode::Multinode);

    let fetched = service.get_environment(env.id).await.unwrap();
    assert_eq!(fetched.name, "NewEnv");
    assert_eq!(fetched.deployment_mode, DeploymentMode::Multinode);
}

#[tokio::test]
async fn test_duplicate_names_rejected() {
    let (service, _) = service();
    service.create_environment("TestEnv", 1).await.unwrap();

    assert!(matches!(
        service.create_environment("TestEnv", 2).await,
        Err(EnvironmentError::DuplicateName(_))
    ));

    let other = service.create_environment("Other", 1).await.unwrap();
    assert!(matches!(
        service
            .set_environment(
                other.id,
                SetEnvironment {
                    name: Some("TestEnv".to_string()),
                    mode: None,
                },
            )
            .await,
        Err(EnvironmentError::DuplicateName(_))
    ));
}

#[tokio::test]
async fn test_node_membership_lifecycle() {
    let (service, _) = service();
    let env = service.create_environment("TestEnv", 1).await.unwrap();

    let node = service
        .register_node("node-1", "9f:b7:00:00:00:01")
        .await
        .unwrap();
    assert_eq!(node.state, NodeState::Unassigned);

    service.add_nodes(env.id, &[node.id]).await.unwrap();
    let members = service.list_nodes(env.id).await.unwrap();
    assert_eq!(members.len(), 1);
    assert_eq!(members[0].state, NodeState::PendingAddition);
    assert_eq!(members[0].environment, Some(env.id));

    service.remove_nodes(env.id, &[node.id]).await.unwrap();
    let members = service.list_nodes(env.id).await.unwrap();
    assert_eq!(members[0].state, NodeState::PendingDeletion);
}

#[tokio::test]
async fn test_adding_a_claimed_node_fails() {
    let (service, _) = service();
    let first = service.create_environment("First", 1).await.unwrap();
    let second = service.create_environment("Second", 1).await.unwrap();

    let node = service
        .register_node("node-1", "9f:b7:00:00:00:01")
        .await
        .unwrap();
    service.add_nodes(first.id, &[node.id]).await.unwrap();

    assert!(matches!(
        service.add_nodes(second.id, &[node.id]).await,
        Err(EnvironmentError::ValidationFailed(_))
    ));
}

#[tokio::test]
async fn test_role_assignment_and_catalog() {
    let (service, _) = service();
    let env = service.create_environment("TestEnv", 1).await.unwrap();
    let node = service
        .register_node("node-1", "9f:b7:00:00:00:01")
        .await
        .unwrap();
    service.add_nodes(env.id, &[node.id]).await.unwrap();

    service.assign_role(env.id, &[node.id], "compute").await.unwrap();
    let members = service.list_nodes(env.id).await.unwrap();
    assert_eq!(members[0].role.as_ref().unwrap().as_str(), "compute");

    assert!(matches!(
        service.assign_role(env.id, &[node.id], "balancer").await,
        Err(EnvironmentError::UnknownRole(_))
    ));
}

#[tokio::test]
async fn test_primary_controller_unique_under_ha_compact() {
    let (service, _) = service();
    let env = service.create_environment("TestEnv", 1).await.unwrap();
    let first = service
        .register_node("node-1", "9f:b7:00:00:00:01")
        .await
        .unwrap();
    let second = service
        .register_node("node-2", "9f:b7:00:00:00:02")
        .await
        .unwrap();
    service.add_nodes(env.id, &[first.id, second.id]).await.unwrap();

    service
        .assign_role(env.id, &[first.id], "primary-controller")
        .await
        .unwrap();
    assert!(matches!(
        service
            .assign_role(env.id, &[second.id], "primary-controller")
            .await,
        Err(EnvironmentError::RoleConflict { .. })
    ));

    // Re-assigning the same node is not a conflict.
    service
        .assign_role(env.id, &[first.id], "primary-controller")
        .await
        .unwrap();
}

#[tokio::test]
async fn test_switch_network_mode_resets_settings() {
    let (service, _) = service();
    let env = service.create_environment("TestEnv", 1).await.unwrap();

    let env = service
        .set_network_mode(env.id, NetworkMode::Neutron)
        .await
        .unwrap();
    assert_eq!(env.network_mode, NetworkMode::Neutron);
    assert!(env.network_settings.get("segmentation_type").is_some());

    // Edits must now target the new mode.
    assert!(matches!(
        service
            .edit_network(
                env.id,
                serde_json::json!({ "net_provider": "nova_network", "networks": {} }),
            )
            .await,
        Err(EnvironmentError::ValidationFailed(_))
    ));
    service
        .edit_network(
            env.id,
            serde_json::json!({ "net_provider": "neutron", "networks": { "segmentation_type": "vlan" } }),
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn test_network_edit_validates_provider() {
    let (service, _) = service();
    let env = service.create_environment("TestEnv", 1).await.unwrap();

    // Payload for the wrong network mode is a validation failure.
    assert!(matches!(
        service
            .edit_network(
                env.id,
                serde_json::json!({ "net_provider": "neutron", "networks": {} }),
            )
            .await,
        Err(EnvironmentError::ValidationFailed(_))
    ));

    service
        .edit_network(
            env.id,
            serde_json::json!({
                "net_provider": "nova_network",
                "networks": { "fixed_networks_cidr": "10.1.0.0/16" },
            }),
        )
        .await
        .unwrap();
    let env = service.get_environment(env.id).await.unwrap();
    assert_eq!(
        env.network_settings["fixed_networks_cidr"],
        serde_json::json!("10.1.0.0/16")
    );
}

#[tokio::test]
async fn test_attribute_edit_requires_editable_section() {
    let (service, _) = service();
    let env = service.create_environment("TestEnv", 1).await.unwrap();

    assert!(matches!(
        service
            .edit_attributes(env.id, serde_json::json!({ "foo": 1 }))
            .await,
        Err(EnvironmentError::ValidationFailed(_))
    ));

    service
        .edit_attributes(
            env.id,
            serde_json::json!({ "editable": { "syslog": { "host": "10.20.0.2" } } }),
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn test_delete_environment_releases_nodes() {
    let (service, repository) = service();
    let env = service.create_environment("TestEnv", 1).await.unwrap();
    let node = service
        .register_node("node-1", "9f:b7:00:00:00:01")
        .await
        .unwrap();
    service.add_nodes(env.id, &[node.id]).await.unwrap();

    service.delete_environment(env.id).await.unwrap();
    assert!(matches!(
        service.get_environment(env.id).await,
        Err(EnvironmentError::NotFound(_))
    ));
    let node = repository.get_node(node.id).await.unwrap();
    assert!(node.environment.is_none());
    assert_eq!(node.state, NodeState::Unassigned);
}
