// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Deployment-class command implementations
//!
//! # Commands
//!
//! - `forge provision --env <ID> [NODES]...` - Provision nodes
//! - `forge deploy --env <ID> [NODES]...` - Deploy nodes
//! - `forge check-networks --env <ID>` - Run network verification
//!
//! All three submit a task tree and follow it to a terminal status within the
//! same process. Ctrl-C cancels the running tree before exiting.

use std::time::Duration;

use anyhow::Result;
use clap::Args;
use colored::Colorize;

use forge_core::application::orchestrator::OrchestrationError;
use forge_core::domain::environment::{EnvironmentId, NodeId, NodeState};
use forge_core::domain::events::TaskEvent;
use forge_core::domain::task::{TaskId, TaskKind, TaskStatus};
use forge_core::infrastructure::event_bus::DomainEvent;

use crate::session::Session;

#[derive(Args)]
pub struct DeploymentArgs {
    /// Environment id
    #[arg(long)]
    pub env: u32,

    /// Node ids (defaults to every eligible member node)
    #[arg(value_name = "NODES")]
    pub nodes: Vec<u32>,

    /// Seconds to wait for the operation to finish
    #[arg(long, default_value = "3600")]
    pub timeout: u64,
}

#[derive(Args)]
pub struct CheckNetworksArgs {
    /// Environment id
    #[arg(long)]
    pub env: u32,

    /// Seconds to wait for the verification to finish
    #[arg(long, default_value = "600")]
    pub timeout: u64,
}

pub async fn provision(args: DeploymentArgs, session: &Session) -> Result<()> {
    let env = EnvironmentId(args.env);
    let nodes = select_nodes(session, env, &args.nodes, TaskKind::Provision).await?;
    let pretty = pretty_ids(&nodes);
    println!("Started provisioning nodes {pretty}.");

    let supertask = session
        .orchestrator
        .submit(env, TaskKind::Provision, &nodes)
        .await?;
    let status = follow(session, supertask, Duration::from_secs(args.timeout)).await?;

    match status {
        TaskStatus::Ready => {
            println!(
                "{}",
                format!("Provisioning of nodes {pretty} is finished.").green()
            );
            Ok(())
        }
        _ => {
            report_failures(session, supertask);
            anyhow::bail!("Provisioning of nodes {pretty} failed")
        }
    }
}

pub async fn deploy(args: DeploymentArgs, session: &Session) -> Result<()> {
    let env = EnvironmentId(args.env);
    let nodes = select_nodes(session, env, &args.nodes, TaskKind::Deploy).await?;
    let pretty = pretty_ids(&nodes);
    println!("Started deploying nodes {pretty}.");

    let supertask = session
        .orchestrator
        .submit(env, TaskKind::Deploy, &nodes)
        .await?;
    let status = follow(session, supertask, Duration::from_secs(args.timeout)).await?;

    match status {
        TaskStatus::Ready => {
            println!(
                "{}",
                format!("Deployment of environment {env} is finished.").green()
            );
            Ok(())
        }
        _ => {
            report_failures(session, supertask);
            anyhow::bail!("Deployment of environment {env} failed")
        }
    }
}

pub async fn check_networks(args: CheckNetworksArgs, session: &Session) -> Result<()> {
    let env = EnvironmentId(args.env);
    println!("Started network verification for environment {env}.");

    let supertask = session
        .orchestrator
        .submit(env, TaskKind::CheckNetworks, &[])
        .await?;
    let status = follow(session, supertask, Duration::from_secs(args.timeout)).await?;

    match status {
        TaskStatus::Ready => {
            println!("{}", "Network verification passed.".green());
            Ok(())
        }
        _ => {
            report_failures(session, supertask);
            anyhow::bail!("Network verification failed")
        }
    }
}

/// Resolve the node selection for a deployment-class command. An explicit
/// list is taken as-is; otherwise every member node eligible for `kind` is
/// selected.
async fn select_nodes(
    session: &Session,
    env: EnvironmentId,
    explicit: &[u32],
    kind: TaskKind,
) -> Result<Vec<NodeId>> {
    if !explicit.is_empty() {
        return Ok(explicit.iter().copied().map(NodeId).collect());
    }
    let members = session.service.list_nodes(env).await?;
    let selected: Vec<NodeId> = members
        .iter()
        .filter(|node| node.has_role())
        .filter(|node| match kind {
            TaskKind::Provision => node.state.is_pending() || node.state == NodeState::Error,
            TaskKind::Deploy => !matches!(
                node.state,
                NodeState::Unassigned | NodeState::Provisioning | NodeState::Deploying
            ),
            TaskKind::CheckNetworks => true,
        })
        .map(|node| node.id)
        .collect();
    if selected.is_empty() {
        anyhow::bail!("No eligible nodes in environment {env} for {kind}");
    }
    Ok(selected)
}

/// Follow a submitted tree to a terminal status, streaming per-node progress
/// lines. Ctrl-C cancels the tree.
async fn follow(session: &Session, supertask: TaskId, timeout: Duration) -> Result<TaskStatus> {
    let mut events = session.event_bus.subscribe();
    let printer = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                DomainEvent::Task(TaskEvent::LeafCompleted {
                    supertask: root,
                    node: Some(node),
                    ..
                }) if root == supertask => {
                    println!("Node {node}: done.");
                }
                DomainEvent::Task(TaskEvent::LeafFailed {
                    supertask: root,
                    node: Some(node),
                    reason,
                    ..
                }) if root == supertask => {
                    println!("{}", format!("Node {node}: {reason}.").red());
                }
                DomainEvent::Task(TaskEvent::SupertaskFinished {
                    supertask: root, ..
                }) if root == supertask => break,
                _ => {}
            }
        }
    });

    let result = tokio::select! {
        result = session.orchestrator.await_terminal(supertask, timeout) => result,
        _ = tokio::signal::ctrl_c() => {
            eprintln!("{}", "Interrupted, cancelling...".yellow());
            session.orchestrator.cancel(supertask).await?;
            session.orchestrator.await_terminal(supertask, Duration::from_secs(10)).await
        }
    };

    match result {
        Ok(status) => {
            let _ = printer.await;
            Ok(status)
        }
        Err(OrchestrationError::Timeout(id)) => {
            printer.abort();
            anyhow::bail!("Timed out waiting for task {id}; it keeps running in the backend")
        }
        Err(err) => {
            printer.abort();
            Err(err.into())
        }
    }
}

fn report_failures(session: &Session, supertask: TaskId) {
    let arena = session.orchestrator.arena();
    let Some(root) = arena.get(supertask) else { return };
    for child in &root.children {
        if let Some(leaf) = arena.get(*child) {
            if let Some(reason) = &leaf.failure {
                match leaf.node {
                    Some(node) => eprintln!("{}", format!("  node {node}: {reason}").red()),
                    None => eprintln!("{}", format!("  {reason}").red()),
                }
            }
        }
    }
}

fn pretty_ids(nodes: &[NodeId]) -> String {
    let rendered: Vec<String> = nodes.iter().map(|n| n.to_string()).collect();
    format!("[{}]", rendered.join(", "))
}
