// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Node command implementations
//!
//! # Commands
//!
//! - `forge node register --name <NAME> --mac <MAC>` - Register a discovered node
//! - `forge node show <ID>` - Show one node
//! - `forge node list --env <ID>` - List member nodes of an environment
//! - `forge node add --env <ID> <NODES>...` - Schedule nodes for addition
//! - `forge node remove --env <ID> <NODES>...` - Schedule nodes for deletion
//! - `forge node set-role --env <ID> --role <ROLE> <NODES>...` - Assign a role

use anyhow::Result;
use clap::Subcommand;
use colored::Colorize;

use forge_core::domain::environment::{EnvironmentId, NodeId};

use crate::session::Session;

#[derive(Subcommand)]
pub enum NodeCommand {
    /// Register a discovered node
    Register {
        /// Node name
        #[arg(long)]
        name: String,

        /// MAC address of the admin interface
        #[arg(long)]
        mac: String,
    },

    /// Show one node
    Show {
        /// Node id
        #[arg(value_name = "ID")]
        id: u32,
    },

    /// List member nodes of an environment
    List {
        /// Environment id
        #[arg(long)]
        env: u32,
    },

    /// Schedule nodes for addition to an environment
    Add {
        /// Environment id
        #[arg(long)]
        env: u32,

        /// Node ids
        #[arg(value_name = "NODES", required = true)]
        nodes: Vec<u32>,
    },

    /// Schedule member nodes for deletion
    Remove {
        /// Environment id
        #[arg(long)]
        env: u32,

        /// Node ids
        #[arg(value_name = "NODES", required = true)]
        nodes: Vec<u32>,
    },

    /// Assign a role to member nodes
    SetRole {
        /// Environment id
        #[arg(long)]
        env: u32,

        /// Role name (controller, primary-controller, compute, cinder)
        #[arg(long)]
        role: String,

        /// Node ids
        #[arg(value_name = "NODES", required = true)]
        nodes: Vec<u32>,
    },
}

pub async fn handle_command(command: NodeCommand, session: &Session) -> Result<()> {
    match command {
        NodeCommand::Register { name, mac } => {
            let node = session.service.register_node(&name, &mac).await?;
            println!(
                "{}",
                format!("Node '{}' with id={} and mac={} was registered.", node.name, node.id, node.mac)
                    .green()
            );
            Ok(())
        }
        NodeCommand::Show { id } => {
            let node = session.service.get_node(NodeId(id)).await?;
            println!("id:          {}", node.id);
            println!("name:        {}", node.name);
            println!("mac:         {}", node.mac);
            println!("state:       {}", node.state);
            match node.environment {
                Some(env) => println!("environment: {env}"),
                None => println!("environment: (unassigned)"),
            }
            match &node.role {
                Some(role) => println!("role:        {role}"),
                None => println!("role:        (none)"),
            }
            Ok(())
        }
        NodeCommand::List { env } => {
            let nodes = session.service.list_nodes(EnvironmentId(env)).await?;
            if nodes.is_empty() {
                println!("{}", "No nodes in this environment.".yellow());
                return Ok(());
            }
            println!("{:<5} {:<16} {:<20} {:<20} {}", "id", "name", "mac", "role", "state");
            for node in nodes {
                let role = node
                    .role
                    .as_ref()
                    .map(|r| r.as_str().to_string())
                    .unwrap_or_else(|| "-".to_string());
                println!(
                    "{:<5} {:<16} {:<20} {:<20} {}",
                    node.id, node.name, node.mac, role, node.state
                );
            }
            Ok(())
        }
        NodeCommand::Add { env, nodes } => {
            let ids = to_node_ids(&nodes);
            session.service.add_nodes(EnvironmentId(env), &ids).await?;
            println!(
                "{}",
                format!("Nodes {nodes:?} were scheduled for addition to environment {env}.").green()
            );
            Ok(())
        }
        NodeCommand::Remove { env, nodes } => {
            let ids = to_node_ids(&nodes);
            session.service.remove_nodes(EnvironmentId(env), &ids).await?;
            println!(
                "{}",
                format!("Nodes {nodes:?} were scheduled for deletion from environment {env}.")
                    .green()
            );
            Ok(())
        }
        NodeCommand::SetRole { env, role, nodes } => {
            let ids = to_node_ids(&nodes);
            session
                .service
                .assign_role(EnvironmentId(env), &ids, &role)
                .await?;
            println!(
                "{}",
                format!("Role '{role}' was assigned to nodes {nodes:?}.").green()
            );
            Ok(())
        }
    }
}

fn to_node_ids(raw: &[u32]) -> Vec<NodeId> {
    raw.iter().copied().map(NodeId).collect()
}
