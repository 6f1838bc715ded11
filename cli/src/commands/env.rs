// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Environment command implementations
//!
//! # Commands
//!
//! - `forge env create --name <NAME> --release <N>` - Declare an environment
//! - `forge env list` - List declared environments
//! - `forge env show <ID>` - Show one environment
//! - `forge env set <ID> [--name ..] [--mode ..] [--net ..]` - Rename / change modes
//! - `forge env delete <ID>` - Delete an environment
//! - `forge env network <ID> --file <FILE>` - Replace network settings
//! - `forge env attributes <ID> --file <FILE>` - Replace editable attributes

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;

use forge_core::application::environment_service::SetEnvironment;
use forge_core::domain::environment::{DeploymentMode, EnvironmentId, NetworkMode};

use crate::session::Session;

#[derive(Subcommand)]
pub enum EnvCommand {
    /// Declare a new environment
    Create {
        /// Environment name
        #[arg(long)]
        name: String,

        /// Release the environment deploys
        #[arg(long, default_value = "1")]
        release: u32,

        /// Network mode (nova_network, neutron)
        #[arg(long = "net")]
        net: Option<String>,
    },

    /// List declared environments
    List,

    /// Show one environment
    Show {
        /// Environment id
        #[arg(value_name = "ID")]
        id: u32,
    },

    /// Rename an environment or change its deployment mode
    Set {
        /// Environment id
        #[arg(value_name = "ID")]
        id: u32,

        /// New name
        #[arg(long)]
        name: Option<String>,

        /// New deployment mode (ha_compact, multinode)
        #[arg(long)]
        mode: Option<String>,

        /// New network mode (nova_network, neutron)
        #[arg(long = "net")]
        net: Option<String>,
    },

    /// Delete an environment, releasing its nodes
    Delete {
        /// Environment id
        #[arg(value_name = "ID")]
        id: u32,
    },

    /// Replace network settings from a YAML file
    Network {
        /// Environment id
        #[arg(value_name = "ID")]
        id: u32,

        /// Path to the network settings payload
        #[arg(long, value_name = "FILE")]
        file: PathBuf,
    },

    /// Replace editable attributes from a YAML file
    Attributes {
        /// Environment id
        #[arg(value_name = "ID")]
        id: u32,

        /// Path to the attributes payload
        #[arg(long, value_name = "FILE")]
        file: PathBuf,
    },
}

pub async fn handle_command(command: EnvCommand, session: &Session) -> Result<()> {
    match command {
        EnvCommand::Create { name, release, net } => create(session, &name, release, net).await,
        EnvCommand::List => list(session).await,
        EnvCommand::Show { id } => show(session, EnvironmentId(id)).await,
        EnvCommand::Set { id, name, mode, net } => {
            set(session, EnvironmentId(id), name, mode, net).await
        }
        EnvCommand::Delete { id } => delete(session, EnvironmentId(id)).await,
        EnvCommand::Network { id, file } => {
            edit_network(session, EnvironmentId(id), &file).await
        }
        EnvCommand::Attributes { id, file } => {
            edit_attributes(session, EnvironmentId(id), &file).await
        }
    }
}

async fn create(session: &Session, name: &str, release: u32, net: Option<String>) -> Result<()> {
    let mut env = session.service.create_environment(name, release).await?;
    if let Some(net) = net {
        let mode = net.parse::<NetworkMode>().context("Invalid network mode")?;
        env = session.service.set_network_mode(env.id, mode).await?;
    }
    println!(
        "{}",
        format!(
            "Environment '{}' with id={}, mode={} and network-mode={} was created!",
            env.name, env.id, env.deployment_mode, env.network_mode
        )
        .green()
    );
    Ok(())
}

async fn list(session: &Session) -> Result<()> {
    let environments = session.service.list_environments().await?;
    if environments.is_empty() {
        println!("{}", "No environments declared.".yellow());
        return Ok(());
    }
    println!(
        "{:<5} {:<20} {:<12} {:<8} {:<6} {}",
        "id", "name", "mode", "release", "nodes", "locked"
    );
    for env in environments {
        let locked = session.lock_manager.is_locked(env.id);
        println!(
            "{:<5} {:<20} {:<12} {:<8} {:<6} {}",
            env.id,
            env.name,
            env.deployment_mode,
            env.release,
            env.nodes.len(),
            if locked { "yes".red() } else { "no".normal() },
        );
    }
    Ok(())
}

async fn show(session: &Session, id: EnvironmentId) -> Result<()> {
    let env = session.service.get_environment(id).await?;
    println!("id:           {}", env.id);
    println!("name:         {}", env.name);
    println!("release:      {}", env.release);
    println!("mode:         {}", env.deployment_mode);
    println!("network-mode: {}", env.network_mode);
    println!("created:      {}", env.created_at.format("%Y-%m-%d %H:%M:%S UTC"));

    let nodes = session.service.list_nodes(id).await?;
    if nodes.is_empty() {
        println!("nodes:        (none)");
    } else {
        println!("nodes:");
        for node in nodes {
            let role = node
                .role
                .as_ref()
                .map(|r| r.as_str().to_string())
                .unwrap_or_else(|| "-".to_string());
            println!("  {:<5} {:<16} {:<20} {}", node.id, node.name, role, node.state);
        }
    }
    Ok(())
}

async fn set(
    session: &Session,
    id: EnvironmentId,
    name: Option<String>,
    mode: Option<String>,
    net: Option<String>,
) -> Result<()> {
    if name.is_none() && mode.is_none() && net.is_none() {
        anyhow::bail!("Nothing to change: pass --name, --mode and/or --net");
    }
    let mode = mode
        .map(|m| m.parse::<DeploymentMode>())
        .transpose()
        .context("Invalid deployment mode")?;
    let net = net
        .map(|n| n.parse::<NetworkMode>())
        .transpose()
        .context("Invalid network mode")?;

    let renamed = name.clone();
    if name.is_some() || mode.is_some() {
        session
            .service
            .set_environment(id, SetEnvironment { name, mode })
            .await?;
    }
    if let Some(net) = net {
        session.service.set_network_mode(id, net).await?;
        println!(
            "{}",
            format!("Environment with id={id} network mode was set to '{net}'.").green()
        );
    }

    if let Some(new_name) = renamed {
        println!(
            "{}",
            format!("Environment with id={id} was renamed to '{new_name}'.").green()
        );
    }
    if let Some(mode) = mode {
        println!(
            "{}",
            format!("Environment with id={id} mode was set to '{mode}'.").green()
        );
    }
    Ok(())
}

async fn delete(session: &Session, id: EnvironmentId) -> Result<()> {
    session.service.delete_environment(id).await?;
    println!("{}", format!("Environment with id={id} was deleted.").green());
    Ok(())
}

async fn edit_network(session: &Session, id: EnvironmentId, file: &PathBuf) -> Result<()> {
    let payload = read_yaml(file)?;
    session.service.edit_network(id, payload).await?;
    println!(
        "{}",
        format!("Network settings for environment {id} were updated.").green()
    );
    Ok(())
}

async fn edit_attributes(session: &Session, id: EnvironmentId, file: &PathBuf) -> Result<()> {
    let payload = read_yaml(file)?;
    session.service.edit_attributes(id, payload).await?;
    println!(
        "{}",
        format!("Attributes for environment {id} were updated.").green()
    );
    Ok(())
}

fn read_yaml(file: &PathBuf) -> Result<serde_json::Value> {
    let raw = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let payload: serde_json::Value =
        serde_yaml::from_str(&raw).with_context(|| format!("Malformed YAML in {}", file.display()))?;
    Ok(payload)
}
