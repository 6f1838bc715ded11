// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # FORGE Deployment Manager CLI
//!
//! The `forge` binary manages declared environments, their node membership
//! and deployment-class operations against an embedded service stack.
//!
//! ## Architecture
//!
//! Commands are one-shot: entity state is loaded from a YAML state file at
//! startup and written back on exit, and provisioning/deployment runs to a
//! terminal status within the same process against the built-in backend.
//!
//! ## Commands
//!
//! - `forge env create|list|show|set|delete|network|attributes` - Environments
//! - `forge node register|show|list|add|remove|set-role` - Node membership
//! - `forge provision|deploy|check-networks` - Deployment operations
//! - `forge download` - Export configuration documents

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

mod commands;
mod session;

use commands::{CheckNetworksArgs, DeploymentArgs, DownloadArgs, EnvCommand, NodeCommand};
use session::Session;

/// FORGE deployment manager - declare environments and deploy them
#[derive(Parser)]
#[command(name = "forge")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to the state file (overrides the default location)
    #[arg(
        short,
        long,
        global = true,
        env = "FORGE_STATE_PATH",
        value_name = "FILE"
    )]
    state: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "FORGE_LOG_LEVEL", default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage environments
    #[command(name = "env")]
    Env {
        #[command(subcommand)]
        command: EnvCommand,
    },

    /// Manage nodes and membership
    #[command(name = "node")]
    Node {
        #[command(subcommand)]
        command: NodeCommand,
    },

    /// Provision nodes
    #[command(name = "provision")]
    Provision {
        #[command(flatten)]
        args: DeploymentArgs,
    },

    /// Deploy nodes
    #[command(name = "deploy")]
    Deploy {
        #[command(flatten)]
        args: DeploymentArgs,
    },

    /// Run network verification
    #[command(name = "check-networks")]
    CheckNetworks {
        #[command(flatten)]
        args: CheckNetworksArgs,
    },

    /// Download configuration documents
    #[command(name = "download")]
    Download {
        #[command(flatten)]
        args: DownloadArgs,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(&cli.log_level)?;

    let Some(command) = cli.command else {
        eprintln!("{}", "No command specified. Use --help for usage.".yellow());
        std::process::exit(1);
    };

    let session = Session::open(cli.state)?;
    let result = dispatch(command, &session).await;
    // Persist whatever the command changed, even when it failed partway.
    session.save()?;
    result
}

async fn dispatch(command: Commands, session: &Session) -> Result<()> {
    match command {
        Commands::Env { command } => commands::env::handle_command(command, session).await,
        Commands::Node { command } => commands::node::handle_command(command, session).await,
        Commands::Provision { args } => commands::deploy::provision(args, session).await,
        Commands::Deploy { args } => commands::deploy::deploy(args, session).await,
        Commands::CheckNetworks { args } => {
            commands::deploy::check_networks(args, session).await
        }
        Commands::Download { args } => commands::download::handle_command(args, session).await,
    }
}

/// Initialize tracing subscriber for logging
fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();

    Ok(())
}
