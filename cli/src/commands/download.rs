// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Configuration download command
//!
//! `forge download --env <ID> --scope <SCOPE> [--dir <DIR>]` serializes the
//! environment and writes the documents as YAML files laid out by document
//! key (`deployment_1/compute_2.yaml`, ...).

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Args, ValueEnum};
use colored::Colorize;

use forge_core::application::exporter::ExportService;
use forge_core::domain::document::SerializationScope;
use forge_core::domain::environment::{EnvironmentId, NodeId};
use forge_core::infrastructure::document_writer::FsDocumentWriter;

use crate::session::Session;

#[derive(Clone, Copy, ValueEnum)]
pub enum Scope {
    Network,
    Settings,
    Deployment,
    Provisioning,
    Disks,
    Interfaces,
}

#[derive(Args)]
pub struct DownloadArgs {
    /// Environment id
    #[arg(long)]
    pub env: u32,

    /// Which document set to download
    #[arg(long, value_enum)]
    pub scope: Scope,

    /// Node id (required for disks/interfaces scopes)
    #[arg(long)]
    pub node: Option<u32>,

    /// Destination directory
    #[arg(long, default_value = ".")]
    pub dir: PathBuf,
}

pub async fn handle_command(args: DownloadArgs, session: &Session) -> Result<()> {
    let scope = match args.scope {
        Scope::Network => SerializationScope::Network,
        Scope::Settings => SerializationScope::Settings,
        Scope::Deployment => SerializationScope::Deployment,
        Scope::Provisioning => SerializationScope::Provisioning,
        Scope::Disks => SerializationScope::Disks(required_node(args.node)?),
        Scope::Interfaces => SerializationScope::Interfaces(required_node(args.node)?),
    };

    let exporter = ExportService::new(
        session.repository.clone(),
        Arc::new(FsDocumentWriter::new(args.dir)),
    );
    let written = exporter
        .serialize_and_export(EnvironmentId(args.env), scope)
        .await?;

    for path in &written {
        println!("{}", path.display());
    }
    println!(
        "{}",
        format!("Downloaded {} configuration file(s).", written.len()).green()
    );
    Ok(())
}

fn required_node(node: Option<u32>) -> Result<NodeId> {
    node.map(NodeId)
        .ok_or_else(|| anyhow::anyhow!("--node is required for this scope"))
}
