// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Command implementations for the FORGE CLI

pub mod deploy;
pub mod download;
pub mod env;
pub mod node;

pub use self::deploy::{CheckNetworksArgs, DeploymentArgs};
pub use self::download::DownloadArgs;
pub use self::env::EnvCommand;
pub use self::node::NodeCommand;
