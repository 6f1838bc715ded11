// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Embedded service session
//!
//! The `forge` binary runs one-shot commands against an embedded service
//! stack: entity state is loaded from a YAML state file at startup and
//! written back when the command finishes, and deployment-class commands run
//! against the built-in delay backend within the same process.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::debug;

use forge_core::application::environment_service::EnvironmentService;
use forge_core::application::lock_manager::ClusterLockManager;
use forge_core::application::orchestrator::TaskOrchestrator;
use forge_core::infrastructure::event_bus::EventBus;
use forge_core::infrastructure::executor::SleepExecutor;
use forge_core::infrastructure::repositories::{
    InMemoryEnvironmentRepository, RepositorySnapshot,
};

/// Simulated backend work duration per dispatched document.
const BACKEND_DELAY: Duration = Duration::from_secs(1);

pub struct Session {
    state_path: PathBuf,
    pub repository: Arc<InMemoryEnvironmentRepository>,
    pub service: EnvironmentService,
    pub orchestrator: TaskOrchestrator,
    pub lock_manager: Arc<ClusterLockManager>,
    pub event_bus: Arc<EventBus>,
}

impl Session {
    /// Load entity state from `state_path` (or the default location) and
    /// wire the embedded service stack around it.
    pub fn open(state_path: Option<PathBuf>) -> Result<Self> {
        let state_path = match state_path {
            Some(path) => path,
            None => default_state_path(),
        };

        let repository = if state_path.exists() {
            let raw = std::fs::read_to_string(&state_path)
                .with_context(|| format!("Failed to read state file {}", state_path.display()))?;
            let snapshot: RepositorySnapshot = serde_yaml::from_str(&raw)
                .with_context(|| format!("Malformed state file {}", state_path.display()))?;
            debug!(path = %state_path.display(), "Loaded state file");
            Arc::new(InMemoryEnvironmentRepository::restore(snapshot))
        } else {
            debug!(path = %state_path.display(), "No state file yet, starting empty");
            Arc::new(InMemoryEnvironmentRepository::new())
        };

        let event_bus = Arc::new(EventBus::with_default_capacity());
        let executor = Arc::new(SleepExecutor::new(BACKEND_DELAY));
        let orchestrator =
            TaskOrchestrator::new(repository.clone(), executor, event_bus.clone());
        let lock_manager = Arc::new(ClusterLockManager::new(orchestrator.arena()));
        let service = EnvironmentService::new(
            repository.clone(),
            lock_manager.clone(),
            event_bus.clone(),
        );

        Ok(Self {
            state_path,
            repository,
            service,
            orchestrator,
            lock_manager,
            event_bus,
        })
    }

    /// Write the current entity state back to the state file.
    pub fn save(&self) -> Result<()> {
        let snapshot = self.repository.snapshot();
        let raw = serde_yaml::to_string(&snapshot).context("Failed to render state file")?;
        if let Some(parent) = self.state_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create state directory {}", parent.display())
                })?;
            }
        }
        std::fs::write(&self.state_path, raw)
            .with_context(|| format!("Failed to write state file {}", self.state_path.display()))?;
        debug!(path = %self.state_path.display(), "Saved state file");
        Ok(())
    }
}

fn default_state_path() -> PathBuf {
    dirs_next::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("forge")
        .join("state.yaml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_state_round_trips_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.yaml");

        let session = Session::open(Some(path.clone())).unwrap();
        session.service.create_environment("TestEnv", 1).await.unwrap();
        session.save().unwrap();

        let reloaded = Session::open(Some(path)).unwrap();
        let environments = reloaded.service.list_environments().await.unwrap();
        assert_eq!(environments.len(), 1);
        assert_eq!(environments[0].name, "TestEnv");
    }
}
