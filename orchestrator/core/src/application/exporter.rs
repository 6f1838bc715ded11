//! Export Service
//!
//! Composes the configuration serializer with a document writer collaborator.
//! Written relative paths are exactly the document path keys plus a `.yaml`
//! suffix (`network_1.yaml`, `deployment_1/compute_2.yaml`, ...), so an
//! exported tree can be diffed against a previous export.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;

use crate::application::serializer::{ConfigurationSerializer, SerializationError};
use crate::domain::document::SerializationScope;
use crate::domain::environment::EnvironmentId;
use crate::domain::repository::{EnvironmentRepository, RepositoryError};
use crate::infrastructure::document_writer::DocumentWriter;

pub struct ExportService {
    repository: Arc<dyn EnvironmentRepository>,
    writer: Arc<dyn DocumentWriter>,
}

impl ExportService {
    pub fn new(repository: Arc<dyn EnvironmentRepository>, writer: Arc<dyn DocumentWriter>) -> Self {
        Self { repository, writer }
    }

    /// Serialize `environment` under `scope` and hand every document to the
    /// writer. Returns the written paths, in key order.
    pub async fn serialize_and_export(
        &self,
        environment: EnvironmentId,
        scope: SerializationScope,
    ) -> Result<Vec<PathBuf>, ExportError> {
        let env = self.repository.get(environment).await?;
        let nodes = self.repository.nodes_of(environment).await?;
        let documents = ConfigurationSerializer::serialize(&env, &nodes, scope)?;

        let mut written = Vec::with_capacity(documents.len());
        for document in &documents {
            let relative = format!("{}.yaml", document.key.path());
            let body = document.render_yaml()?;
            let path = self
                .writer
                .write(&relative, &body)
                .await
                .map_err(|source| ExportError::Io { path: relative, source })?;
            written.push(path);
        }
        info!(environment = %environment, count = written.len(), "Exported configuration documents");
        Ok(written)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Serialization(#[from] SerializationError),

    #[error("failed to render document: {0}")]
    Render(#[from] serde_yaml::Error),

    #[error("failed to write '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
}
