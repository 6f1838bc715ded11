// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Document Writer
//!
//! Seam between the export service and the filesystem. `relative_path`
//! follows the document key scheme and may contain subdirectories
//! (`deployment_1/compute_2.yaml`), which the filesystem writer creates
//! on demand.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

#[async_trait]
pub trait DocumentWriter: Send + Sync {
    /// Write `contents` at `relative_path` under the writer's root.
    /// Returns the absolute path written.
    async fn write(&self, relative_path: &str, contents: &str)
        -> Result<PathBuf, std::io::Error>;
}

pub struct FsDocumentWriter {
    root: PathBuf,
}

impl FsDocumentWriter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl DocumentWriter for FsDocumentWriter {
    async fn write(
        &self,
        relative_path: &str,
        contents: &str,
    ) -> Result<PathBuf, std::io::Error> {
        let path = self.root.join(relative_path);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, contents).await?;
        debug!(path = %path.display(), "Wrote configuration document");
        Ok(path)
    }
}
