use crate::error::PipelineError;
use crate::source::{Fetched, Source};
use std::path::{Path, PathBuf};
use tracing::trace;

/// A spreadsheet file on the local filesystem. Never cached.
#[derive(Debug, Clone)]
pub struct LocalFile {
    path: PathBuf,
}

impl LocalFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait::async_trait]
impl Source for LocalFile {
    fn id(&self) -> String {
        self.path.display().to_string()
    }

    async fn fetch(&self) -> Result<Fetched, PipelineError> {
        trace!("Reading {}", self.path.display());
        // Taken before the read so that a write landing in between is detected as stale.
        let modified = tokio::fs::metadata(&self.path)
            .await
            .and_then(|m| m.modified())
            .map_err(|e| PipelineError::unavailable(self.id(), e))?;
        let bytes = tokio::fs::read(&self.path)
            .await
            .map_err(|e| PipelineError::unavailable(self.id(), e))?;
        Ok(Fetched {
            bytes,
            modified: Some(modified),
        })
    }
}
