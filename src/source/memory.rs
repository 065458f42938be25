//! An in-memory `Source` for tests.

use crate::error::PipelineError;
use crate::source::{Fetched, Source};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Serves fixed bytes, or fails when `bytes` is `None`. Counts how often it was fetched.
#[derive(Debug, Clone)]
pub(crate) struct MemorySource {
    id: String,
    bytes: Option<Vec<u8>>,
    fetches: Arc<AtomicUsize>,
}

impl MemorySource {
    pub(crate) fn new(id: &str, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            id: id.to_string(),
            bytes: Some(bytes.into()),
            fetches: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub(crate) fn failing(id: &str) -> Self {
        Self {
            id: id.to_string(),
            bytes: None,
            fetches: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// A handle on the fetch counter that survives boxing the source.
    pub(crate) fn fetches(&self) -> Arc<AtomicUsize> {
        self.fetches.clone()
    }
}

#[async_trait::async_trait]
impl Source for MemorySource {
    fn id(&self) -> String {
        self.id.clone()
    }

    async fn fetch(&self) -> Result<Fetched, PipelineError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        match &self.bytes {
            Some(bytes) => Ok(Fetched {
                bytes: bytes.clone(),
                modified: None,
            }),
            None => Err(PipelineError::unavailable(&self.id, "connection refused")),
        }
    }
}
