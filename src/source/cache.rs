use crate::error::PipelineError;
use crate::source::{Fetched, Source};
use crate::{utils, Result};
use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

/// Remote downloads stored on disk, one `{key}.bin` with the bytes and one `{key}.json` with
/// metadata per source. The key is a UUID v5 of the source identity, so the same URL always maps
/// to the same files.
#[derive(Debug, Clone)]
pub struct SourceCache {
    dir: PathBuf,
    ttl: Duration,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheMeta {
    source: String,
    fetched_at: DateTime<Utc>,
    len: usize,
}

impl SourceCache {
    pub fn new(dir: impl Into<PathBuf>, ttl: Duration) -> Self {
        Self {
            dir: dir.into(),
            ttl,
        }
    }

    pub fn key(source_id: &str) -> Uuid {
        Uuid::new_v5(&Uuid::NAMESPACE_URL, source_id.as_bytes())
    }

    fn paths(&self, source_id: &str) -> (PathBuf, PathBuf) {
        let key = Self::key(source_id);
        (
            self.dir.join(format!("{key}.bin")),
            self.dir.join(format!("{key}.json")),
        )
    }

    /// The cached bytes of `source_id` if they were fetched less than the time-to-live before
    /// `now`. A missing, expired, or unreadable entry is a miss.
    pub async fn get(&self, source_id: &str, now: DateTime<Utc>) -> Option<Vec<u8>> {
        let (bin, meta) = self.paths(source_id);
        let meta: CacheMeta = match utils::deserialize(&meta).await {
            Ok(meta) => meta,
            Err(_) => {
                debug!("No cache entry for {source_id}");
                return None;
            }
        };
        let age = now.signed_duration_since(meta.fetched_at);
        // A timestamp in the future means the clock moved backwards; do not trust the entry.
        let fresh = age.to_std().is_ok_and(|age| age < self.ttl);
        if !fresh {
            debug!("Cache entry for {source_id} is stale ({}s old)", age.num_seconds());
            return None;
        }
        match utils::read_bytes(&bin).await {
            Ok(bytes) if bytes.len() == meta.len => {
                debug!("Using cached copy of {source_id} from {}", meta.fetched_at);
                Some(bytes)
            }
            Ok(_) => {
                warn!("The cached copy of {source_id} is truncated, ignoring it");
                None
            }
            Err(e) => {
                warn!("Unable to read the cached copy of {source_id}: {e:#}");
                None
            }
        }
    }

    pub async fn put(&self, source_id: &str, bytes: &[u8], now: DateTime<Utc>) -> Result<()> {
        utils::make_dir(&self.dir).await?;
        let (bin, meta_path) = self.paths(source_id);
        let meta = CacheMeta {
            source: source_id.to_string(),
            fetched_at: now,
            len: bytes.len(),
        };
        // Bytes first, so that a metadata file never describes missing data.
        utils::write(&bin, bytes).await?;
        let json =
            serde_json::to_string_pretty(&meta).context("Failed to serialize cache metadata")?;
        utils::write(&meta_path, json).await
    }
}

/// Wraps a remote `Source` with the on-disk cache.
pub(super) struct CachedSource {
    inner: Box<dyn Source>,
    cache: SourceCache,
    refresh: bool,
}

impl CachedSource {
    pub(super) fn new(inner: Box<dyn Source>, cache: SourceCache, refresh: bool) -> Self {
        Self {
            inner,
            cache,
            refresh,
        }
    }
}

#[async_trait::async_trait]
impl Source for CachedSource {
    fn id(&self) -> String {
        self.inner.id()
    }

    async fn fetch(&self) -> std::result::Result<Fetched, PipelineError> {
        let id = self.inner.id();
        if !self.refresh {
            if let Some(bytes) = self.cache.get(&id, Utc::now()).await {
                return Ok(Fetched {
                    bytes,
                    modified: None,
                });
            }
        }
        let fetched = self.inner.fetch().await?;
        if let Err(e) = self.cache.put(&id, &fetched.bytes, Utc::now()).await {
            warn!("Unable to cache {id}: {e:#}");
        }
        Ok(fetched)
    }
}
