//! Obtains the raw bytes of the expense spreadsheet and decodes them into `RawTable`s.
//!
//! A source is either a local file or an HTTP(S) URL (for example a spreadsheet published as CSV or
//! XLSX). Remote sources are memoized on disk for a configurable time-to-live; local sources are
//! always read fresh and their modification time is kept for stale-write detection.

mod cache;
mod decode;
mod local;
#[cfg(test)]
pub(crate) mod memory;
mod remote;

pub use cache::SourceCache;
pub use decode::decode;
pub(crate) use decode::sniff_delimiter;
pub use local::LocalFile;
pub use remote::RemoteFile;

use crate::error::PipelineError;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::{Duration, SystemTime};
use tracing::debug;
use url::Url;

/// The bytes of a source as of one fetch.
#[derive(Debug, Clone)]
pub struct Fetched {
    pub bytes: Vec<u8>,
    /// The modification time, for sources that have one (local files).
    pub modified: Option<SystemTime>,
}

/// Something that the spreadsheet bytes can be fetched from.
#[async_trait::async_trait]
pub trait Source: Send + Sync {
    /// A stable identity of the source, used in messages and as the cache key.
    fn id(&self) -> String;

    async fn fetch(&self) -> Result<Fetched, PipelineError>;
}

/// How the bytes of a source are decoded.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceFormat {
    Csv,
    /// Any format `calamine` reads: xlsx, xlsm, xlsb, xls or ods.
    Workbook,
}

serde_plain::derive_display_from_serialize!(SourceFormat);
serde_plain::derive_fromstr_from_deserialize!(SourceFormat);

impl SourceFormat {
    fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "csv" | "txt" => Some(SourceFormat::Csv),
            "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => Some(SourceFormat::Workbook),
            _ => None,
        }
    }

    fn from_query_value(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "csv" => Some(SourceFormat::Csv),
            "xlsx" | "ods" => Some(SourceFormat::Workbook),
            _ => None,
        }
    }
}

/// Where the spreadsheet lives, as configured by the user.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub enum SourceLocation {
    Path(PathBuf),
    Url(Url),
}

impl SourceLocation {
    /// Guesses the format from the file extension or, for URLs, from a `format=` or `output=`
    /// query parameter (the latter is what published Google Sheets use).
    pub fn infer_format(&self) -> Option<SourceFormat> {
        match self {
            SourceLocation::Path(path) => path
                .extension()
                .and_then(|e| e.to_str())
                .and_then(SourceFormat::from_extension),
            SourceLocation::Url(url) => url
                .query_pairs()
                .find(|(k, _)| k == "format" || k == "output")
                .and_then(|(_, v)| SourceFormat::from_query_value(&v))
                .or_else(|| {
                    Path::new(url.path())
                        .extension()
                        .and_then(|e| e.to_str())
                        .and_then(SourceFormat::from_extension)
                }),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        match self {
            SourceLocation::Path(p) => Some(p),
            SourceLocation::Url(_) => None,
        }
    }

    /// A short name for the table, used in reported locations.
    pub fn name(&self) -> String {
        let name = match self {
            SourceLocation::Path(p) => p.file_name().map(|n| n.to_string_lossy().to_string()),
            SourceLocation::Url(u) => u
                .path_segments()
                .and_then(|mut s| s.next_back())
                .filter(|s| !s.is_empty())
                .map(str::to_string),
        };
        name.unwrap_or_else(|| self.to_string())
    }
}

impl FromStr for SourceLocation {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match Url::parse(s) {
            Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {
                Ok(SourceLocation::Url(url))
            }
            _ => Ok(SourceLocation::Path(PathBuf::from(s))),
        }
    }
}

impl Display for SourceLocation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceLocation::Path(p) => write!(f, "{}", p.display()),
            SourceLocation::Url(u) => write!(f, "{u}"),
        }
    }
}

impl Serialize for SourceLocation {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for SourceLocation {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        SourceLocation::from_str(&s).map_err(serde::de::Error::custom)
    }
}

/// Settings for turning a `SourceLocation` into a `Source`.
#[derive(Debug, Clone)]
pub struct Loader {
    cache: SourceCache,
    fetch_timeout: Duration,
    refresh: bool,
}

impl Loader {
    pub fn new(cache: SourceCache, fetch_timeout: Duration) -> Self {
        Self {
            cache,
            fetch_timeout,
            refresh: false,
        }
    }

    /// When `true`, remote sources are downloaded even if a fresh cache entry exists.
    pub fn refresh(mut self, refresh: bool) -> Self {
        self.refresh = refresh;
        self
    }

    /// Local files are read directly. Remote sources are wrapped in the on-disk cache.
    pub fn open(
        &self,
        location: &SourceLocation,
    ) -> Result<Box<dyn Source>, PipelineError> {
        Ok(match location {
            SourceLocation::Path(path) => Box::new(LocalFile::new(path)),
            SourceLocation::Url(url) => {
                let remote = RemoteFile::new(url.clone(), self.fetch_timeout)?;
                Box::new(cache::CachedSource::new(
                    Box::new(remote),
                    self.cache.clone(),
                    self.refresh,
                ))
            }
        })
    }

    pub async fn fetch(&self, location: &SourceLocation) -> Result<Fetched, PipelineError> {
        let source = self.open(location)?;
        debug!("Fetching {}", source.id());
        source.fetch().await
    }
}
