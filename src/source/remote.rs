use crate::error::PipelineError;
use crate::source::{Fetched, Source};
use std::time::Duration;
use tracing::{debug, trace};
use url::Url;

/// A spreadsheet downloaded over HTTP(S), e.g. a sheet published to the web as CSV or XLSX.
#[derive(Debug, Clone)]
pub struct RemoteFile {
    url: Url,
    client: reqwest::Client,
}

impl RemoteFile {
    pub fn new(url: Url, timeout: Duration) -> Result<Self, PipelineError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PipelineError::unavailable(url.as_str(), e))?;
        Ok(Self { url, client })
    }
}

#[async_trait::async_trait]
impl Source for RemoteFile {
    fn id(&self) -> String {
        self.url.to_string()
    }

    async fn fetch(&self) -> Result<Fetched, PipelineError> {
        trace!("GET {}", self.url);
        let response = self
            .client
            .get(self.url.clone())
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| PipelineError::unavailable(self.id(), e))?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| PipelineError::unavailable(self.id(), e))?;
        debug!("Downloaded {} bytes from {}", bytes.len(), self.url);
        Ok(Fetched {
            bytes: bytes.to_vec(),
            modified: None,
        })
    }
}
