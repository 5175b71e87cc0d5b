// src/pipeline/fetch.rs

//! Source dataset download.

use async_trait::async_trait;
use reqwest::Client;

use crate::config::SourceConfig;
use crate::error::{FetchError, Result};
use crate::utils::http;

/// Capability to retrieve the complete raw dataset as text.
///
/// All-or-nothing: no partial or streamed results. Any `FetchError` is fatal
/// for the current run and persisted state is never touched on that path.
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    async fn fetch(&self) -> std::result::Result<String, FetchError>;
}

/// Fetcher for the published CSV over HTTPS.
pub struct HttpFetcher {
    client: Client,
    url: String,
}

impl HttpFetcher {
    /// Create a fetcher from an already-configured client.
    pub fn new(client: Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }

    /// Build the client (user-agent, finite timeout) and fetcher from config.
    pub fn from_config(config: &SourceConfig) -> Result<Self> {
        let client = http::create_async_client(config)?;
        Ok(Self::new(client, config.url.clone()))
    }
}

#[async_trait]
impl SourceFetcher for HttpFetcher {
    async fn fetch(&self) -> std::result::Result<String, FetchError> {
        let response = self.client.get(&self.url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status { status });
        }

        let text = response.text().await?;
        log::debug!("Downloaded {} bytes from {}", text.len(), self.url);
        Ok(text)
    }
}
