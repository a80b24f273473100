use crate::sources::traits::SnapshotSource;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, warn};

/// Snapshot served over HTTP
pub struct HttpSource {
    client: Client,
    url: String,
}

impl HttpSource {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl SnapshotSource for HttpSource {
    async fn fetch(&self) -> Result<Vec<u8>> {
        debug!("Fetching URL: {}", self.url);

        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .with_context(|| format!("Failed to fetch {}", self.url))?;

        if !response.status().is_success() {
            warn!("{} returned status: {}", self.url, response.status());
            anyhow::bail!("Failed to fetch {}: {}", self.url, response.status());
        }

        let body = response
            .bytes()
            .await
            .context("Failed to read response body")?;

        debug!("Downloaded {} bytes", body.len());
        Ok(body.to_vec())
    }

    fn describe(&self) -> String {
        self.url.clone()
    }
}
