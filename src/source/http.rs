use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use log::debug;
use serde_json::Value;

use super::{DocumentSource, decode_document};

/// Fetches `<base_url>/<stem>.json` over HTTP.
pub struct HttpSource {
    base_url: String,
    http_client: reqwest::Client,
}

impl HttpSource {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .user_agent(concat!("esg-questionnaire/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self::with_client(base_url, http_client))
    }

    /// Use a preconfigured client (cheap to clone, shares its pool).
    pub fn with_client(base_url: &str, http_client: reqwest::Client) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http_client,
        }
    }

    pub fn url_for(&self, stem: &str) -> String {
        format!("{}/{}.json", self.base_url, urlencoding::encode(stem))
    }
}

#[async_trait]
impl DocumentSource for HttpSource {
    async fn fetch_rows(&self, stem: &str) -> Result<Vec<Value>> {
        let url = self.url_for(stem);
        debug!("GET {}", url);

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("Failed to fetch {}", url))?;

        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("Fetching {} failed: response not OK ({})", url, status));
        }

        let body = response
            .text()
            .await
            .with_context(|| format!("Failed to read response body from {}", url))?;
        decode_document(&body, &url)
    }

    fn describe(&self) -> String {
        self.base_url.clone()
    }
}
