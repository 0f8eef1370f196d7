use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{CACHE_CONTROL, PRAGMA};
use serde_json::Value;
use tracing::{debug, info};
use url::Url;

use crate::error::{PassportError, Result};

/// Source of static site artifacts.
#[async_trait]
pub trait Fetch: Send + Sync {
    /// Body of the resource at `url`. Non-success statuses are errors.
    async fn fetch_text(&self, url: &Url) -> Result<String>;
}

/// Fetches `http(s)://` resources with caching disabled and reads `file://` ones from disk.
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PassportError::Transport {
                path: "<client>".into(),
                reason: e.to_string(),
            })?;
        Ok(HttpFetcher { client })
    }

    async fn fetch_http(&self, url: &Url) -> Result<String> {
        let transport = |e: reqwest::Error| PassportError::Transport {
            path: url.to_string(),
            reason: e.to_string(),
        };

        let response = self
            .client
            .get(url.clone())
            .header(CACHE_CONTROL, "no-store")
            .header(PRAGMA, "no-cache")
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(PassportError::ResourceUnavailable {
                path: url.to_string(),
                status: status.as_u16(),
            });
        }
        response.text().await.map_err(transport)
    }

    async fn fetch_file(&self, url: &Url) -> Result<String> {
        let path = url.to_file_path().map_err(|_| PassportError::InvalidLocation(url.to_string()))?;
        tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| PassportError::Transport {
                path: path.display().to_string(),
                reason: e.to_string(),
            })
    }
}

#[async_trait]
impl Fetch for HttpFetcher {
    async fn fetch_text(&self, url: &Url) -> Result<String> {
        info!("Fetching {}", url);
        let body = match url.scheme() {
            "http" | "https" => self.fetch_http(url).await?,
            "file" => self.fetch_file(url).await?,
            other => {
                return Err(PassportError::Transport {
                    path: url.to_string(),
                    reason: format!("unsupported scheme '{other}'"),
                })
            }
        };
        debug!(bytes = body.len(), "Fetched {}", url);
        Ok(body)
    }
}

/// Fetch and parse a JSON document.
pub async fn fetch_json<F: Fetch + ?Sized>(fetcher: &F, url: &Url) -> Result<Value> {
    let body = fetcher.fetch_text(url).await?;
    serde_json::from_str(&body).map_err(|e| PassportError::MalformedDocument {
        path: url.to_string(),
        reason: e.to_string(),
    })
}
