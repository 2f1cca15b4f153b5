//! Client for a remote snapshot cache service.
//!
//! The service stores opaque bytes under `/snapshots/{key}` and answers
//! liveness probes on `/ping`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client, StatusCode};
use tracing::debug;

use super::{Relation, SnapshotCache};
use crate::error::CacheError;

/// HTTP request timeout in seconds.
/// Snapshots of a two-month window are a few megabytes at most.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Probe timeout in milliseconds.
/// A cache that cannot answer a ping this fast is slower than the store.
const PROBE_TIMEOUT_MS: u64 = 500;

/// Snapshot cache client.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct HttpSnapshotCache {
    client: Client,
    base_url: String,
}

impl HttpSnapshotCache {
    pub fn new(base_url: &str) -> Result<Self, CacheError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn snapshot_url(&self, key: Relation) -> String {
        format!("{}/snapshots/{}", self.base_url, key.key())
    }

    fn ping_url(&self) -> String {
        format!("{}/ping", self.base_url)
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response, CacheError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(CacheError::from_status(status, &body))
        }
    }
}

#[async_trait]
impl SnapshotCache for HttpSnapshotCache {
    async fn get(&self, key: Relation) -> Result<Option<Vec<u8>>, CacheError> {
        let response = self.client.get(self.snapshot_url(key)).send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = Self::check_response(response).await?;
        let bytes = response.bytes().await?;
        Ok(Some(bytes.to_vec()))
    }

    async fn put(&self, key: Relation, value: Vec<u8>) -> Result<(), CacheError> {
        let response = self
            .client
            .put(self.snapshot_url(key))
            .header(header::CONTENT_TYPE, "application/octet-stream")
            .body(value)
            .send()
            .await?;

        Self::check_response(response).await?;
        Ok(())
    }

    async fn available(&self) -> bool {
        let result = self
            .client
            .get(self.ping_url())
            .timeout(Duration::from_millis(PROBE_TIMEOUT_MS))
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => true,
            Ok(response) => {
                debug!(status = %response.status(), "Cache service probe rejected");
                false
            }
            Err(e) => {
                debug!(error = %e, "Cache service probe failed");
                false
            }
        }
    }

    fn backend_type(&self) -> &'static str {
        "http"
    }
}
