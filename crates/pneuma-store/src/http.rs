//! # HTTP Content-Store Backend
//!
//! Client for the content-store daemon API:
//!
//! - `POST {base}/api/v0/put` — body is the JSON payload, response is
//!   `{"content_id": "<64-hex>"}`.
//! - `GET {base}/api/v0/get/{content_id}` — payload JSON, or 404.
//! - `GET {base}/api/v0/health` — 200 when the daemon is serving.
//!
//! ## Integrity
//!
//! The daemon's returned content id is verified against the locally
//! computed digest of the canonical payload. A daemon that disagrees about
//! the content address is misconfigured or compromised, and `put` fails
//! loudly rather than anchoring an id the node cannot reproduce.
//!
//! ## Timeout & Retry
//!
//! Each request uses a per-request timeout (configurable, default 30s).
//! Transient transport failures are retried with bounded exponential
//! backoff via the crate's `retry` module.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use pneuma_core::{sha256_digest, CanonicalBytes, ContentDigest};

use crate::retry::retry_send;
use crate::{ContentStore, StoreError};

/// Configuration for the HTTP content-store backend.
#[derive(Debug, Clone)]
pub struct HttpStoreConfig {
    /// Base URL of the daemon (e.g., `http://127.0.0.1:5001`).
    pub base_url: String,
    /// Request timeout in seconds (default: 30).
    pub timeout_secs: u64,
}

impl HttpStoreConfig {
    /// Create a configuration with the default timeout.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout_secs: 30,
        }
    }
}

/// HTTP client for a content-store daemon.
#[derive(Debug)]
pub struct HttpContentStore {
    client: reqwest::Client,
    base_url: String,
}

impl HttpContentStore {
    /// Create a new HTTP backend from configuration.
    pub fn new(config: HttpStoreConfig) -> Result<Self, StoreError> {
        url::Url::parse(&config.base_url)
            .map_err(|e| StoreError::Unavailable(format!("invalid base URL: {e}")))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| StoreError::Unavailable(format!("failed to build HTTP client: {e}")))?;

        let base_url = config.base_url.trim_end_matches('/').to_string();
        Ok(Self { client, base_url })
    }

    async fn check_status(
        resp: reqwest::Response,
        endpoint: &str,
    ) -> Result<reqwest::Response, StoreError> {
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(StoreError::Api {
                endpoint: endpoint.to_string(),
                status,
                body,
            });
        }
        Ok(resp)
    }
}

#[async_trait]
impl ContentStore for HttpContentStore {
    async fn put(&self, value: &Value) -> Result<ContentDigest, StoreError> {
        let canonical = CanonicalBytes::new(value)?;
        let local_digest = sha256_digest(&canonical);

        let endpoint = format!("{}/api/v0/put", self.base_url);
        let resp = retry_send(|| self.client.post(&endpoint).json(value).send())
            .await
            .map_err(|source| StoreError::Http {
                endpoint: endpoint.clone(),
                source,
            })?;
        let resp = Self::check_status(resp, &endpoint).await?;

        #[derive(serde::Deserialize)]
        struct PutResponse {
            content_id: String,
        }
        let put: PutResponse = resp.json().await.map_err(|source| StoreError::Http {
            endpoint: endpoint.clone(),
            source,
        })?;

        let remote_digest = ContentDigest::from_hex(&put.content_id).map_err(|e| {
            StoreError::Integrity(format!("daemon returned malformed content id: {e}"))
        })?;
        if remote_digest != local_digest {
            return Err(StoreError::Integrity(format!(
                "daemon content id {} disagrees with local digest {}",
                remote_digest.to_hex(),
                local_digest.to_hex(),
            )));
        }

        Ok(local_digest)
    }

    async fn get(&self, id: &ContentDigest) -> Result<Option<Value>, StoreError> {
        let endpoint = format!("{}/api/v0/get/{}", self.base_url, id.to_hex());
        let resp = retry_send(|| self.client.get(&endpoint).send())
            .await
            .map_err(|source| StoreError::Http {
                endpoint: endpoint.clone(),
                source,
            })?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let resp = Self::check_status(resp, &endpoint).await?;

        let value: Value = resp.json().await.map_err(|source| StoreError::Http {
            endpoint: endpoint.clone(),
            source,
        })?;
        Ok(Some(value))
    }

    async fn health(&self) -> Result<(), StoreError> {
        let endpoint = format!("{}/api/v0/health", self.base_url);
        let resp = self
            .client
            .get(&endpoint)
            .send()
            .await
            .map_err(|e| StoreError::Unavailable(format!("{endpoint}: {e}")))?;
        Self::check_status(resp, &endpoint).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults() {
        let config = HttpStoreConfig::new("http://127.0.0.1:5001");
        assert_eq!(config.timeout_secs, 30);
    }

    #[test]
    fn rejects_invalid_base_url() {
        let result = HttpContentStore::new(HttpStoreConfig::new("not a url"));
        assert!(result.is_err());
    }

    #[test]
    fn builds_with_valid_config() {
        let store = HttpContentStore::new(HttpStoreConfig::new("http://127.0.0.1:5001/"))
            .expect("should build");
        // Trailing slash is normalized away.
        assert_eq!(store.base_url, "http://127.0.0.1:5001");
    }
}
