//! Network access for the sync engine.
//!
//! The engine only needs "fetch the bytes at this URL, within a timeout".
//! [`HttpTransport`] does that over reqwest; tests substitute a scripted
//! transport.

use crate::config::RemoteConfig;
use crate::utils::errors::{Result, SyncError};
use bytes::Bytes;
use reqwest::Url;
use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// A single timed fetch. Implementations classify failures into the
/// transient (network, timeout, 5xx) and non-transient variants of
/// [`SyncError`]; retrying is the caller's job.
pub trait Transport {
    fn fetch(&self, url: &Url) -> impl Future<Output = Result<Bytes>>;
}

pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("seer-sync/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| SyncError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    pub fn from_config(config: &RemoteConfig) -> Result<Self> {
        Self::new(config.timeout())
    }
}

impl Transport for HttpTransport {
    async fn fetch(&self, url: &Url) -> Result<Bytes> {
        debug!("GET {}", url);
        let response = self.client.get(url.clone()).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        Ok(response.bytes().await?)
    }
}
