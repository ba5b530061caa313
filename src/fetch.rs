//! Abstract JWKS transport, so the cache can be driven by a test double.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::{Error, Result};

pub const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_millis(3000);

#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, uri: &str, timeout: Duration) -> Result<Vec<u8>>;
}

/// JWKS endpoints are fetched over HTTPS only, except for loopback hosts
/// (`localhost`/`127.0.0.1`/`::1`), which are allowed over plain HTTP so a
/// verifier can be pointed at a local test server.
pub fn require_https(uri: &str) -> Result<()> {
    let parsed = url::Url::parse(uri).map_err(|e| Error::NonRetryableFetchError(format!("invalid jwks_uri {uri}: {e}")))?;
    let is_loopback_http = parsed.scheme() == "http"
        && matches!(parsed.host_str(), Some("localhost") | Some("127.0.0.1") | Some("::1"));
    if parsed.scheme() != "https" && !is_loopback_http {
        return Err(Error::NonRetryableFetchError(format!(
            "jwks_uri must use https, got scheme {:?}",
            parsed.scheme()
        )));
    }
    Ok(())
}

#[cfg(feature = "fetch-reqwest")]
pub struct ReqwestFetcher {
    client: reqwest::Client,
}

#[cfg(feature = "fetch-reqwest")]
impl ReqwestFetcher {
    pub fn new() -> Self {
        Self { client: reqwest::Client::new() }
    }
}

#[cfg(feature = "fetch-reqwest")]
impl Default for ReqwestFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "fetch-reqwest")]
#[async_trait]
impl Fetcher for ReqwestFetcher {
    async fn fetch(&self, uri: &str, timeout: Duration) -> Result<Vec<u8>> {
        require_https(uri)?;

        #[cfg(feature = "tracing")]
        tracing::debug!(uri, "fetching jwks");

        let response = self
            .client
            .get(uri)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| Error::FetchError(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Error::NonRetryableFetchError(format!(
                "unexpected status {} fetching {uri}",
                response.status()
            )));
        }

        response.bytes().await.map(|b| b.to_vec()).map_err(|e| Error::FetchError(e.to_string()))
    }
}
