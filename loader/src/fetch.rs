//! Fetching raw bytes from resource locations.

use async_trait::async_trait;
use reqwest::{Client, ClientBuilder};
use std::time::Duration;
use tracing::debug;

use crate::error::{LoaderError, LoaderResult};
use crate::resource::ResourceLocation;

/// Fetches the bytes stored at a location.
#[async_trait]
pub trait ResourceFetcher: Send + Sync {
    async fn fetch(&self, location: &ResourceLocation) -> LoaderResult<Vec<u8>>;
}

/// Fetcher handling HTTP(S), local files and embedded payloads.
pub struct DefaultFetcher {
    client: Client,
}

impl DefaultFetcher {
    /// Create a fetcher whose HTTP requests time out after `timeout`.
    pub fn new(timeout: Duration) -> LoaderResult<Self> {
        Self::with_client_builder(
            Client::builder()
                .timeout(timeout)
                .user_agent(concat!("pivotfx/", env!("CARGO_PKG_VERSION"))),
        )
    }

    pub fn with_client_builder(builder: ClientBuilder) -> LoaderResult<Self> {
        let client = builder
            .build()
            .map_err(|e| LoaderError::InvalidConfig(format!("HTTP client: {e}")))?;
        Ok(Self { client })
    }

    async fn fetch_http(&self, url: &reqwest::Url) -> LoaderResult<Vec<u8>> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| LoaderError::fetch(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(LoaderError::fetch(url, format!("HTTP {status}")));
        }

        let body = response.bytes().await.map_err(|e| LoaderError::fetch(url, e))?;
        debug!(url = %url, bytes = body.len(), "Fetched remote resource");
        Ok(body.to_vec())
    }
}

#[async_trait]
impl ResourceFetcher for DefaultFetcher {
    async fn fetch(&self, location: &ResourceLocation) -> LoaderResult<Vec<u8>> {
        match location {
            ResourceLocation::Http(url) => self.fetch_http(url).await,
            ResourceLocation::File(path) => tokio::fs::read(path)
                .await
                .map_err(|e| LoaderError::fetch(location, e)),
            ResourceLocation::Embedded { data, .. } => Ok(data.to_vec()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[tokio::test]
    async fn test_fetch_file_and_embedded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rates.tsv");
        std::fs::write(&path, b"Currency\tJanuary 02, 2024").unwrap();

        let fetcher = DefaultFetcher::new(Duration::from_secs(1)).unwrap();

        let data = fetcher.fetch(&ResourceLocation::File(path)).await.unwrap();
        assert!(data.starts_with(b"Currency"));

        let embedded = ResourceLocation::embedded("sample", b"payload");
        assert_eq!(fetcher.fetch(&embedded).await.unwrap(), b"payload".to_vec());
    }

    #[tokio::test]
    async fn test_fetch_missing_file_is_fetch_error() {
        let fetcher = DefaultFetcher::new(Duration::from_secs(1)).unwrap();
        let missing = ResourceLocation::File(PathBuf::from("/definitely/not/here.xml"));

        let result = fetcher.fetch(&missing).await;
        assert!(matches!(result, Err(LoaderError::Fetch { .. })));
    }

    #[test]
    fn test_client_build_failure_is_reported() {
        let builder = Client::builder().user_agent("broken\nagent");
        let result = DefaultFetcher::with_client_builder(builder);
        assert!(matches!(result, Err(LoaderError::InvalidConfig(_))));
    }
}
