//! Sub-resource fetching
//!
//! `http(s)://` locations are downloaded with reqwest; anything else is read
//! from disk, relative to the configured image root when not absolute.

use crate::models::SubResourceRef;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP {status} fetching {location}")]
    Http { status: u16, location: String },

    #[error("network error fetching {location}: {message}")]
    Network { location: String, message: String },

    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{0} is empty")]
    Empty(String),
}

#[async_trait]
pub trait SubResourceFetcher: Send + Sync {
    async fn fetch(&self, sub_resource: &SubResourceRef) -> Result<Vec<u8>, FetchError>;
}

pub struct HttpSubResourceFetcher {
    http_client: reqwest::Client,
    image_root: Option<PathBuf>,
    timeout: Duration,
}

impl HttpSubResourceFetcher {
    pub fn new(image_root: Option<PathBuf>, timeout: Duration) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            image_root,
            timeout,
        }
    }

    fn local_path(&self, location: &str) -> PathBuf {
        let path = Path::new(location);
        match &self.image_root {
            Some(root) if path.is_relative() => root.join(path),
            _ => path.to_path_buf(),
        }
    }

    async fn fetch_remote(&self, location: &str) -> Result<Vec<u8>, FetchError> {
        let network = |e: reqwest::Error| FetchError::Network {
            location: location.to_string(),
            message: e.to_string(),
        };

        let response = self
            .http_client
            .get(location)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(network)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Http {
                status: status.as_u16(),
                location: location.to_string(),
            });
        }

        Ok(response.bytes().await.map_err(network)?.to_vec())
    }
}

#[async_trait]
impl SubResourceFetcher for HttpSubResourceFetcher {
    async fn fetch(&self, sub_resource: &SubResourceRef) -> Result<Vec<u8>, FetchError> {
        let bytes = if sub_resource.is_remote() {
            self.fetch_remote(&sub_resource.location).await?
        } else {
            let path = self.local_path(&sub_resource.location);
            tokio::fs::read(&path)
                .await
                .map_err(|source| FetchError::Io { path, source })?
        };

        if bytes.is_empty() {
            return Err(FetchError::Empty(sub_resource.location.clone()));
        }
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_reads_relative_path_under_image_root() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("a.jpg"), b"\xFF\xD8jpeg").unwrap();

        let fetcher = HttpSubResourceFetcher::new(
            Some(temp_dir.path().to_path_buf()),
            Duration::from_secs(5),
        );
        let bytes = fetcher.fetch(&SubResourceRef::new("a.jpg")).await.unwrap();
        assert_eq!(bytes, b"\xFF\xD8jpeg");
    }

    #[tokio::test]
    async fn test_absolute_path_ignores_image_root() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("b.png");
        std::fs::write(&path, b"png").unwrap();

        let fetcher =
            HttpSubResourceFetcher::new(Some(PathBuf::from("/nonexistent")), Duration::from_secs(5));
        let location = path.to_string_lossy().to_string();
        assert_eq!(
            fetcher.fetch(&SubResourceRef::new(location)).await.unwrap(),
            b"png"
        );
    }

    #[tokio::test]
    async fn test_missing_and_empty_files_fail() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("empty.jpg"), b"").unwrap();
        let fetcher = HttpSubResourceFetcher::new(
            Some(temp_dir.path().to_path_buf()),
            Duration::from_secs(5),
        );

        let err = fetcher
            .fetch(&SubResourceRef::new("missing.jpg"))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Io { .. }));

        let err = fetcher
            .fetch(&SubResourceRef::new("empty.jpg"))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Empty(_)));
    }
}
