//! Where image bytes come from.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use thiserror::Error;
use tracing::debug;

use crate::config::ImageSettings;
use crate::user_agent::resolve_user_agent;

/// Errors while fetching or storing one photo.
#[derive(Debug, Error)]
pub enum ImageError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP status {0}")]
    Status(u16),

    #[error("not an image (content type {0})")]
    NotImage(String),

    #[error("corrupt image: {0}")]
    Corrupt(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ImageError {
    /// Transport failures and error statuses are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Http(_) | Self::Status(_))
    }
}

/// Body and declared type of a fetched image.
#[derive(Debug, Clone)]
pub struct FetchedImage {
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// Fetches image bytes by URL.
#[async_trait]
pub trait ImageSource: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchedImage, ImageError>;
}

/// HTTP image source backed by reqwest.
#[derive(Clone)]
pub struct HttpImageSource {
    client: Client,
}

impl HttpImageSource {
    pub fn new(settings: &ImageSettings, proxy: Option<&str>) -> Result<Self, ImageError> {
        let user_agent = resolve_user_agent(settings.user_agent.as_deref());
        let mut builder = Client::builder()
            .user_agent(&user_agent)
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .gzip(true)
            .brotli(true);

        if let Some(proxy) = proxy {
            builder = builder.proxy(reqwest::Proxy::all(proxy)?);
        }

        Ok(Self {
            client: builder.build()?,
        })
    }
}

#[async_trait]
impl ImageSource for HttpImageSource {
    async fn fetch(&self, url: &str) -> Result<FetchedImage, ImageError> {
        debug!("GET {}", url);
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ImageError::Status(status.as_u16()));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());
        let bytes = response.bytes().await?.to_vec();

        Ok(FetchedImage {
            content_type,
            bytes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_classification() {
        assert!(ImageError::Status(503).is_retryable());
        assert!(!ImageError::NotImage("text/html".into()).is_retryable());
        assert!(!ImageError::Corrupt("eof".into()).is_retryable());
        assert!(!ImageError::Io(std::io::Error::other("disk")).is_retryable());
    }

    #[test]
    fn test_http_source_builds_with_defaults() {
        assert!(HttpImageSource::new(&ImageSettings::default(), None).is_ok());
    }
}
