//! Garment image retrieval.

use std::time::Duration;

use async_trait::async_trait;

/// Garment images larger than this are refused.
pub const MAX_GARMENT_BYTES: usize = 15 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum GarmentFetchError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("garment host returned HTTP {0}")]
    Status(u16),

    #[error("garment image is {0} bytes, limit is {MAX_GARMENT_BYTES}")]
    TooLarge(usize),

    #[error("garment image is empty")]
    Empty,
}

/// Source of garment image bytes, addressed by URL.
#[async_trait]
pub trait GarmentSource: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, GarmentFetchError>;
}

/// Downloads garment images over HTTP.
pub struct HttpGarmentFetcher {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpGarmentFetcher {
    pub fn new(client: reqwest::Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }
}

#[async_trait]
impl GarmentSource for HttpGarmentFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, GarmentFetchError> {
        let response = self.client.get(url).timeout(self.timeout).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(GarmentFetchError::Status(status.as_u16()));
        }
        if let Some(len) = response.content_length() {
            if len as usize > MAX_GARMENT_BYTES {
                return Err(GarmentFetchError::TooLarge(len as usize));
            }
        }

        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Err(GarmentFetchError::Empty);
        }
        if bytes.len() > MAX_GARMENT_BYTES {
            return Err(GarmentFetchError::TooLarge(bytes.len()));
        }
        Ok(bytes.to_vec())
    }
}
