//! S3-compatible blob store (AWS S3, MinIO, R2).
//!
//! Each top-level path segment maps to a key prefix inside one bucket, so
//! `user-photos/original/7/a.jpg` is stored under exactly that key.

use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;

use super::{split_path, BlobStore};
use crate::error::StorageError;

pub struct S3BlobStore {
    client: aws_sdk_s3::Client,
    bucket: String,
    public_base_url: String,
}

impl S3BlobStore {
    pub fn new(client: aws_sdk_s3::Client, bucket: String, public_base_url: &str) -> Self {
        Self {
            client,
            bucket,
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Build a client from the ambient AWS configuration.
    ///
    /// A custom `endpoint` switches to path-style addressing, which MinIO
    /// and most S3-compatible services require.
    pub async fn from_env(
        bucket: String,
        region: Option<String>,
        endpoint: Option<String>,
        public_base_url: &str,
    ) -> Self {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
        if let Some(region) = region {
            loader = loader.region(aws_sdk_s3::config::Region::new(region));
        }
        let shared = loader.load().await;

        let mut builder = aws_sdk_s3::config::Builder::from(&shared);
        if let Some(endpoint) = endpoint {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }
        let client = aws_sdk_s3::Client::from_conf(builder.build());
        Self::new(client, bucket, public_base_url)
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn upload(
        &self,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, StorageError> {
        // Validates the shape; the whole path is used as the key.
        split_path(path)?;
        let key = path.trim_start_matches('/');

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(bytes))
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(key, error = %e, "S3 upload failed");
                StorageError::S3(e.to_string())
            })?;

        Ok(self.public_url(path))
    }

    fn public_url(&self, path: &str) -> String {
        format!("{}/{}", self.public_base_url, path.trim_start_matches('/'))
    }
}
