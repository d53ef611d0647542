//! Supabase Storage REST client.

use async_trait::async_trait;

use super::{split_path, BlobStore};
use crate::error::StorageError;

pub struct SupabaseBlobStore {
    client: reqwest::Client,
    base_url: String,
    service_key: String,
}

impl SupabaseBlobStore {
    pub fn new(client: reqwest::Client, base_url: &str, service_key: String) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            service_key,
        }
    }
}

#[async_trait]
impl BlobStore for SupabaseBlobStore {
    async fn upload(
        &self,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, StorageError> {
        let (bucket, key) = split_path(path)?;
        let response = self
            .client
            .post(format!("{}/storage/v1/object/{bucket}/{key}", self.base_url))
            .bearer_auth(&self.service_key)
            .header("apikey", &self.service_key)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(bytes)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StorageError::Status {
                status: status.as_u16(),
                body,
            });
        }

        tracing::debug!(bucket, key, "Object uploaded");
        Ok(self.public_url(path))
    }

    fn public_url(&self, path: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}",
            self.base_url,
            path.trim_start_matches('/')
        )
    }
}
