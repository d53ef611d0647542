//! Public blob storage for original and generated images.
//!
//! Object paths are `{bucket}/{folder}/{user}/{uuid}.{ext}`. The first
//! segment selects the bucket; the remainder is the key inside it.

use async_trait::async_trait;

use crate::error::StorageError;

pub mod s3;
pub mod supabase;

pub use s3::S3BlobStore;
pub use supabase::SupabaseBlobStore;

/// A store that accepts bytes and hands back a public URL.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `bytes` at `path` and return its public URL.
    async fn upload(
        &self,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, StorageError>;

    /// Public URL for an object path, whether or not it exists yet.
    fn public_url(&self, path: &str) -> String;
}

/// Split `bucket/key...` into its bucket and key.
pub(crate) fn split_path(path: &str) -> Result<(&str, &str), StorageError> {
    let path = path.trim_start_matches('/');
    match path.split_once('/') {
        Some((bucket, key)) if !bucket.is_empty() && !key.is_empty() => Ok((bucket, key)),
        _ => Err(StorageError::InvalidPath(path.to_string())),
    }
}
