//! Error types for the try-on pipeline.
//!
//! Only [`TryOnError`] ever leaves the orchestrator, and only for runs that
//! stop before the original image is committed to blob storage. Provider,
//! composition and post-commit storage failures are absorbed into the
//! response envelope.

use std::time::Duration;

use atelier_core::error::CoreError;
use atelier_core::tryon::TryOnStage;
use atelier_core::types::DbId;

// ---------------------------------------------------------------------------
// Provider errors
// ---------------------------------------------------------------------------

/// Why a single provider attempt failed.
#[derive(Debug, thiserror::Error)]
pub enum ProviderFailure {
    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The provider returned a non-2xx status code.
    #[error("provider returned HTTP {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Raw response body (truncated) for debugging.
        body: String,
    },

    /// The provider did not answer within its budget.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// The response parsed but did not have the expected shape.
    #[error("unexpected response: {0}")]
    BadResponse(String),

    /// The provider returned bytes that do not decode as an image.
    #[error("response is not a decodable image")]
    NotAnImage,

    /// The chain's generation budget ran out before this provider's turn.
    #[error("skipped, generation budget exhausted")]
    BudgetExhausted,
}

/// A failed attempt against one named provider.
#[derive(Debug, thiserror::Error)]
#[error("provider '{provider}' failed: {cause}")]
pub struct ProviderError {
    pub provider: String,
    #[source]
    pub cause: ProviderFailure,
}

// ---------------------------------------------------------------------------
// Storage errors
// ---------------------------------------------------------------------------

/// Failures from a blob store backend.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("storage returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("S3 upload failed: {0}")]
    S3(String),

    #[error("invalid object path '{0}'")]
    InvalidPath(String),

    #[error("upload timed out after {0:?}")]
    Timeout(Duration),

    /// The detached upload task panicked or was aborted.
    #[error("upload task failed: {0}")]
    Task(String),
}

// ---------------------------------------------------------------------------
// Collaborator errors
// ---------------------------------------------------------------------------

/// Failures from the catalog or history collaborators.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

// ---------------------------------------------------------------------------
// Terminal orchestrator errors
// ---------------------------------------------------------------------------

/// A try-on run that stopped before any image was produced.
#[derive(Debug, thiserror::Error)]
pub enum TryOnError {
    /// Bad content type, oversized, undecodable, or too-small upload.
    #[error("{0}")]
    Validation(String),

    /// The requested product does not exist.
    #[error("Product with id {0} not found")]
    ProductNotFound(DbId),

    /// The product's garment image could not be downloaded or decoded.
    #[error("Failed to fetch garment image: {reason}")]
    AssetFetch { product_name: String, reason: String },

    /// The catalog could not be queried.
    #[error("Catalog lookup failed: {0}")]
    Catalog(#[from] StoreError),

    /// The normalized original image could not be stored.
    #[error("Failed to store original image: {0}")]
    Storage(#[from] StorageError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl TryOnError {
    /// The stage the run was in when it stopped.
    pub fn stage(&self) -> TryOnStage {
        match self {
            Self::Validation(_) => TryOnStage::Validating,
            Self::ProductNotFound(_) | Self::Catalog(_) => TryOnStage::FetchingProduct,
            Self::AssetFetch { .. } | Self::Internal(_) => TryOnStage::PreparingImages,
            Self::Storage(_) => TryOnStage::UploadingOriginal,
        }
    }

    /// Name of the product, when the run got far enough to look it up.
    pub fn product_name(&self) -> Option<&str> {
        match self {
            Self::AssetFetch { product_name, .. } => Some(product_name),
            _ => None,
        }
    }
}

impl From<CoreError> for TryOnError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Validation(msg) => Self::Validation(msg),
            CoreError::NotFound { id, .. } => Self::ProductNotFound(id),
            other => Self::Internal(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_display_names_provider() {
        let err = ProviderError {
            provider: "idm-vton".into(),
            cause: ProviderFailure::Status {
                status: 503,
                body: "Model is loading".into(),
            },
        };
        assert_eq!(
            err.to_string(),
            "provider 'idm-vton' failed: provider returned HTTP 503: Model is loading"
        );
    }

    #[test]
    fn timeout_display() {
        let err = ProviderFailure::Timeout(Duration::from_secs(60));
        assert_eq!(err.to_string(), "timed out after 60s");
    }

    #[test]
    fn core_validation_maps_to_validation() {
        let err: TryOnError = CoreError::Validation("too big".into()).into();
        assert!(matches!(err, TryOnError::Validation(ref m) if m == "too big"));
        assert_eq!(err.stage(), TryOnStage::Validating);
    }

    #[test]
    fn core_not_found_maps_to_product_not_found() {
        let err: TryOnError = CoreError::NotFound {
            entity: "Product",
            id: 9,
        }
        .into();
        assert_eq!(err.to_string(), "Product with id 9 not found");
    }

    #[test]
    fn storage_error_stops_at_original_upload() {
        let err = TryOnError::Storage(StorageError::Timeout(Duration::from_secs(30)));
        assert_eq!(err.stage(), TryOnStage::UploadingOriginal);
        assert_eq!(
            err.to_string(),
            "Failed to store original image: upload timed out after 30s"
        );
        assert_eq!(err.product_name(), None);
    }

    #[test]
    fn asset_fetch_carries_product_name() {
        let err = TryOnError::AssetFetch {
            product_name: "Red Jacket".into(),
            reason: "garment host returned HTTP 404".into(),
        };
        assert_eq!(err.product_name(), Some("Red Jacket"));
        assert_eq!(
            err.to_string(),
            "Failed to fetch garment image: garment host returned HTTP 404"
        );
    }
}
