//! Virtual try-on constants, upload validation, and the response envelope.
//!
//! The envelope ([`TryOnResult`]) is the only shape a try-on run ever
//! produces. Terminal failures, degraded runs and full successes all end up
//! here, distinguished by `success`, `method` and `error`.

use std::fmt;

use serde::Serialize;

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Upload limits
// ---------------------------------------------------------------------------

/// Maximum accepted upload size (5 MiB).
pub const MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;

/// Declared content types must start with this prefix.
pub const IMAGE_CONTENT_TYPE_PREFIX: &str = "image/";

// ---------------------------------------------------------------------------
// Result methods
// ---------------------------------------------------------------------------

/// `method` value when the local compositor produced the result.
pub const METHOD_FALLBACK: &str = "fallback-overlay";

/// `method` value when no generated image could be produced at all.
pub const METHOD_ERROR: &str = "error";

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validate an uploaded try-on photo before anything touches the network.
///
/// - The declared content type must begin with `image/`.
/// - The body must be non-empty and at most [`MAX_UPLOAD_BYTES`].
pub fn validate_upload(content_type: &str, size_bytes: usize) -> Result<(), CoreError> {
    if !content_type
        .trim()
        .to_ascii_lowercase()
        .starts_with(IMAGE_CONTENT_TYPE_PREFIX)
    {
        return Err(CoreError::Validation(format!(
            "File must be an image, got content type '{content_type}'"
        )));
    }
    if size_bytes == 0 {
        return Err(CoreError::Validation("Uploaded image is empty".into()));
    }
    if size_bytes > MAX_UPLOAD_BYTES {
        return Err(CoreError::Validation(format!(
            "Image too large: {size_bytes} bytes exceeds the {MAX_UPLOAD_BYTES} byte limit"
        )));
    }
    Ok(())
}

/// Build the text descriptor handed to providers that accept a prompt.
pub fn garment_descriptor(product_name: &str) -> String {
    format!("A person wearing {product_name}, professional clothing fitting room photo")
}

// ---------------------------------------------------------------------------
// Orchestration stages
// ---------------------------------------------------------------------------

/// Stages of a single try-on run, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TryOnStage {
    Validating,
    FetchingProduct,
    PreparingImages,
    UploadingOriginal,
    GeneratingRemote,
    GeneratingFallback,
    PersistingResult,
    Done,
}

impl TryOnStage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Validating => "validating",
            Self::FetchingProduct => "fetching_product",
            Self::PreparingImages => "preparing_images",
            Self::UploadingOriginal => "uploading_original",
            Self::GeneratingRemote => "generating_remote",
            Self::GeneratingFallback => "generating_fallback",
            Self::PersistingResult => "persisting_result",
            Self::Done => "done",
        }
    }
}

impl fmt::Display for TryOnStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// Normalized response for every try-on outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TryOnResult {
    pub success: bool,
    pub original_image: String,
    pub generated_image: String,
    pub product_name: String,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TryOnResult {
    /// A completed run: `method` is the provider name or [`METHOD_FALLBACK`].
    pub fn completed(
        original_image: String,
        generated_image: String,
        product_name: String,
        method: impl Into<String>,
    ) -> Self {
        Self {
            success: true,
            original_image,
            generated_image,
            product_name,
            method: method.into(),
            error: None,
        }
    }

    /// A run that stopped before any image was produced.
    pub fn failed(product_name: Option<String>, error: impl Into<String>) -> Self {
        Self {
            success: false,
            original_image: String::new(),
            generated_image: String::new(),
            product_name: product_name.unwrap_or_default(),
            method: METHOD_ERROR.to_string(),
            error: Some(error.into()),
        }
    }

    /// Downgrade a completed envelope to a failure while keeping its URLs.
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.success = false;
        self.error = Some(error.into());
        self
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
