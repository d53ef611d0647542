//! Try-on provider adapters.
//!
//! Every generative backend has its own contract: one wants inline base64
//! images, one wants public URLs, one wants file uploads followed by an
//! event stream. [`TryOnProvider`] hides those differences behind a single
//! `generate(person, garment, descriptor) -> image bytes` capability.
//!
//! Adapters never enforce their own deadline; the chain wraps each call in
//! [`TryOnProvider::timeout`].

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::ProviderFailure;

pub mod gradio;
pub mod huggingface;
pub mod replicate;

pub use gradio::GradioTryOnProvider;
pub use huggingface::HuggingFaceTryOnProvider;
pub use replicate::ReplicateTryOnProvider;

/// Maximum number of body bytes kept in error messages.
const ERROR_BODY_LIMIT: usize = 512;

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// Everything a provider may need for one generation attempt.
///
/// Both the raw bytes and the public URLs are supplied so each adapter can
/// pick whichever form its backend accepts.
#[derive(Debug, Clone)]
pub struct GenerationInput {
    /// Normalized person photo (canonical JPEG).
    pub person_image: Vec<u8>,
    /// Public URL of the normalized person photo.
    pub person_image_url: String,
    /// Prepared garment image (PNG).
    pub garment_image: Vec<u8>,
    /// Public URL of the product's garment image.
    pub garment_image_url: String,
    /// Free-text description of the garment.
    pub descriptor: String,
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Coarse availability reported by a provider status check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderState {
    /// Accepting requests.
    Ready,
    /// Reachable but warming up (cold model, sleeping space).
    Loading,
    /// Unreachable or misconfigured.
    Error,
}

/// Result of probing one provider.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderStatus {
    pub provider: String,
    pub status: ProviderState,
    pub message: String,
}

impl ProviderStatus {
    pub fn new(provider: &str, status: ProviderState, message: impl Into<String>) -> Self {
        Self {
            provider: provider.to_string(),
            status,
            message: message.into(),
        }
    }

    /// Map an HTTP status-check response code: 2xx is ready, 503 is loading.
    pub fn from_http(provider: &str, code: reqwest::StatusCode) -> Self {
        if code.is_success() {
            Self::new(provider, ProviderState::Ready, "Model is ready")
        } else if code == reqwest::StatusCode::SERVICE_UNAVAILABLE {
            Self::new(provider, ProviderState::Loading, "Model is loading, please wait")
        } else {
            Self::new(
                provider,
                ProviderState::Error,
                format!("Status check returned HTTP {}", code.as_u16()),
            )
        }
    }
}

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// A generative virtual try-on backend.
#[async_trait]
pub trait TryOnProvider: Send + Sync {
    /// Stable identifier, reported as the result `method`.
    fn name(&self) -> &str;

    /// Budget for one `generate` call, including any polling.
    fn timeout(&self) -> Duration;

    /// Produce an image of the person wearing the garment.
    async fn generate(&self, input: &GenerationInput) -> Result<Vec<u8>, ProviderFailure>;

    /// Report availability without generating anything.
    async fn status(&self) -> ProviderStatus {
        ProviderStatus::new(self.name(), ProviderState::Ready, "No status check available")
    }
}

// ---------------------------------------------------------------------------
// Shared HTTP helpers
// ---------------------------------------------------------------------------

/// Return the response unchanged on 2xx, otherwise a `Status` failure
/// carrying a truncated body.
pub(crate) async fn ensure_success(
    response: reqwest::Response,
) -> Result<reqwest::Response, ProviderFailure> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<unreadable body>".to_string());
    Err(ProviderFailure::Status {
        status: status.as_u16(),
        body: truncate(&body, ERROR_BODY_LIMIT),
    })
}

/// Download an image produced by a provider (output URLs, temp files).
pub(crate) async fn download_image(
    client: &reqwest::Client,
    url: &str,
) -> Result<Vec<u8>, ProviderFailure> {
    let response = ensure_success(client.get(url).send().await?).await?;
    let bytes = response.bytes().await?;
    if bytes.is_empty() {
        return Err(ProviderFailure::BadResponse(format!(
            "empty body downloading {url}"
        )));
    }
    Ok(bytes.to_vec())
}

/// Reject JSON bodies returned where raw image bytes were expected.
pub(crate) fn reject_json_body(
    content_type: Option<&str>,
    bytes: &[u8],
) -> Result<(), ProviderFailure> {
    let is_json = content_type.is_some_and(|ct| ct.starts_with("application/json"));
    if is_json {
        return Err(ProviderFailure::BadResponse(truncate(
            &String::from_utf8_lossy(bytes),
            ERROR_BODY_LIMIT,
        )));
    }
    Ok(())
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &s[..end])
}
