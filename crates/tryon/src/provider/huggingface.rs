//! Hugging Face Inference API adapter (IDM-VTON).
//!
//! Contract: `POST {model_url}` with a bearer token and a JSON body carrying
//! both images inline as base64. A successful call answers with raw image
//! bytes; a cold model answers 503 with a JSON body.

use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Serialize;

use super::{ensure_success, reject_json_body, GenerationInput, ProviderStatus, TryOnProvider};
use crate::error::ProviderFailure;

/// Default hosted IDM-VTON model endpoint.
pub const DEFAULT_MODEL_URL: &str = "https://api-inference.huggingface.co/models/yisol/IDM-VTON";

/// Provider identifier.
pub const PROVIDER_NAME: &str = "idm-vton";

#[derive(Debug, Serialize)]
struct InferenceRequest<'a> {
    inputs: InferenceInputs<'a>,
}

#[derive(Debug, Serialize)]
struct InferenceInputs<'a> {
    person_image: String,
    garment_image: String,
    description: &'a str,
}

/// Inline-bytes adapter over the Hugging Face Inference API.
pub struct HuggingFaceTryOnProvider {
    client: reqwest::Client,
    api_key: String,
    model_url: String,
    timeout: Duration,
}

impl HuggingFaceTryOnProvider {
    pub fn new(
        client: reqwest::Client,
        api_key: String,
        model_url: String,
        timeout: Duration,
    ) -> Self {
        Self {
            client,
            api_key,
            model_url,
            timeout,
        }
    }

    fn request_body<'a>(input: &'a GenerationInput) -> InferenceRequest<'a> {
        InferenceRequest {
            inputs: InferenceInputs {
                person_image: STANDARD.encode(&input.person_image),
                garment_image: STANDARD.encode(&input.garment_image),
                description: &input.descriptor,
            },
        }
    }
}

#[async_trait]
impl TryOnProvider for HuggingFaceTryOnProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn generate(&self, input: &GenerationInput) -> Result<Vec<u8>, ProviderFailure> {
        let response = self
            .client
            .post(&self.model_url)
            .bearer_auth(&self.api_key)
            .json(&Self::request_body(input))
            .send()
            .await?;
        let response = ensure_success(response).await?;

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let bytes = response.bytes().await?;
        reject_json_body(content_type.as_deref(), &bytes)?;
        Ok(bytes.to_vec())
    }

    async fn status(&self) -> ProviderStatus {
        match self
            .client
            .head(&self.model_url)
            .bearer_auth(&self.api_key)
            .send()
            .await
        {
            Ok(resp) => ProviderStatus::from_http(PROVIDER_NAME, resp.status()),
            Err(e) => ProviderStatus::new(PROVIDER_NAME, super::ProviderState::Error, e.to_string()),
        }
    }
}
