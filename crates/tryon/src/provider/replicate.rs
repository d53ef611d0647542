//! Replicate predictions adapter.
//!
//! Replicate takes public image URLs rather than bytes. A prediction is
//! created with `Prefer: wait` so short jobs finish in the initial call;
//! longer jobs are polled through `urls.get` until they reach a terminal
//! state. The chain's timeout bounds the whole exchange.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{download_image, ensure_success, GenerationInput, ProviderState, ProviderStatus, TryOnProvider};
use crate::error::ProviderFailure;

/// Default API root.
pub const DEFAULT_BASE_URL: &str = "https://api.replicate.com";

/// Provider identifier.
pub const PROVIDER_NAME: &str = "replicate";

/// OOTDiffusion model version used when none is configured.
pub const DEFAULT_VERSION: &str =
    "9f0868c61af97a96b648554ba6b0e7c45ca6929d3d0826655bb411c23ecd5022";

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Serialize)]
struct CreatePrediction<'a> {
    version: &'a str,
    input: PredictionInput<'a>,
}

#[derive(Debug, Serialize)]
struct PredictionInput<'a> {
    model_image: &'a str,
    garment_image: &'a str,
    description: &'a str,
}

#[derive(Debug, Deserialize)]
struct Prediction {
    id: String,
    status: String,
    #[serde(default)]
    output: Option<serde_json::Value>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    urls: Option<PredictionUrls>,
}

#[derive(Debug, Deserialize)]
struct PredictionUrls {
    get: Option<String>,
}

impl Prediction {
    fn is_terminal(&self) -> bool {
        matches!(self.status.as_str(), "succeeded" | "failed" | "canceled")
    }

    /// First output URL. Models answer with either a string or a list.
    fn output_url(&self) -> Option<&str> {
        match self.output.as_ref()? {
            serde_json::Value::String(url) => Some(url),
            serde_json::Value::Array(items) => items.first()?.as_str(),
            _ => None,
        }
    }
}

/// URL-based adapter over the Replicate predictions API.
pub struct ReplicateTryOnProvider {
    client: reqwest::Client,
    api_token: String,
    version: String,
    base_url: String,
    timeout: Duration,
    poll_interval: Duration,
}

impl ReplicateTryOnProvider {
    pub fn new(
        client: reqwest::Client,
        api_token: String,
        version: String,
        timeout: Duration,
    ) -> Self {
        Self {
            client,
            api_token,
            version,
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    async fn create(&self, input: &GenerationInput) -> Result<Prediction, ProviderFailure> {
        let body = CreatePrediction {
            version: &self.version,
            input: PredictionInput {
                model_image: &input.person_image_url,
                garment_image: &input.garment_image_url,
                description: &input.descriptor,
            },
        };
        let response = self
            .client
            .post(format!("{}/v1/predictions", self.base_url))
            .bearer_auth(&self.api_token)
            .header("Prefer", "wait")
            .json(&body)
            .send()
            .await?;
        parse_prediction(ensure_success(response).await?).await
    }

    async fn poll(&self, mut prediction: Prediction) -> Result<Prediction, ProviderFailure> {
        while !prediction.is_terminal() {
            let url = prediction
                .urls
                .as_ref()
                .and_then(|u| u.get.clone())
                .unwrap_or_else(|| format!("{}/v1/predictions/{}", self.base_url, prediction.id));

            tracing::debug!(prediction_id = %prediction.id, status = %prediction.status, "Polling prediction");
            tokio::time::sleep(self.poll_interval).await;

            let response = self
                .client
                .get(&url)
                .bearer_auth(&self.api_token)
                .send()
                .await?;
            prediction = parse_prediction(ensure_success(response).await?).await?;
        }
        Ok(prediction)
    }
}

async fn parse_prediction(response: reqwest::Response) -> Result<Prediction, ProviderFailure> {
    let text = response.text().await?;
    serde_json::from_str(&text)
        .map_err(|e| ProviderFailure::BadResponse(format!("invalid prediction JSON: {e}")))
}

#[async_trait]
impl TryOnProvider for ReplicateTryOnProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn generate(&self, input: &GenerationInput) -> Result<Vec<u8>, ProviderFailure> {
        let created = self.create(input).await?;
        let prediction = self.poll(created).await?;

        if prediction.status != "succeeded" {
            return Err(ProviderFailure::BadResponse(format!(
                "prediction {} {}: {}",
                prediction.id,
                prediction.status,
                prediction.error.as_deref().unwrap_or("no error message")
            )));
        }

        let url = prediction.output_url().ok_or_else(|| {
            ProviderFailure::BadResponse(format!("prediction {} has no output", prediction.id))
        })?;
        download_image(&self.client, url).await
    }

    async fn status(&self) -> ProviderStatus {
        let result = self
            .client
            .get(format!("{}/v1/account", self.base_url))
            .bearer_auth(&self.api_token)
            .send()
            .await;
        match result {
            Ok(resp) if resp.status().is_success() => {
                ProviderStatus::new(PROVIDER_NAME, ProviderState::Ready, "API token accepted")
            }
            Ok(resp) => ProviderStatus::from_http(PROVIDER_NAME, resp.status()),
            Err(e) => ProviderStatus::new(PROVIDER_NAME, ProviderState::Error, e.to_string()),
        }
    }
}
