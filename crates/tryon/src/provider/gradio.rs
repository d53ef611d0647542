//! Gradio Space adapter (hosted IDM-VTON demo).
//!
//! The Space API is a three step exchange:
//!
//! 1. `POST /gradio_api/upload` with both images as multipart `files`,
//!    answering with server-side temp paths.
//! 2. `POST /gradio_api/call/tryon` with the positional inputs, answering
//!    with an `event_id`.
//! 3. `GET /gradio_api/call/tryon/{event_id}`, a server-sent event stream
//!    that ends with either `event: complete` or `event: error`.
//!
//! The first output of the completed event is downloaded as the result.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use serde_json::{json, Value};

use super::{download_image, ensure_success, GenerationInput, ProviderState, ProviderStatus, TryOnProvider};
use crate::error::ProviderFailure;

/// Default public Space.
pub const DEFAULT_SPACE_URL: &str = "https://yisol-idm-vton.hf.space";

/// Provider identifier.
pub const PROVIDER_NAME: &str = "gradio";

/// Default denoising steps.
pub const DEFAULT_STEPS: u32 = 30;

/// Default seed. Fixed so repeated requests are reproducible.
pub const DEFAULT_SEED: i64 = 42;

#[derive(Debug, Deserialize)]
struct CallResponse {
    event_id: String,
}

/// Terminal event parsed from the result stream.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum SseOutcome {
    Complete(Value),
    Error(String),
}

/// Adapter over a Gradio Space running the try-on demo.
pub struct GradioTryOnProvider {
    client: reqwest::Client,
    space_url: String,
    timeout: Duration,
    steps: u32,
    seed: i64,
}

impl GradioTryOnProvider {
    pub fn new(client: reqwest::Client, space_url: String, timeout: Duration) -> Self {
        Self {
            client,
            space_url: space_url.trim_end_matches('/').to_string(),
            timeout,
            steps: DEFAULT_STEPS,
            seed: DEFAULT_SEED,
        }
    }

    pub fn with_sampling(mut self, steps: u32, seed: i64) -> Self {
        self.steps = steps;
        self.seed = seed;
        self
    }

    async fn upload(&self, input: &GenerationInput) -> Result<(String, String), ProviderFailure> {
        let form = Form::new()
            .part(
                "files",
                Part::bytes(input.person_image.clone())
                    .file_name("person.jpg")
                    .mime_str("image/jpeg")?,
            )
            .part(
                "files",
                Part::bytes(input.garment_image.clone())
                    .file_name("garment.png")
                    .mime_str("image/png")?,
            );

        let response = self
            .client
            .post(format!("{}/gradio_api/upload", self.space_url))
            .multipart(form)
            .send()
            .await?;
        let paths: Vec<String> = ensure_success(response)
            .await?
            .json()
            .await
            .map_err(|e| ProviderFailure::BadResponse(format!("invalid upload response: {e}")))?;

        match <[String; 2]>::try_from(paths) {
            Ok([person, garment]) => Ok((person, garment)),
            Err(paths) => Err(ProviderFailure::BadResponse(format!(
                "expected 2 uploaded paths, got {}",
                paths.len()
            ))),
        }
    }

    fn call_payload(&self, person_path: &str, garment_path: &str, descriptor: &str) -> Value {
        json!({
            "data": [
                { "background": file_data(person_path), "layers": [], "composite": null },
                file_data(garment_path),
                descriptor,
                true,
                false,
                self.steps,
                self.seed,
            ]
        })
    }

    async fn call(&self, payload: &Value) -> Result<String, ProviderFailure> {
        let response = self
            .client
            .post(format!("{}/gradio_api/call/tryon", self.space_url))
            .json(payload)
            .send()
            .await?;
        let call: CallResponse = ensure_success(response)
            .await?
            .json()
            .await
            .map_err(|e| ProviderFailure::BadResponse(format!("invalid call response: {e}")))?;
        Ok(call.event_id)
    }

    async fn await_result(&self, event_id: &str) -> Result<Value, ProviderFailure> {
        let response = self
            .client
            .get(format!("{}/gradio_api/call/tryon/{event_id}", self.space_url))
            .send()
            .await?;
        let stream = ensure_success(response).await?.text().await?;
        match parse_sse(&stream) {
            Some(SseOutcome::Complete(data)) => Ok(data),
            Some(SseOutcome::Error(msg)) => Err(ProviderFailure::BadResponse(format!(
                "space reported error: {msg}"
            ))),
            None => Err(ProviderFailure::BadResponse(
                "event stream ended without a result".to_string(),
            )),
        }
    }

    /// Resolve the downloadable URL of the first output file.
    fn output_url(&self, data: &Value) -> Option<String> {
        let first = data.as_array()?.first()?;
        if let Some(url) = first.get("url").and_then(Value::as_str) {
            return Some(url.to_string());
        }
        let path = first.get("path").and_then(Value::as_str)?;
        Some(format!("{}/gradio_api/file={path}", self.space_url))
    }
}

fn file_data(path: &str) -> Value {
    json!({ "path": path, "meta": { "_type": "gradio.FileData" } })
}

/// Find the terminal event in a Gradio SSE body.
///
/// Non-terminal events (`generating`, `heartbeat`) are skipped. A `data:`
/// line that is not valid JSON on an `error` event is kept as the message.
pub(crate) fn parse_sse(body: &str) -> Option<SseOutcome> {
    let mut event: Option<&str> = None;
    for line in body.lines() {
        let line = line.trim_end_matches('\r');
        if let Some(name) = line.strip_prefix("event:") {
            event = Some(name.trim());
        } else if let Some(data) = line.strip_prefix("data:") {
            let data = data.trim();
            match event {
                Some("complete") => {
                    let value = serde_json::from_str(data).unwrap_or(Value::Null);
                    return Some(SseOutcome::Complete(value));
                }
                Some("error") => {
                    let msg = match serde_json::from_str::<Value>(data) {
                        Ok(Value::String(s)) => s,
                        Ok(Value::Null) | Err(_) if data.is_empty() || data == "null" => {
                            "unknown error".to_string()
                        }
                        _ => data.to_string(),
                    };
                    return Some(SseOutcome::Error(msg));
                }
                _ => {}
            }
        }
    }
    None
}

#[async_trait]
impl TryOnProvider for GradioTryOnProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn generate(&self, input: &GenerationInput) -> Result<Vec<u8>, ProviderFailure> {
        let (person_path, garment_path) = self.upload(input).await?;
        let payload = self.call_payload(&person_path, &garment_path, &input.descriptor);
        let event_id = self.call(&payload).await?;
        tracing::debug!(event_id = %event_id, "Gradio call queued");

        let data = self.await_result(&event_id).await?;
        let url = self
            .output_url(&data)
            .ok_or_else(|| ProviderFailure::BadResponse("completed event has no output".into()))?;
        download_image(&self.client, &url).await
    }

    async fn status(&self) -> ProviderStatus {
        match self
            .client
            .get(format!("{}/config", self.space_url))
            .send()
            .await
        {
            Ok(resp) if resp.status().is_success() => {
                ProviderStatus::new(PROVIDER_NAME, ProviderState::Ready, "Space is running")
            }
            Ok(resp) => ProviderStatus::from_http(PROVIDER_NAME, resp.status()),
            Err(e) => ProviderStatus::new(PROVIDER_NAME, ProviderState::Error, e.to_string()),
        }
    }
}
