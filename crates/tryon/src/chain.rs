//! Ordered provider chain.
//!
//! Providers are attempted strictly one after another in configured order.
//! Each attempt is bounded by the provider's own timeout and is never
//! retried; the first provider to return a decodable image wins and later
//! providers are not called.
//!
//! An optional generation budget caps the whole walk. A provider whose turn
//! comes after the budget is spent is skipped, and the one running when it
//! runs out is cut short, so the caller always has time left for the local
//! fallback.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use atelier_core::preprocess;

use crate::error::{ProviderError, ProviderFailure};
use crate::provider::{GenerationInput, ProviderState, ProviderStatus, TryOnProvider};

/// Default bound on a single status check.
pub const DEFAULT_STATUS_TIMEOUT: Duration = Duration::from_secs(5);

/// Image produced by a remote provider.
#[derive(Debug, Clone)]
pub struct Generated {
    pub provider: String,
    pub image: Vec<u8>,
    pub content_type: &'static str,
}

/// Result of walking the chain.
#[derive(Debug, Default)]
pub struct ChainOutcome {
    /// The winning provider's output, if any provider succeeded.
    pub generated: Option<Generated>,
    /// Every failed attempt, in the order they were made.
    pub failures: Vec<ProviderError>,
}

#[derive(Clone)]
pub struct ProviderChain {
    providers: Vec<Arc<dyn TryOnProvider>>,
    budget: Option<Duration>,
    status_timeout: Duration,
}

impl Default for ProviderChain {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl ProviderChain {
    pub fn new(providers: Vec<Arc<dyn TryOnProvider>>) -> Self {
        Self {
            providers,
            budget: None,
            status_timeout: DEFAULT_STATUS_TIMEOUT,
        }
    }

    /// Cap the total time [`run`](Self::run) may spend across providers.
    pub fn with_budget(mut self, budget: Duration) -> Self {
        self.budget = Some(budget);
        self
    }

    /// Bound each status check.
    pub fn with_status_timeout(mut self, timeout: Duration) -> Self {
        self.status_timeout = timeout;
        self
    }

    pub fn budget(&self) -> Option<Duration> {
        self.budget
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    /// One bounded attempt against a single provider.
    ///
    /// A timeout, a transport error, a non-2xx status, an unexpected body
    /// and undecodable bytes all surface as the same [`ProviderError`].
    pub async fn invoke(
        provider: &dyn TryOnProvider,
        input: &GenerationInput,
    ) -> Result<Vec<u8>, ProviderError> {
        Self::invoke_within(provider, input, provider.timeout()).await
    }

    /// Like [`invoke`](Self::invoke) with an explicit time limit.
    async fn invoke_within(
        provider: &dyn TryOnProvider,
        input: &GenerationInput,
        budget: Duration,
    ) -> Result<Vec<u8>, ProviderError> {
        let fail = |cause| ProviderError {
            provider: provider.name().to_string(),
            cause,
        };

        let bytes = tokio::time::timeout(budget, provider.generate(input))
            .await
            .map_err(|_| fail(ProviderFailure::Timeout(budget)))?
            .map_err(fail)?;

        let (bytes, decodable) = tokio::task::spawn_blocking(move || {
            let ok = preprocess::is_decodable(&bytes);
            (bytes, ok)
        })
        .await
        .map_err(|e| fail(ProviderFailure::BadResponse(e.to_string())))?;

        if !decodable {
            return Err(fail(ProviderFailure::NotAnImage));
        }
        Ok(bytes)
    }

    /// Walk the chain until one provider succeeds.
    pub async fn run(&self, input: &GenerationInput) -> ChainOutcome {
        let mut outcome = ChainOutcome::default();
        let deadline = self.budget.map(|budget| Instant::now() + budget);

        for provider in &self.providers {
            let mut limit = provider.timeout();
            if let Some(deadline) = deadline {
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    tracing::warn!(
                        provider = provider.name(),
                        "Generation budget exhausted, skipping try-on provider"
                    );
                    outcome.failures.push(ProviderError {
                        provider: provider.name().to_string(),
                        cause: ProviderFailure::BudgetExhausted,
                    });
                    continue;
                }
                limit = limit.min(remaining);
            }

            tracing::info!(
                provider = provider.name(),
                timeout_secs = limit.as_secs(),
                "Attempting try-on provider"
            );
            match Self::invoke_within(provider.as_ref(), input, limit).await {
                Ok(image) => {
                    let content_type =
                        preprocess::sniff_content_type(&image).unwrap_or("image/jpeg");
                    tracing::info!(
                        provider = provider.name(),
                        bytes = image.len(),
                        "Try-on provider succeeded"
                    );
                    outcome.generated = Some(Generated {
                        provider: provider.name().to_string(),
                        image,
                        content_type,
                    });
                    return outcome;
                }
                Err(e) => {
                    tracing::warn!(provider = provider.name(), error = %e, "Try-on provider failed");
                    outcome.failures.push(e);
                }
            }
        }

        outcome
    }

    /// Check every provider concurrently, each bounded by the status timeout.
    pub async fn statuses(&self) -> Vec<ProviderStatus> {
        let limit = self.status_timeout;
        futures::future::join_all(self.providers.iter().map(|p| async move {
            match tokio::time::timeout(limit, p.status()).await {
                Ok(status) => status,
                Err(_) => {
                    tracing::warn!(provider = p.name(), "Provider status check timed out");
                    ProviderStatus::new(
                        p.name(),
                        ProviderState::Error,
                        format!("Status check timed out after {}s", limit.as_secs()),
                    )
                }
            }
        }))
        .await
    }
}
