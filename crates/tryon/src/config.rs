//! Try-on pipeline configuration.
//!
//! | Env Var                      | Default                        |
//! |------------------------------|--------------------------------|
//! | `TRYON_PROVIDERS`            | `idm-vton,gradio,replicate`    |
//! | `HUGGING_FACE_API_KEY`       | (none, provider skipped)       |
//! | `HF_TRYON_MODEL_URL`         | hosted IDM-VTON model          |
//! | `HF_TRYON_TIMEOUT_SECS`      | `60`                           |
//! | `REPLICATE_API_TOKEN`        | (none, provider skipped)       |
//! | `REPLICATE_TRYON_VERSION`    | OOTDiffusion version           |
//! | `REPLICATE_TIMEOUT_SECS`     | `120`                          |
//! | `GRADIO_TRYON_SPACE_URL`     | public IDM-VTON Space          |
//! | `GRADIO_TRYON_TIMEOUT_SECS`  | `120`                          |
//! | `GRADIO_TRYON_STEPS`         | `30`                           |
//! | `GRADIO_TRYON_SEED`          | `42`                           |
//! | `GARMENT_FETCH_TIMEOUT_SECS` | `20`                           |
//! | `TRYON_GENERATION_BUDGET_SECS` | `120`                        |
//! | `STORAGE_TIMEOUT_SECS`       | `30`                           |
//! | `PROVIDER_STATUS_TIMEOUT_SECS`| `5`                            |
//! | `BLOB_BACKEND`               | `supabase`                     |

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::blob::{BlobStore, S3BlobStore, SupabaseBlobStore};
use crate::chain::ProviderChain;
use crate::orchestrator::PROCESSING_ALLOWANCE;
use crate::provider::{
    gradio, huggingface, replicate, GradioTryOnProvider, HuggingFaceTryOnProvider,
    ReplicateTryOnProvider, TryOnProvider,
};

/// Known provider backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    IdmVton,
    Replicate,
    Gradio,
}

impl ProviderKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::IdmVton => huggingface::PROVIDER_NAME,
            Self::Replicate => replicate::PROVIDER_NAME,
            Self::Gradio => gradio::PROVIDER_NAME,
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "idm-vton" | "huggingface" => Ok(Self::IdmVton),
            "replicate" => Ok(Self::Replicate),
            "gradio" => Ok(Self::Gradio),
            other => Err(format!("unknown try-on provider '{other}'")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct HuggingFaceSettings {
    pub api_key: Option<String>,
    pub model_url: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct ReplicateSettings {
    pub api_token: Option<String>,
    pub version: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct GradioSettings {
    pub space_url: String,
    pub timeout: Duration,
    pub steps: u32,
    pub seed: i64,
}

/// Where original and generated images are stored.
#[derive(Debug, Clone)]
pub enum BlobBackend {
    Supabase {
        url: String,
        service_key: String,
    },
    S3 {
        bucket: String,
        region: Option<String>,
        endpoint: Option<String>,
        public_base_url: String,
    },
}

/// Full try-on pipeline configuration.
#[derive(Debug, Clone)]
pub struct TryOnConfig {
    /// Raw provider order as configured; unknown entries are kept so they
    /// can be reported when the chain is built.
    pub provider_order: Vec<String>,
    pub huggingface: HuggingFaceSettings,
    pub replicate: ReplicateSettings,
    pub gradio: GradioSettings,
    pub garment_fetch_timeout: Duration,
    /// Cap on the time spent across all remote providers in one run.
    pub generation_budget: Duration,
    /// Bound on each blob upload and catalog/history query.
    pub storage_timeout: Duration,
    /// Bound on each provider status check.
    pub status_timeout: Duration,
    pub blob: BlobBackend,
}

impl TryOnConfig {
    /// Load configuration from environment variables with defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let secs = |key: &str, default: u64| {
            Duration::from_secs(
                get(key)
                    .map(|v| v.parse().unwrap_or_else(|_| panic!("{key} must be a valid u64")))
                    .unwrap_or(default),
            )
        };

        let provider_order = get("TRYON_PROVIDERS")
            .unwrap_or_else(|| "idm-vton,gradio,replicate".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let huggingface = HuggingFaceSettings {
            api_key: get("HUGGING_FACE_API_KEY"),
            model_url: get("HF_TRYON_MODEL_URL")
                .unwrap_or_else(|| huggingface::DEFAULT_MODEL_URL.into()),
            timeout: secs("HF_TRYON_TIMEOUT_SECS", 60),
        };

        let replicate = ReplicateSettings {
            api_token: get("REPLICATE_API_TOKEN"),
            version: get("REPLICATE_TRYON_VERSION")
                .unwrap_or_else(|| replicate::DEFAULT_VERSION.into()),
            timeout: secs("REPLICATE_TIMEOUT_SECS", 120),
        };

        let gradio = GradioSettings {
            space_url: get("GRADIO_TRYON_SPACE_URL")
                .unwrap_or_else(|| gradio::DEFAULT_SPACE_URL.into()),
            timeout: secs("GRADIO_TRYON_TIMEOUT_SECS", 120),
            steps: get("GRADIO_TRYON_STEPS")
                .map(|v| v.parse().expect("GRADIO_TRYON_STEPS must be a valid u32"))
                .unwrap_or(gradio::DEFAULT_STEPS),
            seed: get("GRADIO_TRYON_SEED")
                .map(|v| v.parse().expect("GRADIO_TRYON_SEED must be a valid i64"))
                .unwrap_or(gradio::DEFAULT_SEED),
        };

        let blob = match get("BLOB_BACKEND").as_deref().unwrap_or("supabase") {
            "s3" => BlobBackend::S3 {
                bucket: get("S3_BUCKET").expect("S3_BUCKET must be set when BLOB_BACKEND=s3"),
                region: get("S3_REGION"),
                endpoint: get("S3_ENDPOINT"),
                public_base_url: get("S3_PUBLIC_BASE_URL")
                    .expect("S3_PUBLIC_BASE_URL must be set when BLOB_BACKEND=s3"),
            },
            "supabase" => BlobBackend::Supabase {
                url: get("SUPABASE_URL").expect("SUPABASE_URL must be set"),
                service_key: get("SUPABASE_SERVICE_ROLE_KEY")
                    .expect("SUPABASE_SERVICE_ROLE_KEY must be set"),
            },
            other => panic!("BLOB_BACKEND must be 'supabase' or 's3', got '{other}'"),
        };

        Self {
            provider_order,
            huggingface,
            replicate,
            gradio,
            garment_fetch_timeout: secs("GARMENT_FETCH_TIMEOUT_SECS", 20),
            generation_budget: secs("TRYON_GENERATION_BUDGET_SECS", 120),
            storage_timeout: secs("STORAGE_TIMEOUT_SECS", 30),
            status_timeout: secs("PROVIDER_STATUS_TIMEOUT_SECS", 5),
            blob,
        }
    }

    /// Shortest HTTP request timeout that cannot cut off a run.
    ///
    /// Garment download, four bounded storage calls, the generation budget
    /// and the processing allowance, in the worst case all running to their
    /// limits.
    pub fn min_request_timeout(&self) -> Duration {
        self.garment_fetch_timeout
            + self.storage_timeout * 4
            + self.generation_budget
            + PROCESSING_ALLOWANCE
    }

    /// Build the provider chain with the configured budget and status-check bound.
    pub fn build_chain(&self, client: &reqwest::Client) -> ProviderChain {
        ProviderChain::new(self.build_providers(client))
            .with_budget(self.generation_budget)
            .with_status_timeout(self.status_timeout)
    }

    /// Instantiate the configured providers in order.
    ///
    /// Unknown kinds, duplicates and providers without credentials are
    /// skipped with a warning, so a misconfigured deployment still serves
    /// requests through whatever remains (or the local fallback).
    pub fn build_providers(&self, client: &reqwest::Client) -> Vec<Arc<dyn TryOnProvider>> {
        let mut seen = Vec::new();
        let mut providers: Vec<Arc<dyn TryOnProvider>> = Vec::new();

        for raw in &self.provider_order {
            let kind = match raw.parse::<ProviderKind>() {
                Ok(kind) => kind,
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping try-on provider");
                    continue;
                }
            };
            if seen.contains(&kind) {
                tracing::warn!(provider = %kind, "Skipping duplicate try-on provider");
                continue;
            }
            seen.push(kind);

            match kind {
                ProviderKind::IdmVton => match &self.huggingface.api_key {
                    Some(key) => providers.push(Arc::new(HuggingFaceTryOnProvider::new(
                        client.clone(),
                        key.clone(),
                        self.huggingface.model_url.clone(),
                        self.huggingface.timeout,
                    ))),
                    None => tracing::warn!(
                        provider = %kind,
                        "HUGGING_FACE_API_KEY not set, skipping provider"
                    ),
                },
                ProviderKind::Replicate => match &self.replicate.api_token {
                    Some(token) => providers.push(Arc::new(ReplicateTryOnProvider::new(
                        client.clone(),
                        token.clone(),
                        self.replicate.version.clone(),
                        self.replicate.timeout,
                    ))),
                    None => tracing::warn!(
                        provider = %kind,
                        "REPLICATE_API_TOKEN not set, skipping provider"
                    ),
                },
                ProviderKind::Gradio => providers.push(Arc::new(
                    GradioTryOnProvider::new(
                        client.clone(),
                        self.gradio.space_url.clone(),
                        self.gradio.timeout,
                    )
                    .with_sampling(self.gradio.steps, self.gradio.seed),
                )),
            }
        }

        providers
    }

    /// Instantiate the configured blob store.
    pub async fn build_blob_store(&self, client: &reqwest::Client) -> Arc<dyn BlobStore> {
        match &self.blob {
            BlobBackend::Supabase { url, service_key } => Arc::new(SupabaseBlobStore::new(
                client.clone(),
                url,
                service_key.clone(),
            )),
            BlobBackend::S3 {
                bucket,
                region,
                endpoint,
                public_base_url,
            } => Arc::new(
                S3BlobStore::from_env(
                    bucket.clone(),
                    region.clone(),
                    endpoint.clone(),
                    public_base_url,
                )
                .await,
            ),
        }
    }
}
