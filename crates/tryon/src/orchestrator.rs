//! Try-on orchestration.
//!
//! One run walks the stages in [`TryOnStage`] order:
//!
//! ```text
//! Validating -> FetchingProduct -> PreparingImages -> UploadingOriginal
//!   -> GeneratingRemote -> [GeneratingFallback] -> PersistingResult -> Done
//! ```
//!
//! Every stage up to and including `UploadingOriginal` may stop the run
//! with a [`TryOnError`]. Once the original is stored the run is total: it
//! always returns a [`TryOnResult`] with a non-empty `generated_image`,
//! degrading through the provider chain, the local compositor and finally
//! the original image itself.
//!
//! Blob uploads run on detached tasks so a client disconnect cancels
//! provider calls but lets in-flight uploads finish. Every storage call is
//! bounded by the storage timeout and provider calls by the chain's budget,
//! so the whole run fits inside [`TryOnOrchestrator::worst_case_duration`].

use std::sync::Arc;
use std::time::Duration;

use atelier_core::compositor::{self, Composite};
use atelier_core::naming::{
    extension_for_content_type, user_object_path, BUCKET_GENERATED, BUCKET_USER_PHOTOS,
};
use atelier_core::preprocess;
use atelier_core::tryon::{
    garment_descriptor, validate_upload, TryOnResult, TryOnStage, METHOD_ERROR, METHOD_FALLBACK,
};
use atelier_core::types::DbId;
use atelier_db::models::tryon_history::CreateTryOnHistory;

use crate::blob::BlobStore;
use crate::chain::ProviderChain;
use crate::error::{StorageError, StoreError, TryOnError};
use crate::garment::GarmentSource;
use crate::provider::GenerationInput;
use crate::store::{GarmentProduct, HistoryStore, ProductCatalog};

/// Content type of normalized user photos.
const NORMALIZED_CONTENT_TYPE: &str = "image/jpeg";

/// Default bound on one blob upload or history/catalog query.
pub const DEFAULT_STORAGE_TIMEOUT: Duration = Duration::from_secs(30);

/// Time reserved for CPU work: normalizing, garment preparation and the
/// fallback overlay.
pub const PROCESSING_ALLOWANCE: Duration = Duration::from_secs(15);

/// Produces the local fallback image when no provider succeeded.
pub trait Compositor: Send + Sync {
    fn composite(&self, person: &[u8], garment: &[u8]) -> Composite;
}

/// The watermarked overlay from [`atelier_core::compositor`].
pub struct OverlayCompositor;

impl Compositor for OverlayCompositor {
    fn composite(&self, person: &[u8], garment: &[u8]) -> Composite {
        compositor::composite(person, garment)
    }
}

/// One inbound try-on request.
#[derive(Debug, Clone)]
pub struct TryOnRequest {
    pub user_id: DbId,
    pub product_id: DbId,
    /// Raw uploaded bytes.
    pub image: Vec<u8>,
    /// Declared content type of the upload.
    pub content_type: String,
}

/// Generated image ready to persist.
struct Rendered {
    image: Vec<u8>,
    content_type: &'static str,
    method: String,
}

/// Ties the provider chain, compositor and collaborators into one run.
///
/// Holds no per-request state; one instance serves all requests.
#[derive(Clone)]
pub struct TryOnOrchestrator {
    chain: ProviderChain,
    blob: Arc<dyn BlobStore>,
    catalog: Arc<dyn ProductCatalog>,
    history: Arc<dyn HistoryStore>,
    garments: Arc<dyn GarmentSource>,
    compositor: Arc<dyn Compositor>,
    storage_timeout: Duration,
}

impl TryOnOrchestrator {
    pub fn new(
        chain: ProviderChain,
        blob: Arc<dyn BlobStore>,
        catalog: Arc<dyn ProductCatalog>,
        history: Arc<dyn HistoryStore>,
        garments: Arc<dyn GarmentSource>,
    ) -> Self {
        Self {
            chain,
            blob,
            catalog,
            history,
            garments,
            compositor: Arc::new(OverlayCompositor),
            storage_timeout: DEFAULT_STORAGE_TIMEOUT,
        }
    }

    pub fn with_compositor(mut self, compositor: Arc<dyn Compositor>) -> Self {
        self.compositor = compositor;
        self
    }

    /// Bound every blob upload and catalog/history query.
    pub fn with_storage_timeout(mut self, timeout: Duration) -> Self {
        self.storage_timeout = timeout;
        self
    }

    /// Upper bound on one run, excluding the garment download (which the
    /// garment source bounds on its own).
    ///
    /// Four storage calls (catalog lookup, two uploads, history insert), the
    /// chain budget and the processing allowance. `None` when the chain has
    /// no budget.
    pub fn worst_case_duration(&self) -> Option<Duration> {
        self.chain
            .budget()
            .map(|budget| budget + self.storage_timeout * 4 + PROCESSING_ALLOWANCE)
    }

    pub fn chain(&self) -> &ProviderChain {
        &self.chain
    }

    pub fn history(&self) -> &Arc<dyn HistoryStore> {
        &self.history
    }

    /// Run one try-on request to completion.
    pub async fn run(&self, request: TryOnRequest) -> Result<TryOnResult, TryOnError> {
        let TryOnRequest {
            user_id,
            product_id,
            image,
            content_type,
        } = request;

        // --- Validating ---
        stage(TryOnStage::Validating, user_id, product_id);
        validate_upload(&content_type, image.len())?;

        // --- FetchingProduct ---
        stage(TryOnStage::FetchingProduct, user_id, product_id);
        let lookup = self.catalog.find_product(product_id);
        let product = tokio::time::timeout(self.storage_timeout, lookup)
            .await
            .map_err(|_| StoreError::Unavailable("catalog lookup timed out".into()))??
            .ok_or(TryOnError::ProductNotFound(product_id))?;

        // --- PreparingImages ---
        stage(TryOnStage::PreparingImages, user_id, product_id);
        let person = tokio::task::spawn_blocking(move || preprocess::normalize(&image))
            .await
            .map_err(|e| TryOnError::Internal(e.to_string()))?
            .map_err(|e| TryOnError::Validation(e.to_string()))?;
        let garment = self.prepare_garment(&product).await?;

        // --- UploadingOriginal ---
        stage(TryOnStage::UploadingOriginal, user_id, product_id);
        let original_path =
            user_object_path(&format!("{BUCKET_USER_PHOTOS}/original"), user_id, "jpg");
        let original_url = self
            .upload_detached(original_path, person.clone(), NORMALIZED_CONTENT_TYPE)
            .await?;

        // Committed: nothing below returns Err.
        let rendered = self
            .generate(user_id, product_id, &product, person, garment, &original_url)
            .await;

        // --- PersistingResult ---
        stage(TryOnStage::PersistingResult, user_id, product_id);
        let result = match rendered {
            Ok(rendered) => self.persist(user_id, &product, original_url, rendered).await,
            Err(reason) => {
                // Nothing usable was produced: hand back the original.
                let result = TryOnResult::completed(
                    original_url.clone(),
                    original_url,
                    product.name.clone(),
                    METHOD_ERROR,
                )
                .with_error(reason);
                self.record(user_id, product.id, result).await
            }
        };

        stage(TryOnStage::Done, user_id, product_id);
        tracing::info!(
            user_id,
            product_id,
            success = result.success,
            method = %result.method,
            "Try-on completed"
        );
        Ok(result)
    }

    async fn prepare_garment(&self, product: &GarmentProduct) -> Result<Vec<u8>, TryOnError> {
        let asset_error = |reason: String| TryOnError::AssetFetch {
            product_name: product.name.clone(),
            reason,
        };
        let raw = self
            .garments
            .fetch(&product.image_url)
            .await
            .map_err(|e| asset_error(e.to_string()))?;
        tokio::task::spawn_blocking(move || preprocess::prepare_garment(&raw))
            .await
            .map_err(|e| TryOnError::Internal(e.to_string()))?
            .map_err(|e| asset_error(e.to_string()))
    }

    /// Remote providers first, then the local compositor.
    ///
    /// `Err` carries the reason when even the compositor could not produce
    /// an overlay.
    async fn generate(
        &self,
        user_id: DbId,
        product_id: DbId,
        product: &GarmentProduct,
        person: Vec<u8>,
        garment: Vec<u8>,
        original_url: &str,
    ) -> Result<Rendered, String> {
        stage(TryOnStage::GeneratingRemote, user_id, product_id);
        let input = GenerationInput {
            person_image: person,
            person_image_url: original_url.to_string(),
            garment_image: garment,
            garment_image_url: product.image_url.clone(),
            descriptor: garment_descriptor(&product.name),
        };

        let outcome = self.chain.run(&input).await;
        if let Some(generated) = outcome.generated {
            return Ok(Rendered {
                image: generated.image,
                content_type: generated.content_type,
                method: generated.provider,
            });
        }

        stage(TryOnStage::GeneratingFallback, user_id, product_id);
        tracing::warn!(
            user_id,
            product_id,
            attempted = outcome.failures.len(),
            "No try-on provider succeeded, using fallback overlay"
        );

        let GenerationInput {
            person_image,
            garment_image,
            ..
        } = input;
        let compositor = Arc::clone(&self.compositor);
        let composite =
            tokio::task::spawn_blocking(move || compositor.composite(&person_image, &garment_image))
                .await
                .unwrap_or_else(|e| Composite::Passthrough {
                    image: Vec::new(),
                    reason: e.to_string(),
                });

        match composite {
            Composite::Overlay(image) => Ok(Rendered {
                image,
                content_type: "image/jpeg",
                method: METHOD_FALLBACK.to_string(),
            }),
            Composite::Passthrough { reason, .. } => {
                tracing::error!(user_id, product_id, reason = %reason, "Fallback overlay failed");
                Err(format!("Try-on generation failed: {reason}"))
            }
        }
    }

    /// Upload the generated image and record history.
    async fn persist(
        &self,
        user_id: DbId,
        product: &GarmentProduct,
        original_url: String,
        rendered: Rendered,
    ) -> TryOnResult {
        let path = user_object_path(
            &format!("{BUCKET_GENERATED}/generated"),
            user_id,
            extension_for_content_type(rendered.content_type),
        );

        match self
            .upload_detached(path, rendered.image, rendered.content_type)
            .await
        {
            Ok(generated_url) => {
                let result = TryOnResult::completed(
                    original_url,
                    generated_url,
                    product.name.clone(),
                    rendered.method,
                );
                self.record(user_id, product.id, result).await
            }
            Err(e) => {
                tracing::error!(
                    user_id,
                    product_id = product.id,
                    error = %e,
                    "Generated image upload failed"
                );
                // The generated image is lost, so no provider result is claimed.
                TryOnResult::completed(
                    original_url.clone(),
                    original_url,
                    product.name.clone(),
                    METHOD_ERROR,
                )
                .with_error(format!("Failed to store generated image: {e}"))
            }
        }
    }

    /// Write one history row for `result`, downgrading it on failure.
    async fn record(&self, user_id: DbId, product_id: DbId, result: TryOnResult) -> TryOnResult {
        let record = CreateTryOnHistory {
            user_id,
            product_id,
            original_image_url: result.original_image.clone(),
            generated_image_url: result.generated_image.clone(),
        };
        let insert = self.history.insert_history(record);
        let inserted = tokio::time::timeout(self.storage_timeout, insert)
            .await
            .unwrap_or_else(|_| Err(StoreError::Unavailable("history insert timed out".into())));
        match inserted {
            Ok(row) => {
                tracing::debug!(history_id = row.id, user_id, "Try-on history recorded");
                result
            }
            Err(e) => {
                tracing::error!(user_id, product_id, error = %e, "Failed to record try-on history");
                result.with_error(format!("Failed to save try-on history: {e}"))
            }
        }
    }

    /// Upload on a detached task so it completes even if the caller is
    /// dropped mid-request. The task gives up after the storage timeout.
    async fn upload_detached(
        &self,
        path: String,
        bytes: Vec<u8>,
        content_type: &'static str,
    ) -> Result<String, StorageError> {
        let blob = Arc::clone(&self.blob);
        let limit = self.storage_timeout;
        tokio::spawn(async move {
            tokio::time::timeout(limit, blob.upload(&path, bytes, content_type))
                .await
                .map_err(|_| StorageError::Timeout(limit))?
        })
        .await
        .map_err(|e| StorageError::Task(e.to_string()))?
    }
}

fn stage(stage: TryOnStage, user_id: DbId, product_id: DbId) {
    tracing::debug!(user_id, product_id, stage = %stage, "Try-on stage");
}
