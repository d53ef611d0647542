//! End-to-end orchestrator runs against in-memory collaborators.

use std::collections::HashMap;
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use assert_matches::assert_matches;
use async_trait::async_trait;
use atelier_core::compositor::Composite;
use atelier_core::tryon::{METHOD_ERROR, METHOD_FALLBACK};
use atelier_core::types::DbId;
use atelier_db::models::tryon_history::{
    CreateTryOnHistory, ProductSummary, TryOnHistory, TryOnHistoryEntry,
};
use atelier_tryon::blob::BlobStore;
use atelier_tryon::garment::{GarmentFetchError, GarmentSource};
use atelier_tryon::provider::{GenerationInput, TryOnProvider};
use atelier_tryon::store::{GarmentProduct, HistoryStore, ProductCatalog};
use atelier_tryon::orchestrator::Compositor;
use atelier_tryon::{
    ProviderChain, ProviderFailure, StorageError, StoreError, TryOnError, TryOnOrchestrator,
    TryOnRequest,
};
use image::{ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};

const USER: DbId = 7;
const RED_JACKET: DbId = 1;

// ---------------------------------------------------------------------------
// Images
// ---------------------------------------------------------------------------

fn jpeg(width: u32, height: u32, color: [u8; 3]) -> Vec<u8> {
    let img = RgbImage::from_pixel(width, height, Rgb(color));
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Jpeg).unwrap();
    buf.into_inner()
}

fn garment_png() -> Vec<u8> {
    let img = RgbaImage::from_pixel(300, 400, Rgba([200, 20, 20, 255]));
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Png).unwrap();
    buf.into_inner()
}

fn person_photo() -> Vec<u8> {
    jpeg(400, 600, [180, 170, 160])
}

// ---------------------------------------------------------------------------
// Doubles
// ---------------------------------------------------------------------------

#[derive(Default)]
struct MemoryBlobStore {
    objects: Mutex<Vec<(String, Vec<u8>, String)>>,
    /// Uploads whose path starts with this prefix fail.
    fail_prefix: Option<&'static str>,
}

impl MemoryBlobStore {
    fn failing(prefix: &'static str) -> Self {
        Self {
            fail_prefix: Some(prefix),
            ..Default::default()
        }
    }

    fn uploads(&self) -> usize {
        self.objects.lock().unwrap().len()
    }

    fn bytes_at(&self, url: &str) -> Option<Vec<u8>> {
        let path = url.strip_prefix("mem://")?;
        self.objects
            .lock()
            .unwrap()
            .iter()
            .find(|(p, _, _)| p == path)
            .map(|(_, b, _)| b.clone())
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn upload(
        &self,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, StorageError> {
        if self.fail_prefix.is_some_and(|p| path.starts_with(p)) {
            return Err(StorageError::Status {
                status: 503,
                body: "storage offline".into(),
            });
        }
        self.objects
            .lock()
            .unwrap()
            .push((path.to_string(), bytes, content_type.to_string()));
        Ok(self.public_url(path))
    }

    fn public_url(&self, path: &str) -> String {
        format!("mem://{path}")
    }
}

struct MemoryCatalog {
    products: HashMap<DbId, GarmentProduct>,
}

impl MemoryCatalog {
    fn with_red_jacket() -> Self {
        let jacket = GarmentProduct {
            id: RED_JACKET,
            name: "Red Jacket".into(),
            category: "outerwear".into(),
            image_url: "https://cdn.example.com/red-jacket.png".into(),
        };
        Self {
            products: HashMap::from([(RED_JACKET, jacket)]),
        }
    }
}

#[async_trait]
impl ProductCatalog for MemoryCatalog {
    async fn find_product(&self, id: DbId) -> Result<Option<GarmentProduct>, StoreError> {
        Ok(self.products.get(&id).cloned())
    }
}

#[derive(Default)]
struct MemoryHistory {
    rows: Mutex<Vec<CreateTryOnHistory>>,
    fail: bool,
}

impl MemoryHistory {
    fn count(&self) -> usize {
        self.rows.lock().unwrap().len()
    }
}

#[async_trait]
impl HistoryStore for MemoryHistory {
    async fn insert_history(
        &self,
        record: CreateTryOnHistory,
    ) -> Result<TryOnHistory, StoreError> {
        if self.fail {
            return Err(StoreError::Unavailable("history database down".into()));
        }
        let mut rows = self.rows.lock().unwrap();
        rows.push(record.clone());
        Ok(TryOnHistory {
            id: rows.len() as DbId,
            user_id: record.user_id,
            product_id: record.product_id,
            original_image_url: record.original_image_url,
            generated_image_url: record.generated_image_url,
            created_at: chrono::Utc::now(),
        })
    }

    async fn list_history(
        &self,
        user_id: DbId,
        _limit: Option<i64>,
        _offset: Option<i64>,
    ) -> Result<Vec<TryOnHistoryEntry>, StoreError> {
        let rows = self.rows.lock().unwrap();
        Ok(rows
            .iter()
            .enumerate()
            .rev()
            .filter(|(_, r)| r.user_id == user_id)
            .map(|(i, r)| TryOnHistoryEntry {
                id: i as DbId + 1,
                user_id: r.user_id,
                product_id: r.product_id,
                original_image_url: r.original_image_url.clone(),
                generated_image_url: r.generated_image_url.clone(),
                created_at: chrono::Utc::now(),
                product: ProductSummary {
                    name: "Red Jacket".into(),
                    category: "outerwear".into(),
                    image_url: String::new(),
                    price: 0.0,
                },
            })
            .collect())
    }
}

struct CountingGarments {
    bytes: Option<Vec<u8>>,
    calls: AtomicUsize,
}

impl CountingGarments {
    fn ok() -> Self {
        Self {
            bytes: Some(garment_png()),
            calls: AtomicUsize::new(0),
        }
    }

    fn unreachable() -> Self {
        Self {
            bytes: None,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl GarmentSource for CountingGarments {
    async fn fetch(&self, _url: &str) -> Result<Vec<u8>, GarmentFetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.bytes.clone().ok_or(GarmentFetchError::Status(404))
    }
}

enum Behavior {
    Succeed(Vec<u8>),
    Fail,
    Hang,
}

struct ScriptedProvider {
    name: &'static str,
    behavior: Behavior,
    calls: AtomicUsize,
}

impl ScriptedProvider {
    fn new(name: &'static str, behavior: Behavior) -> Arc<Self> {
        Arc::new(Self {
            name,
            behavior,
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TryOnProvider for ScriptedProvider {
    fn name(&self) -> &str {
        self.name
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(60)
    }

    async fn generate(&self, _input: &GenerationInput) -> Result<Vec<u8>, ProviderFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.behavior {
            Behavior::Succeed(bytes) => Ok(bytes.clone()),
            Behavior::Fail => Err(ProviderFailure::Status {
                status: 503,
                body: "Model is loading".into(),
            }),
            Behavior::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(ProviderFailure::BadResponse("unreachable".into()))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

struct Harness {
    blob: Arc<MemoryBlobStore>,
    history: Arc<MemoryHistory>,
    garments: Arc<CountingGarments>,
    orchestrator: TryOnOrchestrator,
}

fn harness_with(
    providers: &[Arc<ScriptedProvider>],
    blob: MemoryBlobStore,
    history: MemoryHistory,
    garments: CountingGarments,
) -> Harness {
    let blob = Arc::new(blob);
    let history = Arc::new(history);
    let garments = Arc::new(garments);
    let chain = ProviderChain::new(
        providers
            .iter()
            .map(|p| Arc::clone(p) as Arc<dyn TryOnProvider>)
            .collect(),
    );
    let orchestrator = TryOnOrchestrator::new(
        chain,
        blob.clone(),
        Arc::new(MemoryCatalog::with_red_jacket()),
        history.clone(),
        garments.clone(),
    );
    Harness {
        blob,
        history,
        garments,
        orchestrator,
    }
}

fn harness(providers: &[Arc<ScriptedProvider>]) -> Harness {
    harness_with(
        providers,
        MemoryBlobStore::default(),
        MemoryHistory::default(),
        CountingGarments::ok(),
    )
}

fn request(image: Vec<u8>) -> TryOnRequest {
    TryOnRequest {
        user_id: USER,
        product_id: RED_JACKET,
        image,
        content_type: "image/jpeg".into(),
    }
}

// ---------------------------------------------------------------------------
// Remote generation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn first_successful_provider_wins_and_later_ones_are_not_called() {
    let a = ScriptedProvider::new("a", Behavior::Succeed(jpeg(768, 1024, [10, 10, 10])));
    let b = ScriptedProvider::new("b", Behavior::Succeed(jpeg(768, 1024, [20, 20, 20])));
    let h = harness(&[a.clone(), b.clone()]);

    let result = h.orchestrator.run(request(person_photo())).await.unwrap();

    assert!(result.success);
    assert_eq!(result.method, "a");
    assert_eq!(a.calls(), 1);
    assert_eq!(b.calls(), 0);
}

#[tokio::test]
async fn successful_run_writes_exactly_one_matching_history_record() {
    let a = ScriptedProvider::new("a", Behavior::Succeed(jpeg(768, 1024, [10, 10, 10])));
    let h = harness(&[a]);

    let result = h.orchestrator.run(request(person_photo())).await.unwrap();

    let rows = h.history.rows.lock().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].generated_image_url, result.generated_image);
    assert_eq!(rows[0].original_image_url, result.original_image);
    assert_eq!(rows[0].user_id, USER);
    assert_eq!(rows[0].product_id, RED_JACKET);
}

#[tokio::test]
async fn original_is_stored_normalized_under_user_scope() {
    let a = ScriptedProvider::new("a", Behavior::Succeed(jpeg(768, 1024, [10, 10, 10])));
    let h = harness(&[a]);

    let result = h.orchestrator.run(request(person_photo())).await.unwrap();

    assert!(result
        .original_image
        .starts_with(&format!("mem://user-photos/original/{USER}/")));
    assert!(result
        .generated_image
        .starts_with(&format!("mem://generated-images/generated/{USER}/")));

    let stored = h.blob.bytes_at(&result.original_image).unwrap();
    let img = image::load_from_memory(&stored).unwrap();
    assert_eq!((img.width(), img.height()), (768, 1024));
}

#[tokio::test(start_paused = true)]
async fn red_jacket_first_provider_times_out_second_succeeds() {
    let a = ScriptedProvider::new("A", Behavior::Hang);
    let b = ScriptedProvider::new("B", Behavior::Succeed(jpeg(768, 1024, [90, 10, 10])));
    let h = harness(&[a.clone(), b.clone()]);

    let result = h.orchestrator.run(request(person_photo())).await.unwrap();

    assert!(result.success);
    assert_eq!(result.method, "B");
    assert_eq!(result.product_name, "Red Jacket");
    assert!(result.error.is_none());
    assert_eq!(a.calls(), 1);
    assert_eq!(b.calls(), 1);
    assert_eq!(h.history.count(), 1);
    assert_eq!(
        h.blob.bytes_at(&result.generated_image).unwrap(),
        jpeg(768, 1024, [90, 10, 10])
    );
}

// ---------------------------------------------------------------------------
// Fallback
// ---------------------------------------------------------------------------

#[tokio::test]
async fn all_providers_failing_falls_back_to_overlay() {
    let a = ScriptedProvider::new("a", Behavior::Fail);
    let b = ScriptedProvider::new("b", Behavior::Fail);
    let h = harness(&[a.clone(), b.clone()]);

    let result = h.orchestrator.run(request(person_photo())).await.unwrap();

    assert!(result.success);
    assert_eq!(result.method, METHOD_FALLBACK);
    assert!(!result.generated_image.is_empty());
    assert_ne!(result.generated_image, result.original_image);
    assert_ne!(
        h.blob.bytes_at(&result.generated_image).unwrap(),
        h.blob.bytes_at(&result.original_image).unwrap()
    );
    assert_eq!(a.calls(), 1);
    assert_eq!(b.calls(), 1);
    assert_eq!(h.history.count(), 1);
}

#[tokio::test]
async fn empty_chain_goes_straight_to_fallback() {
    let h = harness(&[]);
    let result = h.orchestrator.run(request(person_photo())).await.unwrap();
    assert_eq!(result.method, METHOD_FALLBACK);
}

// ---------------------------------------------------------------------------
// Terminal failures
// ---------------------------------------------------------------------------

#[tokio::test]
async fn oversized_upload_is_rejected_before_any_network_call() {
    let a = ScriptedProvider::new("a", Behavior::Succeed(jpeg(768, 1024, [10, 10, 10])));
    let h = harness(&[a.clone()]);

    let err = h
        .orchestrator
        .run(request(vec![0u8; 6 * 1024 * 1024]))
        .await
        .unwrap_err();

    assert_matches!(err, TryOnError::Validation(_));
    assert_eq!(a.calls(), 0);
    assert_eq!(h.garments.calls.load(Ordering::SeqCst), 0);
    assert_eq!(h.blob.uploads(), 0);
    assert_eq!(h.history.count(), 0);
}

#[tokio::test]
async fn non_image_content_type_is_rejected() {
    let h = harness(&[]);
    let mut req = request(person_photo());
    req.content_type = "application/pdf".into();

    let err = h.orchestrator.run(req).await.unwrap_err();
    assert_matches!(err, TryOnError::Validation(msg) if msg.contains("must be an image"));
}

#[tokio::test]
async fn undecodable_and_tiny_images_are_validation_errors() {
    let h = harness(&[]);

    let err = h
        .orchestrator
        .run(request(b"definitely not a jpeg".to_vec()))
        .await
        .unwrap_err();
    assert_matches!(err, TryOnError::Validation(_));

    let err = h
        .orchestrator
        .run(request(jpeg(100, 100, [0, 0, 0])))
        .await
        .unwrap_err();
    assert_matches!(err, TryOnError::Validation(msg) if msg.contains("too small"));
    assert_eq!(h.blob.uploads(), 0);
}

#[tokio::test]
async fn unknown_product_is_not_found_and_writes_no_history() {
    let a = ScriptedProvider::new("a", Behavior::Succeed(jpeg(768, 1024, [10, 10, 10])));
    let h = harness(&[a.clone()]);
    let mut req = request(person_photo());
    req.product_id = 999;

    let err = h.orchestrator.run(req).await.unwrap_err();

    assert_matches!(err, TryOnError::ProductNotFound(999));
    assert_eq!(h.history.count(), 0);
    assert_eq!(a.calls(), 0);
}

#[tokio::test]
async fn unreachable_garment_image_is_asset_fetch_error() {
    let a = ScriptedProvider::new("a", Behavior::Succeed(jpeg(768, 1024, [10, 10, 10])));
    let h = harness_with(
        &[a.clone()],
        MemoryBlobStore::default(),
        MemoryHistory::default(),
        CountingGarments::unreachable(),
    );

    let err = h.orchestrator.run(request(person_photo())).await.unwrap_err();

    assert_matches!(
        err,
        TryOnError::AssetFetch { ref product_name, .. } if product_name == "Red Jacket"
    );
    assert_eq!(h.blob.uploads(), 0);
    assert_eq!(a.calls(), 0);
}

#[tokio::test]
async fn original_upload_failure_is_terminal() {
    let a = ScriptedProvider::new("a", Behavior::Succeed(jpeg(768, 1024, [10, 10, 10])));
    let h = harness_with(
        &[a.clone()],
        MemoryBlobStore::failing("user-photos/"),
        MemoryHistory::default(),
        CountingGarments::ok(),
    );

    let err = h.orchestrator.run(request(person_photo())).await.unwrap_err();

    assert_matches!(err, TryOnError::Storage(_));
    assert_eq!(a.calls(), 0);
    assert_eq!(h.history.count(), 0);
}

// ---------------------------------------------------------------------------
// Post-commit degradation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn generated_upload_failure_returns_original_with_error() {
    let a = ScriptedProvider::new("a", Behavior::Succeed(jpeg(768, 1024, [10, 10, 10])));
    let h = harness_with(
        &[a],
        MemoryBlobStore::failing("generated-images/"),
        MemoryHistory::default(),
        CountingGarments::ok(),
    );

    let result = h.orchestrator.run(request(person_photo())).await.unwrap();

    assert!(!result.success);
    assert!(!result.original_image.is_empty());
    assert_eq!(result.generated_image, result.original_image);
    assert_eq!(result.method, METHOD_ERROR);
    assert!(result.error.unwrap().contains("storage offline"));
    assert_eq!(h.history.count(), 0);
}

/// Compositor that can never produce an overlay.
struct BrokenCompositor;

impl Compositor for BrokenCompositor {
    fn composite(&self, person: &[u8], _garment: &[u8]) -> Composite {
        Composite::Passthrough {
            image: person.to_vec(),
            reason: "encoder unavailable".into(),
        }
    }
}

#[tokio::test]
async fn compositor_passthrough_returns_original_and_records_history() {
    let a = ScriptedProvider::new("a", Behavior::Fail);
    let h = harness(&[a.clone()]);
    let orchestrator = h
        .orchestrator
        .clone()
        .with_compositor(Arc::new(BrokenCompositor));

    let result = orchestrator.run(request(person_photo())).await.unwrap();

    assert!(!result.success);
    assert_eq!(result.method, METHOD_ERROR);
    assert_eq!(result.product_name, "Red Jacket");
    assert!(result.original_image.starts_with("mem://user-photos/original/"));
    assert_eq!(result.generated_image, result.original_image);
    assert!(result.error.unwrap().contains("encoder unavailable"));
    assert_eq!(a.calls(), 1);

    // Only the original was stored.
    assert_eq!(h.blob.uploads(), 1);

    let rows = h.history.rows.lock().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].generated_image_url, result.generated_image);
    assert_eq!(rows[0].original_image_url, result.original_image);
}

/// Blob store whose uploads never complete.
struct StalledBlobStore;

#[async_trait]
impl BlobStore for StalledBlobStore {
    async fn upload(
        &self,
        _path: &str,
        _bytes: Vec<u8>,
        _content_type: &str,
    ) -> Result<String, StorageError> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Err(StorageError::Status {
            status: 504,
            body: "unreachable".into(),
        })
    }

    fn public_url(&self, path: &str) -> String {
        format!("mem://{path}")
    }
}

#[tokio::test(start_paused = true)]
async fn stalled_original_upload_times_out() {
    let a = ScriptedProvider::new("a", Behavior::Succeed(jpeg(768, 1024, [10, 10, 10])));
    let orchestrator = TryOnOrchestrator::new(
        ProviderChain::new(vec![a.clone() as Arc<dyn TryOnProvider>]),
        Arc::new(StalledBlobStore),
        Arc::new(MemoryCatalog::with_red_jacket()),
        Arc::new(MemoryHistory::default()),
        Arc::new(CountingGarments::ok()),
    )
    .with_storage_timeout(Duration::from_secs(10));

    let started = tokio::time::Instant::now();
    let err = orchestrator.run(request(person_photo())).await.unwrap_err();

    assert_matches!(
        err,
        TryOnError::Storage(StorageError::Timeout(d)) if d == Duration::from_secs(10)
    );
    assert!(started.elapsed() < Duration::from_secs(11));
    assert_eq!(a.calls(), 0);
}

#[test]
fn worst_case_duration_counts_budget_storage_and_processing() {
    let orchestrator = TryOnOrchestrator::new(
        ProviderChain::default().with_budget(Duration::from_secs(120)),
        Arc::new(MemoryBlobStore::default()),
        Arc::new(MemoryCatalog::with_red_jacket()),
        Arc::new(MemoryHistory::default()),
        Arc::new(CountingGarments::ok()),
    )
    .with_storage_timeout(Duration::from_secs(30));

    assert_eq!(
        orchestrator.worst_case_duration(),
        Some(Duration::from_secs(120 + 4 * 30 + 15))
    );
}

#[tokio::test]
async fn history_failure_keeps_urls_and_reports_error() {
    let a = ScriptedProvider::new("a", Behavior::Succeed(jpeg(768, 1024, [10, 10, 10])));
    let h = harness_with(
        &[a],
        MemoryBlobStore::default(),
        MemoryHistory {
            fail: true,
            ..Default::default()
        },
        CountingGarments::ok(),
    );

    let result = h.orchestrator.run(request(person_photo())).await.unwrap();

    assert!(!result.success);
    assert_eq!(result.method, "a");
    assert!(result.generated_image.starts_with("mem://generated-images/"));
    assert_ne!(result.generated_image, result.original_image);
    assert!(result.error.unwrap().contains("history"));
}

#[tokio::test]
async fn history_is_listed_newest_first() {
    let a = ScriptedProvider::new("a", Behavior::Succeed(jpeg(768, 1024, [10, 10, 10])));
    let h = harness(&[a]);

    let first = h.orchestrator.run(request(person_photo())).await.unwrap();
    let second = h.orchestrator.run(request(person_photo())).await.unwrap();

    let entries = h
        .orchestrator
        .history()
        .list_history(USER, None, None)
        .await
        .unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].generated_image_url, second.generated_image);
    assert_eq!(entries[1].generated_image_url, first.generated_image);
}
