#![allow(dead_code)]

use std::io::Cursor;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use atelier_api::auth::jwt::{generate_access_token, JwtConfig};
use atelier_api::config::{ServerConfig, DEFAULT_MAX_BODY_BYTES};
use atelier_api::router::build_app_router;
use atelier_api::state::AppState;
use atelier_core::types::DbId;
use atelier_tryon::blob::BlobStore;
use atelier_tryon::garment::{GarmentFetchError, GarmentSource};
use atelier_tryon::provider::{GenerationInput, TryOnProvider};
use atelier_tryon::store::PgTryOnStore;
use atelier_tryon::{ProviderChain, ProviderFailure, StorageError, TryOnOrchestrator};
use axum::body::Body;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{Method, Request};
use axum::response::Response;
use axum::Router;
use http_body_util::BodyExt;
use image::{ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};
use sqlx::PgPool;
use tower::ServiceExt;

pub const TEST_JWT_SECRET: &str = "integration-test-secret-long-enough-for-hs256";
pub const BOUNDARY: &str = "atelier-test-boundary";

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 30,
        max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        jwt: JwtConfig {
            secret: TEST_JWT_SECRET.to_string(),
            access_token_expiry_mins: 15,
        },
    }
}

// ---------------------------------------------------------------------------
// In-memory collaborators
// ---------------------------------------------------------------------------

/// Blob store that keeps uploads in memory and hands out `mem://` URLs.
#[derive(Default)]
pub struct MemoryBlobStore {
    pub objects: Mutex<Vec<String>>,
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn upload(
        &self,
        path: &str,
        _bytes: Vec<u8>,
        _content_type: &str,
    ) -> Result<String, StorageError> {
        self.objects.lock().unwrap().push(path.to_string());
        Ok(self.public_url(path))
    }

    fn public_url(&self, path: &str) -> String {
        format!("mem://{path}")
    }
}

/// Garment source that always returns the same PNG.
pub struct StaticGarments;

#[async_trait]
impl GarmentSource for StaticGarments {
    async fn fetch(&self, _url: &str) -> Result<Vec<u8>, GarmentFetchError> {
        Ok(garment_png())
    }
}

/// Provider that answers every request with a fixed image.
pub struct FixedProvider(pub Vec<u8>);

#[async_trait]
impl TryOnProvider for FixedProvider {
    fn name(&self) -> &str {
        "idm-vton"
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(5)
    }

    async fn generate(&self, _input: &GenerationInput) -> Result<Vec<u8>, ProviderFailure> {
        Ok(self.0.clone())
    }
}

// ---------------------------------------------------------------------------
// App
// ---------------------------------------------------------------------------

/// Build the full application router with all middleware layers, using the
/// given database pool.
///
/// Uses the same router builder as `main.rs`. The catalog and history
/// stores hit the real database; blob storage, garment downloads and the
/// generative provider are in-memory.
pub fn build_test_app(pool: PgPool) -> Router {
    let config = test_config();

    let store = Arc::new(PgTryOnStore::new(pool.clone()));
    let chain = ProviderChain::new(vec![Arc::new(FixedProvider(jpeg(768, 1024, [40, 90, 160])))
        as Arc<dyn TryOnProvider>]);
    let orchestrator = TryOnOrchestrator::new(
        chain,
        Arc::new(MemoryBlobStore::default()),
        store.clone(),
        store,
        Arc::new(StaticGarments),
    );

    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
        tryon: Arc::new(orchestrator),
    };

    build_app_router(state, &config)
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

/// Issue a bearer token for `user_id` signed with the test secret.
pub fn token(user_id: DbId) -> String {
    generate_access_token(user_id, "customer", &test_config().jwt).unwrap()
}

pub async fn get(app: Router, uri: &str) -> Response {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn get_auth(app: Router, uri: &str, token: &str) -> Response {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .header(AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

/// POST a multipart body built by [`multipart_body`].
pub async fn post_multipart(app: Router, uri: &str, token: Option<&str>, body: Vec<u8>) -> Response {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(
            CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        );
    if let Some(token) = token {
        builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
    }
    app.oneshot(builder.body(Body::from(body)).unwrap())
        .await
        .unwrap()
}

/// Encode a `multipart/form-data` body. `image` is `(bytes, content_type)`.
pub fn multipart_body(image: Option<(&[u8], &str)>, product_id: Option<&str>) -> Vec<u8> {
    let mut body = Vec::new();
    if let Some((bytes, content_type)) = image {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"user_image\"; \
                 filename=\"me.jpg\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    if let Some(id) = product_id {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"product_id\"\r\n\r\n{id}\r\n"
            )
            .as_bytes(),
        );
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

pub fn jpeg(width: u32, height: u32, color: [u8; 3]) -> Vec<u8> {
    let img = RgbImage::from_pixel(width, height, Rgb(color));
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Jpeg).unwrap();
    buf.into_inner()
}

pub fn garment_png() -> Vec<u8> {
    let img = RgbaImage::from_pixel(300, 400, Rgba([200, 20, 20, 255]));
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Png).unwrap();
    buf.into_inner()
}

/// Insert a catalog product and return its id.
pub async fn insert_product(pool: &PgPool, name: &str, category: &str) -> DbId {
    sqlx::query_scalar(
        "INSERT INTO products (name, price, category, image_url) \
         VALUES ($1, 49.99, $2, 'https://cdn.example.com/garment.png') RETURNING id",
    )
    .bind(name)
    .bind(category)
    .fetch_one(pool)
    .await
    .unwrap()
}
