//! Catalog and history collaborators.
//!
//! The orchestrator only sees these traits. [`PgTryOnStore`] backs both
//! with the Postgres repositories; tests substitute in-memory doubles.

use async_trait::async_trait;
use atelier_core::types::DbId;
use atelier_db::models::product::Product;
use atelier_db::models::tryon_history::{CreateTryOnHistory, TryOnHistory, TryOnHistoryEntry};
use atelier_db::repositories::{ProductRepo, TryOnHistoryRepo};
use atelier_db::DbPool;

use crate::error::StoreError;

/// The product fields a try-on run needs.
#[derive(Debug, Clone, PartialEq)]
pub struct GarmentProduct {
    pub id: DbId,
    pub name: String,
    pub category: String,
    pub image_url: String,
}

impl From<Product> for GarmentProduct {
    fn from(p: Product) -> Self {
        Self {
            id: p.id,
            name: p.name,
            category: p.category,
            image_url: p.image_url,
        }
    }
}

#[async_trait]
pub trait ProductCatalog: Send + Sync {
    /// Look up a product; `Ok(None)` when it does not exist.
    async fn find_product(&self, id: DbId) -> Result<Option<GarmentProduct>, StoreError>;
}

#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn insert_history(&self, record: CreateTryOnHistory)
        -> Result<TryOnHistory, StoreError>;

    async fn list_history(
        &self,
        user_id: DbId,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<TryOnHistoryEntry>, StoreError>;
}

/// Postgres-backed catalog and history store.
#[derive(Clone)]
pub struct PgTryOnStore {
    pool: DbPool,
}

impl PgTryOnStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProductCatalog for PgTryOnStore {
    async fn find_product(&self, id: DbId) -> Result<Option<GarmentProduct>, StoreError> {
        let product = ProductRepo::find_by_id(&self.pool, id).await?;
        Ok(product.map(GarmentProduct::from))
    }
}

#[async_trait]
impl HistoryStore for PgTryOnStore {
    async fn insert_history(
        &self,
        record: CreateTryOnHistory,
    ) -> Result<TryOnHistory, StoreError> {
        Ok(TryOnHistoryRepo::create(&self.pool, &record).await?)
    }

    async fn list_history(
        &self,
        user_id: DbId,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<TryOnHistoryEntry>, StoreError> {
        Ok(TryOnHistoryRepo::list_by_user(&self.pool, user_id, limit, offset).await?)
    }
}
