//! Try-on history models.
//!
//! History rows are immutable once written: there is no update DTO.

use atelier_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `tryon_history` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct TryOnHistory {
    pub id: DbId,
    pub user_id: DbId,
    pub product_id: DbId,
    pub original_image_url: String,
    pub generated_image_url: String,
    pub created_at: Timestamp,
}

/// DTO for recording a completed try-on run.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateTryOnHistory {
    pub user_id: DbId,
    pub product_id: DbId,
    pub original_image_url: String,
    pub generated_image_url: String,
}

/// Product fields embedded in history listings.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ProductSummary {
    pub name: String,
    pub category: String,
    pub image_url: String,
    pub price: f64,
}

/// A history row joined with its product summary.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct TryOnHistoryEntry {
    pub id: DbId,
    pub user_id: DbId,
    pub product_id: DbId,
    pub original_image_url: String,
    pub generated_image_url: String,
    pub created_at: Timestamp,
    #[sqlx(flatten)]
    pub product: ProductSummary,
}
