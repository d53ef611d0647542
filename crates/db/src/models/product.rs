//! Catalog product rows (read-only from this service).

use atelier_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `products` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Product {
    pub id: DbId,
    pub name: String,
    pub description: Option<String>,
    pub price: f64,
    pub discount_price: Option<f64>,
    pub category: String,
    /// Public URL of the garment image used for try-on.
    pub image_url: String,
    pub stock_quantity: i32,
    pub rating: f64,
    pub reviews_count: i32,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}
