//! Read-only repository for the `products` table.

use atelier_core::types::DbId;
use sqlx::PgPool;

use crate::models::product::Product;

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, name, description, price, discount_price, category, image_url, \
    stock_quantity, rating, reviews_count, created_at, updated_at";

/// Lookups against the catalog owned by the product service.
pub struct ProductRepo;

impl ProductRepo {
    /// Find a product by its internal ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Product>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM products WHERE id = $1");
        sqlx::query_as::<_, Product>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }
}
