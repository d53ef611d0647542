//! Repository for the append-only `tryon_history` table.

use atelier_core::pagination::{clamp_limit, clamp_offset, DEFAULT_HISTORY_LIMIT, MAX_HISTORY_LIMIT};
use atelier_core::types::DbId;
use sqlx::PgPool;

use crate::models::tryon_history::{CreateTryOnHistory, TryOnHistory, TryOnHistoryEntry};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str =
    "id, user_id, product_id, original_image_url, generated_image_url, created_at";

/// Insert and list operations for try-on history. Rows are never updated.
pub struct TryOnHistoryRepo;

impl TryOnHistoryRepo {
    /// Record a completed try-on run, returning the created row.
    pub async fn create(
        pool: &PgPool,
        input: &CreateTryOnHistory,
    ) -> Result<TryOnHistory, sqlx::Error> {
        let query = format!(
            "INSERT INTO tryon_history
                (user_id, product_id, original_image_url, generated_image_url)
             VALUES ($1, $2, $3, $4)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, TryOnHistory>(&query)
            .bind(input.user_id)
            .bind(input.product_id)
            .bind(&input.original_image_url)
            .bind(&input.generated_image_url)
            .fetch_one(pool)
            .await
    }

    /// List a user's history newest-first, joined with a product summary.
    ///
    /// `limit` is clamped to `1..=100` (default 20); `offset` to `>= 0`.
    /// Ties on `created_at` are broken by descending id so insertion order
    /// is preserved.
    pub async fn list_by_user(
        pool: &PgPool,
        user_id: DbId,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<TryOnHistoryEntry>, sqlx::Error> {
        let limit = clamp_limit(limit, DEFAULT_HISTORY_LIMIT, MAX_HISTORY_LIMIT);
        let offset = clamp_offset(offset);
        sqlx::query_as::<_, TryOnHistoryEntry>(
            "SELECT h.id, h.user_id, h.product_id, h.original_image_url,
                    h.generated_image_url, h.created_at,
                    p.name, p.category, p.image_url, p.price
             FROM tryon_history h
             JOIN products p ON p.id = h.product_id
             WHERE h.user_id = $1
             ORDER BY h.created_at DESC, h.id DESC
             LIMIT $2 OFFSET $3",
        )
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await
    }
}
