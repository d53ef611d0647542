//! Integration tests for the product and try-on history repositories.

use atelier_core::types::DbId;
use atelier_db::models::tryon_history::CreateTryOnHistory;
use atelier_db::repositories::{ProductRepo, TryOnHistoryRepo};
use sqlx::PgPool;

async fn seed_product(pool: &PgPool, name: &str) -> DbId {
    let (id,): (DbId,) = sqlx::query_as(
        "INSERT INTO products (name, price, category, image_url)
         VALUES ($1, 99.0, 'outerwear', 'https://cdn.example.com/jacket.png')
         RETURNING id",
    )
    .bind(name)
    .fetch_one(pool)
    .await
    .unwrap();
    id
}

fn record(user_id: DbId, product_id: DbId, n: u32) -> CreateTryOnHistory {
    CreateTryOnHistory {
        user_id,
        product_id,
        original_image_url: format!("https://blob/user-photos/{user_id}/{n}.jpg"),
        generated_image_url: format!("https://blob/generated-images/{user_id}/{n}.jpg"),
    }
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn find_product_by_id(pool: PgPool) {
    let id = seed_product(&pool, "Red Jacket").await;

    let product = ProductRepo::find_by_id(&pool, id).await.unwrap().unwrap();
    assert_eq!(product.name, "Red Jacket");
    assert_eq!(product.category, "outerwear");

    assert!(ProductRepo::find_by_id(&pool, id + 1000).await.unwrap().is_none());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn create_returns_inserted_row(pool: PgPool) {
    let product_id = seed_product(&pool, "Red Jacket").await;

    let row = TryOnHistoryRepo::create(&pool, &record(7, product_id, 1))
        .await
        .unwrap();
    assert_eq!(row.user_id, 7);
    assert_eq!(row.product_id, product_id);
    assert!(row.generated_image_url.ends_with("/7/1.jpg"));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn list_is_newest_first_and_scoped_to_user(pool: PgPool) {
    let product_id = seed_product(&pool, "Red Jacket").await;

    for n in 1..=3 {
        TryOnHistoryRepo::create(&pool, &record(7, product_id, n))
            .await
            .unwrap();
    }
    TryOnHistoryRepo::create(&pool, &record(8, product_id, 99))
        .await
        .unwrap();

    let rows = TryOnHistoryRepo::list_by_user(&pool, 7, None, None)
        .await
        .unwrap();
    assert_eq!(rows.len(), 3);
    assert!(rows[0].generated_image_url.ends_with("/3.jpg"));
    assert!(rows[2].generated_image_url.ends_with("/1.jpg"));
    assert!(rows.iter().all(|r| r.user_id == 7));
    assert_eq!(rows[0].product.name, "Red Jacket");

    let other = TryOnHistoryRepo::list_by_user(&pool, 8, None, None).await.unwrap();
    assert_eq!(other.len(), 1);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn list_respects_limit_and_offset(pool: PgPool) {
    let product_id = seed_product(&pool, "Red Jacket").await;
    for n in 1..=5 {
        TryOnHistoryRepo::create(&pool, &record(7, product_id, n))
            .await
            .unwrap();
    }

    let page = TryOnHistoryRepo::list_by_user(&pool, 7, Some(2), Some(1))
        .await
        .unwrap();
    assert_eq!(page.len(), 2);
    assert!(page[0].generated_image_url.ends_with("/4.jpg"));
    assert!(page[1].generated_image_url.ends_with("/3.jpg"));
}
