//! Handlers for virtual try-on endpoints.

use atelier_core::preprocess::sniff_content_type;
use atelier_core::tryon::TryOnResult;
use atelier_core::types::DbId;
use atelier_db::models::tryon_history::TryOnHistoryEntry;
use atelier_tryon::provider::ProviderStatus;
use atelier_tryon::{TryOnError, TryOnRequest};
use axum::extract::{Multipart, Query, State};
use axum::Json;

use crate::error::{AppResult, TryOnFailure};
use crate::middleware::auth::AuthUser;
use crate::query::PaginationParams;
use crate::response::DataResponse;
use crate::state::AppState;

/// Multipart field carrying the shopper's photo.
const FIELD_USER_IMAGE: &str = "user_image";
/// Multipart field carrying the product id.
const FIELD_PRODUCT_ID: &str = "product_id";

/// POST /api/v1/try-on/generate
///
/// Accepts a multipart form with a `user_image` file and a `product_id`
/// field. Always answers with a [`TryOnResult`] body: 200 once the run has
/// committed the original image (check `success` for degraded runs), or an
/// error status with `success: false` when the run was rejected.
pub async fn generate(
    user: AuthUser,
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<TryOnResult>, TryOnFailure> {
    let (image, content_type, product_id) = read_form(multipart).await?;

    tracing::info!(
        user_id = user.user_id,
        product_id,
        bytes = image.len(),
        content_type = %content_type,
        "Try-on requested"
    );

    let result = state
        .tryon
        .run(TryOnRequest {
            user_id: user.user_id,
            product_id,
            image,
            content_type,
        })
        .await?;

    Ok(Json(result))
}

/// Pull the photo and product id out of the form.
///
/// A missing content type on the file part falls back to sniffing the bytes
/// so browsers that omit it are not rejected.
async fn read_form(mut multipart: Multipart) -> Result<(Vec<u8>, String, DbId), TryOnError> {
    let mut image: Option<(Vec<u8>, Option<String>)> = None;
    let mut product_id: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| TryOnError::Validation(format!("Invalid multipart body: {e}")))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            FIELD_USER_IMAGE => {
                let content_type = field.content_type().map(str::to_string);
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| TryOnError::Validation(format!("Invalid upload: {e}")))?;
                image = Some((data.to_vec(), content_type));
            }
            FIELD_PRODUCT_ID => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| TryOnError::Validation(format!("Invalid product_id: {e}")))?;
                product_id = Some(text);
            }
            _ => {} // ignore unknown fields
        }
    }

    let (image, declared) = image.ok_or_else(|| {
        TryOnError::Validation(format!("Missing required '{FIELD_USER_IMAGE}' field"))
    })?;
    let content_type = declared
        .filter(|ct| !ct.is_empty() && ct != "application/octet-stream")
        .or_else(|| sniff_content_type(&image).map(str::to_string))
        .unwrap_or_else(|| "application/octet-stream".to_string());

    let product_id = product_id
        .ok_or_else(|| {
            TryOnError::Validation(format!("Missing required '{FIELD_PRODUCT_ID}' field"))
        })?
        .trim()
        .parse::<DbId>()
        .map_err(|_| TryOnError::Validation("product_id must be an integer".into()))?;

    Ok((image, content_type, product_id))
}

/// GET /api/v1/try-on/history?limit=&offset=
///
/// The caller's own try-on history, newest first, with a product summary.
pub async fn list_history(
    user: AuthUser,
    State(state): State<AppState>,
    Query(params): Query<PaginationParams>,
) -> AppResult<Json<DataResponse<Vec<TryOnHistoryEntry>>>> {
    let entries = state
        .tryon
        .history()
        .list_history(user.user_id, params.limit, params.offset)
        .await?;
    Ok(Json(DataResponse { data: entries }))
}

/// GET /api/v1/try-on/providers
///
/// Check every configured provider and report its availability.
pub async fn provider_status(
    _user: AuthUser,
    State(state): State<AppState>,
) -> Json<DataResponse<Vec<ProviderStatus>>> {
    Json(DataResponse {
        data: state.tryon.chain().statuses().await,
    })
}
