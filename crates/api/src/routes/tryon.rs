//! Route definitions for virtual try-on.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::tryon;
use crate::state::AppState;

/// Routes mounted at `/try-on`. All require authentication.
///
/// ```text
/// POST /generate    -> generate
/// GET  /history     -> list_history
/// GET  /providers   -> provider_status
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/generate", post(tryon::generate))
        .route("/history", get(tryon::list_history))
        .route("/providers", get(tryon::provider_status))
}
