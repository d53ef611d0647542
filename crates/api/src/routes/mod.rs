pub mod health;
pub mod tryon;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /try-on/generate                                 generate (POST, multipart)
/// /try-on/history                                  list own history (GET)
/// /try-on/providers                                provider status checks (GET)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new().nest("/try-on", tryon::router())
}
