//! Domain layer for the Atelier try-on backend.
//!
//! Zero internal dependencies: error types, id/timestamp aliases, upload
//! validation, pagination helpers, blob path naming, and the two pure image
//! algorithms (canonical preprocessing and the local fallback compositor).

pub mod compositor;
pub mod error;
pub mod naming;
pub mod pagination;
pub mod preprocess;
pub mod tryon;
pub mod types;
mod watermark;
