//! Blob path naming for try-on assets.
//!
//! Every object key is namespaced by the owning user so one user's assets
//! never collide with another's: `{prefix}/{user_id}/{uuid}.{ext}`.

use crate::types::DbId;

/// Bucket holding normalized user photos.
pub const BUCKET_USER_PHOTOS: &str = "user-photos";

/// Bucket holding provider or compositor output.
pub const BUCKET_GENERATED: &str = "generated-images";

/// Build a unique, user-scoped object path.
///
/// # Examples
///
/// ```
/// use atelier_core::naming::user_object_path;
///
/// let path = user_object_path("user-photos", 7, "jpg");
/// assert!(path.starts_with("user-photos/7/"));
/// assert!(path.ends_with(".jpg"));
/// ```
pub fn user_object_path(prefix: &str, user_id: DbId, extension: &str) -> String {
    format!("{prefix}/{user_id}/{}.{extension}", uuid::Uuid::new_v4())
}

/// File extension for a known image content type, defaulting to `bin`.
pub fn extension_for_content_type(content_type: &str) -> &'static str {
    match content_type {
        "image/jpeg" | "image/jpg" => "jpg",
        "image/png" => "png",
        "image/webp" => "webp",
        _ => "bin",
    }
}
