//! Pagination defaults and clamps shared by list endpoints.

/// Default number of history rows per page.
pub const DEFAULT_HISTORY_LIMIT: i64 = 20;

/// Maximum number of history rows per page.
pub const MAX_HISTORY_LIMIT: i64 = 100;

/// Clamp a user-provided limit to valid bounds.
pub fn clamp_limit(limit: Option<i64>, default: i64, max: i64) -> i64 {
    limit.unwrap_or(default).max(1).min(max)
}

/// Clamp a user-provided offset to non-negative.
pub fn clamp_offset(offset: Option<i64>) -> i64 {
    offset.unwrap_or(0).max(0)
}
