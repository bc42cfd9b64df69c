//! Shared query parameter types for API handlers.

use serde::Deserialize;

/// Generic pagination parameters (`?limit=&offset=`).
///
/// Values are clamped with `clamp_limit` / `clamp_offset` before they reach
/// the repositories.
#[derive(Debug, Deserialize)]
pub struct PaginationParams {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}
