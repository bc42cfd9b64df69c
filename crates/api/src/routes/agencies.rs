//! Route definitions for the `/agencies` resource.

use axum::routing::get;
use axum::Router;

use crate::handlers::agencies;
use crate::state::AppState;

/// Routes mounted at `/agencies`.
///
/// ```text
/// GET  /      -> list (public, active agencies only)
/// POST /      -> create (public)
/// GET  /{id}  -> get_by_id (public)
/// PUT  /{id}  -> update (back-office or agency admin)
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(agencies::list).post(agencies::create))
        .route("/{id}", get(agencies::get_by_id).put(agencies::update))
}
