//! Route definitions for the `/conventions` resource.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::{assessments, conventions};
use crate::state::AppState;

/// Routes mounted at `/conventions`.
///
/// ```text
/// GET    /                    -> list (requires auth)
/// POST   /                    -> create (public)
/// POST   /magic-link/renew    -> renew_magic_link (public)
/// GET    /{id}                -> get_by_id
/// PUT    /{id}                -> update
/// POST   /{id}/sign           -> sign
/// POST   /{id}/status         -> change_status
/// GET    /{id}/assessment     -> assessments::get_by_convention
/// POST   /{id}/assessment     -> assessments::create
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(conventions::list).post(conventions::create))
        .route("/magic-link/renew", post(conventions::renew_magic_link))
        .route(
            "/{id}",
            get(conventions::get_by_id).put(conventions::update),
        )
        .route("/{id}/sign", post(conventions::sign))
        .route("/{id}/status", post(conventions::change_status))
        .route(
            "/{id}/assessment",
            get(assessments::get_by_convention).post(assessments::create),
        )
}
