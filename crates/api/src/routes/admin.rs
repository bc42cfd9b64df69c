//! Route definitions for the `/admin` resource.

use axum::routing::{get, put};
use axum::Router;

use crate::handlers::{admin, agencies, users};
use crate::state::AppState;

/// Routes mounted at `/admin`.
///
/// All routes require a back-office user (enforced by handler extractors).
///
/// ```text
/// GET /dashboard                  -> dashboard
/// GET /notifications              -> list_notifications
/// GET /outbox/failed              -> list_failed_events
/// PUT /agencies/{id}/status       -> agencies::change_status
/// PUT /users/{id}/agency-rights   -> users::replace_rights
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/dashboard", get(admin::dashboard))
        .route("/notifications", get(admin::list_notifications))
        .route("/outbox/failed", get(admin::list_failed_events))
        .route("/agencies/{id}/status", put(agencies::change_status))
        .route("/users/{id}/agency-rights", put(users::replace_rights))
}
