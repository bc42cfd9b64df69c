//! Route definitions for the `/users` resource.

use axum::routing::post;
use axum::Router;

use crate::handlers::users;
use crate::state::AppState;

/// Routes mounted at `/users`.
///
/// ```text
/// POST /me/agency-rights -> request_right (requires auth)
/// ```
pub fn router() -> Router<AppState> {
    Router::new().route("/me/agency-rights", post(users::request_right))
}
