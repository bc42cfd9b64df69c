//! Route definitions for the `/establishments` resource.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::establishments;
use crate::state::AppState;

/// Routes mounted at `/establishments`.
///
/// ```text
/// POST   /                      -> create (public)
/// GET    /{siret}               -> get_by_siret (edit link or back-office)
/// PUT    /{siret}               -> update (edit link or back-office)
/// DELETE /{siret}               -> delete (back-office)
/// POST   /{siret}/edit-link     -> request_edit_link (public)
/// GET    /{siret}/discussions   -> list_discussions (edit link or back-office)
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(establishments::create))
        .route(
            "/{siret}",
            get(establishments::get_by_siret)
                .put(establishments::update)
                .delete(establishments::delete),
        )
        .route("/{siret}/edit-link", post(establishments::request_edit_link))
        .route("/{siret}/discussions", get(establishments::list_discussions))
}
