pub mod admin;
pub mod agencies;
pub mod auth;
pub mod conventions;
pub mod establishments;
pub mod health;
pub mod users;

use axum::routing::{get, post};
use axum::Router;

use crate::handlers;
use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /auth/register                                   register (public)
/// /auth/login                                      login (public)
/// /auth/refresh                                    refresh (public)
/// /auth/logout                                     logout (requires auth)
/// /auth/me                                         current user + rights
///
/// /users/me/agency-rights                          request a right (POST)
///
/// /conventions                                     list (auth), submit (public)
/// /conventions/magic-link/renew                    renew an expired link (POST)
/// /conventions/{id}                                get, update (magic link or auth)
/// /conventions/{id}/sign                           sign (signatory magic link)
/// /conventions/{id}/status                         status change (POST)
/// /conventions/{id}/assessment                     get, create
///
/// /agencies                                        list active, register
/// /agencies/{id}                                   get, update
///
/// /establishments                                  register (public)
/// /establishments/{siret}                          get, update, delete
/// /establishments/{siret}/edit-link                email an edit link (POST)
/// /establishments/{siret}/discussions              contact requests received
/// /search                                          searchable offers (GET)
/// /contact-establishment                           contact request (POST)
/// /siret/{siret}                                   business registry lookup
///
/// /admin/dashboard                                 aggregated counts
/// /admin/notifications                             latest notifications
/// /admin/outbox/failed                             failed and quarantined events
/// /admin/agencies/{id}/status                      agency review (PUT)
/// /admin/users/{id}/agency-rights                  replace rights (PUT)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        // Authentication routes (register, login, refresh, logout, me).
        .nest("/auth", auth::router())
        // Agency rights requests of connected users.
        .nest("/users", users::router())
        // Conventions, their signatures, review and assessment.
        .nest("/conventions", conventions::router())
        // Agencies directory and registration.
        .nest("/agencies", agencies::router())
        // Host establishments.
        .nest("/establishments", establishments::router())
        .route("/search", get(handlers::establishments::search))
        .route("/contact-establishment", post(handlers::establishments::contact))
        .route("/siret/{siret}", get(handlers::admin::get_siret))
        // Back-office.
        .nest("/admin", admin::router())
}
