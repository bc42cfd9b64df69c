//! Authentication and authorization extractors.
//!
//! - [`auth::AuthUser`] -- Connected user from a JWT Bearer token.
//! - [`rbac::RequireBackOffice`] -- Requires a back-office user.
//! - [`convention_access::ConventionPrincipal`] -- Magic-link holder or
//!   connected user acting on a convention.
//! - [`establishment_access::EstablishmentPrincipal`] -- Holder of an
//!   establishment edit link, or a back-office user.

pub mod auth;
pub mod convention_access;
pub mod establishment_access;
pub mod rbac;

use axum::http::request::Parts;
use immersion_core::error::CoreError;

use crate::error::AppError;

/// Extract the Bearer token of the `Authorization` header.
pub(crate) fn bearer_token(parts: &Parts) -> Result<&str, AppError> {
    let auth_header = parts
        .headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            AppError::Core(CoreError::Unauthorized(
                "Missing Authorization header".into(),
            ))
        })?;

    auth_header.strip_prefix("Bearer ").ok_or_else(|| {
        AppError::Core(CoreError::Unauthorized(
            "Invalid Authorization format. Expected: Bearer <token>".into(),
        ))
    })
}
