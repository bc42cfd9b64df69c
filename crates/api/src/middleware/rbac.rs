//! Role-based access control extractors.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use immersion_core::error::CoreError;

use super::auth::AuthUser;
use crate::error::AppError;
use crate::state::AppState;

/// Requires a back-office user. Rejects with 403 Forbidden otherwise.
///
/// ```ignore
/// async fn admin_only(RequireBackOffice(user): RequireBackOffice) -> AppResult<Json<()>> {
///     Ok(Json(()))
/// }
/// ```
pub struct RequireBackOffice(pub AuthUser);

impl FromRequestParts<AppState> for RequireBackOffice {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        if !user.is_back_office() {
            return Err(AppError::Core(CoreError::Forbidden(
                "Back-office role required".into(),
            )));
        }
        Ok(RequireBackOffice(user))
    }
}
