//! Access to an establishment listing through its edit link.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use immersion_core::error::CoreError;

use super::auth::AuthUser;
use super::bearer_token;
use crate::auth::magic_link::validate_establishment_jwt;
use crate::error::AppError;
use crate::state::AppState;

/// Who is editing an establishment.
#[derive(Debug, Clone)]
pub enum EstablishmentPrincipal {
    /// Holder of an edit link for this siret.
    EditLink { siret: String },
    BackOffice(AuthUser),
}

impl EstablishmentPrincipal {
    /// Fail with 403 unless the principal may act on `siret`.
    pub fn ensure_siret(&self, siret: &str) -> Result<(), AppError> {
        match self {
            Self::EditLink { siret: allowed } if allowed != siret => Err(AppError::Core(
                CoreError::Forbidden("This link does not grant access to this establishment".into()),
            )),
            _ => Ok(()),
        }
    }
}

impl FromRequestParts<AppState> for EstablishmentPrincipal {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?;

        if let Ok(claims) = validate_establishment_jwt(token, &state.config.magic_link) {
            return Ok(Self::EditLink { siret: claims.siret });
        }

        let user = AuthUser::from_request_parts(parts, state).await?;
        if !user.is_back_office() {
            return Err(AppError::Core(CoreError::Forbidden(
                "Back-office role required".into(),
            )));
        }
        Ok(Self::BackOffice(user))
    }
}
