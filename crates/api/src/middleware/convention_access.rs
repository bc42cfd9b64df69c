//! Who is acting on a convention, and with which role.
//!
//! A request on a convention carries either a convention magic link or a
//! connected user's access token. The extractor only authenticates; the role
//! is resolved against the convention itself by [`resolve_role`].

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use immersion_core::error::CoreError;
use immersion_core::roles::{AgencyRightRole, Role};
use immersion_core::types::DbId;
use immersion_core::validation::email_hash;
use immersion_db::models::agency::Agency;
use immersion_db::models::convention::Convention;
use immersion_db::repositories::{AgencyRepo, AgencyRightRepo};
use sqlx::PgConnection;

use super::auth::AuthUser;
use super::bearer_token;
use crate::auth::magic_link::{validate_convention_jwt, ConventionClaims};
use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Clone)]
pub enum ConventionPrincipal {
    MagicLink(ConventionClaims),
    Connected(AuthUser),
}

impl FromRequestParts<AppState> for ConventionPrincipal {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?;

        match validate_convention_jwt(token, &state.config.magic_link) {
            Ok(claims) => return Ok(Self::MagicLink(claims)),
            Err(e) if e.is_expired() => {
                return Err(AppError::Core(CoreError::Unauthorized(
                    "Magic link expired, ask for a new one".into(),
                )))
            }
            Err(_) => {}
        }

        let user = AuthUser::from_request_parts(parts, state).await?;
        Ok(Self::Connected(user))
    }
}

impl ConventionPrincipal {
    /// The magic-link claims, or 403 for a connected user.
    pub fn magic_link(&self) -> Result<&ConventionClaims, AppError> {
        match self {
            Self::MagicLink(claims) => Ok(claims),
            Self::Connected(_) => Err(AppError::Core(CoreError::Forbidden(
                "This action requires a convention magic link".into(),
            ))),
        }
    }
}

/// Resolve the role `principal` holds on `convention`.
///
/// - A magic link must name this convention, and its email hash must match
///   the party holding the role.
/// - A back-office user acts as `back-office`.
/// - Any other connected user acts with their right on the convention's
///   agency, or on the agency it refers conventions to.
pub async fn resolve_role(
    conn: &mut PgConnection,
    principal: &ConventionPrincipal,
    convention: &Convention,
) -> Result<Role, AppError> {
    match principal {
        ConventionPrincipal::MagicLink(claims) => {
            if claims.convention_id != convention.id {
                return Err(forbidden("This link was issued for another convention"));
            }
            let emails = party_emails(conn, convention, claims.role).await?;
            if emails.iter().any(|email| email_hash(email) == claims.email_hash) {
                Ok(claims.role)
            } else {
                Err(forbidden("This link no longer matches a party of the convention"))
            }
        }
        ConventionPrincipal::Connected(user) if user.is_back_office() => Ok(Role::BackOffice),
        ConventionPrincipal::Connected(user) => {
            let agency = load_agency(conn, convention.agency_id).await?;
            let mut role = granted_role(conn, user.user_id, agency.id).await?;
            if role.is_none() {
                if let Some(referred_id) = agency.refers_to_agency_id {
                    role = granted_role(conn, user.user_id, referred_id).await?;
                }
            }
            role.ok_or_else(|| forbidden("You have no right on this convention's agency"))
        }
    }
}

/// Emails of whoever holds `role` on `convention`.
///
/// Validators of an agency that refers to another agency are those of the
/// referred agency.
pub async fn party_emails(
    conn: &mut PgConnection,
    convention: &Convention,
    role: Role,
) -> Result<Vec<String>, AppError> {
    let emails = match role {
        Role::EstablishmentTutor => vec![convention.establishment_tutor.email.clone()],
        Role::Counsellor => load_agency(conn, convention.agency_id).await?.counsellor_emails,
        Role::Validator => {
            let agency = load_agency(conn, convention.agency_id).await?;
            match agency.refers_to_agency_id {
                Some(referred_id) => load_agency(conn, referred_id).await?.validator_emails,
                None => agency.validator_emails,
            }
        }
        role => convention
            .signatories
            .email_for(role)
            .map(|email| vec![email.to_string()])
            .unwrap_or_default(),
    };
    Ok(emails)
}

/// The convention role granted by the user's right on `agency_id`. A right
/// still awaiting review grants none.
async fn granted_role(
    conn: &mut PgConnection,
    user_id: DbId,
    agency_id: DbId,
) -> Result<Option<Role>, AppError> {
    let right = AgencyRightRepo::find(&mut *conn, user_id, agency_id).await?;
    Ok(right
        .and_then(|r| AgencyRightRole::parse(&r.role))
        .and_then(|r| r.as_role()))
}

async fn load_agency(conn: &mut PgConnection, id: DbId) -> Result<Agency, AppError> {
    AgencyRepo::find_by_id(&mut *conn, id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound { entity: "Agency", id }))
}

fn forbidden(msg: &str) -> AppError {
    AppError::Core(CoreError::Forbidden(msg.into()))
}
