//! Magic links: tokens granting scoped access without an account.
//!
//! A convention link names the convention, the role of its holder and the
//! SHA-256 of the holder's email. An establishment link names a siret and
//! lets its contact edit the listing. Both are signed with
//! `MAGIC_LINK_SECRET`, distinct from the secret of access tokens.

use immersion_core::roles::Role;
use immersion_core::types::DbId;
use immersion_core::validation::email_hash;
use serde::{Deserialize, Serialize};

use super::env_i64;
use super::token::{self, Expiry, TokenClaims, TokenError, TokenKind};

/// Format version of convention links. Links carrying another version are
/// refused.
pub const MAGIC_LINK_VERSION: i32 = 1;

const DEFAULT_CONVENTION_EXPIRY_DAYS: i64 = 30;
const DEFAULT_ESTABLISHMENT_EXPIRY_DAYS: i64 = 2;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConventionClaims {
    pub convention_id: DbId,
    pub role: Role,
    pub email_hash: String,
    pub iat: i64,
    pub exp: i64,
    pub version: i32,
}

impl TokenClaims for ConventionClaims {
    const KIND: TokenKind = TokenKind::Convention;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EstablishmentClaims {
    pub siret: String,
    pub iat: i64,
    pub exp: i64,
}

impl TokenClaims for EstablishmentClaims {
    const KIND: TokenKind = TokenKind::Establishment;
}

#[derive(Debug, Clone)]
pub struct MagicLinkConfig {
    pub secret: String,
    pub convention_expiry_days: i64,
    pub establishment_expiry_days: i64,
}

impl MagicLinkConfig {
    /// | Env Var                           | Required | Default |
    /// |-----------------------------------|----------|---------|
    /// | `MAGIC_LINK_SECRET`               | **yes**  | --      |
    /// | `MAGIC_LINK_EXPIRY_DAYS`          | no       | `30`    |
    /// | `ESTABLISHMENT_LINK_EXPIRY_DAYS`  | no       | `2`     |
    ///
    /// # Panics
    ///
    /// Panics if `MAGIC_LINK_SECRET` is missing or empty, or a lifetime is
    /// not an integer.
    pub fn from_env() -> Self {
        let secret = std::env::var("MAGIC_LINK_SECRET")
            .expect("MAGIC_LINK_SECRET must be set in the environment");
        assert!(!secret.is_empty(), "MAGIC_LINK_SECRET must not be empty");

        Self {
            secret,
            convention_expiry_days: env_i64("MAGIC_LINK_EXPIRY_DAYS", DEFAULT_CONVENTION_EXPIRY_DAYS),
            establishment_expiry_days: env_i64(
                "ESTABLISHMENT_LINK_EXPIRY_DAYS",
                DEFAULT_ESTABLISHMENT_EXPIRY_DAYS,
            ),
        }
    }
}

pub fn generate_convention_jwt(
    convention_id: DbId,
    role: Role,
    email: &str,
    config: &MagicLinkConfig,
) -> Result<String, TokenError> {
    let (iat, exp) = token::validity(chrono::Duration::days(config.convention_expiry_days));
    let claims = ConventionClaims {
        convention_id,
        role,
        email_hash: email_hash(email),
        iat,
        exp,
        version: MAGIC_LINK_VERSION,
    };
    token::sign(&claims, &config.secret)
}

/// Decode a convention link, checking signature, expiry and version.
pub fn validate_convention_jwt(
    token: &str,
    config: &MagicLinkConfig,
) -> Result<ConventionClaims, TokenError> {
    decode_convention(token, config, Expiry::Enforced)
}

/// Decode a convention link whose only acceptable defect is being expired.
/// Used to renew links.
pub fn decode_expired_convention_jwt(
    token: &str,
    config: &MagicLinkConfig,
) -> Result<ConventionClaims, TokenError> {
    decode_convention(token, config, Expiry::Ignored)
}

fn decode_convention(
    token: &str,
    config: &MagicLinkConfig,
    expiry: Expiry,
) -> Result<ConventionClaims, TokenError> {
    let claims: ConventionClaims = token::verify(token, &config.secret, expiry)?;
    if claims.version != MAGIC_LINK_VERSION {
        return Err(TokenError::UnsupportedVersion(claims.version));
    }
    Ok(claims)
}

pub fn generate_establishment_jwt(
    siret: &str,
    config: &MagicLinkConfig,
) -> Result<String, TokenError> {
    let (iat, exp) = token::validity(chrono::Duration::days(config.establishment_expiry_days));
    let claims = EstablishmentClaims {
        siret: siret.to_string(),
        iat,
        exp,
    };
    token::sign(&claims, &config.secret)
}

pub fn validate_establishment_jwt(
    token: &str,
    config: &MagicLinkConfig,
) -> Result<EstablishmentClaims, TokenError> {
    token::verify(token, &config.secret, Expiry::Enforced)
}

/// Frontend URL carrying a magic link, e.g. `{base}/convention/sign?jwt=...`.
pub fn frontend_link(base_url: &str, path: &str, token: &str) -> String {
    format!(
        "{}/{}?jwt={token}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
