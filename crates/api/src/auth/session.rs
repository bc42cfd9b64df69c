//! Sessions of connected users (agency staff and back-office).
//!
//! A login yields a short-lived access token and a single-use refresh token.
//! Only the SHA-256 of the refresh token is stored in `user_sessions`;
//! refreshing consumes it and issues a new pair.

use immersion_core::types::DbId;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use super::env_i64;
use super::token::{self, Expiry, TokenClaims, TokenError, TokenKind};

const DEFAULT_ACCESS_EXPIRY_MINS: i64 = 15;
const DEFAULT_REFRESH_EXPIRY_DAYS: i64 = 7;

/// Platform-wide role written in access tokens. Rights on agencies are
/// resolved per request from `user_agency_rights`, not from the token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccessRole {
    #[serde(rename = "back-office")]
    BackOffice,
    #[serde(rename = "user")]
    AgencyUser,
}

impl AccessRole {
    pub fn for_user(is_back_office: bool) -> Self {
        if is_back_office {
            Self::BackOffice
        } else {
            Self::AgencyUser
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BackOffice => "back-office",
            Self::AgencyUser => "user",
        }
    }
}

impl std::fmt::Display for AccessRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    /// User id.
    pub sub: DbId,
    pub role: AccessRole,
    pub iat: i64,
    pub exp: i64,
    pub jti: String,
}

impl TokenClaims for AccessClaims {
    const KIND: TokenKind = TokenKind::Access;
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub secret: String,
    pub access_token_expiry_mins: i64,
    pub refresh_token_expiry_days: i64,
}

impl SessionConfig {
    /// | Env Var                    | Required | Default |
    /// |----------------------------|----------|---------|
    /// | `JWT_SECRET`               | **yes**  | --      |
    /// | `JWT_ACCESS_EXPIRY_MINS`   | no       | `15`    |
    /// | `JWT_REFRESH_EXPIRY_DAYS`  | no       | `7`     |
    ///
    /// # Panics
    ///
    /// Panics if `JWT_SECRET` is missing or empty, or a lifetime is not an
    /// integer.
    pub fn from_env() -> Self {
        let secret =
            std::env::var("JWT_SECRET").expect("JWT_SECRET must be set in the environment");
        assert!(!secret.is_empty(), "JWT_SECRET must not be empty");

        Self {
            secret,
            access_token_expiry_mins: env_i64("JWT_ACCESS_EXPIRY_MINS", DEFAULT_ACCESS_EXPIRY_MINS),
            refresh_token_expiry_days: env_i64(
                "JWT_REFRESH_EXPIRY_DAYS",
                DEFAULT_REFRESH_EXPIRY_DAYS,
            ),
        }
    }

    pub fn access_lifetime(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.access_token_expiry_mins)
    }

    pub fn refresh_lifetime(&self) -> chrono::Duration {
        chrono::Duration::days(self.refresh_token_expiry_days)
    }
}

pub fn issue_access_token(
    user_id: DbId,
    role: AccessRole,
    config: &SessionConfig,
) -> Result<String, TokenError> {
    let (iat, exp) = token::validity(config.access_lifetime());
    let claims = AccessClaims {
        sub: user_id,
        role,
        iat,
        exp,
        jti: Uuid::new_v4().to_string(),
    };
    token::sign(&claims, &config.secret)
}

pub fn verify_access_token(token: &str, config: &SessionConfig) -> Result<AccessClaims, TokenError> {
    token::verify(token, &config.secret, Expiry::Enforced)
}

/// Opaque refresh token handed to the client once.
#[derive(Debug, Clone)]
pub struct RefreshToken {
    pub plaintext: String,
    /// What `user_sessions.refresh_token_hash` stores.
    pub hash: String,
}

impl RefreshToken {
    pub fn issue() -> Self {
        let plaintext = Uuid::new_v4().to_string();
        let hash = Self::hash_of(&plaintext);
        Self { plaintext, hash }
    }

    /// Hex SHA-256 of a refresh token presented by a client.
    pub fn hash_of(plaintext: &str) -> String {
        format!("{:x}", Sha256::digest(plaintext.as_bytes()))
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use crate::auth::magic_link::{generate_establishment_jwt, MagicLinkConfig};

    fn config() -> SessionConfig {
        SessionConfig {
            secret: "session-test-secret".into(),
            access_token_expiry_mins: 15,
            refresh_token_expiry_days: 7,
        }
    }

    #[test]
    fn access_token_carries_user_and_role() {
        let token = issue_access_token(42, AccessRole::BackOffice, &config()).unwrap();
        let claims = verify_access_token(&token, &config()).unwrap();
        assert_eq!(claims.sub, 42);
        assert_eq!(claims.role, AccessRole::BackOffice);
        assert_eq!(claims.exp - claims.iat, 15 * 60);
    }

    #[test]
    fn each_login_gets_a_distinct_token_id() {
        let jti = || {
            let token = issue_access_token(1, AccessRole::AgencyUser, &config()).unwrap();
            verify_access_token(&token, &config()).unwrap().jti
        };
        assert_ne!(jti(), jti());
    }

    #[test]
    fn edit_link_is_not_an_access_token() {
        // Same secret on purpose: only the kind claim tells them apart.
        let links = MagicLinkConfig {
            secret: config().secret,
            convention_expiry_days: 30,
            establishment_expiry_days: 2,
        };
        let link = generate_establishment_jwt("12345678901234", &links).unwrap();
        assert_matches!(
            verify_access_token(&link, &config()),
            Err(TokenError::WrongKind { expected: TokenKind::Access, .. })
        );
    }

    #[test]
    fn refresh_token_is_stored_hashed() {
        let refresh = RefreshToken::issue();
        assert_ne!(refresh.plaintext, refresh.hash);
        assert_eq!(refresh.hash, RefreshToken::hash_of(&refresh.plaintext));
        assert_eq!(refresh.hash.len(), 64);
    }

    #[test]
    fn role_serializes_as_the_api_exposes_it() {
        assert_eq!(serde_json::to_value(AccessRole::AgencyUser).unwrap(), "user");
        assert_eq!(AccessRole::for_user(true).to_string(), "back-office");
    }
}
