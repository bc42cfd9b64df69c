//! Signed tokens shared by user sessions and magic links.
//!
//! Every JWT the platform issues is HS256-signed and tagged with a `kind`
//! claim. A token minted for one purpose is refused by every other verifier,
//! even if two kinds were ever configured with the same secret.

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// What a token grants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TokenKind {
    /// A connected user's API access.
    Access,
    /// A party's access to one convention.
    Convention,
    /// Edition rights on one establishment listing.
    Establishment,
}

impl TokenKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Access => "access",
            Self::Convention => "convention",
            Self::Establishment => "establishment",
        }
    }
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Claims carried by one kind of token.
pub trait TokenClaims: Serialize + DeserializeOwned {
    const KIND: TokenKind;
}

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error(transparent)]
    Jwt(#[from] jsonwebtoken::errors::Error),

    #[error("Malformed token claims: {0}")]
    Claims(#[from] serde_json::Error),

    #[error("Expected a {expected} token, got a {found} token")]
    WrongKind { expected: TokenKind, found: TokenKind },

    #[error("Unsupported magic link version {0}")]
    UnsupportedVersion(i32),
}

impl TokenError {
    pub fn is_expired(&self) -> bool {
        matches!(self, Self::Jwt(e) if matches!(e.kind(), ErrorKind::ExpiredSignature))
    }
}

/// Whether verification rejects a token past its `exp`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiry {
    Enforced,
    /// Only for renewing an expired link; signature and kind still apply.
    Ignored,
}

#[derive(Serialize)]
struct Tagged<'a, C> {
    kind: TokenKind,
    #[serde(flatten)]
    claims: &'a C,
}

#[derive(Deserialize)]
struct TaggedPayload {
    kind: TokenKind,
    #[serde(flatten)]
    claims: Map<String, Value>,
}

pub fn sign<C: TokenClaims>(claims: &C, secret: &str) -> Result<String, TokenError> {
    let tagged = Tagged {
        kind: C::KIND,
        claims,
    };
    Ok(encode(
        &Header::new(Algorithm::HS256),
        &tagged,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?)
}

pub fn verify<C: TokenClaims>(token: &str, secret: &str, expiry: Expiry) -> Result<C, TokenError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = expiry == Expiry::Enforced;

    let payload = decode::<TaggedPayload>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )?
    .claims;
    if payload.kind != C::KIND {
        return Err(TokenError::WrongKind {
            expected: C::KIND,
            found: payload.kind,
        });
    }
    Ok(serde_json::from_value(Value::Object(payload.claims))?)
}

/// `(iat, exp)` Unix timestamps for a token issued now.
pub fn validity(lifetime: chrono::Duration) -> (i64, i64) {
    let now = chrono::Utc::now().timestamp();
    (now, now + lifetime.num_seconds())
}
