//! Refresh-token sessions of connected users.

use immersion_core::types::{DbId, Timestamp};
use sqlx::FromRow;

/// A row from the `user_sessions` table. Only the hash of the refresh token
/// is stored.
#[derive(Debug, Clone, FromRow)]
pub struct UserSession {
    pub id: DbId,
    pub user_id: DbId,
    pub refresh_token_hash: String,
    pub expires_at: Timestamp,
    pub is_revoked: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}
