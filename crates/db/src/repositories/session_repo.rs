//! Repository for the `user_sessions` table.

use immersion_core::types::{DbId, Timestamp};
use sqlx::PgExecutor;

use crate::models::session::UserSession;

const COLUMNS: &str =
    "id, user_id, refresh_token_hash, expires_at, is_revoked, created_at, updated_at";

pub struct SessionRepo;

impl SessionRepo {
    pub async fn create(
        executor: impl PgExecutor<'_>,
        user_id: DbId,
        refresh_token_hash: &str,
        expires_at: Timestamp,
    ) -> Result<UserSession, sqlx::Error> {
        let query = format!(
            "INSERT INTO user_sessions (user_id, refresh_token_hash, expires_at)
             VALUES ($1, $2, $3)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, UserSession>(&query)
            .bind(user_id)
            .bind(refresh_token_hash)
            .bind(expires_at)
            .fetch_one(executor)
            .await
    }

    /// Revoke the live session holding `refresh_token_hash` and return it.
    ///
    /// A refresh token is single-use: of two concurrent calls with the same
    /// token, only one gets the session back.
    pub async fn consume(
        executor: impl PgExecutor<'_>,
        refresh_token_hash: &str,
    ) -> Result<Option<UserSession>, sqlx::Error> {
        let query = format!(
            "UPDATE user_sessions SET is_revoked = true
             WHERE refresh_token_hash = $1
               AND is_revoked = false
               AND expires_at > NOW()
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, UserSession>(&query)
            .bind(refresh_token_hash)
            .fetch_optional(executor)
            .await
    }

    /// Revoke every live session of a user. Returns how many were revoked.
    pub async fn revoke_all_for_user(
        executor: impl PgExecutor<'_>,
        user_id: DbId,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE user_sessions SET is_revoked = true
             WHERE user_id = $1 AND is_revoked = false",
        )
        .bind(user_id)
        .execute(executor)
        .await?;
        Ok(result.rows_affected())
    }

    /// Delete expired and revoked sessions.
    pub async fn cleanup_expired(executor: impl PgExecutor<'_>) -> Result<u64, sqlx::Error> {
        let result =
            sqlx::query("DELETE FROM user_sessions WHERE expires_at < NOW() OR is_revoked = true")
                .execute(executor)
                .await?;
        Ok(result.rows_affected())
    }
}
