//! Repository for the `users` table.

use immersion_core::types::{DbId, Timestamp};
use sqlx::PgExecutor;

use crate::models::user::{CreateUser, User};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, email, first_name, last_name, password_hash, is_back_office, \
                       is_active, last_login_at, failed_login_count, locked_until, \
                       created_at, updated_at";

/// Provides CRUD operations for users.
pub struct UserRepo;

impl UserRepo {
    /// Insert a new user, returning the created row. Emails are stored
    /// lower-cased.
    pub async fn create(
        executor: impl PgExecutor<'_>,
        input: &CreateUser,
    ) -> Result<User, sqlx::Error> {
        let query = format!(
            "INSERT INTO users (email, first_name, last_name, password_hash, is_back_office)
             VALUES (LOWER($1), $2, $3, $4, $5)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, User>(&query)
            .bind(&input.email)
            .bind(&input.first_name)
            .bind(&input.last_name)
            .bind(&input.password_hash)
            .bind(input.is_back_office)
            .fetch_one(executor)
            .await
    }

    pub async fn find_by_id(
        executor: impl PgExecutor<'_>,
        id: DbId,
    ) -> Result<Option<User>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM users WHERE id = $1");
        sqlx::query_as::<_, User>(&query)
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    /// Find a user by email, ignoring case.
    pub async fn find_by_email(
        executor: impl PgExecutor<'_>,
        email: &str,
    ) -> Result<Option<User>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM users WHERE email = LOWER($1)");
        sqlx::query_as::<_, User>(&query)
            .bind(email.trim())
            .fetch_optional(executor)
            .await
    }

    /// Increment the failed login counter, returning the new count.
    pub async fn increment_failed_login(
        executor: impl PgExecutor<'_>,
        id: DbId,
    ) -> Result<i32, sqlx::Error> {
        sqlx::query_scalar(
            "UPDATE users SET failed_login_count = failed_login_count + 1
             WHERE id = $1
             RETURNING failed_login_count",
        )
        .bind(id)
        .fetch_one(executor)
        .await
    }

    /// Lock a user account until the specified timestamp.
    pub async fn lock_account(
        executor: impl PgExecutor<'_>,
        id: DbId,
        until: Timestamp,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE users SET locked_until = $2 WHERE id = $1")
            .bind(id)
            .bind(until)
            .execute(executor)
            .await?;
        Ok(())
    }

    /// Record a successful login: reset `failed_login_count` to 0, clear
    /// `locked_until`, and set `last_login_at` to now.
    pub async fn record_successful_login(
        executor: impl PgExecutor<'_>,
        id: DbId,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE users SET
                failed_login_count = 0,
                locked_until = NULL,
                last_login_at = NOW()
             WHERE id = $1",
        )
        .bind(id)
        .execute(executor)
        .await?;
        Ok(())
    }
}
