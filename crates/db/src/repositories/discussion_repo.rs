//! Repository for the `discussions` table.

use immersion_core::types::{DbId, Timestamp};
use sqlx::PgExecutor;

use crate::models::discussion::{CreateDiscussion, Discussion};

const COLUMNS: &str = "id, establishment_id, siret, appellation_code, contact_mode, status, \
                       potential_beneficiary_first_name, potential_beneficiary_last_name, \
                       potential_beneficiary_email, potential_beneficiary_phone, message, \
                       created_at, updated_at";

pub struct DiscussionRepo;

impl DiscussionRepo {
    pub async fn create(
        executor: impl PgExecutor<'_>,
        input: &CreateDiscussion<'_>,
    ) -> Result<Discussion, sqlx::Error> {
        let request = input.request;
        let query = format!(
            "INSERT INTO discussions (establishment_id, siret, appellation_code, contact_mode, \
                 potential_beneficiary_first_name, potential_beneficiary_last_name, \
                 potential_beneficiary_email, potential_beneficiary_phone, message)
             VALUES ($1, $2, $3, $4, $5, $6, LOWER($7), $8, $9)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Discussion>(&query)
            .bind(input.establishment_id)
            .bind(&request.siret)
            .bind(&request.appellation_code)
            .bind(request.contact_mode.as_str())
            .bind(request.potential_beneficiary_first_name.trim())
            .bind(request.potential_beneficiary_last_name.trim())
            .bind(request.potential_beneficiary_email.trim())
            .bind(&request.potential_beneficiary_phone)
            .bind(&request.message)
            .fetch_one(executor)
            .await
    }

    pub async fn find_by_id(
        executor: impl PgExecutor<'_>,
        id: DbId,
    ) -> Result<Option<Discussion>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM discussions WHERE id = $1");
        sqlx::query_as::<_, Discussion>(&query)
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    /// Whether `email` already contacted this offer since `since`.
    pub async fn exists_since(
        executor: impl PgExecutor<'_>,
        siret: &str,
        appellation_code: &str,
        email: &str,
        since: Timestamp,
    ) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT EXISTS (
                SELECT 1 FROM discussions
                WHERE siret = $1 AND appellation_code = $2
                  AND potential_beneficiary_email = LOWER($3)
                  AND created_at >= $4
             )",
        )
        .bind(siret)
        .bind(appellation_code)
        .bind(email.trim())
        .bind(since)
        .fetch_one(executor)
        .await
    }

    /// Number of contact requests an establishment received since `since`.
    pub async fn count_since(
        executor: impl PgExecutor<'_>,
        establishment_id: DbId,
        since: Timestamp,
    ) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT COUNT(*) FROM discussions WHERE establishment_id = $1 AND created_at >= $2",
        )
        .bind(establishment_id)
        .bind(since)
        .fetch_one(executor)
        .await
    }

    pub async fn list_for_establishment(
        executor: impl PgExecutor<'_>,
        establishment_id: DbId,
    ) -> Result<Vec<Discussion>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM discussions
             WHERE establishment_id = $1
             ORDER BY created_at DESC, id DESC"
        );
        sqlx::query_as::<_, Discussion>(&query)
            .bind(establishment_id)
            .fetch_all(executor)
            .await
    }
}
