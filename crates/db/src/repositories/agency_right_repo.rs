//! Repository for the `user_agency_rights` table.

use immersion_core::roles::AgencyRightRole;
use immersion_core::types::DbId;
use sqlx::{PgConnection, PgExecutor};

use crate::models::agency_right::{AgencyRightInput, UserAgencyRight};

const COLUMNS: &str = "id, user_id, agency_id, role, is_notified_by_email, created_at, updated_at";

pub struct AgencyRightRepo;

impl AgencyRightRepo {
    pub async fn list_for_user(
        executor: impl PgExecutor<'_>,
        user_id: DbId,
    ) -> Result<Vec<UserAgencyRight>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM user_agency_rights WHERE user_id = $1 ORDER BY agency_id"
        );
        sqlx::query_as::<_, UserAgencyRight>(&query)
            .bind(user_id)
            .fetch_all(executor)
            .await
    }

    pub async fn find(
        executor: impl PgExecutor<'_>,
        user_id: DbId,
        agency_id: DbId,
    ) -> Result<Option<UserAgencyRight>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM user_agency_rights WHERE user_id = $1 AND agency_id = $2"
        );
        sqlx::query_as::<_, UserAgencyRight>(&query)
            .bind(user_id)
            .bind(agency_id)
            .fetch_optional(executor)
            .await
    }

    /// Record a pending (`to-review`) right request.
    ///
    /// Fails with a unique violation on `uq_user_agency_rights_user_agency`
    /// when the user already has a right on that agency.
    pub async fn request(
        executor: impl PgExecutor<'_>,
        user_id: DbId,
        agency_id: DbId,
    ) -> Result<UserAgencyRight, sqlx::Error> {
        let query = format!(
            "INSERT INTO user_agency_rights (user_id, agency_id, role)
             VALUES ($1, $2, $3)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, UserAgencyRight>(&query)
            .bind(user_id)
            .bind(agency_id)
            .bind(AgencyRightRole::ToReview.as_str())
            .fetch_one(executor)
            .await
    }

    /// Replace every right of a user with `rights`.
    pub async fn replace_for_user(
        conn: &mut PgConnection,
        user_id: DbId,
        rights: &[AgencyRightInput],
    ) -> Result<Vec<UserAgencyRight>, sqlx::Error> {
        sqlx::query("DELETE FROM user_agency_rights WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *conn)
            .await?;

        let query = format!(
            "INSERT INTO user_agency_rights (user_id, agency_id, role, is_notified_by_email)
             VALUES ($1, $2, $3, $4)
             RETURNING {COLUMNS}"
        );
        let mut created = Vec::with_capacity(rights.len());
        for right in rights {
            let row = sqlx::query_as::<_, UserAgencyRight>(&query)
                .bind(user_id)
                .bind(right.agency_id)
                .bind(&right.role)
                .bind(right.is_notified_by_email)
                .fetch_one(&mut *conn)
                .await?;
            created.push(row);
        }
        Ok(created)
    }

    /// Agency admins of an agency who want email notifications.
    pub async fn list_admin_emails(
        executor: impl PgExecutor<'_>,
        agency_id: DbId,
    ) -> Result<Vec<String>, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT u.email FROM user_agency_rights r
             JOIN users u ON u.id = r.user_id
             WHERE r.agency_id = $1 AND r.role = $2 AND r.is_notified_by_email = true
               AND u.is_active = true
             ORDER BY u.email",
        )
        .bind(agency_id)
        .bind(AgencyRightRole::AgencyAdmin.as_str())
        .fetch_all(executor)
        .await
    }
}
