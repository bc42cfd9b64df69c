//! Repository for the `agencies` table.

use immersion_core::agency::AgencyStatus;
use immersion_core::types::DbId;
use sqlx::PgExecutor;

use crate::models::agency::{Agency, AgencyFilter, AgencyPublic, CreateAgency, UpdateAgency};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, name, kind, status, address, postcode, department_code, city, \
                       agency_siret, counsellor_emails, validator_emails, refers_to_agency_id, \
                       rejection_justification, created_at, updated_at";

const PUBLIC_COLUMNS: &str =
    "id, name, kind, address, postcode, department_code, city, refers_to_agency_id";

/// Provides CRUD operations for agencies.
pub struct AgencyRepo;

impl AgencyRepo {
    /// Insert a new agency in `needsReview`, returning the created row.
    pub async fn create(
        executor: impl PgExecutor<'_>,
        input: &CreateAgency,
    ) -> Result<Agency, sqlx::Error> {
        let query = format!(
            "INSERT INTO agencies (name, kind, address, postcode, department_code, city, \
                                   agency_siret, counsellor_emails, validator_emails, refers_to_agency_id)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Agency>(&query)
            .bind(&input.name)
            .bind(&input.kind)
            .bind(&input.address)
            .bind(&input.postcode)
            .bind(&input.department_code)
            .bind(&input.city)
            .bind(&input.agency_siret)
            .bind(&input.counsellor_emails)
            .bind(&input.validator_emails)
            .bind(input.refers_to_agency_id)
            .fetch_one(executor)
            .await
    }

    pub async fn find_by_id(
        executor: impl PgExecutor<'_>,
        id: DbId,
    ) -> Result<Option<Agency>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM agencies WHERE id = $1");
        sqlx::query_as::<_, Agency>(&query)
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    /// Load an agency and lock its row for the rest of the transaction, so
    /// concurrent status changes serialize.
    pub async fn find_by_id_for_update(
        executor: impl PgExecutor<'_>,
        id: DbId,
    ) -> Result<Option<Agency>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM agencies WHERE id = $1 FOR UPDATE");
        sqlx::query_as::<_, Agency>(&query)
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    /// Load an agency under a share lock: its status cannot change until the
    /// transaction ends, while other readers proceed.
    pub async fn find_by_id_for_share(
        executor: impl PgExecutor<'_>,
        id: DbId,
    ) -> Result<Option<Agency>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM agencies WHERE id = $1 FOR SHARE");
        sqlx::query_as::<_, Agency>(&query)
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    /// List active agencies, optionally filtered by department, kind and a
    /// case-insensitive name fragment.
    pub async fn list_active(
        executor: impl PgExecutor<'_>,
        filter: &AgencyFilter,
    ) -> Result<Vec<AgencyPublic>, sqlx::Error> {
        let query = format!(
            "SELECT {PUBLIC_COLUMNS} FROM agencies
             WHERE status = $1
               AND ($2::TEXT IS NULL OR department_code = $2)
               AND ($3::TEXT IS NULL OR kind = $3)
               AND ($4::TEXT IS NULL OR name ILIKE '%' || $4 || '%')
             ORDER BY name"
        );
        sqlx::query_as::<_, AgencyPublic>(&query)
            .bind(AgencyStatus::Active.as_str())
            .bind(&filter.department)
            .bind(&filter.kind)
            .bind(&filter.name)
            .fetch_all(executor)
            .await
    }

    /// Update an agency. Only non-`None` fields in `input` are applied.
    ///
    /// Returns `None` if no row with the given `id` exists.
    pub async fn update(
        executor: impl PgExecutor<'_>,
        id: DbId,
        input: &UpdateAgency,
    ) -> Result<Option<Agency>, sqlx::Error> {
        let query = format!(
            "UPDATE agencies SET
                name = COALESCE($2, name),
                address = COALESCE($3, address),
                postcode = COALESCE($4, postcode),
                department_code = COALESCE($5, department_code),
                city = COALESCE($6, city),
                agency_siret = COALESCE($7, agency_siret),
                counsellor_emails = COALESCE($8, counsellor_emails),
                validator_emails = COALESCE($9, validator_emails)
             WHERE id = $1
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Agency>(&query)
            .bind(id)
            .bind(&input.name)
            .bind(&input.address)
            .bind(&input.postcode)
            .bind(&input.department_code)
            .bind(&input.city)
            .bind(&input.agency_siret)
            .bind(&input.counsellor_emails)
            .bind(&input.validator_emails)
            .fetch_optional(executor)
            .await
    }

    /// Set the status, storing the justification when one is given.
    pub async fn update_status(
        executor: impl PgExecutor<'_>,
        id: DbId,
        status: AgencyStatus,
        justification: Option<&str>,
    ) -> Result<Option<Agency>, sqlx::Error> {
        let query = format!(
            "UPDATE agencies SET status = $2, rejection_justification = $3
             WHERE id = $1
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Agency>(&query)
            .bind(id)
            .bind(status.as_str())
            .bind(justification)
            .fetch_optional(executor)
            .await
    }

    /// Number of agencies still operating (pending review or active) that
    /// refer to `id`.
    pub async fn count_referring(
        executor: impl PgExecutor<'_>,
        id: DbId,
    ) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT COUNT(*) FROM agencies
             WHERE refers_to_agency_id = $1 AND status IN ($2, $3)",
        )
        .bind(id)
        .bind(AgencyStatus::NeedsReview.as_str())
        .bind(AgencyStatus::Active.as_str())
        .fetch_one(executor)
        .await
    }
}
