//! Repository for the `conventions` table.

use immersion_core::convention::ConventionForm;
use immersion_core::convention_status::ConventionStatus;
use immersion_core::types::DbId;
use sqlx::types::Json;
use sqlx::PgExecutor;

use crate::models::convention::{Convention, ConventionStatusChange, CreateConvention};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, agency_id, status, status_justification, internship_kind, \
                       date_submission, date_start, date_end, date_validation, schedule, siret, \
                       business_name, immersion_address, immersion_objective, \
                       immersion_appellation, immersion_activities, immersion_skills, \
                       work_conditions, individual_protection, sanitary_prevention, \
                       sanitary_prevention_description, signatories, establishment_tutor, \
                       created_at, updated_at";

/// Provides persistence for conventions.
pub struct ConventionRepo;

impl ConventionRepo {
    /// Insert a submitted convention in `READY_TO_SIGN`.
    pub async fn create(
        executor: impl PgExecutor<'_>,
        input: &CreateConvention<'_>,
    ) -> Result<Convention, sqlx::Error> {
        let form = input.form;
        let query = format!(
            "INSERT INTO conventions (
                agency_id, status, internship_kind, date_submission, date_start, date_end,
                schedule, siret, business_name, immersion_address, immersion_objective,
                immersion_appellation, immersion_activities, immersion_skills, work_conditions,
                individual_protection, sanitary_prevention, sanitary_prevention_description,
                signatories, establishment_tutor)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17,
                     $18, $19, $20)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Convention>(&query)
            .bind(form.agency_id)
            .bind(ConventionStatus::ReadyToSign.as_str())
            .bind(form.internship_kind.as_str())
            .bind(input.date_submission)
            .bind(form.date_start)
            .bind(form.date_end)
            .bind(Json(&form.schedule))
            .bind(&form.siret)
            .bind(&form.business_name)
            .bind(&form.immersion_address)
            .bind(&form.immersion_objective)
            .bind(Json(&form.immersion_appellation))
            .bind(&form.immersion_activities)
            .bind(&form.immersion_skills)
            .bind(&form.work_conditions)
            .bind(form.individual_protection)
            .bind(form.sanitary_prevention)
            .bind(&form.sanitary_prevention_description)
            .bind(Json(&form.signatories))
            .bind(Json(&form.establishment_tutor))
            .fetch_one(executor)
            .await
    }

    pub async fn find_by_id(
        executor: impl PgExecutor<'_>,
        id: DbId,
    ) -> Result<Option<Convention>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM conventions WHERE id = $1");
        sqlx::query_as::<_, Convention>(&query)
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    /// Same as [`find_by_id`](Self::find_by_id) but takes a row lock for the
    /// rest of the transaction, so concurrent signatures serialize.
    pub async fn find_by_id_for_update(
        executor: impl PgExecutor<'_>,
        id: DbId,
    ) -> Result<Option<Convention>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM conventions WHERE id = $1 FOR UPDATE");
        sqlx::query_as::<_, Convention>(&query)
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    /// Replace the content of a convention after an edit.
    ///
    /// The caller clears signatures on `form`; the status goes back to
    /// `READY_TO_SIGN` and any previous justification is dropped.
    pub async fn update_form(
        executor: impl PgExecutor<'_>,
        id: DbId,
        form: &ConventionForm,
    ) -> Result<Option<Convention>, sqlx::Error> {
        let query = format!(
            "UPDATE conventions SET
                agency_id = $2,
                status = $3,
                status_justification = NULL,
                internship_kind = $4,
                date_start = $5,
                date_end = $6,
                schedule = $7,
                siret = $8,
                business_name = $9,
                immersion_address = $10,
                immersion_objective = $11,
                immersion_appellation = $12,
                immersion_activities = $13,
                immersion_skills = $14,
                work_conditions = $15,
                individual_protection = $16,
                sanitary_prevention = $17,
                sanitary_prevention_description = $18,
                signatories = $19,
                establishment_tutor = $20
             WHERE id = $1
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Convention>(&query)
            .bind(id)
            .bind(form.agency_id)
            .bind(ConventionStatus::ReadyToSign.as_str())
            .bind(form.internship_kind.as_str())
            .bind(form.date_start)
            .bind(form.date_end)
            .bind(Json(&form.schedule))
            .bind(&form.siret)
            .bind(&form.business_name)
            .bind(&form.immersion_address)
            .bind(&form.immersion_objective)
            .bind(Json(&form.immersion_appellation))
            .bind(&form.immersion_activities)
            .bind(&form.immersion_skills)
            .bind(&form.work_conditions)
            .bind(form.individual_protection)
            .bind(form.sanitary_prevention)
            .bind(&form.sanitary_prevention_description)
            .bind(Json(&form.signatories))
            .bind(Json(&form.establishment_tutor))
            .fetch_optional(executor)
            .await
    }

    /// Apply a status change. `signatories` and `date_validation` are only
    /// written when present.
    pub async fn update_status(
        executor: impl PgExecutor<'_>,
        id: DbId,
        change: &ConventionStatusChange,
    ) -> Result<Option<Convention>, sqlx::Error> {
        let query = format!(
            "UPDATE conventions SET
                status = $2,
                status_justification = $3,
                signatories = COALESCE($4, signatories),
                date_validation = COALESCE($5, date_validation)
             WHERE id = $1
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Convention>(&query)
            .bind(id)
            .bind(change.status.as_str())
            .bind(&change.justification)
            .bind(change.signatories.as_ref().map(Json))
            .bind(change.date_validation)
            .fetch_optional(executor)
            .await
    }

    /// Conventions of the given agencies, newest first.
    pub async fn list_for_agencies(
        executor: impl PgExecutor<'_>,
        agency_ids: &[DbId],
        status: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Convention>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM conventions
             WHERE agency_id = ANY($1)
               AND ($2::TEXT IS NULL OR status = $2)
             ORDER BY created_at DESC, id DESC
             LIMIT $3 OFFSET $4"
        );
        sqlx::query_as::<_, Convention>(&query)
            .bind(agency_ids)
            .bind(status)
            .bind(limit)
            .bind(offset)
            .fetch_all(executor)
            .await
    }
}
