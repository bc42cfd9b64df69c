//! Repository for the `assessments` table.

use immersion_core::assessment::AssessmentForm;
use immersion_core::types::DbId;
use sqlx::PgExecutor;

use crate::models::assessment::Assessment;

const COLUMNS: &str = "id, convention_id, status, establishment_feedback, last_day_of_presence, \
                       number_of_missed_hours, created_at, updated_at";

pub struct AssessmentRepo;

impl AssessmentRepo {
    /// Insert the assessment of a convention.
    ///
    /// A second assessment for the same convention violates
    /// `uq_assessments_convention_id`.
    pub async fn create(
        executor: impl PgExecutor<'_>,
        convention_id: DbId,
        form: &AssessmentForm,
    ) -> Result<Assessment, sqlx::Error> {
        let query = format!(
            "INSERT INTO assessments (convention_id, status, establishment_feedback, \
                                      last_day_of_presence, number_of_missed_hours)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Assessment>(&query)
            .bind(convention_id)
            .bind(form.status.as_str())
            .bind(form.establishment_feedback.trim())
            .bind(form.last_day_of_presence)
            .bind(form.number_of_missed_hours)
            .fetch_one(executor)
            .await
    }

    pub async fn find_by_convention(
        executor: impl PgExecutor<'_>,
        convention_id: DbId,
    ) -> Result<Option<Assessment>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM assessments WHERE convention_id = $1");
        sqlx::query_as::<_, Assessment>(&query)
            .bind(convention_id)
            .fetch_optional(executor)
            .await
    }
}
