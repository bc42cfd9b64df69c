//! Convention entity model.
//!
//! Parties, schedule and appellation are stored as JSONB and decoded into
//! the core domain types.

use immersion_core::appellation::Appellation;
use immersion_core::convention::{ConventionForm, ConventionSchedule, EstablishmentTutor, Signatories};
use immersion_core::convention_status::ConventionStatus;
use immersion_core::types::{Date, DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;

/// A row from the `conventions` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Convention {
    pub id: DbId,
    pub agency_id: DbId,
    pub status: String,
    pub status_justification: Option<String>,
    pub internship_kind: String,
    pub date_submission: Date,
    pub date_start: Date,
    pub date_end: Date,
    pub date_validation: Option<Timestamp>,
    pub schedule: Json<ConventionSchedule>,
    pub siret: String,
    pub business_name: String,
    pub immersion_address: String,
    pub immersion_objective: String,
    pub immersion_appellation: Json<Appellation>,
    pub immersion_activities: String,
    pub immersion_skills: Option<String>,
    pub work_conditions: Option<String>,
    pub individual_protection: bool,
    pub sanitary_prevention: bool,
    pub sanitary_prevention_description: Option<String>,
    pub signatories: Json<Signatories>,
    pub establishment_tutor: Json<EstablishmentTutor>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Convention {
    /// Parsed status; `None` only for a value outside `ck_conventions_status`.
    pub fn status(&self) -> Option<ConventionStatus> {
        ConventionStatus::parse(&self.status)
    }
}

/// Status change written by the status and signature use cases.
#[derive(Debug, Clone)]
pub struct ConventionStatusChange {
    pub status: ConventionStatus,
    pub justification: Option<String>,
    pub signatories: Option<Signatories>,
    /// Set when the convention becomes `ACCEPTED_BY_VALIDATOR`.
    pub date_validation: Option<Timestamp>,
}

/// Input of a new submission.
#[derive(Debug, Clone)]
pub struct CreateConvention<'a> {
    pub form: &'a ConventionForm,
    pub date_submission: Date,
}

/// Filters for the agency dashboard list.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConventionFilter {
    pub status: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}
