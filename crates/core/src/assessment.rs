//! End-of-immersion assessment filled by the establishment tutor.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::convention_status::ConventionStatus;
use crate::error::CoreError;
use crate::types::Date;
use crate::validation::{validate_required_text, MAX_TEXT_LENGTH};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export)]
pub enum AssessmentStatus {
    Completed,
    PartiallyCompleted,
    DidNotShow,
}

impl AssessmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "COMPLETED",
            Self::PartiallyCompleted => "PARTIALLY_COMPLETED",
            Self::DidNotShow => "DID_NOT_SHOW",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct AssessmentForm {
    pub status: AssessmentStatus,
    pub establishment_feedback: String,
    #[serde(default)]
    pub last_day_of_presence: Option<Date>,
    #[serde(default)]
    pub number_of_missed_hours: Option<f64>,
}

/// Validate an assessment for a convention in `convention_status` that ran
/// from `date_start` to `date_end`, submitted on `today`.
pub fn validate_assessment(
    form: &AssessmentForm,
    convention_status: ConventionStatus,
    date_start: Date,
    date_end: Date,
    today: Date,
) -> Result<(), CoreError> {
    if convention_status != ConventionStatus::AcceptedByValidator {
        return Err(CoreError::Validation(format!(
            "Cannot assess a convention with status '{convention_status}'"
        )));
    }
    if date_end > today {
        return Err(CoreError::Validation(
            "The immersion is not over yet".into(),
        ));
    }

    validate_required_text("establishment_feedback", &form.establishment_feedback, MAX_TEXT_LENGTH)?;

    match form.status {
        AssessmentStatus::PartiallyCompleted => {
            let last_day = form.last_day_of_presence.ok_or_else(|| {
                CoreError::Validation(
                    "last_day_of_presence is required for a partially completed immersion".into(),
                )
            })?;
            if last_day < date_start || last_day > date_end {
                return Err(CoreError::Validation(
                    "last_day_of_presence must fall within the convention dates".into(),
                ));
            }
            match form.number_of_missed_hours {
                Some(hours) if hours >= 0.0 => {}
                _ => {
                    return Err(CoreError::Validation(
                        "number_of_missed_hours is required and must not be negative".into(),
                    ))
                }
            }
        }
        AssessmentStatus::Completed | AssessmentStatus::DidNotShow => {
            if form.last_day_of_presence.is_some() || form.number_of_missed_hours.is_some() {
                return Err(CoreError::Validation(format!(
                    "Presence details only apply to a partially completed immersion, not '{}'",
                    form.status.as_str()
                )));
            }
        }
    }

    Ok(())
}
