//! Agency kinds, statuses and registration rules.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::CoreError;
use crate::validation::{
    validate_email, validate_postcode, validate_required_text, validate_siret, MAX_NAME_LENGTH,
    MAX_TEXT_LENGTH,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum AgencyKind {
    #[serde(rename = "pole-emploi")]
    PoleEmploi,
    #[serde(rename = "mission-locale")]
    MissionLocale,
    #[serde(rename = "cap-emploi")]
    CapEmploi,
    #[serde(rename = "conseil-departemental")]
    ConseilDepartemental,
    #[serde(rename = "structure-IAE")]
    StructureIae,
    #[serde(rename = "prepa-apprentissage")]
    PrepaApprentissage,
    #[serde(rename = "cci")]
    Cci,
    #[serde(rename = "autre")]
    Autre,
}

impl AgencyKind {
    pub const ALL: [AgencyKind; 8] = [
        AgencyKind::PoleEmploi,
        AgencyKind::MissionLocale,
        AgencyKind::CapEmploi,
        AgencyKind::ConseilDepartemental,
        AgencyKind::StructureIae,
        AgencyKind::PrepaApprentissage,
        AgencyKind::Cci,
        AgencyKind::Autre,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PoleEmploi => "pole-emploi",
            Self::MissionLocale => "mission-locale",
            Self::CapEmploi => "cap-emploi",
            Self::ConseilDepartemental => "conseil-departemental",
            Self::StructureIae => "structure-IAE",
            Self::PrepaApprentissage => "prepa-apprentissage",
            Self::Cci => "cci",
            Self::Autre => "autre",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub enum AgencyStatus {
    NeedsReview,
    Active,
    Closed,
    Rejected,
}

impl AgencyStatus {
    pub const ALL: [AgencyStatus; 4] = [
        AgencyStatus::NeedsReview,
        AgencyStatus::Active,
        AgencyStatus::Closed,
        AgencyStatus::Rejected,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NeedsReview => "needsReview",
            Self::Active => "active",
            Self::Closed => "closed",
            Self::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|status| status.as_str() == s)
    }

    /// Returns the statuses an agency may move to from `self`.
    ///
    /// - `needsReview` -> `active`, `rejected`
    /// - `active`      -> `closed`
    /// - `closed`      -> `active`
    /// - `rejected`    -> `active`
    pub fn valid_transitions(&self) -> &'static [AgencyStatus] {
        match self {
            Self::NeedsReview => &[Self::Active, Self::Rejected],
            Self::Active => &[Self::Closed],
            Self::Closed => &[Self::Active],
            Self::Rejected => &[Self::Active],
        }
    }
}

impl std::fmt::Display for AgencyStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validate an agency status change, including the justification a
/// rejection must carry.
pub fn validate_status_transition(
    current: AgencyStatus,
    next: AgencyStatus,
    justification: Option<&str>,
) -> Result<(), CoreError> {
    if !current.valid_transitions().contains(&next) {
        return Err(CoreError::Validation(format!(
            "Cannot move agency from '{current}' to '{next}'"
        )));
    }
    if next == AgencyStatus::Rejected && justification.is_none_or(|j| j.trim().is_empty()) {
        return Err(CoreError::Validation(
            "A justification is required to reject an agency".into(),
        ));
    }
    Ok(())
}

/// Contact lists and address of an agency, as submitted on registration or
/// edition.
#[derive(Debug, Clone)]
pub struct AgencyFields<'a> {
    pub name: &'a str,
    pub address: &'a str,
    pub postcode: &'a str,
    pub city: &'a str,
    pub agency_siret: Option<&'a str>,
    pub validator_emails: &'a [String],
    pub counsellor_emails: &'a [String],
    pub refers_to_agency: bool,
}

/// Validate the registrable fields of an agency.
///
/// An agency that refers to another agency only has counsellors; the
/// referred agency validates its conventions.
pub fn validate_agency_fields(fields: &AgencyFields<'_>) -> Result<(), CoreError> {
    validate_required_text("name", fields.name, MAX_NAME_LENGTH)?;
    validate_required_text("address", fields.address, MAX_TEXT_LENGTH)?;
    validate_required_text("city", fields.city, MAX_NAME_LENGTH)?;
    validate_postcode(fields.postcode)?;
    if let Some(siret) = fields.agency_siret {
        validate_siret(siret)?;
    }

    for email in fields.validator_emails.iter().chain(fields.counsellor_emails) {
        validate_email("agency email", email)?;
    }

    if fields.refers_to_agency {
        if fields.counsellor_emails.is_empty() {
            return Err(CoreError::Validation(
                "An agency referring to another agency needs at least one counsellor".into(),
            ));
        }
        if !fields.validator_emails.is_empty() {
            return Err(CoreError::Validation(
                "An agency referring to another agency cannot have its own validators".into(),
            ));
        }
    } else if fields.validator_emails.is_empty() {
        return Err(CoreError::Validation(
            "An agency needs at least one validator email".into(),
        ));
    }

    Ok(())
}
