//! Convention domain types and form validation.
//!
//! A convention binds a beneficiary, a host establishment and a prescribing
//! agency for a short observation period. The types here are shared by the
//! repository layer (stored as JSONB) and the API layer (request bodies).

use chrono::{Datelike, Duration, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::appellation::Appellation;
use crate::error::CoreError;
use crate::roles::Role;
use crate::types::{Date, DbId, Timestamp};
use crate::validation::{
    normalize_phone, validate_email, validate_required_text, validate_siret, MAX_NAME_LENGTH,
    MAX_TEXT_LENGTH,
};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Longest immersion, in calendar days (start and end included).
pub const MAX_IMMERSION_DAYS: i64 = 30;

/// Longest CCI mini-stage, in calendar days.
pub const MAX_MINI_STAGE_DAYS: i64 = 5;

/// Maximum worked hours in a single day.
pub const MAX_DAILY_HOURS: f64 = 10.0;

/// Maximum worked hours in one ISO week.
pub const MAX_WEEKLY_HOURS: f64 = 48.0;

/// Minimum beneficiary age for an immersion.
pub const MIN_IMMERSION_AGE: u32 = 16;

/// Minimum beneficiary age for a mini-stage.
pub const MIN_MINI_STAGE_AGE: u32 = 10;

/// Below this age a beneficiary representative must sign.
pub const AGE_OF_MAJORITY: u32 = 18;

// ---------------------------------------------------------------------------
// Internship kind
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "kebab-case")]
#[ts(export)]
pub enum InternshipKind {
    Immersion,
    MiniStageCci,
}

impl InternshipKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Immersion => "immersion",
            Self::MiniStageCci => "mini-stage-cci",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "immersion" => Some(Self::Immersion),
            "mini-stage-cci" => Some(Self::MiniStageCci),
            _ => None,
        }
    }

    pub fn max_days(&self) -> i64 {
        match self {
            Self::Immersion => MAX_IMMERSION_DAYS,
            Self::MiniStageCci => MAX_MINI_STAGE_DAYS,
        }
    }

    pub fn min_age(&self) -> u32 {
        match self {
            Self::Immersion => MIN_IMMERSION_AGE,
            Self::MiniStageCci => MIN_MINI_STAGE_AGE,
        }
    }
}

// ---------------------------------------------------------------------------
// Parties
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Beneficiary {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub birthdate: Date,
    #[serde(default)]
    pub signed_at: Option<Timestamp>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Signatory {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    #[serde(default)]
    pub signed_at: Option<Timestamp>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct BeneficiaryCurrentEmployer {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub job: String,
    pub business_siret: String,
    pub business_name: String,
    #[serde(default)]
    pub signed_at: Option<Timestamp>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct EstablishmentTutor {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub job: String,
}

/// Everyone who signs the convention.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Signatories {
    pub beneficiary: Beneficiary,
    pub establishment_representative: Signatory,
    #[serde(default)]
    pub beneficiary_representative: Option<Signatory>,
    #[serde(default)]
    pub beneficiary_current_employer: Option<BeneficiaryCurrentEmployer>,
}

impl Signatories {
    /// Email of the signatory holding `role`, if that party exists.
    pub fn email_for(&self, role: Role) -> Option<&str> {
        match role {
            Role::Beneficiary => Some(&self.beneficiary.email),
            Role::EstablishmentRepresentative => Some(&self.establishment_representative.email),
            Role::BeneficiaryRepresentative => {
                self.beneficiary_representative.as_ref().map(|s| s.email.as_str())
            }
            Role::BeneficiaryCurrentEmployer => {
                self.beneficiary_current_employer.as_ref().map(|s| s.email.as_str())
            }
            _ => None,
        }
    }

    /// Phone of the signatory holding `role`, if that party exists.
    pub fn phone_for(&self, role: Role) -> Option<&str> {
        match role {
            Role::Beneficiary => Some(&self.beneficiary.phone),
            Role::EstablishmentRepresentative => Some(&self.establishment_representative.phone),
            Role::BeneficiaryRepresentative => {
                self.beneficiary_representative.as_ref().map(|s| s.phone.as_str())
            }
            Role::BeneficiaryCurrentEmployer => {
                self.beneficiary_current_employer.as_ref().map(|s| s.phone.as_str())
            }
            _ => None,
        }
    }

    /// Roles of the signatories present on this convention.
    pub fn roles(&self) -> Vec<Role> {
        let mut roles = vec![Role::Beneficiary, Role::EstablishmentRepresentative];
        if self.beneficiary_representative.is_some() {
            roles.push(Role::BeneficiaryRepresentative);
        }
        if self.beneficiary_current_employer.is_some() {
            roles.push(Role::BeneficiaryCurrentEmployer);
        }
        roles
    }

    fn signed_at_mut(&mut self, role: Role) -> Option<&mut Option<Timestamp>> {
        match role {
            Role::Beneficiary => Some(&mut self.beneficiary.signed_at),
            Role::EstablishmentRepresentative => {
                Some(&mut self.establishment_representative.signed_at)
            }
            Role::BeneficiaryRepresentative => {
                self.beneficiary_representative.as_mut().map(|s| &mut s.signed_at)
            }
            Role::BeneficiaryCurrentEmployer => {
                self.beneficiary_current_employer.as_mut().map(|s| &mut s.signed_at)
            }
            _ => None,
        }
    }

    fn signed_at(&self, role: Role) -> Option<Timestamp> {
        match role {
            Role::Beneficiary => self.beneficiary.signed_at,
            Role::EstablishmentRepresentative => self.establishment_representative.signed_at,
            Role::BeneficiaryRepresentative => {
                self.beneficiary_representative.as_ref().and_then(|s| s.signed_at)
            }
            Role::BeneficiaryCurrentEmployer => {
                self.beneficiary_current_employer.as_ref().and_then(|s| s.signed_at)
            }
            _ => None,
        }
    }

    /// Record a signature for `role`.
    ///
    /// Fails with `Forbidden` when no such signatory exists and with
    /// `Conflict` when the party already signed.
    pub fn sign(&mut self, role: Role, at: Timestamp) -> Result<(), CoreError> {
        let slot = self.signed_at_mut(role).ok_or_else(|| {
            CoreError::Forbidden(format!("Role '{role}' is not a signatory of this convention"))
        })?;
        if slot.is_some() {
            return Err(CoreError::Conflict(format!(
                "The {role} has already signed this convention"
            )));
        }
        *slot = Some(at);
        Ok(())
    }

    pub fn signed_count(&self) -> usize {
        self.roles()
            .into_iter()
            .filter(|role| self.signed_at(*role).is_some())
            .count()
    }

    pub fn required_count(&self) -> usize {
        self.roles().len()
    }

    pub fn all_signed(&self) -> bool {
        self.signed_count() == self.required_count()
    }

    /// Drop every signature, used when the convention content changes.
    pub fn clear_signatures(&mut self) {
        for role in self.roles() {
            if let Some(slot) = self.signed_at_mut(role) {
                *slot = None;
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Schedule
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct WorkingDay {
    pub date: Date,
    pub hours: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ConventionSchedule {
    pub working_days: Vec<WorkingDay>,
}

impl ConventionSchedule {
    pub fn total_hours(&self) -> f64 {
        self.working_days.iter().map(|d| d.hours).sum()
    }

    /// Check the schedule fits inside `[start, end]` and respects the daily
    /// and weekly hour limits.
    pub fn validate(&self, start: Date, end: Date) -> Result<(), CoreError> {
        if self.working_days.is_empty() {
            return Err(CoreError::Validation(
                "schedule: at least one working day is required".into(),
            ));
        }

        let mut weekly: Vec<((i32, u32), f64)> = Vec::new();
        let mut seen = std::collections::HashSet::new();

        for day in &self.working_days {
            if day.date < start || day.date > end {
                return Err(CoreError::Validation(format!(
                    "schedule: {} is outside the convention dates",
                    day.date
                )));
            }
            if !seen.insert(day.date) {
                return Err(CoreError::Validation(format!(
                    "schedule: {} appears more than once",
                    day.date
                )));
            }
            if day.hours <= 0.0 || day.hours > MAX_DAILY_HOURS {
                return Err(CoreError::Validation(format!(
                    "schedule: {} hours on {} (must be between 0 and {MAX_DAILY_HOURS})",
                    day.hours, day.date
                )));
            }

            let week = day.date.iso_week();
            let key = (week.year(), week.week());
            match weekly.iter_mut().find(|(k, _)| *k == key) {
                Some((_, hours)) => *hours += day.hours,
                None => weekly.push((key, day.hours)),
            }
        }

        if let Some(((year, week), hours)) = weekly.iter().find(|(_, h)| *h > MAX_WEEKLY_HOURS) {
            return Err(CoreError::Validation(format!(
                "schedule: {hours} hours in week {week} of {year} exceeds {MAX_WEEKLY_HOURS}"
            )));
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Form
// ---------------------------------------------------------------------------

/// Everything a convention submission or edit carries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ConventionForm {
    pub agency_id: DbId,
    pub internship_kind: InternshipKind,
    pub date_start: Date,
    pub date_end: Date,
    pub schedule: ConventionSchedule,
    pub siret: String,
    pub business_name: String,
    pub immersion_address: String,
    pub immersion_objective: String,
    pub immersion_appellation: Appellation,
    pub immersion_activities: String,
    #[serde(default)]
    pub immersion_skills: Option<String>,
    #[serde(default)]
    pub work_conditions: Option<String>,
    pub individual_protection: bool,
    pub sanitary_prevention: bool,
    #[serde(default)]
    pub sanitary_prevention_description: Option<String>,
    pub signatories: Signatories,
    pub establishment_tutor: EstablishmentTutor,
}

/// Age in whole years reached on `on`.
pub fn age_on(birthdate: Date, on: Date) -> u32 {
    let mut years = on.year() - birthdate.year();
    if (on.month(), on.day()) < (birthdate.month(), birthdate.day()) {
        years -= 1;
    }
    years.max(0) as u32
}

/// Normalise phone numbers in place, then validate every business rule.
///
/// `submitted_on` is the day the form reaches the server; the immersion may
/// not start before it.
pub fn normalize_and_validate(form: &mut ConventionForm, submitted_on: Date) -> Result<(), CoreError> {
    validate_dates(form, submitted_on)?;
    form.schedule.validate(form.date_start, form.date_end)?;

    validate_siret(&form.siret)?;
    validate_required_text("business_name", &form.business_name, MAX_NAME_LENGTH)?;
    validate_required_text("immersion_address", &form.immersion_address, MAX_TEXT_LENGTH)?;
    validate_required_text("immersion_objective", &form.immersion_objective, MAX_TEXT_LENGTH)?;
    validate_required_text("immersion_activities", &form.immersion_activities, MAX_TEXT_LENGTH)?;
    form.immersion_appellation.validate()?;

    if form.sanitary_prevention
        && form
            .sanitary_prevention_description
            .as_deref()
            .is_none_or(|d| d.trim().is_empty())
    {
        return Err(CoreError::Validation(
            "sanitary_prevention_description is required when sanitary_prevention is set".into(),
        ));
    }

    normalize_parties(form)?;
    validate_beneficiary_age(form)?;
    validate_distinct_emails(&form.signatories)?;

    Ok(())
}

fn validate_dates(form: &ConventionForm, submitted_on: Date) -> Result<(), CoreError> {
    if form.date_end <= form.date_start {
        return Err(CoreError::Validation(
            "date_end must be after date_start".into(),
        ));
    }
    if form.date_start < submitted_on {
        return Err(CoreError::Validation(
            "date_start must not be before the submission date".into(),
        ));
    }
    let max_days = form.internship_kind.max_days();
    let length = (form.date_end - form.date_start) + Duration::days(1);
    if length.num_days() > max_days {
        return Err(CoreError::Validation(format!(
            "A {} cannot last more than {max_days} days",
            form.internship_kind.as_str()
        )));
    }
    Ok(())
}

fn normalize_parties(form: &mut ConventionForm) -> Result<(), CoreError> {
    let s = &mut form.signatories;

    check_person("beneficiary", &s.beneficiary.first_name, &s.beneficiary.last_name, &s.beneficiary.email)?;
    s.beneficiary.phone = normalize_phone("beneficiary.phone", &s.beneficiary.phone)?;

    let rep = &mut s.establishment_representative;
    check_person("establishment_representative", &rep.first_name, &rep.last_name, &rep.email)?;
    rep.phone = normalize_phone("establishment_representative.phone", &rep.phone)?;

    if let Some(rep) = s.beneficiary_representative.as_mut() {
        check_person("beneficiary_representative", &rep.first_name, &rep.last_name, &rep.email)?;
        rep.phone = normalize_phone("beneficiary_representative.phone", &rep.phone)?;
    }

    if let Some(employer) = s.beneficiary_current_employer.as_mut() {
        check_person(
            "beneficiary_current_employer",
            &employer.first_name,
            &employer.last_name,
            &employer.email,
        )?;
        employer.phone = normalize_phone("beneficiary_current_employer.phone", &employer.phone)?;
        validate_siret(&employer.business_siret)?;
        validate_required_text("beneficiary_current_employer.job", &employer.job, MAX_NAME_LENGTH)?;
    }

    let tutor = &mut form.establishment_tutor;
    check_person("establishment_tutor", &tutor.first_name, &tutor.last_name, &tutor.email)?;
    tutor.phone = normalize_phone("establishment_tutor.phone", &tutor.phone)?;
    validate_required_text("establishment_tutor.job", &tutor.job, MAX_NAME_LENGTH)?;

    Ok(())
}

fn check_person(prefix: &str, first_name: &str, last_name: &str, email: &str) -> Result<(), CoreError> {
    validate_required_text(&format!("{prefix}.first_name"), first_name, MAX_NAME_LENGTH)?;
    validate_required_text(&format!("{prefix}.last_name"), last_name, MAX_NAME_LENGTH)?;
    validate_email(&format!("{prefix}.email"), email)
}

fn validate_beneficiary_age(form: &ConventionForm) -> Result<(), CoreError> {
    let age = age_on(form.signatories.beneficiary.birthdate, form.date_start);
    let min_age = form.internship_kind.min_age();
    if age < min_age {
        return Err(CoreError::Validation(format!(
            "The beneficiary must be at least {min_age} years old on the start date"
        )));
    }
    if age < AGE_OF_MAJORITY && form.signatories.beneficiary_representative.is_none() {
        return Err(CoreError::Validation(
            "A minor beneficiary needs a beneficiary representative".into(),
        ));
    }
    Ok(())
}

fn validate_distinct_emails(signatories: &Signatories) -> Result<(), CoreError> {
    let emails: Vec<String> = signatories
        .roles()
        .into_iter()
        .filter_map(|role| signatories.email_for(role))
        .map(|e| e.trim().to_lowercase())
        .collect();

    for (i, email) in emails.iter().enumerate() {
        if emails[i + 1..].contains(email) {
            return Err(CoreError::Validation(format!(
                "Signatories must use distinct emails ('{email}' is repeated)"
            )));
        }
    }
    Ok(())
}

/// Today's date in UTC.
pub fn today() -> Date {
    Utc::now().date_naive()
}
