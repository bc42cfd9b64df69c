//! Host establishments, their offers and contact requests.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::appellation::Appellation;
use crate::error::CoreError;
use crate::validation::{
    normalize_phone, validate_email, validate_postcode, validate_required_text, validate_siret,
    MAX_NAME_LENGTH, MAX_TEXT_LENGTH,
};

/// Default weekly cap on contact requests for a newly registered establishment.
pub const DEFAULT_MAX_CONTACTS_PER_WEEK: i32 = 10;

/// Upper bound accepted for `max_contacts_per_week`.
pub const MAX_CONTACTS_PER_WEEK_LIMIT: i32 = 100;

/// The same person may not contact the same offer again within this window.
pub const CONTACT_COOLDOWN_DAYS: i64 = 7;

/// Rolling window over which `max_contacts_per_week` is counted.
pub const CONTACT_CAP_WINDOW_DAYS: i64 = 7;

/// Whether `contacts_in_window` requests exhaust the establishment's cap.
pub fn weekly_cap_reached(contacts_in_window: i64, max_contacts_per_week: i32) -> bool {
    contacts_in_window >= i64::from(max_contacts_per_week)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export)]
pub enum ContactMode {
    Email,
    Phone,
    InPerson,
}

impl ContactMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Email => "EMAIL",
            Self::Phone => "PHONE",
            Self::InPerson => "IN_PERSON",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "EMAIL" => Some(Self::Email),
            "PHONE" => Some(Self::Phone),
            "IN_PERSON" => Some(Self::InPerson),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export)]
pub enum DiscussionStatus {
    Pending,
    Accepted,
    Rejected,
}

impl DiscussionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Accepted => "ACCEPTED",
            Self::Rejected => "REJECTED",
        }
    }
}

/// The establishment contact person.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct BusinessContact {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub job: String,
    pub contact_mode: ContactMode,
}

/// The form an establishment fills to be listed as a host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct EstablishmentForm {
    pub siret: String,
    pub business_name: String,
    #[serde(default)]
    pub business_name_customized: Option<String>,
    pub street_address: String,
    pub postcode: String,
    pub city: String,
    #[serde(default)]
    pub naf_code: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub additional_information: Option<String>,
    pub business_contact: BusinessContact,
    pub offers: Vec<Appellation>,
    #[serde(default)]
    pub max_contacts_per_week: Option<i32>,
    #[serde(default = "default_searchable")]
    pub is_searchable: bool,
}

fn default_searchable() -> bool {
    true
}

/// Normalise the contact phone then validate the form.
pub fn normalize_and_validate(form: &mut EstablishmentForm) -> Result<(), CoreError> {
    validate_siret(&form.siret)?;
    validate_required_text("business_name", &form.business_name, MAX_NAME_LENGTH)?;
    validate_required_text("street_address", &form.street_address, MAX_TEXT_LENGTH)?;
    validate_required_text("city", &form.city, MAX_NAME_LENGTH)?;
    validate_postcode(&form.postcode)?;

    let contact = &mut form.business_contact;
    validate_required_text("business_contact.first_name", &contact.first_name, MAX_NAME_LENGTH)?;
    validate_required_text("business_contact.last_name", &contact.last_name, MAX_NAME_LENGTH)?;
    validate_required_text("business_contact.job", &contact.job, MAX_NAME_LENGTH)?;
    validate_email("business_contact.email", &contact.email)?;
    contact.phone = normalize_phone("business_contact.phone", &contact.phone)?;

    if form.offers.is_empty() {
        return Err(CoreError::Validation("At least one offer is required".into()));
    }
    for (i, offer) in form.offers.iter().enumerate() {
        offer.validate()?;
        if form.offers[..i]
            .iter()
            .any(|o| o.appellation_code == offer.appellation_code)
        {
            return Err(CoreError::Validation(format!(
                "Offer '{}' is listed more than once",
                offer.appellation_code
            )));
        }
    }

    if let Some(max) = form.max_contacts_per_week {
        if !(1..=MAX_CONTACTS_PER_WEEK_LIMIT).contains(&max) {
            return Err(CoreError::Validation(format!(
                "max_contacts_per_week must be between 1 and {MAX_CONTACTS_PER_WEEK_LIMIT}"
            )));
        }
    }

    Ok(())
}

/// A candidate's request to be put in touch with an establishment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ContactRequest {
    pub siret: String,
    pub appellation_code: String,
    pub contact_mode: ContactMode,
    pub potential_beneficiary_first_name: String,
    pub potential_beneficiary_last_name: String,
    pub potential_beneficiary_email: String,
    #[serde(default)]
    pub potential_beneficiary_phone: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Validate a contact request against the establishment's contact mode.
///
/// Email contacts need a message; the phone is normalised when present.
pub fn validate_contact_request(
    request: &mut ContactRequest,
    establishment_mode: ContactMode,
) -> Result<(), CoreError> {
    validate_siret(&request.siret)?;
    validate_required_text(
        "potential_beneficiary_first_name",
        &request.potential_beneficiary_first_name,
        MAX_NAME_LENGTH,
    )?;
    validate_required_text(
        "potential_beneficiary_last_name",
        &request.potential_beneficiary_last_name,
        MAX_NAME_LENGTH,
    )?;
    validate_email("potential_beneficiary_email", &request.potential_beneficiary_email)?;

    if let Some(phone) = request.potential_beneficiary_phone.take() {
        request.potential_beneficiary_phone =
            Some(normalize_phone("potential_beneficiary_phone", &phone)?);
    }

    if request.contact_mode != establishment_mode {
        return Err(CoreError::Validation(format!(
            "This establishment expects contact mode '{}'",
            establishment_mode.as_str()
        )));
    }

    if request.contact_mode == ContactMode::Email {
        let message = request.message.as_deref().unwrap_or_default();
        validate_required_text("message", message, MAX_TEXT_LENGTH)?;
    }

    Ok(())
}
