//! Field-level validators shared by every form the platform accepts.
//!
//! All functions return [`CoreError::Validation`] with a message naming the
//! offending field so the frontend can display it next to the input.

use std::sync::LazyLock;

use regex::Regex;
use sha2::{Digest, Sha256};
use validator::ValidateEmail;

use crate::error::CoreError;

/// Maximum length of free-text fields (activities, objectives, messages).
pub const MAX_TEXT_LENGTH: usize = 3_000;

/// Maximum length of short fields (names, job titles).
pub const MAX_NAME_LENGTH: usize = 255;

static SIRET_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{14}$").expect("valid SIRET regex"));

static ROME_CODE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-N]\d{4}$").expect("valid ROME regex"));

static APPELLATION_CODE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{1,8}$").expect("valid appellation regex"));

static DEPARTMENT_CODE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{2}|2[AB]|97\d)$").expect("valid department regex"));

static POSTCODE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{5}$").expect("valid postcode regex"));

/// Strip spaces, dots and dashes and check the result is a plausible phone
/// number (optional leading `+`, 8 to 15 digits). Returns the normalised form.
pub fn normalize_phone(field: &str, phone: &str) -> Result<String, CoreError> {
    let cleaned: String = phone
        .chars()
        .filter(|c| !matches!(c, ' ' | '.' | '-' | '(' | ')'))
        .collect();
    let digits = cleaned.strip_prefix('+').unwrap_or(&cleaned);
    let valid = (8..=15).contains(&digits.len()) && digits.chars().all(|c| c.is_ascii_digit());
    if !valid {
        return Err(CoreError::Validation(format!(
            "{field}: '{phone}' is not a valid phone number"
        )));
    }
    Ok(cleaned)
}

pub fn validate_email(field: &str, email: &str) -> Result<(), CoreError> {
    if !email.validate_email() {
        return Err(CoreError::Validation(format!(
            "{field}: '{email}' is not a valid email address"
        )));
    }
    Ok(())
}

pub fn validate_siret(siret: &str) -> Result<(), CoreError> {
    if !SIRET_RE.is_match(siret) {
        return Err(CoreError::Validation(format!(
            "siret: '{siret}' must be exactly 14 digits"
        )));
    }
    Ok(())
}

pub fn validate_rome_code(code: &str) -> Result<(), CoreError> {
    if !ROME_CODE_RE.is_match(code) {
        return Err(CoreError::Validation(format!(
            "rome_code: '{code}' is not a valid ROME code"
        )));
    }
    Ok(())
}

pub fn validate_appellation_code(code: &str) -> Result<(), CoreError> {
    if !APPELLATION_CODE_RE.is_match(code) {
        return Err(CoreError::Validation(format!(
            "appellation_code: '{code}' is not a valid appellation code"
        )));
    }
    Ok(())
}

pub fn validate_department_code(code: &str) -> Result<(), CoreError> {
    if !DEPARTMENT_CODE_RE.is_match(code) {
        return Err(CoreError::Validation(format!(
            "department_code: '{code}' is not a valid department code"
        )));
    }
    Ok(())
}

pub fn validate_postcode(postcode: &str) -> Result<(), CoreError> {
    if !POSTCODE_RE.is_match(postcode) {
        return Err(CoreError::Validation(format!(
            "postcode: '{postcode}' must be 5 digits"
        )));
    }
    Ok(())
}

/// Department code derived from a French postcode (Corsica and overseas
/// territories included).
pub fn department_from_postcode(postcode: &str) -> Option<String> {
    if !POSTCODE_RE.is_match(postcode) {
        return None;
    }
    let code = match &postcode[..2] {
        "20" => {
            if postcode < "20200" {
                "2A".to_string()
            } else {
                "2B".to_string()
            }
        }
        "97" => postcode[..3].to_string(),
        prefix => prefix.to_string(),
    };
    Some(code)
}

/// Non-empty, trimmed, bounded text.
pub fn validate_required_text(field: &str, value: &str, max_len: usize) -> Result<(), CoreError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(CoreError::Validation(format!("{field} is required")));
    }
    if trimmed.chars().count() > max_len {
        return Err(CoreError::Validation(format!(
            "{field} exceeds maximum length of {max_len} characters"
        )));
    }
    Ok(())
}

/// SHA-256 hex digest of a lower-cased, trimmed email.
///
/// Magic links carry this hash instead of the address itself.
pub fn email_hash(email: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(email.trim().to_lowercase().as_bytes());
    format!("{:x}", hasher.finalize())
}
