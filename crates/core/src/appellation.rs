//! Job appellations from the ROME referential.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::CoreError;
use crate::validation::{validate_appellation_code, validate_required_text, validate_rome_code, MAX_NAME_LENGTH};

/// A job title and the ROME code it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Appellation {
    pub appellation_code: String,
    pub appellation_label: String,
    pub rome_code: String,
}

impl Appellation {
    pub fn validate(&self) -> Result<(), CoreError> {
        validate_appellation_code(&self.appellation_code)?;
        validate_rome_code(&self.rome_code)?;
        validate_required_text("appellation_label", &self.appellation_label, MAX_NAME_LENGTH)
    }
}
