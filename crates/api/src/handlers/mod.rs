//! Request handlers, one submodule per resource.
//!
//! Handlers are the use cases of the platform: they validate input with
//! `immersion_core`, run the change through `immersion_db` repositories in
//! one transaction, record the outbox event and map errors via [`AppError`].

pub mod admin;
pub mod agencies;
pub mod assessments;
pub mod auth;
pub mod conventions;
pub mod establishments;
pub mod users;

use immersion_core::error::CoreError;
use immersion_core::validation::department_from_postcode;

use crate::error::{AppError, AppResult};

/// Department code of a validated postcode.
pub(crate) fn department_of(postcode: &str) -> AppResult<String> {
    department_from_postcode(postcode).ok_or_else(|| {
        AppError::Core(CoreError::Validation(format!(
            "Postcode '{postcode}' does not match a department"
        )))
    })
}
