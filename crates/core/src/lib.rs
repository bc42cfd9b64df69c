//! Domain rules of the immersion platform: roles, convention status machine,
//! validation of submitted forms and event topics. No I/O lives here.

pub mod agency;
pub mod appellation;
pub mod assessment;
pub mod convention;
pub mod convention_status;
pub mod error;
pub mod establishment;
pub mod events;
pub mod roles;
pub mod types;
pub mod validation;
