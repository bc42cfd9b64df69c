//! Row structs and DTOs, one module per table group.

pub mod agency;
pub mod agency_right;
pub mod assessment;
pub mod convention;
pub mod dashboard;
pub mod discussion;
pub mod establishment;
pub mod notification;
pub mod outbox;
pub mod session;
pub mod user;
