//! Outbound channels: email to parties, SMS for signature requests and the
//! monitoring webhook for operational alerts.

pub mod email;
pub mod sms;
pub mod webhook;
