//! Event dispatch and outbound gateways.
//!
//! - [`EventBus`]: in-process fan-out of [`DomainEvent`]s once they have
//!   been dispatched.
//! - [`OutboxCrawler`]: background service that reads the `outbox` table
//!   and hands each event to the registered [`EventSubscriber`]s.
//! - [`delivery`]: email, SMS and monitoring webhook channels.
//! - [`siret`]: business registry lookups.

pub mod bus;
pub mod delivery;
pub mod outbox;
pub mod siret;

pub use bus::{DomainEvent, EventBus};
pub use delivery::email::{
    EmailConfig, EmailError, EmailGateway, EmailMessage, InMemoryEmailGateway, SmtpEmailGateway,
};
pub use delivery::sms::{HttpSmsGateway, InMemorySmsGateway, SmsConfig, SmsError, SmsGateway, SmsMessage};
pub use delivery::webhook::MonitoringNotifier;
pub use outbox::{BatchReport, EventSubscriber, OutboxConfig, OutboxCrawler, SubscriberError};
pub use siret::{
    HttpSiretGateway, OfflineSiretGateway, SiretConfig, SiretError, SiretEstablishment, SiretGateway,
};
