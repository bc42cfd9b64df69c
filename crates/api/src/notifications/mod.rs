//! Email and SMS notifications triggered by domain events.
//!
//! The [`NotificationDispatcher`] is registered on the outbox crawler as an
//! [`EventSubscriber`](immersion_events::EventSubscriber). For each event it
//! works out who must be told, renders the messages from [`templates`] and
//! sends them, recording one `notifications` row per message.

pub mod dispatcher;
pub mod templates;

pub use dispatcher::NotificationDispatcher;
