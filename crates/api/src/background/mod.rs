//! Background tasks and scheduled jobs.
//!
//! Each submodule provides a long-running async function intended to be
//! spawned via `tokio::spawn`. Scheduled jobs accept a [`CancellationToken`]
//! for graceful shutdown; bus observers stop when the bus is dropped.
//!
//! [`CancellationToken`]: tokio_util::sync::CancellationToken

pub mod event_log;
pub mod session_cleanup;
