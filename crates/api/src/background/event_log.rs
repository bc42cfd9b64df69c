//! Structured log line for every event published by the outbox crawler.

use immersion_events::DomainEvent;
use tokio::sync::broadcast;

/// Log each published event until the bus is closed.
pub async fn run(mut receiver: broadcast::Receiver<DomainEvent>) {
    loop {
        match receiver.recv().await {
            Ok(event) => {
                tracing::info!(
                    outbox_id = event.id,
                    topic = %event.topic,
                    occurred_at = %event.occurred_at,
                    "Domain event published"
                );
            }
            Err(broadcast::error::RecvError::Lagged(n)) => {
                tracing::warn!(skipped = n, "Event log lagged");
            }
            Err(broadcast::error::RecvError::Closed) => {
                tracing::info!("Event bus closed, event log shutting down");
                break;
            }
        }
    }
}
