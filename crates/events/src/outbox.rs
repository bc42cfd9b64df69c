//! Outbox crawler: dispatches committed domain events to subscribers.
//!
//! Events are written to the `outbox` table in the same transaction as the
//! change that raised them. [`OutboxCrawler`] polls that table, hands each
//! event to every [`EventSubscriber`] and records the outcome. A failing
//! event is retried on later ticks until `max_attempts`, then quarantined
//! and reported to monitoring.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use immersion_db::models::outbox::{OutboxEvent, OUTBOX_QUARANTINED};
use immersion_db::repositories::OutboxRepo;
use immersion_db::DbPool;
use tokio_util::sync::CancellationToken;

use crate::bus::{DomainEvent, EventBus};
use crate::delivery::webhook::MonitoringNotifier;

// ---------------------------------------------------------------------------
// OutboxConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct OutboxConfig {
    pub poll_interval: Duration,
    pub max_attempts: i32,
    pub batch_size: i64,
}

impl Default for OutboxConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(10_000),
            max_attempts: 3,
            batch_size: 100,
        }
    }
}

impl OutboxConfig {
    /// | Env var                   | Default |
    /// |---------------------------|---------|
    /// | `OUTBOX_POLL_INTERVAL_MS` | `10000` |
    /// | `OUTBOX_MAX_ATTEMPTS`     | `3`     |
    /// | `OUTBOX_BATCH_SIZE`       | `100`   |
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let poll_interval = std::env::var("OUTBOX_POLL_INTERVAL_MS")
            .ok()
            .map(|v| v.parse::<u64>().expect("OUTBOX_POLL_INTERVAL_MS must be a valid u64"))
            .map(Duration::from_millis)
            .unwrap_or(defaults.poll_interval);

        let max_attempts = std::env::var("OUTBOX_MAX_ATTEMPTS")
            .ok()
            .map(|v| v.parse::<i32>().expect("OUTBOX_MAX_ATTEMPTS must be a valid i32"))
            .unwrap_or(defaults.max_attempts);

        let batch_size = std::env::var("OUTBOX_BATCH_SIZE")
            .ok()
            .map(|v| v.parse::<i64>().expect("OUTBOX_BATCH_SIZE must be a valid i64"))
            .unwrap_or(defaults.batch_size);

        Self {
            poll_interval,
            max_attempts,
            batch_size,
        }
    }
}

// ---------------------------------------------------------------------------
// EventSubscriber
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct SubscriberError(pub String);

impl SubscriberError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Reacts to dispatched domain events.
///
/// `handle` may run more than once for the same event when another
/// subscriber failed on an earlier attempt.
#[async_trait]
pub trait EventSubscriber: Send + Sync {
    fn name(&self) -> &'static str;

    async fn handle(&self, event: &DomainEvent) -> Result<(), SubscriberError>;
}

// ---------------------------------------------------------------------------
// OutboxCrawler
// ---------------------------------------------------------------------------

/// Outcome of one crawl.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub published: usize,
    pub failed: usize,
    pub quarantined: usize,
}

impl BatchReport {
    pub fn is_empty(&self) -> bool {
        self.published + self.failed + self.quarantined == 0
    }
}

pub struct OutboxCrawler {
    pool: DbPool,
    bus: Arc<EventBus>,
    subscribers: Vec<Arc<dyn EventSubscriber>>,
    config: OutboxConfig,
    monitoring: MonitoringNotifier,
}

impl OutboxCrawler {
    pub fn new(
        pool: DbPool,
        bus: Arc<EventBus>,
        config: OutboxConfig,
        monitoring: MonitoringNotifier,
    ) -> Self {
        Self {
            pool,
            bus,
            subscribers: Vec::new(),
            config,
            monitoring,
        }
    }

    pub fn with_subscriber(mut self, subscriber: Arc<dyn EventSubscriber>) -> Self {
        self.subscribers.push(subscriber);
        self
    }

    /// Run the crawl loop until `cancel` is cancelled.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut interval = tokio::time::interval(self.config.poll_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        tracing::info!(
            poll_interval_ms = self.config.poll_interval.as_millis() as u64,
            subscribers = self.subscribers.len(),
            "Outbox crawler started"
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Outbox crawler cancelled");
                    break;
                }
                _ = interval.tick() => {
                    match self.process_batch().await {
                        Ok(report) if !report.is_empty() => {
                            tracing::info!(
                                published = report.published,
                                failed = report.failed,
                                quarantined = report.quarantined,
                                "Outbox batch processed"
                            );
                        }
                        Ok(_) => {}
                        Err(e) => tracing::error!(error = %e, "Outbox crawl failed"),
                    }
                }
            }
        }
    }

    /// Dispatch one batch of pending events.
    ///
    /// The batch rows stay locked until the outcome of every event is
    /// written, so concurrent crawlers never dispatch the same event.
    /// Published events are broadcast on the bus after commit.
    pub async fn process_batch(&self) -> Result<BatchReport, sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        let rows = OutboxRepo::fetch_unpublished(&mut *tx, self.config.batch_size).await?;

        let mut report = BatchReport::default();
        let mut published = Vec::new();
        let mut quarantined = Vec::new();

        for row in rows {
            let Some(event) = DomainEvent::from_outbox(&row) else {
                tracing::warn!(outbox_id = row.id, topic = %row.topic, "Unknown outbox topic");
                // max_attempts of 0 quarantines on the spot.
                OutboxRepo::mark_failed(&mut *tx, row.id, "unknown topic", 0).await?;
                report.quarantined += 1;
                quarantined.push((row, "unknown topic".to_string()));
                continue;
            };

            match self.dispatch(&event).await {
                Ok(()) => {
                    OutboxRepo::mark_published(&mut *tx, event.id).await?;
                    report.published += 1;
                    published.push(event);
                }
                Err(error) => {
                    let status = OutboxRepo::mark_failed(
                        &mut *tx,
                        event.id,
                        &error,
                        self.config.max_attempts,
                    )
                    .await?;
                    if status == OUTBOX_QUARANTINED {
                        report.quarantined += 1;
                        quarantined.push((row, error));
                    } else {
                        report.failed += 1;
                    }
                }
            }
        }

        tx.commit().await?;

        for event in published {
            self.bus.publish(event);
        }
        for (row, error) in quarantined {
            self.report_quarantine(&row, error);
        }

        Ok(report)
    }

    /// Run every subscriber, joining their error messages.
    async fn dispatch(&self, event: &DomainEvent) -> Result<(), String> {
        let mut errors = Vec::new();
        for subscriber in &self.subscribers {
            if let Err(e) = subscriber.handle(event).await {
                tracing::warn!(
                    outbox_id = event.id,
                    topic = %event.topic,
                    subscriber = subscriber.name(),
                    error = %e,
                    "Subscriber failed"
                );
                errors.push(format!("{}: {e}", subscriber.name()));
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors.join("; "))
        }
    }

    fn report_quarantine(&self, row: &OutboxEvent, error: String) {
        tracing::error!(outbox_id = row.id, topic = %row.topic, error = %error, "Outbox event quarantined");
        let monitoring = self.monitoring.clone();
        let details = serde_json::json!({
            "outbox_id": row.id,
            "topic": row.topic,
            "attempts": row.attempts + 1,
            "error": error,
        });
        tokio::spawn(async move {
            let _ = monitoring.alert("Outbox event quarantined", &details).await;
        });
    }
}
