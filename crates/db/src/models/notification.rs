//! Sent notification records.

use immersion_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

pub const KIND_EMAIL: &str = "email";
pub const KIND_SMS: &str = "sms";

pub const STATE_SENT: &str = "sent";
pub const STATE_FAILED: &str = "failed";

/// A row from the `notifications` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Notification {
    pub id: DbId,
    pub outbox_id: Option<DbId>,
    pub kind: String,
    pub topic: String,
    pub recipient: String,
    pub subject: Option<String>,
    pub body: String,
    pub state: String,
    pub error: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for recording a notification attempt.
#[derive(Debug, Clone)]
pub struct CreateNotification {
    pub outbox_id: Option<DbId>,
    pub kind: &'static str,
    pub topic: String,
    pub recipient: String,
    pub subject: Option<String>,
    pub body: String,
    pub state: &'static str,
    pub error: Option<String>,
}

/// Query parameters for the admin notification list.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NotificationFilter {
    pub kind: Option<String>,
    pub limit: Option<i64>,
}
