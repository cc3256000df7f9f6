//! Notification types and their delivery state machine.
//!
//! ```text
//!   pending ──send ok──▶ sent            (terminal)
//!      │
//!      └──send err / inactive──▶ failed ──retry sweep (attempts < 3)──▶ pending
//! ```
//!
//! A failed notification that has used up [`MAX_ATTEMPTS`] is never picked up
//! by the retry sweep again; it stays `failed` indefinitely.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};
use uuid::Uuid;

use crate::{activity::Activity, subject::Subject};

/// Delivery attempts after which a failed notification is left alone.
pub const MAX_ATTEMPTS: u32 = 3;

/// Why a notification exists. At most one of each per activity.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  IntoStaticStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum NotificationType {
  /// The activity opens.
  Start,
  /// One day before the activity is due.
  Reminder,
}

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  IntoStaticStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum NotificationStatus {
  Pending,
  Sent,
  Failed,
}

/// A persisted notification. Serialises to the camel-cased wire shape used
/// for inspection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
  pub notification_id:   Uuid,
  pub activity_id:       Uuid,
  pub subject_id:        String,
  pub notification_type: NotificationType,
  pub scheduled_for:     DateTime<Utc>,
  pub status:            NotificationStatus,
  pub sent_at:           Option<DateTime<Utc>>,
  pub error:             Option<String>,
  pub attempts:          u32,
  pub created_at:        DateTime<Utc>,
}

impl Notification {
  /// Whether the retry sweep would still pick this notification up.
  pub fn is_retryable(&self) -> bool {
    self.status == NotificationStatus::Failed && self.attempts < MAX_ATTEMPTS
  }
}

/// Input to [`crate::store::DeadlineStore::insert_notification`]. New
/// notifications always start `pending` with zero attempts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewNotification {
  pub activity_id:       Uuid,
  pub subject_id:        String,
  pub notification_type: NotificationType,
  pub scheduled_for:     DateTime<Utc>,
}

/// A due notification joined with everything needed to deliver it.
#[derive(Debug, Clone)]
pub struct DueNotification {
  pub notification: Notification,
  pub activity:     Activity,
  pub subject:      Subject,
}

/// Aggregate counts over the whole notification table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
  pub pending: u64,
  pub sent:    u64,
  pub failed:  u64,
  pub total:   u64,
}
