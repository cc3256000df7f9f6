//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as fixed-width RFC 3339 strings (microseconds, `Z`
//! suffix) so that lexical comparison in SQL matches chronological order.
//! Enums are stored as their snake_case/lowercase names. UUIDs are stored as
//! hyphenated lowercase strings.

use chrono::{DateTime, SecondsFormat, Utc};
use nudge_core::{
  activity::{Activity, ActivityType},
  notification::{Notification, NotificationStatus, NotificationType},
  subject::Subject,
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ────────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

fn decode_opt_dt(s: Option<&str>) -> Result<Option<DateTime<Utc>>> {
  s.map(decode_dt).transpose()
}

// ─── Enums ────────────────────────────────────────────────────────────────────

pub fn encode_activity_type(t: ActivityType) -> &'static str { t.into() }

pub fn decode_activity_type(s: &str) -> Result<ActivityType> {
  s.parse()
    .map_err(|_| nudge_core::Error::UnknownActivityType(s.to_owned()).into())
}

pub fn encode_notification_type(t: NotificationType) -> &'static str { t.into() }

pub fn decode_notification_type(s: &str) -> Result<NotificationType> {
  s.parse()
    .map_err(|_| nudge_core::Error::UnknownNotificationType(s.to_owned()).into())
}

pub fn encode_status(s: NotificationStatus) -> &'static str { s.into() }

pub fn decode_status(s: &str) -> Result<NotificationStatus> {
  s.parse()
    .map_err(|_| nudge_core::Error::UnknownNotificationStatus(s.to_owned()).into())
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Column list matching [`RawSubject::read`].
pub const SUBJECT_COLUMNS: &str =
  "s.subject_id, s.credential_ref, s.destination, s.active, s.created_at, s.updated_at";

/// Raw values read directly from a `subjects` row.
pub struct RawSubject {
  pub subject_id:     String,
  pub credential_ref: String,
  pub destination:    String,
  pub active:         bool,
  pub created_at:     String,
  pub updated_at:     String,
}

impl RawSubject {
  /// Read the [`SUBJECT_COLUMNS`] starting at column index `base`.
  pub fn read(row: &rusqlite::Row<'_>, base: usize) -> rusqlite::Result<Self> {
    Ok(Self {
      subject_id:     row.get(base)?,
      credential_ref: row.get(base + 1)?,
      destination:    row.get(base + 2)?,
      active:         row.get(base + 3)?,
      created_at:     row.get(base + 4)?,
      updated_at:     row.get(base + 5)?,
    })
  }

  pub fn into_subject(self) -> Result<Subject> {
    Ok(Subject {
      subject_id:     self.subject_id,
      credential_ref: self.credential_ref,
      destination:    self.destination,
      active:         self.active,
      created_at:     decode_dt(&self.created_at)?,
      updated_at:     decode_dt(&self.updated_at)?,
    })
  }
}

/// Column list matching [`RawActivity::read`].
pub const ACTIVITY_COLUMNS: &str = "a.activity_id, a.subject_id, a.course_code, \
   a.activity_type, a.title, a.start_at, a.due_at, a.link, a.identity, a.created_at";

/// Raw values read directly from an `activities` row.
pub struct RawActivity {
  pub activity_id:   String,
  pub subject_id:    String,
  pub course_code:   String,
  pub activity_type: String,
  pub title:         String,
  pub start_at:      Option<String>,
  pub due_at:        String,
  pub link:          String,
  pub identity:      String,
  pub created_at:    String,
}

impl RawActivity {
  /// Read the [`ACTIVITY_COLUMNS`] starting at column index `base`.
  pub fn read(row: &rusqlite::Row<'_>, base: usize) -> rusqlite::Result<Self> {
    Ok(Self {
      activity_id:   row.get(base)?,
      subject_id:    row.get(base + 1)?,
      course_code:   row.get(base + 2)?,
      activity_type: row.get(base + 3)?,
      title:         row.get(base + 4)?,
      start_at:      row.get(base + 5)?,
      due_at:        row.get(base + 6)?,
      link:          row.get(base + 7)?,
      identity:      row.get(base + 8)?,
      created_at:    row.get(base + 9)?,
    })
  }

  pub fn into_activity(self) -> Result<Activity> {
    Ok(Activity {
      activity_id:   decode_uuid(&self.activity_id)?,
      subject_id:    self.subject_id,
      course_code:   self.course_code,
      activity_type: decode_activity_type(&self.activity_type)?,
      title:         self.title,
      start_at:      decode_opt_dt(self.start_at.as_deref())?,
      due_at:        decode_dt(&self.due_at)?,
      link:          self.link,
      identity:      self.identity,
      created_at:    decode_dt(&self.created_at)?,
    })
  }
}

/// Column list matching [`RawNotification::read`].
pub const NOTIFICATION_COLUMNS: &str = "n.notification_id, n.activity_id, \
   n.subject_id, n.notification_type, n.scheduled_for, n.status, n.sent_at, \
   n.error, n.attempts, n.created_at";

/// Raw values read directly from a `notifications` row.
pub struct RawNotification {
  pub notification_id:   String,
  pub activity_id:       String,
  pub subject_id:        String,
  pub notification_type: String,
  pub scheduled_for:     String,
  pub status:            String,
  pub sent_at:           Option<String>,
  pub error:             Option<String>,
  pub attempts:          u32,
  pub created_at:        String,
}

impl RawNotification {
  /// Read the [`NOTIFICATION_COLUMNS`] starting at column index `base`.
  pub fn read(row: &rusqlite::Row<'_>, base: usize) -> rusqlite::Result<Self> {
    Ok(Self {
      notification_id:   row.get(base)?,
      activity_id:       row.get(base + 1)?,
      subject_id:        row.get(base + 2)?,
      notification_type: row.get(base + 3)?,
      scheduled_for:     row.get(base + 4)?,
      status:            row.get(base + 5)?,
      sent_at:           row.get(base + 6)?,
      error:             row.get(base + 7)?,
      attempts:          row.get(base + 8)?,
      created_at:        row.get(base + 9)?,
    })
  }

  pub fn into_notification(self) -> Result<Notification> {
    Ok(Notification {
      notification_id:   decode_uuid(&self.notification_id)?,
      activity_id:       decode_uuid(&self.activity_id)?,
      subject_id:        self.subject_id,
      notification_type: decode_notification_type(&self.notification_type)?,
      scheduled_for:     decode_dt(&self.scheduled_for)?,
      status:            decode_status(&self.status)?,
      sent_at:           decode_opt_dt(self.sent_at.as_deref())?,
      error:             self.error,
      attempts:          self.attempts,
      created_at:        decode_dt(&self.created_at)?,
    })
  }
}
