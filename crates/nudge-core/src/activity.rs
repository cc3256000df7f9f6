//! Activity types: a single deadline-bearing item observed for a subject.
//!
//! Activities are immutable once stored. Their identity is derived from their
//! content rather than assigned, so that re-observing the same logical item on
//! a later run collapses onto the existing record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use strum::{Display, EnumString, IntoStaticStr};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Kind ────────────────────────────────────────────────────────────────────

/// What sort of deadline an activity represents.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Default,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ActivityType {
  Assignment,
  Quiz,
  QuizResult,
  DiscussionBoard,
  DiscussionBoardResult,
  PendingFee,
  Practical,
  /// Anything the extraction source could not classify.
  #[default]
  #[serde(other)]
  Unknown,
}

impl ActivityType {
  /// Human-readable label used in rendered messages.
  pub fn label(self) -> &'static str {
    match self {
      Self::Assignment => "Assignment",
      Self::Quiz => "Quiz",
      Self::QuizResult => "Quiz result",
      Self::DiscussionBoard => "Discussion board",
      Self::DiscussionBoardResult => "Discussion board result",
      Self::PendingFee => "Pending fee",
      Self::Practical => "Practical",
      Self::Unknown => "Activity",
    }
  }
}

// ─── Raw input ───────────────────────────────────────────────────────────────

/// One record as emitted by an extraction source. Nothing about it has been
/// checked yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawActivity {
  pub course_code:   String,
  #[serde(default)]
  pub activity_type: ActivityType,
  pub title:         String,
  #[serde(default)]
  pub start_date:    Option<DateTime<Utc>>,
  pub due_date:      DateTime<Utc>,
  pub link:          String,
}

impl RawActivity {
  /// Reject records that cannot be identified or linked back to the source.
  pub fn validate(&self) -> Result<()> {
    let blank = |s: &str| s.trim().is_empty();
    if blank(&self.course_code) {
      return Err(Error::InvalidActivity {
        field:  "course_code",
        reason: "is blank",
      });
    }
    if blank(&self.title) {
      return Err(Error::InvalidActivity {
        field:  "title",
        reason: "is blank",
      });
    }
    if blank(&self.link) {
      return Err(Error::InvalidActivity {
        field:  "link",
        reason: "is blank",
      });
    }
    if let Some(start) = self.start_date
      && start > self.due_date
    {
      return Err(Error::InvalidActivity {
        field:  "start_date",
        reason: "is after due_date",
      });
    }
    Ok(())
  }
}

// ─── Identity ────────────────────────────────────────────────────────────────

/// Compute the content identity of an activity.
///
/// SHA-256 over the subject, course code, title and due instant, hex-encoded.
/// Each field is length-prefixed so that shifting characters between fields
/// cannot produce the same digest.
pub fn compute_identity(
  subject_id: &str,
  course_code: &str,
  title: &str,
  due: DateTime<Utc>,
) -> String {
  let mut hasher = Sha256::new();
  for part in [subject_id, course_code, title] {
    hasher.update((part.len() as u64).to_le_bytes());
    hasher.update(part.as_bytes());
  }
  hasher.update(due.timestamp_micros().to_le_bytes());
  hex::encode(hasher.finalize())
}

// ─── Stored activity ─────────────────────────────────────────────────────────

/// A persisted activity. Once written, no field is ever updated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Activity {
  pub activity_id:   Uuid,
  pub subject_id:    String,
  pub course_code:   String,
  pub activity_type: ActivityType,
  pub title:         String,
  pub start_at:      Option<DateTime<Utc>>,
  pub due_at:        DateTime<Utc>,
  pub link:          String,
  /// See [`compute_identity`]. Globally unique.
  pub identity:      String,
  /// Server-assigned timestamp.
  pub created_at:    DateTime<Utc>,
}

/// Input to [`crate::store::DeadlineStore::insert_activity`].
/// `activity_id` and `created_at` are assigned by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewActivity {
  pub subject_id:    String,
  pub course_code:   String,
  pub activity_type: ActivityType,
  pub title:         String,
  pub start_at:      Option<DateTime<Utc>>,
  pub due_at:        DateTime<Utc>,
  pub link:          String,
  pub identity:      String,
}

impl NewActivity {
  /// Build the insert payload for `raw`, observed for `subject_id`.
  pub fn from_raw(subject_id: &str, raw: &RawActivity) -> Self {
    Self {
      subject_id:    subject_id.to_owned(),
      course_code:   raw.course_code.clone(),
      activity_type: raw.activity_type,
      title:         raw.title.clone(),
      start_at:      raw.start_date,
      due_at:        raw.due_date,
      link:          raw.link.clone(),
      identity:      compute_identity(
        subject_id,
        &raw.course_code,
        &raw.title,
        raw.due_date,
      ),
    }
  }
}
