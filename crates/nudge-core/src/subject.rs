//! Subject: a monitored individual whose deadlines are tracked.
//!
//! Subjects are never deleted. The only mutations are refreshing the
//! destination address (on every successful ingestion run) and toggling the
//! active flag.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A persisted subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
  /// Externally meaningful identifier, e.g. a student number.
  pub subject_id:     String,
  /// Opaque reference handed to the extraction source; never interpreted here.
  pub credential_ref: String,
  /// Where messages for this subject are delivered.
  pub destination:    String,
  /// Inactive subjects keep their history but receive no messages.
  pub active:         bool,
  pub created_at:     DateTime<Utc>,
  pub updated_at:     DateTime<Utc>,
}

/// Input to [`crate::store::DeadlineStore::upsert_subject`], and the shape of
/// one entry of the roster an orchestrator run walks through.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSubject {
  #[serde(rename = "id")]
  pub subject_id:     String,
  #[serde(default)]
  pub credential_ref: String,
  pub destination:    String,
}

impl NewSubject {
  pub fn new(
    subject_id: impl Into<String>,
    credential_ref: impl Into<String>,
    destination: impl Into<String>,
  ) -> Self {
    Self {
      subject_id:     subject_id.into(),
      credential_ref: credential_ref.into(),
      destination:    destination.into(),
    }
  }
}
