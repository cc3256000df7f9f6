//! Deduplicating ingestion of raw activities.
//!
//! Each raw record is keyed by its content identity. Re-observing the same
//! logical activity, on a later run or in a racing concurrent call, never
//! creates a second record.

use chrono::{DateTime, Utc};
use nudge_core::{
  activity::{Activity, NewActivity, RawActivity},
  store::{DeadlineStore, InsertOutcome},
};
use serde::Serialize;
use tracing::debug;

use crate::{Error, Result};

/// Why an activity was not stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
  /// Already due before the ingestion instant.
  Past,
  /// An activity with the same identity is already stored.
  Duplicate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
  Created(Activity),
  Skipped(SkipReason),
}

/// Store `raw` for `subject_id` unless it is past due or already known.
///
/// The past-due filter is one-way: an activity first seen after its deadline
/// is never stored, not even retroactively.
pub async fn ingest<S>(
  store: &S,
  subject_id: &str,
  raw: &RawActivity,
  now: DateTime<Utc>,
) -> Result<IngestOutcome>
where
  S: DeadlineStore,
{
  if raw.due_date < now {
    return Ok(IngestOutcome::Skipped(SkipReason::Past));
  }

  let input = NewActivity::from_raw(subject_id, raw);
  match store.insert_activity(input).await.map_err(Error::store)? {
    InsertOutcome::Created(activity) => {
      debug!(
        subject_id,
        activity_id = %activity.activity_id,
        course = %activity.course_code,
        "stored new activity"
      );
      Ok(IngestOutcome::Created(activity))
    }
    InsertOutcome::AlreadyExists => Ok(IngestOutcome::Skipped(SkipReason::Duplicate)),
  }
}
