//! Deriving notifications for newly ingested activities.
//!
//! An activity gets at most a `start` notification (when it opens in the
//! future) and a `reminder` one day before it is due. Both inserts are
//! idempotent, so scheduling the same activity twice is harmless.

use chrono::{DateTime, Duration, Utc};
use nudge_core::{
  activity::Activity,
  notification::{NewNotification, Notification, NotificationType},
  store::{DeadlineStore, InsertOutcome},
};
use tracing::{debug, info};

use crate::{Error, Result};

/// How long before the due instant the reminder fires.
pub fn reminder_lead() -> Duration { Duration::days(1) }

/// Schedule the start and reminder notifications for `activity`.
///
/// Returns only the notifications this call actually created. Candidates
/// whose instant is not strictly in the future are dropped, and collisions
/// with an existing `(activity, type)` pair are treated as already scheduled.
pub async fn schedule_notifications<S>(
  store: &S,
  activity: &Activity,
  now: DateTime<Utc>,
) -> Result<Vec<Notification>>
where
  S: DeadlineStore,
{
  let mut candidates = Vec::with_capacity(2);

  if let Some(start) = activity.start_at
    && start > now
  {
    candidates.push((NotificationType::Start, start));
  }

  let remind_at = activity.due_at - reminder_lead();
  if remind_at > now {
    candidates.push((NotificationType::Reminder, remind_at));
  }

  let mut created = Vec::with_capacity(candidates.len());
  for (notification_type, scheduled_for) in candidates {
    let input = NewNotification {
      activity_id: activity.activity_id,
      subject_id: activity.subject_id.clone(),
      notification_type,
      scheduled_for,
    };
    match store.insert_notification(input).await.map_err(Error::store)? {
      InsertOutcome::Created(n) => {
        debug!(
          activity_id = %activity.activity_id,
          kind = %notification_type,
          at = %scheduled_for,
          "scheduled notification"
        );
        created.push(n);
      }
      InsertOutcome::AlreadyExists => {}
    }
  }

  Ok(created)
}

/// Re-run scheduling for future activities that ended up with no
/// notification at all, e.g. because the process stopped between storing an
/// activity and scheduling it. Returns the number of notifications created.
pub async fn repair_unscheduled<S>(store: &S, now: DateTime<Utc>) -> Result<usize>
where
  S: DeadlineStore,
{
  let orphans = store
    .activities_without_notifications(now)
    .await
    .map_err(Error::store)?;

  let mut repaired = 0;
  for activity in &orphans {
    repaired += schedule_notifications(store, activity, now).await?.len();
  }

  if repaired > 0 {
    info!(activities = orphans.len(), notifications = repaired, "repaired unscheduled activities");
  }
  Ok(repaired)
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;
  use nudge_core::{
    activity::{ActivityType, NewActivity, RawActivity},
    store::NotificationFilter,
  };

  use super::*;
  use crate::testing::{quiz, seeded_store, today};

  async fn stored(store: &impl DeadlineStore, raw: RawActivity) -> Activity {
    store
      .insert_activity(NewActivity::from_raw("s-1", &raw))
      .await
      .unwrap()
      .created()
      .unwrap()
  }

  #[tokio::test]
  async fn reminder_fires_one_day_before_due() {
    let store = seeded_store(&["s-1"]).await;
    let now = Utc.with_ymd_and_hms(2025, 10, 1, 0, 0, 0).unwrap();
    let due = Utc.with_ymd_and_hms(2025, 12, 10, 0, 0, 0).unwrap();
    let activity = stored(&store, quiz("CS201", "Quiz 1", due)).await;

    let created = schedule_notifications(&store, &activity, now).await.unwrap();
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].notification_type, NotificationType::Reminder);
    assert_eq!(
      created[0].scheduled_for,
      Utc.with_ymd_and_hms(2025, 12, 9, 0, 0, 0).unwrap()
    );
  }

  #[tokio::test]
  async fn future_start_gets_its_own_notification() {
    let store = seeded_store(&["s-1"]).await;
    let now = Utc.with_ymd_and_hms(2025, 10, 1, 0, 0, 0).unwrap();
    let start = Utc.with_ymd_and_hms(2025, 11, 1, 0, 0, 0).unwrap();
    let mut raw = quiz("CS201", "Quiz 1", Utc.with_ymd_and_hms(2025, 12, 10, 0, 0, 0).unwrap());
    raw.start_date = Some(start);
    let activity = stored(&store, raw).await;

    let created = schedule_notifications(&store, &activity, now).await.unwrap();
    assert_eq!(created.len(), 2);
    let start_n = created
      .iter()
      .find(|n| n.notification_type == NotificationType::Start)
      .unwrap();
    assert_eq!(start_n.scheduled_for, start);
  }

  #[tokio::test]
  async fn past_start_is_not_scheduled() {
    let store = seeded_store(&["s-1"]).await;
    let now = Utc.with_ymd_and_hms(2025, 11, 15, 0, 0, 0).unwrap();
    let mut raw = quiz("CS201", "Quiz 1", Utc.with_ymd_and_hms(2025, 12, 10, 0, 0, 0).unwrap());
    raw.start_date = Some(Utc.with_ymd_and_hms(2025, 11, 1, 0, 0, 0).unwrap());
    let activity = stored(&store, raw).await;

    let created = schedule_notifications(&store, &activity, now).await.unwrap();
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].notification_type, NotificationType::Reminder);
  }

  #[tokio::test]
  async fn due_within_a_day_gets_nothing() {
    let store = seeded_store(&["s-1"]).await;
    let activity = stored(&store, quiz("CS201", "Quiz 1", today() + Duration::hours(20))).await;

    let created = schedule_notifications(&store, &activity, today()).await.unwrap();
    assert!(created.is_empty());
  }

  #[tokio::test]
  async fn rescheduling_creates_nothing_new() {
    let store = seeded_store(&["s-1"]).await;
    let mut raw = quiz("CS201", "Quiz 1", today() + Duration::days(5));
    raw.activity_type = ActivityType::Assignment;
    raw.start_date = Some(today() + Duration::days(1));
    let activity = stored(&store, raw).await;

    assert_eq!(schedule_notifications(&store, &activity, today()).await.unwrap().len(), 2);
    assert!(schedule_notifications(&store, &activity, today()).await.unwrap().is_empty());

    let all = store.list_notifications(&NotificationFilter::default()).await.unwrap();
    assert_eq!(all.len(), 2);
  }

  #[tokio::test]
  async fn repair_schedules_orphaned_activities_once() {
    let store = seeded_store(&["s-1"]).await;
    stored(&store, quiz("CS201", "Quiz 1", today() + Duration::days(3))).await;
    stored(&store, quiz("CS201", "Quiz 2", today() + Duration::days(4))).await;

    assert_eq!(repair_unscheduled(&store, today()).await.unwrap(), 2);
    assert_eq!(repair_unscheduled(&store, today()).await.unwrap(), 0);
  }
}
