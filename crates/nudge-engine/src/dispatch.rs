//! The notification dispatcher and its retry sweep.
//!
//! A dispatch cycle picks up to `batch_size` due pending notifications and
//! delivers them one at a time, pausing `message_interval` after each
//! delivery attempt. The channel is asked for readiness once per cycle; if it
//! is not ready the whole cycle is abandoned without touching any record.
//!
//! Cycles are serialised: an invocation that finds another cycle in flight
//! does nothing and reports zero counts.

use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use nudge_core::{
  channel::DeliveryChannel,
  notification::{DueNotification, MAX_ATTEMPTS, QueueStats},
  store::DeadlineStore,
};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::{Error, Result, channel, message::Renderer};

/// Reason recorded against notifications for inactive subjects.
pub const INACTIVE_REASON: &str = "inactive";

// ─── Configuration ───────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct DispatchConfig {
  /// Maximum notifications handled per cycle.
  pub batch_size:       usize,
  /// Pause after every delivery attempt.
  pub message_interval: Duration,
  /// Bound on each channel call.
  pub channel_timeout:  Duration,
}

impl Default for DispatchConfig {
  fn default() -> Self {
    Self {
      batch_size:       50,
      message_interval: Duration::from_secs(3),
      channel_timeout:  Duration::from_secs(30),
    }
  }
}

// ─── Reports ─────────────────────────────────────────────────────────────────

/// Counts for one dispatch cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchReport {
  pub processed: usize,
  pub sent:      usize,
  pub failed:    usize,
}

/// Counts for one retry sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryReport {
  pub requeued: usize,
}

// ─── Dispatcher ──────────────────────────────────────────────────────────────

pub struct Dispatcher<S, C> {
  store:    Arc<S>,
  channel:  Arc<C>,
  config:   DispatchConfig,
  renderer: Renderer,
  cycle:    Mutex<()>,
}

impl<S, C> Dispatcher<S, C>
where
  S: DeadlineStore,
  C: DeliveryChannel,
{
  pub fn new(store: Arc<S>, channel: Arc<C>, config: DispatchConfig) -> Self {
    Self {
      store,
      channel,
      config,
      renderer: Renderer::default(),
      cycle: Mutex::new(()),
    }
  }

  pub fn with_renderer(mut self, renderer: Renderer) -> Self {
    self.renderer = renderer;
    self
  }

  /// Run a dispatch cycle now.
  pub async fn process_now(&self) -> Result<DispatchReport> {
    self.process_at(Utc::now()).await
  }

  /// Run a dispatch cycle treating `now` as the current instant.
  pub async fn process_at(&self, now: DateTime<Utc>) -> Result<DispatchReport> {
    let Ok(_cycle) = self.cycle.try_lock() else {
      debug!("dispatch cycle already in progress; skipping");
      return Ok(DispatchReport::default());
    };

    let due = self
      .store
      .due_notifications(now, self.config.batch_size)
      .await
      .map_err(Error::store)?;
    if due.is_empty() {
      return Ok(DispatchReport::default());
    }

    let status = channel::status(self.channel.as_ref(), self.config.channel_timeout).await;
    if !status.is_ready() {
      warn!(%status, due = due.len(), "channel not ready; dispatch cycle aborted");
      return Ok(DispatchReport::default());
    }

    let mut report = DispatchReport::default();
    for item in due {
      report.processed += 1;
      if self.deliver(item, now).await? {
        report.sent += 1;
      } else {
        report.failed += 1;
      }
    }

    info!(
      processed = report.processed,
      sent = report.sent,
      failed = report.failed,
      "dispatch cycle finished"
    );
    Ok(report)
  }

  /// Handle one due notification. Returns whether it was delivered.
  async fn deliver(&self, item: DueNotification, now: DateTime<Utc>) -> Result<bool> {
    let DueNotification { notification, activity, subject } = item;
    let id = notification.notification_id;

    if !subject.active {
      debug!(notification_id = %id, subject_id = %subject.subject_id, "subject inactive");
      self
        .store
        .mark_failed(id, INACTIVE_REASON.to_owned())
        .await
        .map_err(Error::store)?;
      return Ok(false);
    }

    let text = self.renderer.notification(notification.notification_type, &activity);
    let outcome = channel::send(
      self.channel.as_ref(),
      &subject.destination,
      &text,
      self.config.channel_timeout,
    )
    .await;

    let delivered = match outcome {
      Ok(()) => {
        self.store.mark_sent(id, now).await.map_err(Error::store)?;
        true
      }
      Err(reason) => {
        warn!(notification_id = %id, subject_id = %subject.subject_id, %reason, "delivery failed");
        self.store.mark_failed(id, reason).await.map_err(Error::store)?;
        false
      }
    };

    tokio::time::sleep(self.config.message_interval).await;
    Ok(delivered)
  }

  /// Requeue failed notifications that still have attempts left.
  pub async fn retry_failed(&self) -> Result<RetryReport> {
    self.retry_failed_at(Utc::now()).await
  }

  pub async fn retry_failed_at(&self, now: DateTime<Utc>) -> Result<RetryReport> {
    let failed = self
      .store
      .retryable_notifications(now, MAX_ATTEMPTS)
      .await
      .map_err(Error::store)?;

    for n in &failed {
      self
        .store
        .reset_to_pending(n.notification_id)
        .await
        .map_err(Error::store)?;
    }

    if !failed.is_empty() {
      info!(requeued = failed.len(), "requeued failed notifications");
    }
    Ok(RetryReport { requeued: failed.len() })
  }

  /// Read-only snapshot of the notification table.
  pub async fn queue_stats(&self) -> Result<QueueStats> {
    self.store.queue_stats().await.map_err(Error::store)
  }
}

#[cfg(test)]
mod tests {
  use chrono::TimeDelta;
  use nudge_core::{
    activity::NewActivity,
    channel::ChannelStatus,
    notification::{NewNotification, NotificationStatus, NotificationType},
    store::NotificationFilter,
  };
  use nudge_store_sqlite::SqliteStore;
  use uuid::Uuid;

  use super::*;
  use crate::testing::{FakeChannel, quiz, seeded_store, today};

  fn config() -> DispatchConfig {
    DispatchConfig {
      batch_size:       50,
      message_interval: Duration::from_secs(2),
      channel_timeout:  Duration::from_secs(5),
    }
  }

  /// Store one activity for `subject_id` with a reminder at `at`.
  async fn reminder_at(store: &SqliteStore, subject_id: &str, title: &str, at: DateTime<Utc>) -> Uuid {
    let a = store
      .insert_activity(NewActivity::from_raw(
        subject_id,
        &quiz("CS201", title, at + TimeDelta::days(1)),
      ))
      .await
      .unwrap()
      .created()
      .unwrap();
    store
      .insert_notification(NewNotification {
        activity_id: a.activity_id,
        subject_id: subject_id.into(),
        notification_type: NotificationType::Reminder,
        scheduled_for: at,
      })
      .await
      .unwrap()
      .created()
      .unwrap()
      .notification_id
  }

  async fn status_of(store: &SqliteStore, id: Uuid) -> NotificationStatus {
    store.get_notification(id).await.unwrap().unwrap().status
  }

  #[tokio::test(start_paused = true)]
  async fn due_pending_is_sent_and_future_is_left() {
    let store = Arc::new(seeded_store(&["s-1"]).await);
    let channel = Arc::new(FakeChannel::ready());
    let due = reminder_at(&store, "s-1", "Quiz 1", today() - TimeDelta::minutes(5)).await;
    let later = reminder_at(&store, "s-1", "Quiz 2", today() + TimeDelta::hours(1)).await;

    let d = Dispatcher::new(store.clone(), channel.clone(), config());
    let report = d.process_at(today()).await.unwrap();

    assert_eq!(report, DispatchReport { processed: 1, sent: 1, failed: 0 });
    assert_eq!(status_of(&store, due).await, NotificationStatus::Sent);
    assert_eq!(status_of(&store, later).await, NotificationStatus::Pending);

    let sent = channel.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, "dest-s-1");
    assert!(sent[0].1.contains("Quiz 1"));

    let stored = store.get_notification(due).await.unwrap().unwrap();
    assert_eq!(stored.sent_at, Some(today()));
  }

  #[tokio::test(start_paused = true)]
  async fn channel_not_ready_leaves_everything_pending() {
    let store = Arc::new(seeded_store(&["s-1"]).await);
    let channel = Arc::new(FakeChannel::new(ChannelStatus::Disconnected));
    let a = reminder_at(&store, "s-1", "Quiz 1", today() - TimeDelta::minutes(5)).await;
    let b = reminder_at(&store, "s-1", "Quiz 2", today() - TimeDelta::minutes(1)).await;

    let d = Dispatcher::new(store.clone(), channel.clone(), config());
    let report = d.process_at(today()).await.unwrap();

    assert_eq!(report, DispatchReport::default());
    assert_eq!(status_of(&store, a).await, NotificationStatus::Pending);
    assert_eq!(status_of(&store, b).await, NotificationStatus::Pending);
    assert!(channel.sent().is_empty());
    assert_eq!(channel.status_calls(), 1);
  }

  #[tokio::test(start_paused = true)]
  async fn readiness_is_checked_once_per_cycle() {
    let store = Arc::new(seeded_store(&["s-1"]).await);
    let channel = Arc::new(FakeChannel::ready());
    for i in 0..4 {
      reminder_at(&store, "s-1", &format!("Quiz {i}"), today() - TimeDelta::minutes(1)).await;
    }

    let d = Dispatcher::new(store.clone(), channel.clone(), config());
    assert_eq!(d.process_at(today()).await.unwrap().sent, 4);
    assert_eq!(channel.status_calls(), 1);
  }

  #[tokio::test(start_paused = true)]
  async fn send_failure_is_recorded_with_attempt() {
    let store = Arc::new(seeded_store(&["s-1", "s-2"]).await);
    let channel = Arc::new(FakeChannel::ready());
    channel.fail_for("dest-s-2");
    let ok = reminder_at(&store, "s-1", "Quiz 1", today()).await;
    let bad = reminder_at(&store, "s-2", "Quiz 1", today()).await;

    let d = Dispatcher::new(store.clone(), channel.clone(), config());
    let report = d.process_at(today()).await.unwrap();

    assert_eq!(report, DispatchReport { processed: 2, sent: 1, failed: 1 });
    assert_eq!(status_of(&store, ok).await, NotificationStatus::Sent);
    let failed = store.get_notification(bad).await.unwrap().unwrap();
    assert_eq!(failed.status, NotificationStatus::Failed);
    assert_eq!(failed.attempts, 1);
    assert_eq!(failed.error.as_deref(), Some("cannot reach dest-s-2"));
  }

  #[tokio::test(start_paused = true)]
  async fn inactive_subject_fails_without_delivery_or_pause() {
    let store = Arc::new(seeded_store(&["s-1"]).await);
    store.set_subject_active("s-1", false).await.unwrap();
    let channel = Arc::new(FakeChannel::ready());
    let id = reminder_at(&store, "s-1", "Quiz 1", today()).await;

    let d = Dispatcher::new(store.clone(), channel.clone(), config());
    let started = tokio::time::Instant::now();
    let report = d.process_at(today()).await.unwrap();

    assert_eq!(report, DispatchReport { processed: 1, sent: 0, failed: 1 });
    assert!(channel.sent().is_empty());
    assert_eq!(started.elapsed(), Duration::ZERO);
    let stored = store.get_notification(id).await.unwrap().unwrap();
    assert_eq!(stored.status, NotificationStatus::Failed);
    assert_eq!(stored.error.as_deref(), Some(INACTIVE_REASON));
  }

  #[tokio::test(start_paused = true)]
  async fn pauses_after_every_attempt() {
    let store = Arc::new(seeded_store(&["s-1"]).await);
    let channel = Arc::new(FakeChannel::ready());
    for i in 0..3 {
      reminder_at(&store, "s-1", &format!("Quiz {i}"), today()).await;
    }

    let d = Dispatcher::new(store.clone(), channel.clone(), config());
    let started = tokio::time::Instant::now();
    d.process_at(today()).await.unwrap();
    assert!(started.elapsed() >= Duration::from_secs(6));
  }

  #[tokio::test(start_paused = true)]
  async fn batch_size_bounds_a_cycle() {
    let store = Arc::new(seeded_store(&["s-1"]).await);
    let channel = Arc::new(FakeChannel::ready());
    for i in 0..5 {
      reminder_at(&store, "s-1", &format!("Quiz {i}"), today()).await;
    }

    let d = Dispatcher::new(store.clone(), channel, DispatchConfig { batch_size: 2, ..config() });
    assert_eq!(d.process_at(today()).await.unwrap().processed, 2);
    assert_eq!(store.queue_stats().await.unwrap().pending, 3);
  }

  #[tokio::test(start_paused = true)]
  async fn concurrent_cycle_does_nothing() {
    let store = Arc::new(seeded_store(&["s-1"]).await);
    let channel = Arc::new(FakeChannel::ready());
    for i in 0..3 {
      reminder_at(&store, "s-1", &format!("Quiz {i}"), today()).await;
    }

    let d = Dispatcher::new(store.clone(), channel.clone(), config());
    let (a, b) = tokio::join!(d.process_at(today()), d.process_at(today()));
    let (a, b) = (a.unwrap(), b.unwrap());

    assert_eq!(a.sent + b.sent, 3);
    assert!(a == DispatchReport::default() || b == DispatchReport::default());
    assert_eq!(channel.sent().len(), 3);
  }

  #[tokio::test(start_paused = true)]
  async fn retry_requeues_until_attempts_exhausted() {
    let store = Arc::new(seeded_store(&["s-1"]).await);
    let channel = Arc::new(FakeChannel::ready());
    channel.fail_for("dest-s-1");
    let id = reminder_at(&store, "s-1", "Quiz 1", today()).await;

    let d = Dispatcher::new(store.clone(), channel.clone(), config());
    for attempt in 1..=3u32 {
      assert_eq!(d.process_at(today()).await.unwrap().failed, 1);
      let requeued = d.retry_failed_at(today()).await.unwrap().requeued;
      assert_eq!(requeued, if attempt < 3 { 1 } else { 0 });
    }

    let dead = store.get_notification(id).await.unwrap().unwrap();
    assert_eq!(dead.status, NotificationStatus::Failed);
    assert_eq!(dead.attempts, 3);

    assert_eq!(d.process_at(today()).await.unwrap(), DispatchReport::default());
    assert_eq!(d.retry_failed_at(today()).await.unwrap().requeued, 0);
  }

  #[tokio::test(start_paused = true)]
  async fn queue_stats_counts_each_status() {
    let store = Arc::new(seeded_store(&["s-1", "s-2"]).await);
    let channel = Arc::new(FakeChannel::ready());
    channel.fail_for("dest-s-2");
    reminder_at(&store, "s-1", "Quiz 1", today()).await;
    reminder_at(&store, "s-2", "Quiz 1", today()).await;
    reminder_at(&store, "s-1", "Quiz 2", today() + TimeDelta::days(1)).await;

    let d = Dispatcher::new(store.clone(), channel, config());
    d.process_at(today()).await.unwrap();

    let stats = d.queue_stats().await.unwrap();
    assert_eq!(stats, QueueStats { pending: 1, sent: 1, failed: 1, total: 3 });

    let failed = store
      .list_notifications(&NotificationFilter {
        status: Some(NotificationStatus::Failed),
        ..Default::default()
      })
      .await
      .unwrap();
    assert_eq!(failed.len(), 1);
  }
}
