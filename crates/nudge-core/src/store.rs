//! The `DeadlineStore` trait and supporting query types.
//!
//! The trait is implemented by storage backends (e.g. `nudge-store-sqlite`).
//! The engine and the API depend on this abstraction, not on any concrete
//! backend.

use std::future::Future;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  activity::{Activity, NewActivity},
  notification::{
    DueNotification, NewNotification, Notification, NotificationStatus,
    QueueStats,
  },
  subject::{NewSubject, Subject},
};

// ─── Insert outcome ──────────────────────────────────────────────────────────

/// Result of an insert guarded by a uniqueness constraint.
///
/// Losing a race against a concurrent insert of the same key is reported as
/// [`InsertOutcome::AlreadyExists`], exactly like a plain re-insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome<T> {
  Created(T),
  AlreadyExists,
}

impl<T> InsertOutcome<T> {
  pub fn created(self) -> Option<T> {
    match self {
      Self::Created(t) => Some(t),
      Self::AlreadyExists => None,
    }
  }

  pub fn is_created(&self) -> bool { matches!(self, Self::Created(_)) }
}

// ─── Query type ──────────────────────────────────────────────────────────────

/// Parameters for [`DeadlineStore::list_notifications`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotificationFilter {
  pub status:     Option<NotificationStatus>,
  pub subject_id: Option<String>,
  pub limit:      Option<usize>,
  pub offset:     Option<usize>,
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a Nudge store backend.
///
/// Activities are append-only. Notifications only ever change `status`,
/// `sent_at`, `error` and `attempts`.
///
/// All methods return `Send` futures so the trait can be shared between the
/// orchestrator, the dispatcher and the HTTP surface on a multi-threaded
/// runtime.
pub trait DeadlineStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Subjects ──────────────────────────────────────────────────────────

  /// Create the subject, or refresh the destination and credential reference
  /// of an existing one. The active flag is left untouched.
  fn upsert_subject(
    &self,
    input: NewSubject,
  ) -> impl Future<Output = Result<Subject, Self::Error>> + Send + '_;

  /// Retrieve a subject by identifier. Returns `None` if not found.
  fn get_subject<'a>(
    &'a self,
    subject_id: &'a str,
  ) -> impl Future<Output = Result<Option<Subject>, Self::Error>> + Send + 'a;

  /// List subjects ordered by identifier.
  fn list_subjects(
    &self,
    active_only: bool,
  ) -> impl Future<Output = Result<Vec<Subject>, Self::Error>> + Send + '_;

  /// Toggle the active flag. Returns `None` if the subject does not exist.
  fn set_subject_active<'a>(
    &'a self,
    subject_id: &'a str,
    active: bool,
  ) -> impl Future<Output = Result<Option<Subject>, Self::Error>> + Send + 'a;

  // ── Activities ────────────────────────────────────────────────────────

  /// Insert an activity keyed by its content identity.
  fn insert_activity(
    &self,
    input: NewActivity,
  ) -> impl Future<Output = Result<InsertOutcome<Activity>, Self::Error>> + Send + '_;

  fn get_activity(
    &self,
    activity_id: Uuid,
  ) -> impl Future<Output = Result<Option<Activity>, Self::Error>> + Send + '_;

  /// Activities for a subject ordered by due instant, optionally restricted
  /// to those due at or after `due_after`.
  fn list_activities<'a>(
    &'a self,
    subject_id: &'a str,
    due_after: Option<DateTime<Utc>>,
  ) -> impl Future<Output = Result<Vec<Activity>, Self::Error>> + Send + 'a;

  /// Activities due after `due_after` that have no notification of any type.
  fn activities_without_notifications(
    &self,
    due_after: DateTime<Utc>,
  ) -> impl Future<Output = Result<Vec<Activity>, Self::Error>> + Send + '_;

  // ── Notifications ─────────────────────────────────────────────────────

  /// Insert a pending notification; at most one per (activity, type).
  fn insert_notification(
    &self,
    input: NewNotification,
  ) -> impl Future<Output = Result<InsertOutcome<Notification>, Self::Error>>
  + Send
  + '_;

  fn get_notification(
    &self,
    notification_id: Uuid,
  ) -> impl Future<Output = Result<Option<Notification>, Self::Error>> + Send + '_;

  /// Up to `limit` pending notifications with `scheduled_for <= now`, joined
  /// with their activity and subject. Order is unspecified.
  fn due_notifications(
    &self,
    now: DateTime<Utc>,
    limit: usize,
  ) -> impl Future<Output = Result<Vec<DueNotification>, Self::Error>> + Send + '_;

  /// `pending → sent`.
  fn mark_sent(
    &self,
    notification_id: Uuid,
    sent_at: DateTime<Utc>,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// `→ failed`, recording `error` and incrementing `attempts`.
  fn mark_failed(
    &self,
    notification_id: Uuid,
    error: String,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Failed notifications with `attempts < max_attempts` and
  /// `scheduled_for <= now`.
  fn retryable_notifications(
    &self,
    now: DateTime<Utc>,
    max_attempts: u32,
  ) -> impl Future<Output = Result<Vec<Notification>, Self::Error>> + Send + '_;

  /// `failed → pending`. `attempts` is left untouched.
  fn reset_to_pending(
    &self,
    notification_id: Uuid,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn list_notifications<'a>(
    &'a self,
    filter: &'a NotificationFilter,
  ) -> impl Future<Output = Result<Vec<Notification>, Self::Error>> + Send + 'a;

  fn queue_stats(
    &self,
  ) -> impl Future<Output = Result<QueueStats, Self::Error>> + Send + '_;
}
