//! [`SqliteStore`]: the SQLite implementation of [`DeadlineStore`].

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use nudge_core::{
  activity::{Activity, NewActivity},
  notification::{
    DueNotification, NewNotification, Notification, NotificationStatus,
    QueueStats,
  },
  store::{DeadlineStore, InsertOutcome, NotificationFilter},
  subject::{NewSubject, Subject},
};

use crate::{
  encode::{
    ACTIVITY_COLUMNS, NOTIFICATION_COLUMNS, RawActivity, RawNotification,
    RawSubject, SUBJECT_COLUMNS, encode_activity_type, encode_dt,
    encode_notification_type, encode_status, encode_uuid,
  },
  schema::SCHEMA,
  Error, Result,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Nudge store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, mostly for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn query_subject(&self, subject_id: String) -> Result<Option<Subject>> {
    let raw: Option<RawSubject> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!("SELECT {SUBJECT_COLUMNS} FROM subjects s WHERE s.subject_id = ?1"),
            rusqlite::params![subject_id],
            |row| RawSubject::read(row, 0),
          )
          .optional()?)
      })
      .await?;

    raw.map(RawSubject::into_subject).transpose()
  }

  async fn query_activities(
    &self,
    sql: String,
    params: Vec<String>,
  ) -> Result<Vec<Activity>> {
    let raws: Vec<RawActivity> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(params.iter()), |row| {
            RawActivity::read(row, 0)
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawActivity::into_activity).collect()
  }

  /// Run a single-row `UPDATE` on `notifications`, failing if no row matched.
  async fn update_notification(
    &self,
    notification_id: Uuid,
    sql: &'static str,
    extra: Vec<Option<String>>,
  ) -> Result<()> {
    let id_str = encode_uuid(notification_id);

    let changed = self
      .conn
      .call(move |conn| {
        let mut params: Vec<Option<String>> = vec![Some(id_str)];
        params.extend(extra);
        Ok(conn.execute(sql, rusqlite::params_from_iter(params.iter()))?)
      })
      .await?;

    if changed == 0 {
      return Err(Error::NotificationNotFound(notification_id));
    }
    Ok(())
  }
}

// ─── DeadlineStore impl ──────────────────────────────────────────────────────

impl DeadlineStore for SqliteStore {
  type Error = Error;

  // ── Subjects ──────────────────────────────────────────────────────────────

  async fn upsert_subject(&self, input: NewSubject) -> Result<Subject> {
    let now_str    = encode_dt(Utc::now());
    let subject_id = input.subject_id.clone();

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO subjects
             (subject_id, credential_ref, destination, active, created_at, updated_at)
           VALUES (?1, ?2, ?3, 1, ?4, ?4)
           ON CONFLICT (subject_id) DO UPDATE SET
             credential_ref = excluded.credential_ref,
             destination    = excluded.destination,
             updated_at     = excluded.updated_at",
          rusqlite::params![
            input.subject_id,
            input.credential_ref,
            input.destination,
            now_str,
          ],
        )?;
        Ok(())
      })
      .await?;

    self
      .query_subject(subject_id.clone())
      .await?
      .ok_or(Error::SubjectNotFound(subject_id))
  }

  async fn get_subject(&self, subject_id: &str) -> Result<Option<Subject>> {
    self.query_subject(subject_id.to_owned()).await
  }

  async fn list_subjects(&self, active_only: bool) -> Result<Vec<Subject>> {
    let raws: Vec<RawSubject> = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT {SUBJECT_COLUMNS} FROM subjects s
           WHERE (?1 = 0 OR s.active = 1)
           ORDER BY s.subject_id"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params![active_only], |row| RawSubject::read(row, 0))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawSubject::into_subject).collect()
  }

  async fn set_subject_active(
    &self,
    subject_id: &str,
    active: bool,
  ) -> Result<Option<Subject>> {
    let id_str  = subject_id.to_owned();
    let now_str = encode_dt(Utc::now());

    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE subjects SET active = ?2, updated_at = ?3 WHERE subject_id = ?1",
          rusqlite::params![id_str, active, now_str],
        )?)
      })
      .await?;

    if changed == 0 {
      return Ok(None);
    }
    self.query_subject(subject_id.to_owned()).await
  }

  // ── Activities ────────────────────────────────────────────────────────────

  async fn insert_activity(&self, input: NewActivity) -> Result<InsertOutcome<Activity>> {
    let activity = Activity {
      activity_id:   Uuid::new_v4(),
      subject_id:    input.subject_id,
      course_code:   input.course_code,
      activity_type: input.activity_type,
      title:         input.title,
      start_at:      input.start_at,
      due_at:        input.due_at,
      link:          input.link,
      identity:      input.identity,
      created_at:    Utc::now(),
    };

    let id_str         = encode_uuid(activity.activity_id);
    let subject_id     = activity.subject_id.clone();
    let course_code    = activity.course_code.clone();
    let type_str       = encode_activity_type(activity.activity_type);
    let title          = activity.title.clone();
    let start_str      = activity.start_at.map(encode_dt);
    let due_str        = encode_dt(activity.due_at);
    let link           = activity.link.clone();
    let identity       = activity.identity.clone();
    let created_at_str = encode_dt(activity.created_at);

    // A conflicting identity inserts nothing; that is the duplicate signal.
    let inserted = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "INSERT INTO activities (
             activity_id, subject_id, course_code, activity_type, title,
             start_at, due_at, link, identity, created_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
           ON CONFLICT (identity) DO NOTHING",
          rusqlite::params![
            id_str,
            subject_id,
            course_code,
            type_str,
            title,
            start_str,
            due_str,
            link,
            identity,
            created_at_str,
          ],
        )?)
      })
      .await?;

    Ok(if inserted == 0 {
      InsertOutcome::AlreadyExists
    } else {
      InsertOutcome::Created(activity)
    })
  }

  async fn get_activity(&self, activity_id: Uuid) -> Result<Option<Activity>> {
    let sql = format!("SELECT {ACTIVITY_COLUMNS} FROM activities a WHERE a.activity_id = ?1");
    let mut found = self.query_activities(sql, vec![encode_uuid(activity_id)]).await?;
    Ok(found.pop())
  }

  async fn list_activities(
    &self,
    subject_id: &str,
    due_after: Option<DateTime<Utc>>,
  ) -> Result<Vec<Activity>> {
    let mut params = vec![subject_id.to_owned()];
    let filter = match due_after {
      Some(at) => {
        params.push(encode_dt(at));
        "AND a.due_at >= ?2"
      }
      None => "",
    };
    let sql = format!(
      "SELECT {ACTIVITY_COLUMNS} FROM activities a
       WHERE a.subject_id = ?1 {filter}
       ORDER BY a.due_at ASC"
    );
    self.query_activities(sql, params).await
  }

  async fn activities_without_notifications(
    &self,
    due_after: DateTime<Utc>,
  ) -> Result<Vec<Activity>> {
    let sql = format!(
      "SELECT {ACTIVITY_COLUMNS} FROM activities a
       WHERE a.due_at > ?1
         AND NOT EXISTS (
           SELECT 1 FROM notifications n WHERE n.activity_id = a.activity_id
         )
       ORDER BY a.due_at ASC"
    );
    self.query_activities(sql, vec![encode_dt(due_after)]).await
  }

  // ── Notifications ─────────────────────────────────────────────────────────

  async fn insert_notification(
    &self,
    input: NewNotification,
  ) -> Result<InsertOutcome<Notification>> {
    let notification = Notification {
      notification_id:   Uuid::new_v4(),
      activity_id:       input.activity_id,
      subject_id:        input.subject_id,
      notification_type: input.notification_type,
      scheduled_for:     input.scheduled_for,
      status:            NotificationStatus::Pending,
      sent_at:           None,
      error:             None,
      attempts:          0,
      created_at:        Utc::now(),
    };

    let id_str          = encode_uuid(notification.notification_id);
    let activity_id_str = encode_uuid(notification.activity_id);
    let subject_id      = notification.subject_id.clone();
    let type_str        = encode_notification_type(notification.notification_type);
    let scheduled_str   = encode_dt(notification.scheduled_for);
    let status_str      = encode_status(notification.status);
    let created_at_str  = encode_dt(notification.created_at);

    let inserted = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "INSERT INTO notifications (
             notification_id, activity_id, subject_id, notification_type,
             scheduled_for, status, attempts, created_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, ?7)
           ON CONFLICT (activity_id, notification_type) DO NOTHING",
          rusqlite::params![
            id_str,
            activity_id_str,
            subject_id,
            type_str,
            scheduled_str,
            status_str,
            created_at_str,
          ],
        )?)
      })
      .await?;

    Ok(if inserted == 0 {
      InsertOutcome::AlreadyExists
    } else {
      InsertOutcome::Created(notification)
    })
  }

  async fn get_notification(&self, notification_id: Uuid) -> Result<Option<Notification>> {
    let id_str = encode_uuid(notification_id);

    let raw: Option<RawNotification> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!(
              "SELECT {NOTIFICATION_COLUMNS} FROM notifications n
               WHERE n.notification_id = ?1"
            ),
            rusqlite::params![id_str],
            |row| RawNotification::read(row, 0),
          )
          .optional()?)
      })
      .await?;

    raw.map(RawNotification::into_notification).transpose()
  }

  async fn due_notifications(
    &self,
    now: DateTime<Utc>,
    limit: usize,
  ) -> Result<Vec<DueNotification>> {
    let now_str   = encode_dt(now);
    let limit_val = limit as i64;

    let raws: Vec<(RawNotification, RawActivity, RawSubject)> = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT {NOTIFICATION_COLUMNS}, {ACTIVITY_COLUMNS}, {SUBJECT_COLUMNS}
           FROM notifications n
           JOIN activities a ON a.activity_id = n.activity_id
           JOIN subjects   s ON s.subject_id  = n.subject_id
           WHERE n.status = 'pending'
             AND n.scheduled_for <= ?1
           LIMIT ?2"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params![now_str, limit_val], |row| {
            Ok((
              RawNotification::read(row, 0)?,
              RawActivity::read(row, 10)?,
              RawSubject::read(row, 20)?,
            ))
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws
      .into_iter()
      .map(|(n, a, s)| {
        Ok(DueNotification {
          notification: n.into_notification()?,
          activity:     a.into_activity()?,
          subject:      s.into_subject()?,
        })
      })
      .collect()
  }

  async fn mark_sent(&self, notification_id: Uuid, sent_at: DateTime<Utc>) -> Result<()> {
    self
      .update_notification(
        notification_id,
        "UPDATE notifications
         SET status = 'sent', sent_at = ?2, error = NULL
         WHERE notification_id = ?1",
        vec![Some(encode_dt(sent_at))],
      )
      .await
  }

  async fn mark_failed(&self, notification_id: Uuid, error: String) -> Result<()> {
    self
      .update_notification(
        notification_id,
        "UPDATE notifications
         SET status = 'failed', error = ?2, attempts = attempts + 1
         WHERE notification_id = ?1",
        vec![Some(error)],
      )
      .await
  }

  async fn retryable_notifications(
    &self,
    now: DateTime<Utc>,
    max_attempts: u32,
  ) -> Result<Vec<Notification>> {
    let now_str = encode_dt(now);

    let raws: Vec<RawNotification> = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT {NOTIFICATION_COLUMNS} FROM notifications n
           WHERE n.status = 'failed'
             AND n.attempts < ?2
             AND n.scheduled_for <= ?1"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params![now_str, max_attempts], |row| {
            RawNotification::read(row, 0)
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawNotification::into_notification).collect()
  }

  async fn reset_to_pending(&self, notification_id: Uuid) -> Result<()> {
    self
      .update_notification(
        notification_id,
        "UPDATE notifications SET status = 'pending'
         WHERE notification_id = ?1 AND status = 'failed'",
        vec![],
      )
      .await
  }

  async fn list_notifications(
    &self,
    filter: &NotificationFilter,
  ) -> Result<Vec<Notification>> {
    let status_str = filter.status.map(encode_status);
    let subject_id = filter.subject_id.clone();
    let limit_val  = filter.limit.unwrap_or(100) as i64;
    let offset_val = filter.offset.unwrap_or(0) as i64;

    let raws: Vec<RawNotification> = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT {NOTIFICATION_COLUMNS} FROM notifications n
           WHERE (?1 IS NULL OR n.status = ?1)
             AND (?2 IS NULL OR n.subject_id = ?2)
           ORDER BY n.scheduled_for ASC
           LIMIT ?3 OFFSET ?4"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(
            rusqlite::params![status_str, subject_id, limit_val, offset_val],
            |row| RawNotification::read(row, 0),
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawNotification::into_notification).collect()
  }

  async fn queue_stats(&self) -> Result<QueueStats> {
    let counts: Vec<(String, i64)> = self
      .conn
      .call(|conn| {
        let mut stmt =
          conn.prepare("SELECT status, COUNT(*) FROM notifications GROUP BY status")?;
        let rows = stmt
          .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    let mut stats = QueueStats::default();
    for (status, count) in counts {
      let count = count as u64;
      match crate::encode::decode_status(&status)? {
        NotificationStatus::Pending => stats.pending = count,
        NotificationStatus::Sent => stats.sent = count,
        NotificationStatus::Failed => stats.failed = count,
      }
      stats.total += count;
    }
    Ok(stats)
  }
}
