//! Shared fixtures and in-memory collaborators for the engine tests.

use std::{
  collections::{HashMap, HashSet, VecDeque},
  sync::{
    Mutex,
    atomic::{AtomicUsize, Ordering},
  },
};

use chrono::{DateTime, TimeZone, Utc};
use nudge_core::{
  activity::{ActivityType, RawActivity},
  channel::{ChannelStatus, DeliveryChannel},
  source::{ActivitySource, Extraction, Stage},
  store::DeadlineStore,
  subject::NewSubject,
};
use nudge_store_sqlite::SqliteStore;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("{0}")]
pub struct FakeError(pub String);

pub fn today() -> DateTime<Utc> { Utc.with_ymd_and_hms(2025, 11, 20, 12, 0, 0).unwrap() }

pub fn roster_entry(id: &str) -> NewSubject {
  NewSubject::new(id, format!("vault:{id}"), format!("dest-{id}"))
}

pub async fn seeded_store(ids: &[&str]) -> SqliteStore {
  let store = SqliteStore::open_in_memory().await.expect("in-memory store");
  for id in ids {
    store.upsert_subject(roster_entry(id)).await.expect("seed subject");
  }
  store
}

pub fn quiz(course: &str, title: &str, due: DateTime<Utc>) -> RawActivity {
  RawActivity {
    course_code:   course.into(),
    activity_type: ActivityType::Quiz,
    title:         title.into(),
    start_date:    None,
    due_date:      due,
    link:          format!("https://lms.example.edu/{course}/{title}"),
  }
}

// ─── Channel ─────────────────────────────────────────────────────────────────

/// A channel whose readiness can be scripted and which records every send.
pub struct FakeChannel {
  status:       Mutex<ChannelStatus>,
  /// Statuses returned (front first) before falling back to `status`.
  script:       Mutex<VecDeque<ChannelStatus>>,
  failing:      Mutex<HashSet<String>>,
  sent:         Mutex<Vec<(String, String)>>,
  status_calls: AtomicUsize,
}

impl FakeChannel {
  pub fn new(status: ChannelStatus) -> Self {
    Self {
      status:       Mutex::new(status),
      script:       Mutex::new(VecDeque::new()),
      failing:      Mutex::new(HashSet::new()),
      sent:         Mutex::new(Vec::new()),
      status_calls: AtomicUsize::new(0),
    }
  }

  pub fn ready() -> Self { Self::new(ChannelStatus::Ready) }

  pub fn set_status(&self, status: ChannelStatus) {
    *self.status.lock().unwrap() = status;
  }

  pub fn script(&self, statuses: impl IntoIterator<Item = ChannelStatus>) {
    self.script.lock().unwrap().extend(statuses);
  }

  pub fn fail_for(&self, destination: &str) {
    self.failing.lock().unwrap().insert(destination.to_owned());
  }

  pub fn sent(&self) -> Vec<(String, String)> { self.sent.lock().unwrap().clone() }

  pub fn status_calls(&self) -> usize { self.status_calls.load(Ordering::SeqCst) }
}

impl DeliveryChannel for FakeChannel {
  type Error = FakeError;

  async fn status(&self) -> Result<ChannelStatus, FakeError> {
    self.status_calls.fetch_add(1, Ordering::SeqCst);
    let scripted = self.script.lock().unwrap().pop_front();
    Ok(scripted.unwrap_or(*self.status.lock().unwrap()))
  }

  async fn send(&self, destination: &str, text: &str) -> Result<(), FakeError> {
    if self.failing.lock().unwrap().contains(destination) {
      return Err(FakeError(format!("cannot reach {destination}")));
    }
    self
      .sent
      .lock()
      .unwrap()
      .push((destination.to_owned(), text.to_owned()));
    Ok(())
  }
}

// ─── Source ──────────────────────────────────────────────────────────────────

/// A source returning canned activities per subject, optionally failing at a
/// given stage. Records when each subject's authentication started.
#[derive(Default)]
pub struct FakeSource {
  activities: HashMap<String, Vec<RawActivity>>,
  rejected:   HashMap<String, usize>,
  failures:   HashMap<String, Stage>,
  started:    Mutex<Vec<(String, tokio::time::Instant)>>,
  closed:     AtomicUsize,
}

impl FakeSource {
  pub fn with_activities(mut self, subject_id: &str, raws: Vec<RawActivity>) -> Self {
    self.activities.insert(subject_id.to_owned(), raws);
    self
  }

  /// Report `count` undecodable records alongside `subject_id`'s activities.
  pub fn with_rejected(mut self, subject_id: &str, count: usize) -> Self {
    self.rejected.insert(subject_id.to_owned(), count);
    self
  }

  pub fn failing_at(mut self, subject_id: &str, stage: Stage) -> Self {
    self.failures.insert(subject_id.to_owned(), stage);
    self
  }

  pub fn started(&self) -> Vec<(String, tokio::time::Instant)> {
    self.started.lock().unwrap().clone()
  }

  pub fn closed(&self) -> usize { self.closed.load(Ordering::SeqCst) }

  fn check(&self, subject_id: &str, stage: Stage) -> Result<(), FakeError> {
    match self.failures.get(subject_id) {
      Some(s) if *s == stage => Err(FakeError(format!("{stage} failed for {subject_id}"))),
      _ => Ok(()),
    }
  }
}

impl ActivitySource for FakeSource {
  type Session = String;
  type Error = FakeError;

  async fn authenticate(&self, subject: &NewSubject) -> Result<String, FakeError> {
    self
      .started
      .lock()
      .unwrap()
      .push((subject.subject_id.clone(), tokio::time::Instant::now()));
    self.check(&subject.subject_id, Stage::Authentication)?;
    Ok(subject.subject_id.clone())
  }

  async fn navigate(&self, session: &mut String) -> Result<(), FakeError> {
    self.check(session, Stage::Navigation)
  }

  async fn extract(&self, session: &mut String) -> Result<Extraction, FakeError> {
    self.check(session, Stage::Extraction)?;
    Ok(Extraction {
      activities: self.activities.get(session.as_str()).cloned().unwrap_or_default(),
      rejected:   self.rejected.get(session.as_str()).copied().unwrap_or_default(),
    })
  }

  async fn close(&self, _session: String) {
    self.closed.fetch_add(1, Ordering::SeqCst);
  }
}
