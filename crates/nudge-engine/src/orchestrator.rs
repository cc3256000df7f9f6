//! The multi-subject orchestrator.
//!
//! A run walks the roster strictly in order. For each subject it drives the
//! source through authentication, navigation and extraction, then ingests and
//! schedules whatever came back. A failure in any stage is recorded against
//! that subject and the run moves on. A fixed cool-down separates consecutive
//! subjects whatever their outcome.
//!
//! Every valid activity seen in the run that is due within the horizon goes
//! into a digest queue, whether it was stored now or on an earlier run. Once
//! every subject has been handled the channel's readiness is checked, and if
//! it is ready the queue is drained through it. A channel that stays
//! unavailable is reported even when the queue is empty.

use std::{collections::HashSet, fmt::Display, future::Future, sync::Arc, time::Duration};

use chrono::{DateTime, TimeDelta, Utc};
use nudge_core::{
  activity::{Activity, compute_identity},
  channel::DeliveryChannel,
  source::{ActivitySource, Extraction, Stage},
  store::DeadlineStore,
  subject::NewSubject,
};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::{
  Error, Result, channel,
  ingest::{IngestOutcome, SkipReason, ingest},
  message::Renderer,
  schedule::{repair_unscheduled, schedule_notifications},
};

// ─── Configuration ───────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
  /// Delay between consecutive subjects.
  pub cooldown:        Duration,
  /// How far ahead an activity may be due and still go into the digest.
  pub horizon:         TimeDelta,
  /// Wait before the single readiness re-check when draining the digest.
  pub readiness_wait:  Duration,
  /// Bound on each source stage.
  pub stage_timeout:   Duration,
  /// Pause after each digest message.
  pub send_interval:   Duration,
  /// Bound on each channel call.
  pub channel_timeout: Duration,
}

impl Default for OrchestratorConfig {
  fn default() -> Self {
    Self {
      cooldown:        Duration::from_secs(30),
      horizon:         TimeDelta::days(7),
      readiness_wait:  Duration::from_secs(60),
      stage_timeout:   Duration::from_secs(120),
      send_interval:   Duration::from_secs(3),
      channel_timeout: Duration::from_secs(30),
    }
  }
}

// ─── Reports ─────────────────────────────────────────────────────────────────

/// Per-subject ingestion counters.
///
/// `seen` is everything the source returned; it splits into `invalid`,
/// `past` and `future`, and `future` splits again into `saved` and
/// `duplicates`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectCounts {
  pub seen:       usize,
  pub saved:      usize,
  pub duplicates: usize,
  pub past:       usize,
  pub future:     usize,
  pub invalid:    usize,
  pub scheduled:  usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SubjectOutcome {
  Success(SubjectCounts),
  Error { stage: Stage, message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectResult {
  pub subject_id: String,
  #[serde(flatten)]
  pub outcome:    SubjectOutcome,
}

impl SubjectResult {
  pub fn is_success(&self) -> bool { matches!(self.outcome, SubjectOutcome::Success(_)) }
}

/// What happened to the digest queue at the end of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DeliveryReport {
  Delivered { delivered: usize, failed: usize },
  /// The channel stayed not-ready through the re-check; nothing was sent.
  ChannelUnavailable,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
  pub started_at: DateTime<Utc>,
  /// Notifications created by the repair pass before the roster was walked.
  pub repaired:   usize,
  pub subjects:   Vec<SubjectResult>,
  pub delivery:   DeliveryReport,
}

/// A digest entry waiting for the end of the run.
struct Upcoming {
  destination: String,
  activity:    Activity,
}

// ─── Orchestrator ────────────────────────────────────────────────────────────

pub struct Orchestrator<S, C, X> {
  store:    Arc<S>,
  channel:  Arc<C>,
  source:   Arc<X>,
  config:   OrchestratorConfig,
  renderer: Renderer,
  run_lock: Mutex<()>,
}

impl<S, C, X> Orchestrator<S, C, X>
where
  S: DeadlineStore,
  C: DeliveryChannel,
  X: ActivitySource,
{
  pub fn new(
    store: Arc<S>,
    channel: Arc<C>,
    source: Arc<X>,
    config: OrchestratorConfig,
  ) -> Self {
    Self {
      store,
      channel,
      source,
      config,
      renderer: Renderer::default(),
      run_lock: Mutex::new(()),
    }
  }

  pub fn with_renderer(mut self, renderer: Renderer) -> Self {
    self.renderer = renderer;
    self
  }

  pub async fn run(&self, roster: &[NewSubject]) -> Result<RunReport> {
    self.run_at(roster, Utc::now()).await
  }

  /// Run over `roster` treating `now` as the ingestion instant.
  ///
  /// Fails with [`Error::Busy`] if another run is in progress, and with
  /// [`Error::Store`] if the store fails; everything else is reported
  /// per subject.
  pub async fn run_at(&self, roster: &[NewSubject], now: DateTime<Utc>) -> Result<RunReport> {
    let Ok(_run) = self.run_lock.try_lock() else {
      return Err(Error::Busy);
    };

    info!(subjects = roster.len(), "orchestrator run starting");
    let repaired = repair_unscheduled(self.store.as_ref(), now).await?;

    let mut subjects = Vec::with_capacity(roster.len());
    let mut digest = Vec::new();

    for (i, subject) in roster.iter().enumerate() {
      if i > 0 {
        tokio::time::sleep(self.config.cooldown).await;
      }

      let outcome = self.process_subject(subject, now, &mut digest).await?;
      match &outcome {
        SubjectOutcome::Success(counts) => info!(
          subject_id = %subject.subject_id,
          seen = counts.seen,
          saved = counts.saved,
          scheduled = counts.scheduled,
          "subject processed"
        ),
        SubjectOutcome::Error { stage, message } => error!(
          subject_id = %subject.subject_id,
          %stage,
          %message,
          "subject failed"
        ),
      }
      subjects.push(SubjectResult {
        subject_id: subject.subject_id.clone(),
        outcome,
      });
    }

    let delivery = self.drain(digest, now).await;
    info!(?delivery, "orchestrator run finished");

    Ok(RunReport { started_at: now, repaired, subjects, delivery })
  }

  async fn process_subject(
    &self,
    subject: &NewSubject,
    now: DateTime<Utc>,
    digest: &mut Vec<Upcoming>,
  ) -> Result<SubjectOutcome> {
    let extraction = match self.extract(subject).await {
      Ok(extraction) => extraction,
      Err((stage, message)) => return Ok(SubjectOutcome::Error { stage, message }),
    };

    let stored = self
      .store
      .upsert_subject(subject.clone())
      .await
      .map_err(Error::store)?;

    let horizon_end = now + self.config.horizon;
    let mut counts = SubjectCounts {
      seen: extraction.rejected,
      invalid: extraction.rejected,
      ..SubjectCounts::default()
    };
    // Identities of everything seen this run that is due within the horizon,
    // whether it was stored now or on an earlier run.
    let mut due_soon = HashSet::new();

    for raw in &extraction.activities {
      counts.seen += 1;
      if let Err(e) = raw.validate() {
        warn!(subject_id = %subject.subject_id, title = %raw.title, error = %e, "dropping invalid activity");
        counts.invalid += 1;
        continue;
      }

      match ingest(self.store.as_ref(), &subject.subject_id, raw, now).await? {
        IngestOutcome::Created(activity) => {
          counts.future += 1;
          counts.saved += 1;
          counts.scheduled += schedule_notifications(self.store.as_ref(), &activity, now)
            .await?
            .len();
        }
        IngestOutcome::Skipped(SkipReason::Duplicate) => {
          counts.future += 1;
          counts.duplicates += 1;
        }
        IngestOutcome::Skipped(SkipReason::Past) => {
          counts.past += 1;
          continue;
        }
      }

      if raw.due_date <= horizon_end {
        due_soon.insert(compute_identity(
          &subject.subject_id,
          &raw.course_code,
          &raw.title,
          raw.due_date,
        ));
      }
    }

    if !stored.active {
      debug!(subject_id = %subject.subject_id, "subject inactive; no digest");
    } else if !due_soon.is_empty() {
      // Listed in due order.
      let activities = self
        .store
        .list_activities(&subject.subject_id, Some(now))
        .await
        .map_err(Error::store)?;
      digest.extend(
        activities
          .into_iter()
          .filter(|a| due_soon.contains(&a.identity))
          .map(|activity| Upcoming {
            destination: stored.destination.clone(),
            activity,
          }),
      );
    }

    Ok(SubjectOutcome::Success(counts))
  }

  /// Drive the source through its three stages. The session is closed
  /// whenever authentication produced one.
  async fn extract(
    &self,
    subject: &NewSubject,
  ) -> Result<Extraction, (Stage, String)> {
    let mut session = self
      .stage(Stage::Authentication, self.source.authenticate(subject))
      .await?;

    let extracted = async {
      self
        .stage(Stage::Navigation, self.source.navigate(&mut session))
        .await?;
      self
        .stage(Stage::Extraction, self.source.extract(&mut session))
        .await
    }
    .await;

    if tokio::time::timeout(self.config.stage_timeout, self.source.close(session))
      .await
      .is_err()
    {
      warn!(subject_id = %subject.subject_id, "closing source session timed out");
    }

    extracted
  }

  async fn stage<T, E>(
    &self,
    stage: Stage,
    fut: impl Future<Output = Result<T, E>>,
  ) -> Result<T, (Stage, String)>
  where
    E: Display,
  {
    match tokio::time::timeout(self.config.stage_timeout, fut).await {
      Ok(Ok(value)) => Ok(value),
      Ok(Err(e)) => Err((stage, e.to_string())),
      Err(_) => Err((
        stage,
        format!("timed out after {}s", self.config.stage_timeout.as_secs()),
      )),
    }
  }

  /// Readiness check with one delayed re-check.
  async fn channel_ready(&self) -> bool {
    let timeout = self.config.channel_timeout;
    if channel::status(self.channel.as_ref(), timeout).await.is_ready() {
      return true;
    }
    debug!(wait_ms = self.config.readiness_wait.as_millis() as u64, "channel not ready; waiting");
    tokio::time::sleep(self.config.readiness_wait).await;
    channel::status(self.channel.as_ref(), timeout).await.is_ready()
  }

  async fn drain(&self, digest: Vec<Upcoming>, now: DateTime<Utc>) -> DeliveryReport {
    if !self.channel_ready().await {
      warn!(queued = digest.len(), "channel unavailable; digest not delivered");
      return DeliveryReport::ChannelUnavailable;
    }

    let (mut delivered, mut failed) = (0, 0);
    for item in digest {
      let text = self.renderer.upcoming(&item.activity, now);
      match channel::send(
        self.channel.as_ref(),
        &item.destination,
        &text,
        self.config.channel_timeout,
      )
      .await
      {
        Ok(()) => delivered += 1,
        Err(reason) => {
          warn!(
            subject_id = %item.activity.subject_id,
            activity_id = %item.activity.activity_id,
            %reason,
            "digest message failed"
          );
          failed += 1;
        }
      }
      tokio::time::sleep(self.config.send_interval).await;
    }

    DeliveryReport::Delivered { delivered, failed }
  }
}
