//! The `ActivitySource` trait: the extraction collaborator.
//!
//! Turning a live session on the source system into raw activity snapshots is
//! site-specific and lives outside the core. The orchestrator drives a source
//! through three stages per subject, each of which may fail on its own.

use std::future::Future;

use serde::{Deserialize, Serialize};
use strum::Display;

use crate::{activity::RawActivity, subject::NewSubject};

/// The stage of a per-subject extraction, used to report where it failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Stage {
  Authentication,
  Navigation,
  Extraction,
}

/// The records one extraction produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extraction {
  pub activities: Vec<RawActivity>,
  /// Records the source returned that could not be read as activities.
  pub rejected:   usize,
}

impl From<Vec<RawActivity>> for Extraction {
  fn from(activities: Vec<RawActivity>) -> Self { Self { activities, rejected: 0 } }
}

pub trait ActivitySource: Send + Sync {
  /// Per-subject session state threaded through the stages.
  type Session: Send;
  type Error: std::error::Error + Send + Sync + 'static;

  /// Log in as `subject` using its opaque credential reference.
  fn authenticate<'a>(
    &'a self,
    subject: &'a NewSubject,
  ) -> impl Future<Output = Result<Self::Session, Self::Error>> + Send + 'a;

  /// Move the session to wherever activities are listed.
  fn navigate<'a>(
    &'a self,
    session: &'a mut Self::Session,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// Read the raw activity list. A record that cannot be decoded is counted
  /// in [`Extraction::rejected`] rather than failing the whole stage.
  fn extract<'a>(
    &'a self,
    session: &'a mut Self::Session,
  ) -> impl Future<Output = Result<Extraction, Self::Error>> + Send + 'a;

  /// Release whatever the session holds. Called after every subject, whether
  /// or not the stages succeeded.
  fn close(
    &self,
    session: Self::Session,
  ) -> impl Future<Output = ()> + Send + '_ {
    drop(session);
    async {}
  }
}
