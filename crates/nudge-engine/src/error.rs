//! Error type for `nudge-engine`.
//!
//! Only process-wide failures surface here. Per-subject and per-notification
//! failures are folded into the reports returned by the orchestrator and the
//! dispatcher.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// The store could not be reached or rejected an operation.
  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),

  /// Another orchestrator run holds the run lock.
  #[error("an orchestrator run is already in progress")]
  Busy,
}

impl Error {
  pub(crate) fn store<E>(e: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Store(Box::new(e))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
