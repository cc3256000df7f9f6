//! Error types for `nudge-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// A raw activity from the extraction source failed validation and will
  /// not be ingested.
  #[error("invalid activity: {field} {reason}")]
  InvalidActivity {
    field:  &'static str,
    reason: &'static str,
  },

  #[error("unknown activity type: {0:?}")]
  UnknownActivityType(String),

  #[error("unknown notification type: {0:?}")]
  UnknownNotificationType(String),

  #[error("unknown notification status: {0:?}")]
  UnknownNotificationStatus(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
