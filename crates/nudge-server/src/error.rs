//! Errors raised by the HTTP collaborator adapters.

use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("http error: {0}")]
  Http(#[from] reqwest::Error),

  /// The collaborator answered with a non-success status.
  #[error("{context} returned {status}: {body}")]
  Status {
    context: String,
    status:  StatusCode,
    body:    String,
  },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Turn a non-success response into [`Error::Status`], keeping the body for
/// the error message.
pub(crate) async fn check(
  resp: reqwest::Response,
  context: impl Into<String>,
) -> Result<reqwest::Response> {
  let status = resp.status();
  if status.is_success() {
    return Ok(resp);
  }
  let body = resp.text().await.unwrap_or_default();
  Err(Error::Status {
    context: context.into(),
    status,
    body: body.trim().to_owned(),
  })
}
