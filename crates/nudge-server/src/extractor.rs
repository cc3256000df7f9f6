//! [`ActivitySource`] backed by an HTTP extraction service.
//!
//! The service owns the browser sessions against the source system; this
//! adapter only steps it through the stages.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `POST`   | `{base}/sessions` | Body `{"subject_id","credential_ref"}`, returns `{"token"}` |
//! | `POST`   | `{base}/sessions/{token}/navigate` | |
//! | `GET`    | `{base}/sessions/{token}/activities` | Returns a list of raw activities; undecodable entries are counted and skipped |
//! | `DELETE` | `{base}/sessions/{token}` | Best effort |

use nudge_core::{
  activity::RawActivity,
  source::{ActivitySource, Extraction},
  subject::NewSubject,
};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::{
  config::HttpEndpoint,
  error::{Result, check},
};

#[derive(Clone)]
pub struct HttpExtractor {
  client:   Client,
  base_url: String,
}

/// An open session on the extraction service.
#[derive(Debug)]
pub struct ExtractorSession {
  pub subject_id: String,
  pub token:      String,
}

#[derive(Serialize)]
struct OpenSession<'a> {
  subject_id:     &'a str,
  credential_ref: &'a str,
}

#[derive(Deserialize)]
struct Opened {
  token: String,
}

impl HttpExtractor {
  pub fn new(endpoint: &HttpEndpoint) -> Result<Self> {
    let client = Client::builder().timeout(endpoint.timeout()).build()?;
    Ok(Self {
      client,
      base_url: endpoint.base_url.trim_end_matches('/').to_owned(),
    })
  }

  fn session_url(&self, token: &str, rest: &str) -> String {
    format!("{}/sessions/{token}{rest}", self.base_url)
  }
}

impl ActivitySource for HttpExtractor {
  type Session = ExtractorSession;
  type Error = crate::Error;

  async fn authenticate(&self, subject: &NewSubject) -> Result<ExtractorSession> {
    let resp = self
      .client
      .post(format!("{}/sessions", self.base_url))
      .json(&OpenSession {
        subject_id:     &subject.subject_id,
        credential_ref: &subject.credential_ref,
      })
      .send()
      .await?;
    let opened: Opened = check(resp, "POST /sessions").await?.json().await?;
    Ok(ExtractorSession {
      subject_id: subject.subject_id.clone(),
      token:      opened.token,
    })
  }

  async fn navigate(&self, session: &mut ExtractorSession) -> Result<()> {
    let resp = self
      .client
      .post(self.session_url(&session.token, "/navigate"))
      .send()
      .await?;
    check(resp, "POST /sessions/{token}/navigate").await?;
    Ok(())
  }

  async fn extract(&self, session: &mut ExtractorSession) -> Result<Extraction> {
    let resp = self
      .client
      .get(self.session_url(&session.token, "/activities"))
      .send()
      .await?;
    let records: Vec<Value> = check(resp, "GET /sessions/{token}/activities")
      .await?
      .json()
      .await?;

    let mut extraction = Extraction::default();
    for (index, record) in records.into_iter().enumerate() {
      match serde_json::from_value::<RawActivity>(record) {
        Ok(raw) => extraction.activities.push(raw),
        Err(e) => {
          warn!(subject_id = %session.subject_id, index, error = %e, "skipping undecodable activity");
          extraction.rejected += 1;
        }
      }
    }
    Ok(extraction)
  }

  async fn close(&self, session: ExtractorSession) {
    let result = match self
      .client
      .delete(self.session_url(&session.token, ""))
      .send()
      .await
    {
      Ok(resp) => check(resp, "DELETE /sessions/{token}").await.map(drop),
      Err(e) => Err(e.into()),
    };
    if let Err(e) = result {
      warn!(subject_id = %session.subject_id, error = %e, "failed to close extractor session");
    }
  }
}
