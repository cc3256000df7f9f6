//! Async HTTP client wrapping the nudge JSON API.

use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use nudge_core::{
  activity::Activity,
  notification::{Notification, NotificationStatus, QueueStats},
  subject::Subject,
};
use nudge_engine::{
  dispatch::{DispatchReport, RetryReport},
  orchestrator::RunReport,
};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::debug;

/// An orchestrator run holds the request open through every cool-down.
const RUN_TIMEOUT: Duration = Duration::from_secs(60 * 60);

/// Async HTTP client for the nudge JSON API.
///
/// Cheap to clone; the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct ApiClient {
  client:   Client,
  base_url: String,
}

impl ApiClient {
  pub fn new(base_url: &str) -> Result<Self> {
    let client = Client::builder()
      .timeout(Duration::from_secs(30))
      .build()
      .context("failed to build HTTP client")?;
    Ok(Self {
      client,
      base_url: base_url.trim_end_matches('/').to_owned(),
    })
  }

  fn url(&self, path: &str) -> String { format!("{}/api{path}", self.base_url) }

  /// Send `req` and decode the JSON body, surfacing the server's
  /// `{"error": ...}` message on failure.
  async fn fetch<T: DeserializeOwned>(&self, what: &str, req: RequestBuilder) -> Result<T> {
    debug!(request = what, "calling nudge API");
    let resp = req.send().await.with_context(|| format!("{what} failed"))?;

    let status = resp.status();
    if !status.is_success() {
      let message = resp
        .json::<Value>()
        .await
        .ok()
        .and_then(|v| v["error"].as_str().map(str::to_owned))
        .unwrap_or_default();
      return Err(anyhow!("{what} → {status} {message}"));
    }
    resp.json().await.with_context(|| format!("decoding response to {what}"))
  }

  // ── Dispatcher ────────────────────────────────────────────────────────────

  /// `POST /api/dispatch/process`
  pub async fn process(&self) -> Result<DispatchReport> {
    self
      .fetch("POST /dispatch/process", self.client.post(self.url("/dispatch/process")))
      .await
  }

  /// `GET /api/dispatch/stats`
  pub async fn stats(&self) -> Result<QueueStats> {
    self
      .fetch("GET /dispatch/stats", self.client.get(self.url("/dispatch/stats")))
      .await
  }

  /// `POST /api/dispatch/retry`
  pub async fn retry(&self) -> Result<RetryReport> {
    self
      .fetch("POST /dispatch/retry", self.client.post(self.url("/dispatch/retry")))
      .await
  }

  // ── Orchestrator ──────────────────────────────────────────────────────────

  /// `POST /api/orchestrator/run`
  pub async fn run(&self) -> Result<RunReport> {
    let req = self
      .client
      .post(self.url("/orchestrator/run"))
      .timeout(RUN_TIMEOUT);
    self.fetch("POST /orchestrator/run", req).await
  }

  // ── Subjects ──────────────────────────────────────────────────────────────

  /// `GET /api/subjects[?active=true]`
  pub async fn subjects(&self, active_only: bool) -> Result<Vec<Subject>> {
    let req = self
      .client
      .get(self.url("/subjects"))
      .query(&[("active", active_only)]);
    self.fetch("GET /subjects", req).await
  }

  /// `POST /api/subjects/{id}/active`
  pub async fn set_active(&self, subject_id: &str, active: bool) -> Result<Subject> {
    let req = self
      .client
      .post(self.url(&format!("/subjects/{subject_id}/active")))
      .json(&json!({ "active": active }));
    self.fetch("POST /subjects/{id}/active", req).await
  }

  /// `GET /api/subjects/{id}/activities`
  pub async fn activities(&self, subject_id: &str) -> Result<Vec<Activity>> {
    let req = self
      .client
      .get(self.url(&format!("/subjects/{subject_id}/activities")));
    self.fetch("GET /subjects/{id}/activities", req).await
  }

  // ── Notifications ─────────────────────────────────────────────────────────

  /// `GET /api/notifications[?status=<s>&subject_id=<id>]`
  pub async fn notifications(
    &self,
    status: Option<NotificationStatus>,
    subject_id: Option<&str>,
  ) -> Result<Vec<Notification>> {
    let mut query: Vec<(&str, String)> = Vec::new();
    if let Some(s) = status {
      query.push(("status", s.to_string()));
    }
    if let Some(id) = subject_id {
      query.push(("subject_id", id.to_owned()));
    }
    let req = self.client.get(self.url("/notifications")).query(&query);
    self.fetch("GET /notifications", req).await
  }
}
