//! Runtime configuration, deserialised from `config.toml` layered with
//! `NUDGE_`-prefixed environment variables.
//!
//! ```toml
//! [api]
//! port = 8080
//!
//! [store]
//! path = "~/.local/share/nudge/nudge.db"
//!
//! [channel]
//! base_url = "http://127.0.0.1:3001"
//!
//! [extractor]
//! base_url = "http://127.0.0.1:3002"
//!
//! [[subjects]]
//! id             = "20231234"
//! credential_ref = "vault:20231234"
//! destination    = "+15550001111"
//! ```
//!
//! Nested keys are reached from the environment with `__`, e.g.
//! `NUDGE_DISPATCH__BATCH_SIZE=20`.

use std::{
  path::{Path, PathBuf},
  time::Duration,
};

use chrono::TimeDelta;
use nudge_core::subject::NewSubject;
use nudge_engine::{
  dispatch::DispatchConfig, message::Renderer, orchestrator::OrchestratorConfig,
};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
  #[serde(default)]
  pub api:                 ApiSection,
  #[serde(default)]
  pub store:               StoreSection,
  pub channel:             HttpEndpoint,
  pub extractor:           HttpEndpoint,
  #[serde(default)]
  pub dispatch:            DispatchSection,
  #[serde(default)]
  pub orchestrator:        OrchestratorSection,
  #[serde(default)]
  pub messages:            MessageSection,
  /// How long in-flight periodic work may take to finish on shutdown.
  #[serde(default = "default_shutdown_grace_secs")]
  pub shutdown_grace_secs: u64,
  #[serde(default)]
  pub subjects:            Vec<NewSubject>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiSection {
  pub host: String,
  pub port: u16,
}

impl Default for ApiSection {
  fn default() -> Self {
    Self {
      host: "127.0.0.1".to_owned(),
      port: 8080,
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreSection {
  pub path: PathBuf,
}

impl Default for StoreSection {
  fn default() -> Self {
    Self {
      path: PathBuf::from("nudge.db"),
    }
  }
}

/// Base URL and per-request timeout for an HTTP collaborator.
#[derive(Debug, Clone, Deserialize)]
pub struct HttpEndpoint {
  pub base_url:     String,
  #[serde(default = "default_http_timeout_secs")]
  pub timeout_secs: u64,
}

impl HttpEndpoint {
  pub fn timeout(&self) -> Duration { Duration::from_secs(self.timeout_secs) }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DispatchSection {
  pub enabled:             bool,
  pub interval_secs:       u64,
  pub batch_size:          usize,
  pub message_interval_ms: u64,
  pub retry_interval_secs: u64,
}

impl Default for DispatchSection {
  fn default() -> Self {
    Self {
      enabled:             true,
      interval_secs:       300,
      batch_size:          50,
      message_interval_ms: 3_000,
      retry_interval_secs: 3_600,
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OrchestratorSection {
  /// Zero disables scheduled runs; on-demand runs still work.
  pub run_interval_secs:   u64,
  pub cooldown_secs:       u64,
  pub horizon_days:        i64,
  pub readiness_wait_secs: u64,
  pub stage_timeout_secs:  u64,
  pub send_interval_ms:    u64,
}

impl Default for OrchestratorSection {
  fn default() -> Self {
    Self {
      run_interval_secs:   6 * 60 * 60,
      cooldown_secs:       30,
      horizon_days:        7,
      readiness_wait_secs: 60,
      stage_timeout_secs:  120,
      send_interval_ms:    3_000,
    }
  }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MessageSection {
  /// Offset east of UTC used when printing due instants.
  pub utc_offset_minutes: i32,
}

fn default_http_timeout_secs() -> u64 { 30 }

fn default_shutdown_grace_secs() -> u64 { 30 }

/// Upper bound on `orchestrator.horizon_days`.
const MAX_HORIZON_DAYS: i64 = 366;

/// Largest `messages.utc_offset_minutes` magnitude, just under a day.
const MAX_OFFSET_MINUTES: i32 = 24 * 60 - 1;

impl ServerConfig {
  /// Load `path` (optional) and the `NUDGE_` environment.
  pub fn load(path: &Path) -> Result<Self, config::ConfigError> {
    config::Config::builder()
      .add_source(config::File::from(path).required(false))
      .add_source(
        config::Environment::with_prefix("NUDGE")
          .prefix_separator("_")
          .separator("__")
          .try_parsing(true),
      )
      .build()?
      .try_deserialize::<Self>()?
      .validated()
  }

  /// Reject values that would panic or misbehave once turned into
  /// durations, offsets and intervals.
  pub fn validated(self) -> Result<Self, config::ConfigError> {
    let invalid = |msg: String| Err(config::ConfigError::Message(msg));

    let horizon = self.orchestrator.horizon_days;
    if !(1..=MAX_HORIZON_DAYS).contains(&horizon) {
      return invalid(format!(
        "orchestrator.horizon_days must be between 1 and {MAX_HORIZON_DAYS}, got {horizon}"
      ));
    }
    let offset = self.messages.utc_offset_minutes;
    if !(-MAX_OFFSET_MINUTES..=MAX_OFFSET_MINUTES).contains(&offset) {
      return invalid(format!(
        "messages.utc_offset_minutes must be within ±{MAX_OFFSET_MINUTES}, got {offset}"
      ));
    }
    if self.dispatch.enabled {
      if self.dispatch.interval_secs == 0 {
        return invalid("dispatch.interval_secs must be positive".to_owned());
      }
      if self.dispatch.retry_interval_secs == 0 {
        return invalid("dispatch.retry_interval_secs must be positive".to_owned());
      }
      if self.dispatch.batch_size == 0 {
        return invalid("dispatch.batch_size must be positive".to_owned());
      }
    }
    Ok(self)
  }

  pub fn bind_address(&self) -> String { format!("{}:{}", self.api.host, self.api.port) }

  /// The store path with a leading `~` expanded.
  pub fn store_path(&self) -> PathBuf { expand_tilde(&self.store.path) }

  pub fn dispatch_config(&self) -> DispatchConfig {
    DispatchConfig {
      batch_size:       self.dispatch.batch_size,
      message_interval: Duration::from_millis(self.dispatch.message_interval_ms),
      channel_timeout:  self.channel.timeout(),
    }
  }

  pub fn orchestrator_config(&self) -> OrchestratorConfig {
    let o = &self.orchestrator;
    OrchestratorConfig {
      cooldown:        Duration::from_secs(o.cooldown_secs),
      horizon:         TimeDelta::try_days(o.horizon_days)
        .unwrap_or(OrchestratorConfig::default().horizon),
      readiness_wait:  Duration::from_secs(o.readiness_wait_secs),
      stage_timeout:   Duration::from_secs(o.stage_timeout_secs),
      send_interval:   Duration::from_millis(o.send_interval_ms),
      channel_timeout: self.channel.timeout(),
    }
  }

  pub fn renderer(&self) -> Renderer {
    Renderer::with_offset_minutes(self.messages.utc_offset_minutes)
  }
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}

#[cfg(test)]
mod tests {
  use config::{Config, File, FileFormat};

  use super::*;

  fn try_parse(toml: &str) -> Result<ServerConfig, config::ConfigError> {
    Config::builder()
      .add_source(File::from_str(toml, FileFormat::Toml))
      .build()?
      .try_deserialize::<ServerConfig>()?
      .validated()
  }

  fn parse(toml: &str) -> ServerConfig { try_parse(toml).unwrap() }

  const MINIMAL: &str = r#"
    [channel]
    base_url = "http://127.0.0.1:3001"

    [extractor]
    base_url = "http://127.0.0.1:3002"
  "#;

  #[test]
  fn minimal_config_takes_defaults() {
    let cfg = parse(MINIMAL);
    assert_eq!(cfg.bind_address(), "127.0.0.1:8080");
    assert_eq!(cfg.dispatch.interval_secs, 300);
    assert_eq!(cfg.dispatch.batch_size, 50);
    assert!(cfg.dispatch.enabled);
    assert_eq!(cfg.orchestrator.horizon_days, 7);
    assert_eq!(cfg.channel.timeout(), Duration::from_secs(30));
    assert!(cfg.subjects.is_empty());

    let o = cfg.orchestrator_config();
    assert_eq!(o.horizon, TimeDelta::days(7));
    assert_eq!(o.channel_timeout, Duration::from_secs(30));
  }

  #[test]
  fn roster_and_overrides_are_read() {
    let cfg = parse(&format!(
      r#"{MINIMAL}
      [dispatch]
      batch_size = 10
      message_interval_ms = 500

      [[subjects]]
      id = "20231234"
      credential_ref = "vault:20231234"
      destination = "+15550001111"

      [[subjects]]
      id = "20235678"
      destination = "+15550002222"
      "#
    ));

    assert_eq!(cfg.subjects.len(), 2);
    assert_eq!(cfg.subjects[0].subject_id, "20231234");
    assert_eq!(cfg.subjects[0].credential_ref, "vault:20231234");
    assert_eq!(cfg.subjects[1].credential_ref, "");

    let d = cfg.dispatch_config();
    assert_eq!(d.batch_size, 10);
    assert_eq!(d.message_interval, Duration::from_millis(500));
  }

  #[test]
  fn missing_channel_is_an_error() {
    let result = Config::builder()
      .add_source(File::from_str("[extractor]\nbase_url = \"x\"", FileFormat::Toml))
      .build()
      .unwrap()
      .try_deserialize::<ServerConfig>();
    assert!(result.is_err());
  }

  #[test]
  fn out_of_range_values_are_rejected() {
    for section in [
      "[orchestrator]\nhorizon_days = 0",
      "[orchestrator]\nhorizon_days = -3",
      "[orchestrator]\nhorizon_days = 9223372036854775807",
      "[messages]\nutc_offset_minutes = 2147483647",
      "[messages]\nutc_offset_minutes = -1440",
      "[dispatch]\ninterval_secs = 0",
      "[dispatch]\nretry_interval_secs = 0",
      "[dispatch]\nbatch_size = 0",
    ] {
      let err = try_parse(&format!("{MINIMAL}\n{section}")).unwrap_err();
      assert!(matches!(err, config::ConfigError::Message(_)), "{section}: {err}");
    }
  }

  #[test]
  fn disabled_dispatch_skips_interval_checks() {
    let cfg = parse(&format!("{MINIMAL}\n[dispatch]\nenabled = false\ninterval_secs = 0"));
    assert!(!cfg.dispatch.enabled);
  }

  #[test]
  fn in_range_extremes_are_accepted() {
    let cfg = parse(&format!(
      "{MINIMAL}\n[orchestrator]\nhorizon_days = 366\n[messages]\nutc_offset_minutes = -1439"
    ));
    assert_eq!(cfg.orchestrator_config().horizon, TimeDelta::days(366));
  }

  #[test]
  fn tilde_expands_to_home() {
    let Ok(home) = std::env::var("HOME") else { return };
    assert_eq!(
      expand_tilde(Path::new("~/nudge.db")),
      PathBuf::from(home).join("nudge.db")
    );
    assert_eq!(expand_tilde(Path::new("/var/nudge.db")), PathBuf::from("/var/nudge.db"));
  }
}
