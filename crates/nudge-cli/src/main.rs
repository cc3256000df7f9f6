//! `nudge`: operator CLI for a running nudge server.
//!
//! # Usage
//!
//! ```
//! nudge --url http://localhost:8080 stats
//! nudge process
//! nudge run
//! nudge notifications --status failed
//! nudge --config ~/.config/nudge/cli.toml subjects --active
//! ```

mod client;
mod render;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use client::ApiClient;
use nudge_core::notification::NotificationStatus;
use serde::Deserialize;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "nudge", about = "Operate a nudge deadline reminder server")]
struct Args {
  /// Path to a TOML config file (url).
  #[arg(short, long, value_name = "FILE")]
  config: Option<std::path::PathBuf>,

  /// Base URL of the nudge server (default: http://localhost:8080).
  #[arg(long, env = "NUDGE_URL")]
  url: Option<String>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Run one dispatch cycle now.
  Process,
  /// Show notification queue totals.
  Stats,
  /// Requeue failed notifications that have attempts left.
  Retry,
  /// Run the orchestrator over the configured roster and wait for it.
  Run,
  /// List subjects.
  Subjects {
    /// Only active subjects.
    #[arg(long)]
    active: bool,
  },
  /// Enable or disable delivery for a subject.
  SetActive {
    subject_id: String,
    #[arg(action = clap::ArgAction::Set)]
    active:     bool,
  },
  /// List a subject's stored activities.
  Activities { subject_id: String },
  /// List notifications.
  Notifications {
    /// pending, sent or failed.
    #[arg(long)]
    status:  Option<NotificationStatus>,
    #[arg(long)]
    subject: Option<String>,
  },
}

// ─── Config file ──────────────────────────────────────────────────────────────

/// Shape of the optional TOML config file.
#[derive(Deserialize, Default)]
struct ConfigFile {
  #[serde(default)]
  url: String,
}

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_writer(std::io::stderr)
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .from_env_lossy(),
    )
    .init();

  let args = Args::parse();

  // Load config file if provided.
  let file_cfg: ConfigFile = if let Some(path) = &args.config {
    let raw = std::fs::read_to_string(path)
      .with_context(|| format!("reading config file {}", path.display()))?;
    toml::from_str(&raw).context("parsing config file")?
  } else {
    ConfigFile::default()
  };

  // CLI flags override config file, which overrides defaults.
  let base_url = args
    .url
    .or_else(|| (!file_cfg.url.is_empty()).then_some(file_cfg.url))
    .unwrap_or_else(|| "http://localhost:8080".to_string());

  let client = ApiClient::new(&base_url)?;

  let output = match args.command {
    Command::Process => render::dispatch(&client.process().await?),
    Command::Stats => render::stats(&client.stats().await?),
    Command::Retry => render::retry(&client.retry().await?),
    Command::Run => render::run(&client.run().await?),
    Command::Subjects { active } => render::subjects(&client.subjects(active).await?),
    Command::SetActive { subject_id, active } => {
      render::subjects(&[client.set_active(&subject_id, active).await?])
    }
    Command::Activities { subject_id } => {
      render::activities(&client.activities(&subject_id).await?)
    }
    Command::Notifications { status, subject } => {
      render::notifications(&client.notifications(status, subject.as_deref()).await?)
    }
  };

  println!("{output}");
  Ok(())
}
