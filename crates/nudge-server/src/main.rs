//! nudge-server binary.
//!
//! Reads `config.toml` (or the path specified with `--config`), opens the
//! SQLite store, starts the periodic dispatcher, retry sweep and orchestrator
//! triggers, and serves the JSON command surface over HTTP.
//!
//! On SIGINT/SIGTERM the triggers are cancelled and any in-flight cycle gets
//! `shutdown_grace_secs` to finish.

use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::Context as _;
use clap::Parser;
use nudge_api::ApiState;
use nudge_core::channel::DeliveryChannel;
use nudge_engine::{
  Error as EngineError,
  dispatch::Dispatcher,
  orchestrator::Orchestrator,
  periodic::{drain, spawn_periodic},
};
use nudge_server::{
  channel::HttpChannel, config::ServerConfig, extractor::HttpExtractor,
};
use nudge_store_sqlite::SqliteStore;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, level_filters::LevelFilter, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Nudge deadline reminder server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  // Initialise tracing.
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  // Load configuration.
  let cfg = ServerConfig::load(&cli.config).context("failed to load configuration")?;

  // Open SQLite store.
  let store_path = cfg.store_path();
  let store = Arc::new(
    SqliteStore::open(&store_path)
      .await
      .with_context(|| format!("failed to open store at {store_path:?}"))?,
  );

  // Collaborators.
  let channel = Arc::new(
    HttpChannel::new(&cfg.channel).context("failed to initialise delivery channel")?,
  );
  let source = Arc::new(
    HttpExtractor::new(&cfg.extractor).context("failed to initialise extractor client")?,
  );
  match channel.status().await {
    Ok(status) => info!(%status, "delivery channel reachable"),
    Err(e) => warn!(error = %e, "delivery channel not reachable yet"),
  }

  let dispatcher = Arc::new(
    Dispatcher::new(store.clone(), channel.clone(), cfg.dispatch_config())
      .with_renderer(cfg.renderer()),
  );
  let orchestrator = Arc::new(
    Orchestrator::new(store.clone(), channel, source, cfg.orchestrator_config())
      .with_renderer(cfg.renderer()),
  );
  let roster = Arc::new(cfg.subjects.clone());
  info!(subjects = roster.len(), "roster loaded");

  // Periodic triggers.
  let cancel = install_signal_handler();
  let mut tasks = Vec::new();

  if cfg.dispatch.enabled {
    let d = dispatcher.clone();
    tasks.push(spawn_periodic(
      "dispatch",
      Duration::from_secs(cfg.dispatch.interval_secs),
      cancel.clone(),
      move || {
        let d = d.clone();
        async move {
          if let Err(e) = d.process_now().await {
            error!(error = %e, "dispatch cycle failed");
          }
        }
      },
    ));

    let d = dispatcher.clone();
    tasks.push(spawn_periodic(
      "retry",
      Duration::from_secs(cfg.dispatch.retry_interval_secs),
      cancel.clone(),
      move || {
        let d = d.clone();
        async move {
          if let Err(e) = d.retry_failed().await {
            error!(error = %e, "retry sweep failed");
          }
        }
      },
    ));
  }

  if cfg.orchestrator.run_interval_secs > 0 && !roster.is_empty() {
    let o = orchestrator.clone();
    let r = roster.clone();
    tasks.push(spawn_periodic(
      "orchestrator",
      Duration::from_secs(cfg.orchestrator.run_interval_secs),
      cancel.clone(),
      move || {
        let (o, r) = (o.clone(), r.clone());
        async move {
          match o.run(&r).await {
            Ok(_) => {}
            Err(EngineError::Busy) => debug!("orchestrator run skipped; another run is active"),
            Err(e) => error!(error = %e, "orchestrator run failed"),
          }
        }
      },
    ));
  }

  // HTTP surface.
  let app = nudge_server::router(ApiState {
    store,
    dispatcher,
    orchestrator,
    roster,
  });
  let address = cfg.bind_address();

  info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app)
    .with_graceful_shutdown(cancel.clone().cancelled_owned())
    .await
    .context("server error")?;

  // Stop and drain the triggers before the store and channel are dropped.
  cancel.cancel();
  let grace = Duration::from_secs(cfg.shutdown_grace_secs);
  if drain(tasks, grace).await {
    info!("shutdown complete");
  }

  Ok(())
}

/// Cancel the returned token on SIGINT or SIGTERM.
fn install_signal_handler() -> CancellationToken {
  let token = CancellationToken::new();
  let trigger = token.clone();

  tokio::spawn(async move {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
      use tokio::signal::unix::{SignalKind, signal};
      match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
          tokio::select! {
            _ = ctrl_c => info!("received SIGINT, shutting down"),
            _ = sigterm.recv() => info!("received SIGTERM, shutting down"),
          }
        }
        Err(e) => {
          warn!(error = %e, "cannot listen for SIGTERM; only SIGINT will stop the server");
          let _ = ctrl_c.await;
          info!("received SIGINT, shutting down");
        }
      }
    }

    #[cfg(not(unix))]
    {
      let _ = ctrl_c.await;
      info!("received Ctrl+C, shutting down");
    }

    trigger.cancel();
  });

  token
}
