//! The Nudge server: configuration, HTTP collaborator adapters and the
//! top-level router.
//!
//! The binary in `main.rs` wires these together with the store, the engine
//! and the periodic triggers.

pub mod channel;
pub mod config;
pub mod error;
pub mod extractor;

pub use error::Error;

use axum::{Json, Router, routing::get};
use nudge_api::{ApiState, api_router};
use nudge_core::{
  channel::DeliveryChannel, source::ActivitySource, store::DeadlineStore,
};
use serde_json::{Value, json};
use tower_http::trace::TraceLayer;

/// Build the HTTP application: the JSON API under `/api` plus `/health`.
pub fn router<S, C, X>(state: ApiState<S, C, X>) -> Router
where
  S: DeadlineStore + 'static,
  C: DeliveryChannel + 'static,
  X: ActivitySource + 'static,
{
  Router::new()
    .route("/health", get(health))
    .nest("/api", api_router(state))
    .layer(TraceLayer::new_for_http())
}

async fn health() -> Json<Value> { Json(json!({ "status": "ok" })) }

#[cfg(test)]
pub(crate) mod test_server {
  use axum::Router;
  use tokio::net::TcpListener;

  /// Serve `app` on an ephemeral local port and return its base URL.
  pub async fn serve(app: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
      axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
  }
}
