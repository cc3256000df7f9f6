//! JSON command surface for Nudge.
//!
//! Exposes an axum [`Router`] over a running dispatcher, orchestrator and
//! store. Auth, TLS, and transport concerns are the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", nudge_api::api_router(state))
//! ```

pub mod dispatch;
pub mod error;
pub mod notifications;
pub mod orchestrator;
pub mod subjects;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post},
};
use nudge_core::{
  channel::DeliveryChannel, source::ActivitySource, store::DeadlineStore,
  subject::NewSubject,
};
use nudge_engine::{dispatch::Dispatcher, orchestrator::Orchestrator};

pub use error::ApiError;

/// Everything the handlers need. Cheap to clone.
pub struct ApiState<S, C, X> {
  pub store:        Arc<S>,
  pub dispatcher:   Arc<Dispatcher<S, C>>,
  pub orchestrator: Arc<Orchestrator<S, C, X>>,
  /// The configured roster used for on-demand runs.
  pub roster:       Arc<Vec<NewSubject>>,
}

impl<S, C, X> Clone for ApiState<S, C, X> {
  fn clone(&self) -> Self {
    Self {
      store:        self.store.clone(),
      dispatcher:   self.dispatcher.clone(),
      orchestrator: self.orchestrator.clone(),
      roster:       self.roster.clone(),
    }
  }
}

/// Build a fully-materialised API router over `state`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S, C, X>(state: ApiState<S, C, X>) -> Router<()>
where
  S: DeadlineStore + 'static,
  C: DeliveryChannel + 'static,
  X: ActivitySource + 'static,
{
  Router::new()
    // Dispatcher
    .route("/dispatch/process", post(dispatch::process::<S, C, X>))
    .route("/dispatch/stats", get(dispatch::stats::<S, C, X>))
    .route("/dispatch/retry", post(dispatch::retry::<S, C, X>))
    // Orchestrator
    .route("/orchestrator/run", post(orchestrator::run::<S, C, X>))
    // Subjects
    .route("/subjects", get(subjects::list::<S, C, X>))
    .route("/subjects/{id}/active", post(subjects::set_active::<S, C, X>))
    .route("/subjects/{id}/activities", get(subjects::activities::<S, C, X>))
    // Notifications
    .route("/notifications", get(notifications::list::<S, C, X>))
    .with_state(state)
}
