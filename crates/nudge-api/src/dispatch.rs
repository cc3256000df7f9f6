//! Handlers for `/dispatch` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/dispatch/process` | Run one cycle now; zero counts if one is in flight |
//! | `GET`  | `/dispatch/stats` | Queue totals per status |
//! | `POST` | `/dispatch/retry` | Requeue failed notifications with attempts left |

use axum::{Json, extract::State};
use nudge_core::{
  channel::DeliveryChannel, notification::QueueStats, source::ActivitySource,
  store::DeadlineStore,
};
use nudge_engine::dispatch::{DispatchReport, RetryReport};

use crate::{ApiState, error::ApiError};

/// `POST /dispatch/process`
pub async fn process<S, C, X>(
  State(state): State<ApiState<S, C, X>>,
) -> Result<Json<DispatchReport>, ApiError>
where
  S: DeadlineStore,
  C: DeliveryChannel,
  X: ActivitySource,
{
  Ok(Json(state.dispatcher.process_now().await?))
}

/// `GET /dispatch/stats`
pub async fn stats<S, C, X>(
  State(state): State<ApiState<S, C, X>>,
) -> Result<Json<QueueStats>, ApiError>
where
  S: DeadlineStore,
  C: DeliveryChannel,
  X: ActivitySource,
{
  Ok(Json(state.dispatcher.queue_stats().await?))
}

/// `POST /dispatch/retry`
pub async fn retry<S, C, X>(
  State(state): State<ApiState<S, C, X>>,
) -> Result<Json<RetryReport>, ApiError>
where
  S: DeadlineStore,
  C: DeliveryChannel,
  X: ActivitySource,
{
  Ok(Json(state.dispatcher.retry_failed().await?))
}
