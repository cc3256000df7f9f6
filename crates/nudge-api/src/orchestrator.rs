//! Handler for `POST /orchestrator/run`.
//!
//! Runs the configured roster to completion and returns the run report. The
//! request is held open for the whole run, cool-downs included. A run that
//! is already in progress yields `409 Conflict`.

use axum::{Json, extract::State};
use nudge_core::{
  channel::DeliveryChannel, source::ActivitySource, store::DeadlineStore,
};
use nudge_engine::orchestrator::RunReport;

use crate::{ApiState, error::ApiError};

pub async fn run<S, C, X>(
  State(state): State<ApiState<S, C, X>>,
) -> Result<Json<RunReport>, ApiError>
where
  S: DeadlineStore,
  C: DeliveryChannel,
  X: ActivitySource,
{
  let report = state.orchestrator.run(&state.roster).await?;
  Ok(Json(report))
}
