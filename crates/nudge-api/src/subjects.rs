//! Handlers for `/subjects` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/subjects` | Optional `?active=true` |
//! | `POST` | `/subjects/{id}/active` | Body: `{"active":false}`; 404 if not found |
//! | `GET`  | `/subjects/{id}/activities` | Optional `?due_after=<rfc3339>`; 404 if not found |

use axum::{
  Json,
  extract::{Path, Query, State},
};
use chrono::{DateTime, Utc};
use nudge_core::{
  activity::Activity, channel::DeliveryChannel, source::ActivitySource,
  store::DeadlineStore, subject::Subject,
};
use serde::Deserialize;
use tracing::info;

use crate::{ApiState, error::ApiError};

// ─── List ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ListParams {
  #[serde(default)]
  pub active: bool,
}

/// `GET /subjects[?active=true]`
pub async fn list<S, C, X>(
  State(state): State<ApiState<S, C, X>>,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<Subject>>, ApiError>
where
  S: DeadlineStore,
  C: DeliveryChannel,
  X: ActivitySource,
{
  let subjects = state
    .store
    .list_subjects(params.active)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(subjects))
}

// ─── Toggle active ────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ActiveBody {
  pub active: bool,
}

/// `POST /subjects/{id}/active`: body: `{"active":false}`
pub async fn set_active<S, C, X>(
  State(state): State<ApiState<S, C, X>>,
  Path(id): Path<String>,
  Json(body): Json<ActiveBody>,
) -> Result<Json<Subject>, ApiError>
where
  S: DeadlineStore,
  C: DeliveryChannel,
  X: ActivitySource,
{
  let subject = state
    .store
    .set_subject_active(&id, body.active)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("subject {id}")))?;
  info!(subject_id = %id, active = body.active, "subject active flag changed");
  Ok(Json(subject))
}

// ─── Activities ───────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ActivityParams {
  pub due_after: Option<DateTime<Utc>>,
}

/// `GET /subjects/{id}/activities[?due_after=<rfc3339>]`
pub async fn activities<S, C, X>(
  State(state): State<ApiState<S, C, X>>,
  Path(id): Path<String>,
  Query(params): Query<ActivityParams>,
) -> Result<Json<Vec<Activity>>, ApiError>
where
  S: DeadlineStore,
  C: DeliveryChannel,
  X: ActivitySource,
{
  state
    .store
    .get_subject(&id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("subject {id}")))?;

  let activities = state
    .store
    .list_activities(&id, params.due_after)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(activities))
}
