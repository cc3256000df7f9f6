//! Handler for `GET /notifications`.
//!
//! Query parameters mirror [`NotificationFilter`]:
//! `?status=pending|sent|failed&subject_id=<id>&limit=<n>&offset=<n>`.

use axum::{
  Json,
  extract::{Query, State},
};
use nudge_core::{
  channel::DeliveryChannel,
  notification::Notification,
  source::ActivitySource,
  store::{DeadlineStore, NotificationFilter},
};

use crate::{ApiState, error::ApiError};

pub async fn list<S, C, X>(
  State(state): State<ApiState<S, C, X>>,
  Query(filter): Query<NotificationFilter>,
) -> Result<Json<Vec<Notification>>, ApiError>
where
  S: DeadlineStore,
  C: DeliveryChannel,
  X: ActivitySource,
{
  let notifications = state
    .store
    .list_notifications(&filter)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(notifications))
}
