//! Handler for `POST /observations`.
//!
//! Body:
//!
//! ```json
//! {
//!   "user_id": "…",
//!   "enclosure_id": "…",
//!   "recorded_at": "2024-01-10T14:00:00Z",
//!   "body": { "kind": "individual", "individual_id": "…", "condition": "seen" }
//! }
//! ```
//!
//! `recorded_at` defaults to now. Re-submitting for the same subject, user,
//! enclosure and day replaces the earlier record, so the response is always
//! `200` with the stored observation.

use axum::{Json, extract::State};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;
use zootally_core::{
  observation::{NewObservation, Observation, ObservationBody},
  store::CountStore,
};

use crate::{AppState, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct UpsertBody {
  pub user_id:      Option<Uuid>,
  pub enclosure_id: Option<Uuid>,
  pub recorded_at:  Option<DateTime<Utc>>,
  pub body:         ObservationBody,
}

/// `POST /observations`
pub async fn upsert<S: CountStore>(
  State(state): State<AppState<S>>,
  Json(input): Json<UpsertBody>,
) -> Result<Json<Observation>, ApiError> {
  let observation = state
    .store
    .upsert(NewObservation {
      user_id:      input.user_id,
      enclosure_id: input.enclosure_id,
      recorded_at:  input.recorded_at.unwrap_or_else(Utc::now),
      body:         input.body,
    })
    .await
    .map_err(ApiError::store)?;

  tracing::info!(
    subject = %observation.subject(),
    day = %observation.stamp.day,
    observation_id = observation.observation_id,
    "observation recorded"
  );
  Ok(Json(observation))
}
