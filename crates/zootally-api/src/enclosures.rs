//! Handlers for `/enclosures` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/enclosures` | Optional `?day=YYYY-MM-DD&active_only=true`; one summary per enclosure |
//! | `POST`   | `/enclosures` | Body: `{"name":"Savanna"}` |
//! | `DELETE` | `/enclosures/:id` | Subjects and observations keep a null enclosure |
//! | `GET`    | `/enclosures/:id/roster` | Active individuals, groups and their species |
//! | `GET`    | `/enclosures/:id/counts` | Optional `?day`; authoritative records plus totals |
//! | `GET`    | `/enclosures/:id/species-counts` | Optional `?day` |

use std::{collections::HashMap, sync::Arc};

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use zootally_core::{
  observation::Observation,
  registry::{Enclosure, Roster},
  rollup::{EnclosureCounts, EnclosureSummary},
  store::CountStore,
};

use crate::{AppState, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct DayParams {
  /// Defaults to today in the store's time zone.
  pub day: Option<NaiveDate>,
}

async fn require_enclosure<S: CountStore>(
  store: &Arc<S>,
  id: Uuid,
) -> Result<Enclosure, ApiError> {
  store
    .get_enclosure(id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("enclosure {id} not found")))
}

// ─── List ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ListParams {
  pub day:         Option<NaiveDate>,
  #[serde(default)]
  pub active_only: bool,
}

#[derive(Debug, Serialize)]
pub struct EnclosureOverview {
  pub enclosure: Enclosure,
  pub summary:   EnclosureSummary,
}

/// `GET /enclosures[?day=...][&active_only=true]`
pub async fn list<S: CountStore>(
  State(state): State<AppState<S>>,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<EnclosureOverview>>, ApiError> {
  let day = state.day_or_today(params.day);
  let enclosures = state
    .store
    .list_enclosures(params.active_only)
    .await
    .map_err(ApiError::store)?;

  let ids: Vec<Uuid> = enclosures.iter().map(|e| e.enclosure_id).collect();
  let mut summaries: HashMap<Uuid, EnclosureSummary> = state
    .store
    .enclosure_summaries(&ids, day)
    .await
    .map_err(ApiError::store)?
    .into_iter()
    .map(|s| (s.enclosure_id, s))
    .collect();

  // An enclosure deleted between the two reads has no summary; skip it.
  let overviews = enclosures
    .into_iter()
    .filter_map(|enclosure| {
      let summary = summaries.remove(&enclosure.enclosure_id)?;
      Some(EnclosureOverview { enclosure, summary })
    })
    .collect();

  Ok(Json(overviews))
}

// ─── Create / delete ──────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateBody {
  pub name: String,
}

/// `POST /enclosures`, body `{"name":"Savanna"}`
pub async fn create<S: CountStore>(
  State(state): State<AppState<S>>,
  Json(body): Json<CreateBody>,
) -> Result<impl IntoResponse, ApiError> {
  let name = body.name.trim();
  if name.is_empty() {
    return Err(ApiError::BadRequest("enclosure name must not be empty".into()));
  }
  let enclosure = state
    .store
    .add_enclosure(name.to_owned())
    .await
    .map_err(ApiError::store)?;
  tracing::info!(enclosure_id = %enclosure.enclosure_id, name = %enclosure.name, "enclosure created");
  Ok((StatusCode::CREATED, Json(enclosure)))
}

/// `DELETE /enclosures/:id`
pub async fn delete_one<S: CountStore>(
  State(state): State<AppState<S>>,
  Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
  if state.store.delete_enclosure(id).await.map_err(ApiError::store)? {
    Ok(StatusCode::NO_CONTENT)
  } else {
    Err(ApiError::NotFound(format!("enclosure {id} not found")))
  }
}

// ─── Roster ───────────────────────────────────────────────────────────────────

/// `GET /enclosures/:id/roster`
pub async fn roster<S: CountStore>(
  State(state): State<AppState<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Roster>, ApiError> {
  require_enclosure(&state.store, id).await?;
  let roster = state.store.enclosure_roster(id).await.map_err(ApiError::store)?;
  Ok(Json(roster))
}

// ─── Counts ───────────────────────────────────────────────────────────────────

/// One enclosure's day at a glance.
#[derive(Debug, Serialize)]
pub struct EnclosureDay {
  pub enclosure_id:   Uuid,
  pub day:            NaiveDate,
  /// Distinct active subjects observed that day.
  pub observed:       u64,
  pub total_subjects: u64,
  pub counts:         EnclosureCounts,
}

/// `GET /enclosures/:id/counts[?day=...]`
pub async fn counts<S: CountStore>(
  State(state): State<AppState<S>>,
  Path(id): Path<Uuid>,
  Query(params): Query<DayParams>,
) -> Result<Json<EnclosureDay>, ApiError> {
  require_enclosure(&state.store, id).await?;
  let day = state.day_or_today(params.day);

  let counts = state.store.aggregate(&[id], day).await.map_err(ApiError::store)?;
  let observed = state
    .store
    .count_observed(id, day)
    .await
    .map_err(ApiError::store)?;
  let total_subjects = state
    .store
    .count_total_subjects(id)
    .await
    .map_err(ApiError::store)?;

  Ok(Json(EnclosureDay { enclosure_id: id, day, observed, total_subjects, counts }))
}

/// `GET /enclosures/:id/species-counts[?day=...]`
pub async fn species_counts<S: CountStore>(
  State(state): State<AppState<S>>,
  Path(id): Path<Uuid>,
  Query(params): Query<DayParams>,
) -> Result<Json<Vec<Observation>>, ApiError> {
  require_enclosure(&state.store, id).await?;
  let day = state.day_or_today(params.day);
  let counts = state
    .store
    .species_counts_on_day(id, day)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(counts))
}
