//! Handlers for `/subjects/:kind/:id` endpoints.
//!
//! `:kind` is one of `individual`, `group` or `species`.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/subjects/:kind/:id` | 404 if not found |
//! | `DELETE` | `/subjects/:kind/:id` | Cascades to observations |
//! | `PUT`    | `/subjects/:kind/:id/active` | Body: `{"active":false}` |
//! | `PUT`    | `/subjects/:kind/:id/enclosure` | Body: `{"enclosure_id":null}` |
//! | `GET`    | `/subjects/:kind/:id/observation` | Optional `?day&enclosure_id` |
//! | `GET`    | `/subjects/:kind/:id/window` | Optional `?days&reference_day&enclosure_id` |
//! | `GET`    | `/subjects/:kind/:id/history` | Optional `?page&enclosure_id`, 1-based pages |
//! | `GET`    | `/individuals/:id/conditions` | Lifetime tally per condition |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use zootally_core::{
  calendar::MAX_WINDOW_DAYS,
  observation::{Condition, Observation},
  registry::{Subject, SubjectKind, SubjectRef},
  store::CountStore,
  window::WindowEntry,
};

use crate::{AppState, error::ApiError};

async fn require_subject<S: CountStore>(
  store: &Arc<S>,
  subject: SubjectRef,
) -> Result<Subject, ApiError> {
  store
    .get_subject(subject)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("{subject} not found")))
}

// ─── Get / delete ─────────────────────────────────────────────────────────────

/// `GET /subjects/:kind/:id`
pub async fn get_one<S: CountStore>(
  State(state): State<AppState<S>>,
  Path((kind, id)): Path<(SubjectKind, Uuid)>,
) -> Result<Json<Subject>, ApiError> {
  let subject = require_subject(&state.store, SubjectRef::new(kind, id)).await?;
  Ok(Json(subject))
}

/// `DELETE /subjects/:kind/:id`
pub async fn delete_one<S: CountStore>(
  State(state): State<AppState<S>>,
  Path((kind, id)): Path<(SubjectKind, Uuid)>,
) -> Result<StatusCode, ApiError> {
  let subject = SubjectRef::new(kind, id);
  if state.store.delete_subject(subject).await.map_err(ApiError::store)? {
    Ok(StatusCode::NO_CONTENT)
  } else {
    Err(ApiError::NotFound(format!("{subject} not found")))
  }
}

// ─── Lifecycle ────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ActiveBody {
  pub active: bool,
}

/// `PUT /subjects/:kind/:id/active`
pub async fn set_active<S: CountStore>(
  State(state): State<AppState<S>>,
  Path((kind, id)): Path<(SubjectKind, Uuid)>,
  Json(body): Json<ActiveBody>,
) -> Result<StatusCode, ApiError> {
  state
    .store
    .set_active(SubjectRef::new(kind, id), body.active)
    .await
    .map_err(ApiError::store)?;
  Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct AssignBody {
  pub enclosure_id: Option<Uuid>,
}

/// `PUT /subjects/:kind/:id/enclosure`
pub async fn assign<S: CountStore>(
  State(state): State<AppState<S>>,
  Path((kind, id)): Path<(SubjectKind, Uuid)>,
  Json(body): Json<AssignBody>,
) -> Result<StatusCode, ApiError> {
  state
    .store
    .assign_enclosure(SubjectRef::new(kind, id), body.enclosure_id)
    .await
    .map_err(ApiError::store)?;
  Ok(StatusCode::NO_CONTENT)
}

// ─── Resolve ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ResolveParams {
  pub day:          Option<NaiveDate>,
  pub enclosure_id: Option<Uuid>,
}

/// A subject's authoritative record for one day; `observation` is `null`
/// when nobody observed it.
#[derive(Debug, Serialize)]
pub struct Resolved {
  pub subject:     SubjectRef,
  pub day:         NaiveDate,
  pub observation: Option<Observation>,
}

/// `GET /subjects/:kind/:id/observation[?day=...][&enclosure_id=...]`
pub async fn resolve<S: CountStore>(
  State(state): State<AppState<S>>,
  Path((kind, id)): Path<(SubjectKind, Uuid)>,
  Query(params): Query<ResolveParams>,
) -> Result<Json<Resolved>, ApiError> {
  let subject = SubjectRef::new(kind, id);
  require_subject(&state.store, subject).await?;
  let day = state.day_or_today(params.day);

  let observation = state
    .store
    .resolve(subject, day, params.enclosure_id)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(Resolved { subject, day, observation }))
}

// ─── Window ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct WindowParams {
  pub days:          Option<i64>,
  /// The window ends the day before this one. Defaults to today.
  pub reference_day: Option<NaiveDate>,
  pub enclosure_id:  Option<Uuid>,
}

/// `GET /subjects/:kind/:id/window[?days=3][&reference_day=...][&enclosure_id=...]`
pub async fn window<S: CountStore>(
  State(state): State<AppState<S>>,
  Path((kind, id)): Path<(SubjectKind, Uuid)>,
  Query(params): Query<WindowParams>,
) -> Result<Json<Vec<WindowEntry>>, ApiError> {
  let subject = SubjectRef::new(kind, id);
  require_subject(&state.store, subject).await?;
  let days = params.days.unwrap_or(state.config.window_days);
  if days > MAX_WINDOW_DAYS {
    return Err(ApiError::BadRequest(format!(
      "window of {days} days exceeds the limit of {MAX_WINDOW_DAYS}"
    )));
  }
  let reference = state.day_or_today(params.reference_day);

  let entries = state
    .store
    .window(subject, days, reference, params.enclosure_id)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(entries))
}

// ─── History ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct HistoryParams {
  pub page:         Option<usize>,
  pub enclosure_id: Option<Uuid>,
}

/// `GET /subjects/:kind/:id/history[?page=1][&enclosure_id=...]`
pub async fn history<S: CountStore>(
  State(state): State<AppState<S>>,
  Path((kind, id)): Path<(SubjectKind, Uuid)>,
  Query(params): Query<HistoryParams>,
) -> Result<Json<Vec<Observation>>, ApiError> {
  let subject = SubjectRef::new(kind, id);
  require_subject(&state.store, subject).await?;

  let page = params.page.unwrap_or(1);
  if page == 0 {
    return Err(ApiError::BadRequest("pages start at 1".into()));
  }
  let limit = state.config.page_size;
  let offset = (page - 1).saturating_mul(limit);

  let observations = state
    .store
    .history(subject, params.enclosure_id, limit, offset)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(observations))
}

// ─── Condition tally ──────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct ConditionCount {
  pub condition: Condition,
  pub label:     &'static str,
  pub count:     u64,
}

/// `GET /individuals/:id/conditions`
pub async fn conditions<S: CountStore>(
  State(state): State<AppState<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Vec<ConditionCount>>, ApiError> {
  require_subject(&state.store, SubjectRef::Individual(id)).await?;
  let tally = state
    .store
    .condition_tally(id)
    .await
    .map_err(ApiError::store)?
    .into_iter()
    .map(|(condition, count)| ConditionCount {
      condition,
      label: condition.label(),
      count,
    })
    .collect();
  Ok(Json(tally))
}
