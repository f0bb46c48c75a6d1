//! Handlers that register species, individuals, groups and users.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `POST`   | `/species` | Body: [`NewSpecies`] |
//! | `POST`   | `/individuals` | Body: [`NewIndividual`]; 422 for unknown species or enclosure |
//! | `POST`   | `/groups` | Body: [`NewGroup`] |
//! | `POST`   | `/users` | Body: `{"username":"keeper"}` |
//! | `DELETE` | `/users/:id` | Their observations keep a null user |

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use serde::Deserialize;
use uuid::Uuid;
use zootally_core::{
  registry::{NewGroup, NewIndividual, NewSpecies},
  store::CountStore,
};

use crate::{AppState, error::ApiError};

fn required(field: &str, value: &str) -> Result<(), ApiError> {
  if value.trim().is_empty() {
    return Err(ApiError::BadRequest(format!("{field} must not be empty")));
  }
  Ok(())
}

/// `POST /species`
pub async fn create_species<S: CountStore>(
  State(state): State<AppState<S>>,
  Json(body): Json<NewSpecies>,
) -> Result<impl IntoResponse, ApiError> {
  required("common_name", &body.common_name)?;
  let species = state.store.add_species(body).await.map_err(ApiError::store)?;
  Ok((StatusCode::CREATED, Json(species)))
}

/// `POST /individuals`
pub async fn create_individual<S: CountStore>(
  State(state): State<AppState<S>>,
  Json(body): Json<NewIndividual>,
) -> Result<impl IntoResponse, ApiError> {
  required("accession_number", &body.accession_number)?;
  let individual = state
    .store
    .add_individual(body)
    .await
    .map_err(ApiError::store)?;
  Ok((StatusCode::CREATED, Json(individual)))
}

/// `POST /groups`
pub async fn create_group<S: CountStore>(
  State(state): State<AppState<S>>,
  Json(body): Json<NewGroup>,
) -> Result<impl IntoResponse, ApiError> {
  required("accession_number", &body.accession_number)?;
  let group = state.store.add_group(body).await.map_err(ApiError::store)?;
  Ok((StatusCode::CREATED, Json(group)))
}

#[derive(Debug, Deserialize)]
pub struct CreateUserBody {
  pub username: String,
}

/// `POST /users`
pub async fn create_user<S: CountStore>(
  State(state): State<AppState<S>>,
  Json(body): Json<CreateUserBody>,
) -> Result<impl IntoResponse, ApiError> {
  required("username", &body.username)?;
  let user = state
    .store
    .add_user(body.username)
    .await
    .map_err(ApiError::store)?;
  Ok((StatusCode::CREATED, Json(user)))
}

/// `DELETE /users/:id`
pub async fn delete_user<S: CountStore>(
  State(state): State<AppState<S>>,
  Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
  if state.store.delete_user(id).await.map_err(ApiError::store)? {
    Ok(StatusCode::NO_CONTENT)
  } else {
    Err(ApiError::NotFound(format!("user {id} not found")))
  }
}
