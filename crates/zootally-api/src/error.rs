//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use zootally_core::{Error as CoreError, error::AsCoreError};

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("not found: {0}")]
  NotFound(String),

  #[error("bad request: {0}")]
  BadRequest(String),

  /// The request names an enclosure, species or user that does not exist.
  #[error("unprocessable: {0}")]
  Unprocessable(String),

  #[error("conflict: {0}")]
  Conflict(String),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl ApiError {
  /// Classify a backend error by the domain error it carries, if any.
  pub fn store<E>(e: E) -> Self
  where
    E: std::error::Error + AsCoreError + Send + Sync + 'static,
  {
    let classified = e.as_core().and_then(|core| match core {
      CoreError::SubjectNotFound(_) => Some(ApiError::NotFound(core.to_string())),
      CoreError::EnclosureNotFound(_)
      | CoreError::SpeciesNotFound(_)
      | CoreError::UserNotFound(_) => Some(ApiError::Unprocessable(core.to_string())),
      CoreError::Conflict(_) => Some(ApiError::Conflict(core.to_string())),
      CoreError::NotAssignable(_)
      | CoreError::WindowTooLong { .. }
      | CoreError::DayOutOfRange(_) => Some(ApiError::BadRequest(core.to_string())),
      // Stored values that no longer decode.
      CoreError::UnknownCondition(_)
      | CoreError::UnknownSubjectKind(_)
      | CoreError::UnknownSex(_) => None,
    });
    classified.unwrap_or_else(|| ApiError::Store(Box::new(e)))
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, message) = match &self {
      ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
      ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
      ApiError::Unprocessable(m) => (StatusCode::UNPROCESSABLE_ENTITY, m.clone()),
      ApiError::Conflict(m) => (StatusCode::CONFLICT, m.clone()),
      ApiError::Store(e) => {
        tracing::error!(error = %e, "store failure");
        (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
      }
    };
    (status, Json(json!({ "error": message }))).into_response()
  }
}
