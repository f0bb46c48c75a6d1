//! Error type for `zootally-store-sqlite`.

use thiserror::Error;
use zootally_core::error::AsCoreError;

#[derive(Debug, Error)]
pub enum Error {
  /// Referential violations, conflicts and decode failures from the domain.
  #[error(transparent)]
  Core(#[from] zootally_core::Error),

  /// The database could not be reached or rejected a statement. Never
  /// retried here.
  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  /// A stored value is outside the range of its domain type.
  #[error("corrupt column {column}: {value}")]
  Corrupt { column: &'static str, value: String },
}

impl AsCoreError for Error {
  fn as_core(&self) -> Option<&zootally_core::Error> {
    match self {
      Self::Core(e) => Some(e),
      _ => None,
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
