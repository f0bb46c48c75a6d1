//! Error types for `zootally-core`.
//!
//! "Nothing observed" is never an error: reads return `None`, an empty
//! `Vec`, or zero. The variants below are the write-side structural
//! violations that callers must see.

use chrono::NaiveDate;
use thiserror::Error;
use uuid::Uuid;

use crate::registry::SubjectRef;

#[derive(Debug, Error)]
pub enum Error {
  #[error("subject not found: {0}")]
  SubjectNotFound(SubjectRef),

  #[error("enclosure not found: {0}")]
  EnclosureNotFound(Uuid),

  #[error("species not found: {0}")]
  SpeciesNotFound(Uuid),

  #[error("user not found: {0}")]
  UserNotFound(Uuid),

  /// A unique name or accession number is already taken.
  #[error("conflict: {0}")]
  Conflict(String),

  #[error("operation not supported for {0}")]
  NotAssignable(SubjectRef),

  #[error("window of {requested} days exceeds the limit of {limit}")]
  WindowTooLong { requested: i64, limit: i64 },

  /// The calendar day falls outside years 0000 to 9999.
  #[error("calendar day out of range: {0}")]
  DayOutOfRange(NaiveDate),

  #[error("unknown condition code: {0:?}")]
  UnknownCondition(String),

  #[error("unknown subject kind: {0:?}")]
  UnknownSubjectKind(String),

  #[error("unknown sex code: {0:?}")]
  UnknownSex(String),
}

impl Error {
  /// `true` for errors caused by a reference to something that does not
  /// exist (as opposed to a conflict or a decode failure).
  pub fn is_referential(&self) -> bool {
    matches!(
      self,
      Self::SubjectNotFound(_)
        | Self::EnclosureNotFound(_)
        | Self::SpeciesNotFound(_)
        | Self::UserNotFound(_)
    )
  }
}

/// Backend errors that may wrap a domain [`Error`].
pub trait AsCoreError {
  fn as_core(&self) -> Option<&Error>;
}

impl AsCoreError for Error {
  fn as_core(&self) -> Option<&Error> { Some(self) }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
