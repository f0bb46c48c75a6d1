//! Observation types. An observation is one user's recorded status for a subject on a day.
//!
//! Every observation shares a [`Stamp`] (who, where, when) and carries a
//! kind-specific [`ObservationBody`]. The body names the subject, so an
//! observation can never point at a subject of the wrong kind.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  Error, Result,
  registry::{SubjectKind, SubjectRef},
};

// ─── Condition ───────────────────────────────────────────────────────────────

/// The status recorded for an individual.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize,
  Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
  /// Bright, active, responsive.
  Bar,
  Seen,
  NeedsAttention,
  Absent,
  NotObserved,
}

impl Condition {
  pub const ALL: [Condition; 5] = [
    Self::Bar,
    Self::Seen,
    Self::NeedsAttention,
    Self::Absent,
    Self::NotObserved,
  ];

  /// Short code stored in the `condition` column.
  pub fn code(self) -> &'static str {
    match self {
      Self::Bar => "BA",
      Self::Seen => "SE",
      Self::NeedsAttention => "NA",
      Self::Absent => "NS",
      Self::NotObserved => "",
    }
  }

  pub fn from_code(code: &str) -> Result<Self> {
    match code {
      "BA" => Ok(Self::Bar),
      "SE" => Ok(Self::Seen),
      "NA" => Ok(Self::NeedsAttention),
      "NS" => Ok(Self::Absent),
      "" => Ok(Self::NotObserved),
      other => Err(Error::UnknownCondition(other.to_owned())),
    }
  }

  /// Whether the animal was actually looked at and found.
  pub fn is_observed(self) -> bool {
    matches!(self, Self::Bar | Self::Seen | Self::NeedsAttention)
  }

  pub fn label(self) -> &'static str {
    match self {
      Self::Bar => "BAR",
      Self::Seen => "Seen",
      Self::NeedsAttention => "Attn",
      Self::Absent => "Absent",
      Self::NotObserved => "Not Obs",
    }
  }
}

// ─── Payloads ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndividualObservation {
  pub individual_id: Uuid,
  pub condition:     Condition,
  #[serde(default)]
  pub comment:       String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupObservation {
  pub group_id:        Uuid,
  pub count_total:     u32,
  pub count_seen:      u32,
  /// Always `max(0, count_total - count_seen)`; recomputed on every write.
  #[serde(default)]
  pub count_not_seen:  u32,
  #[serde(default)]
  pub count_bar:       u32,
  #[serde(default)]
  pub needs_attention: bool,
  #[serde(default)]
  pub comment:         String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeciesObservation {
  pub species_id: Uuid,
  pub count:      u32,
}

/// The kind-specific half of an observation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ObservationBody {
  Individual(IndividualObservation),
  Group(GroupObservation),
  Species(SpeciesObservation),
}

impl ObservationBody {
  pub fn subject(&self) -> SubjectRef {
    match self {
      Self::Individual(o) => SubjectRef::Individual(o.individual_id),
      Self::Group(o) => SubjectRef::Group(o.group_id),
      Self::Species(o) => SubjectRef::Species(o.species_id),
    }
  }

  pub fn kind(&self) -> SubjectKind { self.subject().kind() }

  /// Recompute derived fields. Callers may send anything for
  /// `count_not_seen`; it is overwritten here.
  pub fn normalized(self) -> Self {
    match self {
      Self::Group(mut g) => {
        g.count_not_seen = g.count_total.saturating_sub(g.count_seen);
        Self::Group(g)
      }
      other => other,
    }
  }
}

// ─── Stamp ───────────────────────────────────────────────────────────────────

/// Who recorded an observation, in which enclosure, and when.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stamp {
  /// `None` once the recording user has been deleted.
  pub user_id:      Option<Uuid>,
  /// Snapshot of where the subject was counted; `None` once the enclosure
  /// has been deleted.
  pub enclosure_id: Option<Uuid>,
  pub recorded_at:  DateTime<Utc>,
  /// `recorded_at` in the store's configured time zone, truncated to a date.
  pub day:          NaiveDate,
}

// ─── Observation ─────────────────────────────────────────────────────────────

/// A persisted observation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observation {
  /// Monotonic within a subject kind; higher means inserted later.
  pub observation_id: i64,
  #[serde(flatten)]
  pub stamp:          Stamp,
  pub body:           ObservationBody,
}

impl Observation {
  pub fn subject(&self) -> SubjectRef { self.body.subject() }

  pub fn condition(&self) -> Option<Condition> {
    match &self.body {
      ObservationBody::Individual(o) => Some(o.condition),
      _ => None,
    }
  }

  pub fn as_group(&self) -> Option<&GroupObservation> {
    match &self.body {
      ObservationBody::Group(o) => Some(o),
      _ => None,
    }
  }

  pub fn as_species(&self) -> Option<&SpeciesObservation> {
    match &self.body {
      ObservationBody::Species(o) => Some(o),
      _ => None,
    }
  }
}

// ─── NewObservation ──────────────────────────────────────────────────────────

/// Input to [`crate::store::CountStore::upsert`].
///
/// The calendar day is not accepted from callers: the store derives it from
/// `recorded_at` in its configured time zone.
#[derive(Debug, Clone)]
pub struct NewObservation {
  pub user_id:      Option<Uuid>,
  pub enclosure_id: Option<Uuid>,
  pub recorded_at:  DateTime<Utc>,
  pub body:         ObservationBody,
}

impl NewObservation {
  pub fn new(
    user_id: Uuid,
    enclosure_id: Uuid,
    recorded_at: DateTime<Utc>,
    body: ObservationBody,
  ) -> Self {
    Self {
      user_id: Some(user_id),
      enclosure_id: Some(enclosure_id),
      recorded_at,
      body,
    }
  }

  pub fn subject(&self) -> SubjectRef { self.body.subject() }
}
