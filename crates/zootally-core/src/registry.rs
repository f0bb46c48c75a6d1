//! Subject registry: enclosures, species, individuals, groups and users.
//!
//! Subjects reference enclosures rather than being owned by them: detaching
//! or deleting an enclosure nulls the reference, it never removes the
//! subject or its history.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Enclosure ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enclosure {
  pub enclosure_id: Uuid,
  /// Unique across the registry.
  pub name:         String,
  pub created_at:   DateTime<Utc>,
}

// ─── User ────────────────────────────────────────────────────────────────────

/// A bare identity record. Authentication happens elsewhere; the store only
/// needs something to point observations at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
  pub user_id:  Uuid,
  pub username: String,
}

// ─── Species ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Taxonomy {
  pub class_name:   String,
  pub order_name:   String,
  pub family_name:  String,
  pub genus_name:   String,
  pub species_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Species {
  pub species_id:  Uuid,
  /// Unique across the registry.
  pub common_name: String,
  #[serde(flatten)]
  pub taxonomy:    Taxonomy,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewSpecies {
  pub common_name: String,
  #[serde(flatten)]
  pub taxonomy:    Taxonomy,
}

// ─── Individual ──────────────────────────────────────────────────────────────

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Sex {
  Male,
  Female,
  #[default]
  Unknown,
}

impl Sex {
  /// Single-letter code stored in the `sex` column.
  pub fn code(self) -> &'static str {
    match self {
      Self::Male => "M",
      Self::Female => "F",
      Self::Unknown => "U",
    }
  }

  pub fn from_code(code: &str) -> Result<Self> {
    match code {
      "M" => Ok(Self::Male),
      "F" => Ok(Self::Female),
      "U" => Ok(Self::Unknown),
      other => Err(Error::UnknownSex(other.to_owned())),
    }
  }
}

/// A single tracked animal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Individual {
  pub individual_id:    Uuid,
  /// Globally unique across individuals and groups.
  pub accession_number: String,
  pub name:             String,
  /// Free-text marking or tag description.
  pub identifier:       String,
  pub sex:              Sex,
  pub active:           bool,
  pub species_id:       Uuid,
  pub enclosure_id:     Option<Uuid>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewIndividual {
  pub accession_number: String,
  pub name:             String,
  #[serde(default)]
  pub identifier:       String,
  #[serde(default)]
  pub sex:              Sex,
  pub species_id:       Uuid,
  pub enclosure_id:     Option<Uuid>,
}

// ─── Group ───────────────────────────────────────────────────────────────────

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize,
)]
pub struct Population {
  pub male:    u32,
  pub female:  u32,
  pub unknown: u32,
  pub total:   u32,
}

/// A herd, flock or colony tracked as one accession.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
  pub group_id:         Uuid,
  pub accession_number: String,
  pub population:       Population,
  pub active:           bool,
  pub species_id:       Uuid,
  pub enclosure_id:     Option<Uuid>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewGroup {
  pub accession_number: String,
  #[serde(default)]
  pub population:       Population,
  pub species_id:       Uuid,
  pub enclosure_id:     Option<Uuid>,
}

// ─── Subject ─────────────────────────────────────────────────────────────────

/// The closed set of countable subject kinds. Each kind has exactly one
/// observation variant.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize,
  Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum SubjectKind {
  Individual,
  Group,
  Species,
}

impl SubjectKind {
  pub const ALL: [SubjectKind; 3] = [Self::Individual, Self::Group, Self::Species];

  pub fn as_str(self) -> &'static str {
    match self {
      Self::Individual => "individual",
      Self::Group => "group",
      Self::Species => "species",
    }
  }
}

impl std::str::FromStr for SubjectKind {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    match s {
      "individual" => Ok(Self::Individual),
      "group" => Ok(Self::Group),
      "species" => Ok(Self::Species),
      other => Err(Error::UnknownSubjectKind(other.to_owned())),
    }
  }
}

/// A typed pointer to a subject of any kind.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize,
  Deserialize,
)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum SubjectRef {
  Individual(Uuid),
  Group(Uuid),
  Species(Uuid),
}

impl SubjectRef {
  pub fn new(kind: SubjectKind, id: Uuid) -> Self {
    match kind {
      SubjectKind::Individual => Self::Individual(id),
      SubjectKind::Group => Self::Group(id),
      SubjectKind::Species => Self::Species(id),
    }
  }

  pub fn kind(&self) -> SubjectKind {
    match self {
      Self::Individual(_) => SubjectKind::Individual,
      Self::Group(_) => SubjectKind::Group,
      Self::Species(_) => SubjectKind::Species,
    }
  }

  pub fn id(&self) -> Uuid {
    match *self {
      Self::Individual(id) | Self::Group(id) | Self::Species(id) => id,
    }
  }
}

impl fmt::Display for SubjectRef {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{} {}", self.kind().as_str(), self.id())
  }
}

/// Any registered subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Subject {
  Individual(Individual),
  Group(Group),
  Species(Species),
}

impl Subject {
  pub fn subject_ref(&self) -> SubjectRef {
    match self {
      Self::Individual(i) => SubjectRef::Individual(i.individual_id),
      Self::Group(g) => SubjectRef::Group(g.group_id),
      Self::Species(s) => SubjectRef::Species(s.species_id),
    }
  }

  /// Species have no active flag; they are live as long as they exist.
  pub fn is_active(&self) -> bool {
    match self {
      Self::Individual(i) => i.active,
      Self::Group(g) => g.active,
      Self::Species(_) => true,
    }
  }

  /// The enclosure an individual or group is currently assigned to.
  /// Species span enclosures and always return `None`.
  pub fn enclosure_id(&self) -> Option<Uuid> {
    match self {
      Self::Individual(i) => i.enclosure_id,
      Self::Group(g) => g.enclosure_id,
      Self::Species(_) => None,
    }
  }
}

// ─── Roster ──────────────────────────────────────────────────────────────────

/// The active subjects assigned to one enclosure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Roster {
  /// Distinct species of the active individuals and groups, ordered by
  /// common name.
  pub species:     Vec<Species>,
  /// Ordered by species common name, then name.
  pub individuals: Vec<Individual>,
  /// Ordered by species common name.
  pub groups:      Vec<Group>,
}

impl Roster {
  pub fn total_subjects(&self) -> usize {
    self.individuals.len() + self.groups.len()
  }

  pub fn individuals_of<'a>(
    &'a self,
    species_id: Uuid,
  ) -> impl Iterator<Item = &'a Individual> + 'a {
    self.individuals.iter().filter(move |i| i.species_id == species_id)
  }

  pub fn groups_of<'a>(
    &'a self,
    species_id: Uuid,
  ) -> impl Iterator<Item = &'a Group> + 'a {
    self.groups.iter().filter(move |g| g.species_id == species_id)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn subject_ref_serialises_with_kind_tag() {
    let id = Uuid::nil();
    let json = serde_json::to_value(SubjectRef::Group(id)).unwrap();
    assert_eq!(json["kind"], "group");
    assert_eq!(json["id"], id.to_string());
  }

  #[test]
  fn subject_kind_parses_path_segments() {
    assert_eq!("species".parse::<SubjectKind>().unwrap(), SubjectKind::Species);
    assert!(matches!(
      "herd".parse::<SubjectKind>(),
      Err(Error::UnknownSubjectKind(s)) if s == "herd"
    ));
  }

  #[test]
  fn species_is_never_inactive_or_assigned() {
    let s = Subject::Species(Species {
      species_id:  Uuid::new_v4(),
      common_name: "Zebra".into(),
      taxonomy:    Taxonomy::default(),
    });
    assert!(s.is_active());
    assert_eq!(s.enclosure_id(), None);
  }

  #[test]
  fn sex_codes_roundtrip() {
    for sex in [Sex::Male, Sex::Female, Sex::Unknown] {
      assert_eq!(Sex::from_code(sex.code()).unwrap(), sex);
    }
    assert!(Sex::from_code("X").is_err());
  }
}
