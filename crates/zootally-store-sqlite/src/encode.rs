//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as RFC 3339 UTC strings with a fixed microsecond
//! width so that string order is time order. Calendar days are `YYYY-MM-DD`.
//! UUIDs are stored as hyphenated lowercase strings.

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use zootally_core::{
  observation::{
    Condition, GroupObservation, IndividualObservation, Observation,
    ObservationBody, SpeciesObservation, Stamp,
  },
  registry::{
    Enclosure, Group, Individual, Population, Sex, Species, SubjectKind,
    Taxonomy,
  },
};
use uuid::Uuid;

use crate::{Error, Result, tables::KindTable};

// ─── Scalars ─────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

pub fn decode_opt_uuid(s: Option<&str>) -> Result<Option<Uuid>> {
  s.map(decode_uuid).transpose()
}

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

/// Years 0000 to 9999 only; see [`zootally_core::calendar::is_storable`].
pub fn encode_day(day: NaiveDate) -> String { day.format("%Y-%m-%d").to_string() }

pub fn decode_day(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, "%Y-%m-%d")
    .map_err(|e| Error::DateParse(format!("{s:?}: {e}")))
}

fn decode_count(column: &'static str, value: i64) -> Result<u32> {
  u32::try_from(value).map_err(|_| Error::Corrupt { column, value: value.to_string() })
}

// ─── Registry rows ───────────────────────────────────────────────────────────

pub const ENCLOSURE_COLS: &str = "e.enclosure_id, e.name, e.created_at";

pub struct RawEnclosure {
  pub enclosure_id: String,
  pub name:         String,
  pub created_at:   String,
}

impl RawEnclosure {
  pub fn read(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      enclosure_id: row.get(0)?,
      name:         row.get(1)?,
      created_at:   row.get(2)?,
    })
  }

  pub fn into_enclosure(self) -> Result<Enclosure> {
    Ok(Enclosure {
      enclosure_id: decode_uuid(&self.enclosure_id)?,
      name:         self.name,
      created_at:   decode_dt(&self.created_at)?,
    })
  }
}

pub const SPECIES_COLS: &str = "s.species_id, s.common_name, s.class_name, \
  s.order_name, s.family_name, s.genus_name, s.species_name";

pub struct RawSpecies {
  pub species_id: String,
  pub common_name: String,
  pub taxonomy:   Taxonomy,
}

impl RawSpecies {
  pub fn read(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      species_id:  row.get(0)?,
      common_name: row.get(1)?,
      taxonomy:    Taxonomy {
        class_name:   row.get(2)?,
        order_name:   row.get(3)?,
        family_name:  row.get(4)?,
        genus_name:   row.get(5)?,
        species_name: row.get(6)?,
      },
    })
  }

  pub fn into_species(self) -> Result<Species> {
    Ok(Species {
      species_id:  decode_uuid(&self.species_id)?,
      common_name: self.common_name,
      taxonomy:    self.taxonomy,
    })
  }
}

pub const INDIVIDUAL_COLS: &str = "i.individual_id, i.accession_number, \
  i.name, i.identifier, i.sex, i.active, i.species_id, i.enclosure_id";

pub struct RawIndividual {
  pub individual_id:    String,
  pub accession_number: String,
  pub name:             String,
  pub identifier:       String,
  pub sex:              String,
  pub active:           bool,
  pub species_id:       String,
  pub enclosure_id:     Option<String>,
}

impl RawIndividual {
  pub fn read(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      individual_id:    row.get(0)?,
      accession_number: row.get(1)?,
      name:             row.get(2)?,
      identifier:       row.get(3)?,
      sex:              row.get(4)?,
      active:           row.get(5)?,
      species_id:       row.get(6)?,
      enclosure_id:     row.get(7)?,
    })
  }

  pub fn into_individual(self) -> Result<Individual> {
    Ok(Individual {
      individual_id:    decode_uuid(&self.individual_id)?,
      accession_number: self.accession_number,
      name:             self.name,
      identifier:       self.identifier,
      sex:              Sex::from_code(&self.sex)?,
      active:           self.active,
      species_id:       decode_uuid(&self.species_id)?,
      enclosure_id:     decode_opt_uuid(self.enclosure_id.as_deref())?,
    })
  }
}

pub const GROUP_COLS: &str = "g.group_id, g.accession_number, \
  g.population_male, g.population_female, g.population_unknown, \
  g.population_total, g.active, g.species_id, g.enclosure_id";

pub struct RawGroup {
  pub group_id:         String,
  pub accession_number: String,
  pub population:       [i64; 4],
  pub active:           bool,
  pub species_id:       String,
  pub enclosure_id:     Option<String>,
}

impl RawGroup {
  pub fn read(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      group_id:         row.get(0)?,
      accession_number: row.get(1)?,
      population:       [row.get(2)?, row.get(3)?, row.get(4)?, row.get(5)?],
      active:           row.get(6)?,
      species_id:       row.get(7)?,
      enclosure_id:     row.get(8)?,
    })
  }

  pub fn into_group(self) -> Result<Group> {
    let [male, female, unknown, total] = self.population;
    Ok(Group {
      group_id:         decode_uuid(&self.group_id)?,
      accession_number: self.accession_number,
      population:       Population {
        male:    decode_count("population_male", male)?,
        female:  decode_count("population_female", female)?,
        unknown: decode_count("population_unknown", unknown)?,
        total:   decode_count("population_total", total)?,
      },
      active:           self.active,
      species_id:       decode_uuid(&self.species_id)?,
      enclosure_id:     decode_opt_uuid(self.enclosure_id.as_deref())?,
    })
  }
}

// ─── Observation rows ────────────────────────────────────────────────────────

pub enum RawPayload {
  Individual {
    condition: String,
    comment:   String,
  },
  Group {
    count_total:     i64,
    count_seen:      i64,
    count_not_seen:  i64,
    count_bar:       i64,
    needs_attention: bool,
    comment:         String,
  },
  Species {
    count: i64,
  },
}

/// Raw values read from a row selected with
/// [`KindTable::observation_cols`].
pub struct RawObservation {
  pub observation_id: i64,
  pub subject_id:     String,
  pub user_id:        Option<String>,
  pub enclosure_id:   Option<String>,
  pub recorded_at:    String,
  pub calendar_day:   String,
  pub payload:        RawPayload,
}

impl RawObservation {
  pub fn read(table: &KindTable, row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    let payload = match table.kind {
      SubjectKind::Individual => RawPayload::Individual {
        condition: row.get(6)?,
        comment:   row.get(7)?,
      },
      SubjectKind::Group => RawPayload::Group {
        count_total:     row.get(6)?,
        count_seen:      row.get(7)?,
        count_not_seen:  row.get(8)?,
        count_bar:       row.get(9)?,
        needs_attention: row.get(10)?,
        comment:         row.get(11)?,
      },
      SubjectKind::Species => RawPayload::Species { count: row.get(6)? },
    };

    Ok(Self {
      observation_id: row.get(0)?,
      subject_id: row.get(1)?,
      user_id: row.get(2)?,
      enclosure_id: row.get(3)?,
      recorded_at: row.get(4)?,
      calendar_day: row.get(5)?,
      payload,
    })
  }

  pub fn into_observation(self) -> Result<Observation> {
    let subject_id = decode_uuid(&self.subject_id)?;

    let body = match self.payload {
      RawPayload::Individual { condition, comment } => {
        ObservationBody::Individual(IndividualObservation {
          individual_id: subject_id,
          condition: Condition::from_code(&condition)?,
          comment,
        })
      }
      RawPayload::Group {
        count_total,
        count_seen,
        count_not_seen,
        count_bar,
        needs_attention,
        comment,
      } => ObservationBody::Group(GroupObservation {
        group_id: subject_id,
        count_total: decode_count("count_total", count_total)?,
        count_seen: decode_count("count_seen", count_seen)?,
        count_not_seen: decode_count("count_not_seen", count_not_seen)?,
        count_bar: decode_count("count_bar", count_bar)?,
        needs_attention,
        comment,
      }),
      RawPayload::Species { count } => {
        ObservationBody::Species(SpeciesObservation {
          species_id: subject_id,
          count:      decode_count("count", count)?,
        })
      }
    };

    Ok(Observation {
      observation_id: self.observation_id,
      stamp: Stamp {
        user_id:      decode_opt_uuid(self.user_id.as_deref())?,
        enclosure_id: decode_opt_uuid(self.enclosure_id.as_deref())?,
        recorded_at:  decode_dt(&self.recorded_at)?,
        day:          decode_day(&self.calendar_day)?,
      },
      body,
    })
  }
}
