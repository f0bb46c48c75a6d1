//! [`SqliteStore`], the SQLite implementation of [`CountStore`].

use std::{collections::HashMap, path::Path};

use chrono::{NaiveDate, Utc};
use chrono_tz::Tz;
use rusqlite::{OptionalExtension as _, TransactionBehavior};
use uuid::Uuid;

use zootally_core::{
  Error as CoreError,
  calendar::{MAX_WINDOW_DAYS, calendar_day, is_storable, window_range},
  latest::first_per_group,
  observation::{Condition, NewObservation, Observation, ObservationBody, Stamp},
  registry::{
    Enclosure, Group, Individual, NewGroup, NewIndividual, NewSpecies,
    Roster, Species, Subject, SubjectKind, SubjectRef, User,
  },
  rollup::{EnclosureCounts, EnclosureSummary, RosterTotals, summarize},
  store::CountStore,
  window::{WindowEntry, build_window},
};

use crate::{
  Result,
  encode::{
    ENCLOSURE_COLS, GROUP_COLS, INDIVIDUAL_COLS, RawEnclosure, RawGroup,
    RawIndividual, RawObservation, RawSpecies, SPECIES_COLS, decode_uuid,
    encode_day, encode_dt, encode_uuid,
  },
  schema::SCHEMA,
  tables::{GROUPS, INDIVIDUALS, KindTable, SPECIES, placeholders, table},
};

/// The result of a closure run on the database thread: the outer `Result`
/// carries database failures, the inner one domain rejections.
type Outcome<T> = std::result::Result<T, CoreError>;

/// Ordering that puts the authoritative record of each group first.
const LATEST_FIRST: &str = "o.recorded_at DESC, o.observation_id DESC";

// ─── Store ───────────────────────────────────────────────────────────────────

/// A zootally store backed by a single SQLite file.
///
/// Clones share one connection.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
  tz:   Tz,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  /// Calendar days are derived in UTC until [`Self::with_time_zone`].
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn, tz: Tz::UTC };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn, tz: Tz::UTC };
    store.init_schema().await?;
    Ok(store)
  }

  /// Derive calendar days in `tz` for every subsequent write.
  pub fn with_time_zone(mut self, tz: Tz) -> Self {
    self.tz = tz;
    self
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Run a read of observation rows and decode them.
  async fn fetch_observations(
    &self,
    table: &'static KindTable,
    sql: String,
    params: Vec<Option<String>>,
  ) -> Result<Vec<Observation>> {
    let raws: Vec<RawObservation> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(params), |row| {
            RawObservation::read(table, row)
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawObservation::into_observation).collect()
  }

  /// One statement per subject kind for a set of enclosures on a day.
  async fn latest_per_subject(
    &self,
    table: &'static KindTable,
    enclosures: &[Uuid],
    day: NaiveDate,
  ) -> Result<Vec<Observation>> {
    let sql = format!(
      "{select}
       JOIN {subjects} s ON s.{col} = o.{col}
       WHERE s.active = 1
         AND o.calendar_day = ?1
         AND o.enclosure_id IN ({ids})
       ORDER BY s.accession_number ASC, {LATEST_FIRST}",
      select = table.select_observations(),
      subjects = table.subjects,
      col = table.subject_col,
      ids = placeholders(2, enclosures.len()),
    );

    let params = std::iter::once(Some(encode_day(day)))
      .chain(enclosures.iter().map(|e| Some(encode_uuid(*e))))
      .collect();

    let rows = self.fetch_observations(table, sql, params).await?;
    // Accession numbers are unique, so subject id runs match accession runs.
    Ok(first_per_group(rows, |o| o.subject()))
  }

  async fn roster_totals(&self, enclosures: &[Uuid]) -> Result<Vec<RosterTotals>> {
    let sql = format!(
      "SELECT e.enclosure_id,
         (SELECT COUNT(*) FROM individuals i
           WHERE i.enclosure_id = e.enclosure_id AND i.active = 1),
         (SELECT COUNT(*) FROM animal_groups g
           WHERE g.enclosure_id = e.enclosure_id AND g.active = 1),
         (SELECT COALESCE(SUM(g.population_total), 0) FROM animal_groups g
           WHERE g.enclosure_id = e.enclosure_id AND g.active = 1)
       FROM enclosures e
       WHERE e.enclosure_id IN ({})",
      placeholders(1, enclosures.len())
    );
    let params: Vec<String> = enclosures.iter().copied().map(encode_uuid).collect();

    let raws: Vec<(String, i64, i64, i64)> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(params), |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    let mut by_id = HashMap::with_capacity(raws.len());
    for (id, individuals, groups, population) in raws {
      let enclosure_id = decode_uuid(&id)?;
      by_id.insert(enclosure_id, RosterTotals {
        enclosure_id,
        individuals: clamp_u32(individuals),
        groups: clamp_u32(groups),
        group_population: clamp_u32(population),
      });
    }

    Ok(enclosures.iter().filter_map(|id| by_id.get(id).copied()).collect())
  }
}

fn clamp_u32(n: i64) -> u32 { u32::try_from(n.max(0)).unwrap_or(u32::MAX) }

fn exists(
  conn: &rusqlite::Connection,
  table: &str,
  col: &str,
  id: &str,
) -> rusqlite::Result<bool> {
  Ok(
    conn
      .query_row(
        &format!("SELECT 1 FROM {table} WHERE {col} = ?1"),
        rusqlite::params![id],
        |_| Ok(()),
      )
      .optional()?
      .is_some(),
  )
}

fn is_unique_violation(e: &rusqlite::Error) -> bool {
  matches!(
    e,
    rusqlite::Error::SqliteFailure(f, _)
      if f.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
  )
}

/// Check that an accession number is free in both subject tables; they
/// share one namespace.
fn accession_taken(
  conn: &rusqlite::Connection,
  accession_number: &str,
) -> rusqlite::Result<bool> {
  Ok(
    exists(conn, "individuals", "accession_number", accession_number)?
      || exists(conn, "animal_groups", "accession_number", accession_number)?,
  )
}

/// Overwrite the mutable fields of an existing observation.
fn update_observation(
  conn: &rusqlite::Connection,
  id: i64,
  recorded_at: &str,
  body: &ObservationBody,
) -> rusqlite::Result<()> {
  match body {
    ObservationBody::Individual(o) => conn.execute(
      "UPDATE individual_observations
       SET recorded_at = ?2, condition = ?3, comment = ?4
       WHERE observation_id = ?1",
      rusqlite::params![id, recorded_at, o.condition.code(), o.comment],
    )?,
    ObservationBody::Group(o) => conn.execute(
      "UPDATE group_observations
       SET recorded_at = ?2, count_total = ?3, count_seen = ?4,
           count_not_seen = ?5, count_bar = ?6, needs_attention = ?7,
           comment = ?8
       WHERE observation_id = ?1",
      rusqlite::params![
        id,
        recorded_at,
        o.count_total,
        o.count_seen,
        o.count_not_seen,
        o.count_bar,
        o.needs_attention,
        o.comment,
      ],
    )?,
    ObservationBody::Species(o) => conn.execute(
      "UPDATE species_observations SET recorded_at = ?2, count = ?3
       WHERE observation_id = ?1",
      rusqlite::params![id, recorded_at, o.count],
    )?,
  };
  Ok(())
}

/// Insert a new observation row and return its id.
fn insert_observation(
  conn: &rusqlite::Connection,
  subject_id: &str,
  user_id: Option<&str>,
  enclosure_id: Option<&str>,
  recorded_at: &str,
  day: &str,
  body: &ObservationBody,
) -> rusqlite::Result<i64> {
  match body {
    ObservationBody::Individual(o) => conn.execute(
      "INSERT INTO individual_observations (
         individual_id, user_id, enclosure_id, recorded_at, calendar_day,
         condition, comment
       ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
      rusqlite::params![
        subject_id,
        user_id,
        enclosure_id,
        recorded_at,
        day,
        o.condition.code(),
        o.comment,
      ],
    )?,
    ObservationBody::Group(o) => conn.execute(
      "INSERT INTO group_observations (
         group_id, user_id, enclosure_id, recorded_at, calendar_day,
         count_total, count_seen, count_not_seen, count_bar,
         needs_attention, comment
       ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
      rusqlite::params![
        subject_id,
        user_id,
        enclosure_id,
        recorded_at,
        day,
        o.count_total,
        o.count_seen,
        o.count_not_seen,
        o.count_bar,
        o.needs_attention,
        o.comment,
      ],
    )?,
    ObservationBody::Species(o) => conn.execute(
      "INSERT INTO species_observations (
         species_id, user_id, enclosure_id, recorded_at, calendar_day, count
       ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
      rusqlite::params![subject_id, user_id, enclosure_id, recorded_at, day, o.count],
    )?,
  };
  Ok(conn.last_insert_rowid())
}

// ─── CountStore impl ─────────────────────────────────────────────────────────

impl CountStore for SqliteStore {
  type Error = crate::Error;

  fn time_zone(&self) -> Tz { self.tz }

  // ── Registry ──────────────────────────────────────────────────────────────

  async fn add_enclosure(&self, name: String) -> Result<Enclosure> {
    let enclosure = Enclosure {
      enclosure_id: Uuid::new_v4(),
      name,
      created_at: Utc::now(),
    };

    let id_str = encode_uuid(enclosure.enclosure_id);
    let name   = enclosure.name.clone();
    let at_str = encode_dt(enclosure.created_at);

    let outcome: Outcome<()> = self
      .conn
      .call(move |conn| {
        match conn.execute(
          "INSERT INTO enclosures (enclosure_id, name, created_at) VALUES (?1, ?2, ?3)",
          rusqlite::params![id_str, name, at_str],
        ) {
          Ok(_) => Ok(Ok(())),
          Err(e) if is_unique_violation(&e) => {
            Ok(Err(CoreError::Conflict(format!("enclosure {name:?} already exists"))))
          }
          Err(e) => Err(e.into()),
        }
      })
      .await?;
    outcome?;

    Ok(enclosure)
  }

  async fn get_enclosure(&self, id: Uuid) -> Result<Option<Enclosure>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawEnclosure> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {ENCLOSURE_COLS} FROM enclosures e WHERE e.enclosure_id = ?1"),
              rusqlite::params![id_str],
              RawEnclosure::read,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawEnclosure::into_enclosure).transpose()
  }

  async fn list_enclosures(&self, active_only: bool) -> Result<Vec<Enclosure>> {
    let filter = if active_only {
      "WHERE EXISTS (SELECT 1 FROM individuals i
                     WHERE i.enclosure_id = e.enclosure_id AND i.active = 1)
          OR EXISTS (SELECT 1 FROM animal_groups g
                     WHERE g.enclosure_id = e.enclosure_id AND g.active = 1)"
    } else {
      ""
    };
    let sql = format!(
      "SELECT {ENCLOSURE_COLS} FROM enclosures e {filter} ORDER BY UPPER(e.name)"
    );

    let raws: Vec<RawEnclosure> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map([], RawEnclosure::read)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawEnclosure::into_enclosure).collect()
  }

  async fn delete_enclosure(&self, id: Uuid) -> Result<bool> {
    let id_str = encode_uuid(id);
    let deleted = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "DELETE FROM enclosures WHERE enclosure_id = ?1",
          rusqlite::params![id_str],
        )?)
      })
      .await?;
    Ok(deleted > 0)
  }

  async fn add_user(&self, username: String) -> Result<User> {
    let user = User { user_id: Uuid::new_v4(), username };
    let id_str = encode_uuid(user.user_id);
    let name   = user.username.clone();

    let outcome: Outcome<()> = self
      .conn
      .call(move |conn| {
        match conn.execute(
          "INSERT INTO users (user_id, username) VALUES (?1, ?2)",
          rusqlite::params![id_str, name],
        ) {
          Ok(_) => Ok(Ok(())),
          Err(e) if is_unique_violation(&e) => {
            Ok(Err(CoreError::Conflict(format!("user {name:?} already exists"))))
          }
          Err(e) => Err(e.into()),
        }
      })
      .await?;
    outcome?;

    Ok(user)
  }

  async fn delete_user(&self, id: Uuid) -> Result<bool> {
    let id_str = encode_uuid(id);
    let deleted = self
      .conn
      .call(move |conn| {
        Ok(conn.execute("DELETE FROM users WHERE user_id = ?1", rusqlite::params![id_str])?)
      })
      .await?;
    Ok(deleted > 0)
  }

  async fn add_species(&self, input: NewSpecies) -> Result<Species> {
    let species = Species {
      species_id:  Uuid::new_v4(),
      common_name: input.common_name,
      taxonomy:    input.taxonomy,
    };

    let id_str = encode_uuid(species.species_id);
    let name   = species.common_name.clone();
    let tax    = species.taxonomy.clone();

    let outcome: Outcome<()> = self
      .conn
      .call(move |conn| {
        match conn.execute(
          "INSERT INTO species (
             species_id, common_name, class_name, order_name, family_name,
             genus_name, species_name
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
          rusqlite::params![
            id_str,
            name,
            tax.class_name,
            tax.order_name,
            tax.family_name,
            tax.genus_name,
            tax.species_name,
          ],
        ) {
          Ok(_) => Ok(Ok(())),
          Err(e) if is_unique_violation(&e) => {
            Ok(Err(CoreError::Conflict(format!("species {name:?} already exists"))))
          }
          Err(e) => Err(e.into()),
        }
      })
      .await?;
    outcome?;

    Ok(species)
  }

  async fn add_individual(&self, input: NewIndividual) -> Result<Individual> {
    let individual = Individual {
      individual_id:    Uuid::new_v4(),
      accession_number: input.accession_number,
      name:             input.name,
      identifier:       input.identifier,
      sex:              input.sex,
      active:           true,
      species_id:       input.species_id,
      enclosure_id:     input.enclosure_id,
    };

    let row = individual.clone();

    let outcome: Outcome<()> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let species_str   = encode_uuid(row.species_id);
        let enclosure_str = row.enclosure_id.map(encode_uuid);

        if !exists(&tx, "species", "species_id", &species_str)? {
          return Ok(Err(CoreError::SpeciesNotFound(row.species_id)));
        }
        if let (Some(id), Some(s)) = (row.enclosure_id, &enclosure_str) {
          if !exists(&tx, "enclosures", "enclosure_id", s)? {
            return Ok(Err(CoreError::EnclosureNotFound(id)));
          }
        }
        if accession_taken(&tx, &row.accession_number)? {
          return Ok(Err(CoreError::Conflict(format!(
            "accession number {:?} already exists",
            row.accession_number
          ))));
        }

        tx.execute(
          "INSERT INTO individuals (
             individual_id, accession_number, name, identifier, sex, active,
             species_id, enclosure_id
           ) VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6, ?7)",
          rusqlite::params![
            encode_uuid(row.individual_id),
            row.accession_number,
            row.name,
            row.identifier,
            row.sex.code(),
            species_str,
            enclosure_str,
          ],
        )?;
        tx.commit()?;
        Ok(Ok(()))
      })
      .await?;
    outcome?;

    Ok(individual)
  }

  async fn add_group(&self, input: NewGroup) -> Result<Group> {
    let group = Group {
      group_id:         Uuid::new_v4(),
      accession_number: input.accession_number,
      population:       input.population,
      active:           true,
      species_id:       input.species_id,
      enclosure_id:     input.enclosure_id,
    };

    let row = group.clone();

    let outcome: Outcome<()> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let species_str   = encode_uuid(row.species_id);
        let enclosure_str = row.enclosure_id.map(encode_uuid);

        if !exists(&tx, "species", "species_id", &species_str)? {
          return Ok(Err(CoreError::SpeciesNotFound(row.species_id)));
        }
        if let (Some(id), Some(s)) = (row.enclosure_id, &enclosure_str) {
          if !exists(&tx, "enclosures", "enclosure_id", s)? {
            return Ok(Err(CoreError::EnclosureNotFound(id)));
          }
        }
        if accession_taken(&tx, &row.accession_number)? {
          return Ok(Err(CoreError::Conflict(format!(
            "accession number {:?} already exists",
            row.accession_number
          ))));
        }

        let p = row.population;
        tx.execute(
          "INSERT INTO animal_groups (
             group_id, accession_number, population_male, population_female,
             population_unknown, population_total, active, species_id,
             enclosure_id
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1, ?7, ?8)",
          rusqlite::params![
            encode_uuid(row.group_id),
            row.accession_number,
            p.male,
            p.female,
            p.unknown,
            p.total,
            species_str,
            enclosure_str,
          ],
        )?;
        tx.commit()?;
        Ok(Ok(()))
      })
      .await?;
    outcome?;

    Ok(group)
  }

  async fn get_subject(&self, subject: SubjectRef) -> Result<Option<Subject>> {
    let id_str = encode_uuid(subject.id());

    match subject.kind() {
      SubjectKind::Individual => {
        let raw: Option<RawIndividual> = self
          .conn
          .call(move |conn| {
            Ok(
              conn
                .query_row(
                  &format!(
                    "SELECT {INDIVIDUAL_COLS} FROM individuals i WHERE i.individual_id = ?1"
                  ),
                  rusqlite::params![id_str],
                  RawIndividual::read,
                )
                .optional()?,
            )
          })
          .await?;
        raw
          .map(|r| r.into_individual().map(Subject::Individual))
          .transpose()
      }
      SubjectKind::Group => {
        let raw: Option<RawGroup> = self
          .conn
          .call(move |conn| {
            Ok(
              conn
                .query_row(
                  &format!("SELECT {GROUP_COLS} FROM animal_groups g WHERE g.group_id = ?1"),
                  rusqlite::params![id_str],
                  RawGroup::read,
                )
                .optional()?,
            )
          })
          .await?;
        raw.map(|r| r.into_group().map(Subject::Group)).transpose()
      }
      SubjectKind::Species => {
        let raw: Option<RawSpecies> = self
          .conn
          .call(move |conn| {
            Ok(
              conn
                .query_row(
                  &format!("SELECT {SPECIES_COLS} FROM species s WHERE s.species_id = ?1"),
                  rusqlite::params![id_str],
                  RawSpecies::read,
                )
                .optional()?,
            )
          })
          .await?;
        raw.map(|r| r.into_species().map(Subject::Species)).transpose()
      }
    }
  }

  async fn set_active(&self, subject: SubjectRef, active: bool) -> Result<()> {
    if subject.kind() == SubjectKind::Species {
      return Err(CoreError::NotAssignable(subject).into());
    }
    let t = table(subject.kind());
    let sql = format!("UPDATE {} SET active = ?2 WHERE {} = ?1", t.subjects, t.subject_col);
    let id_str = encode_uuid(subject.id());

    let updated = self
      .conn
      .call(move |conn| Ok(conn.execute(&sql, rusqlite::params![id_str, active])?))
      .await?;

    if updated == 0 {
      return Err(CoreError::SubjectNotFound(subject).into());
    }
    tracing::debug!(%subject, active, "subject activity changed");
    Ok(())
  }

  async fn assign_enclosure(
    &self,
    subject: SubjectRef,
    enclosure_id: Option<Uuid>,
  ) -> Result<()> {
    if subject.kind() == SubjectKind::Species {
      return Err(CoreError::NotAssignable(subject).into());
    }
    let t = table(subject.kind());
    let sql = format!(
      "UPDATE {} SET enclosure_id = ?2 WHERE {} = ?1",
      t.subjects, t.subject_col
    );
    let id_str        = encode_uuid(subject.id());
    let enclosure_str = enclosure_id.map(encode_uuid);

    let outcome: Outcome<()> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        if let (Some(id), Some(s)) = (enclosure_id, &enclosure_str) {
          if !exists(&tx, "enclosures", "enclosure_id", s)? {
            return Ok(Err(CoreError::EnclosureNotFound(id)));
          }
        }
        if tx.execute(&sql, rusqlite::params![id_str, enclosure_str])? == 0 {
          return Ok(Err(CoreError::SubjectNotFound(subject)));
        }
        tx.commit()?;
        Ok(Ok(()))
      })
      .await?;
    outcome?;
    Ok(())
  }

  async fn delete_subject(&self, subject: SubjectRef) -> Result<bool> {
    let t = table(subject.kind());
    let sql = format!("DELETE FROM {} WHERE {} = ?1", t.subjects, t.subject_col);
    let id_str = encode_uuid(subject.id());

    let deleted = self
      .conn
      .call(move |conn| Ok(conn.execute(&sql, rusqlite::params![id_str])?))
      .await?;
    if deleted > 0 {
      tracing::info!(%subject, "subject deleted with its observations");
    }
    Ok(deleted > 0)
  }

  async fn enclosure_roster(&self, enclosure_id: Uuid) -> Result<Roster> {
    let id_str = encode_uuid(enclosure_id);

    let (individuals, groups, species): (
      Vec<RawIndividual>,
      Vec<RawGroup>,
      Vec<RawSpecies>,
    ) = self
      .conn
      .call(move |conn| {
        let individuals = conn
          .prepare(&format!(
            "SELECT {INDIVIDUAL_COLS} FROM individuals i
             JOIN species s ON s.species_id = i.species_id
             WHERE i.enclosure_id = ?1 AND i.active = 1
             ORDER BY UPPER(s.common_name), UPPER(i.name)"
          ))?
          .query_map(rusqlite::params![id_str], RawIndividual::read)?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        let groups = conn
          .prepare(&format!(
            "SELECT {GROUP_COLS} FROM animal_groups g
             JOIN species s ON s.species_id = g.species_id
             WHERE g.enclosure_id = ?1 AND g.active = 1
             ORDER BY UPPER(s.common_name), g.accession_number"
          ))?
          .query_map(rusqlite::params![id_str], RawGroup::read)?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        let species = conn
          .prepare(&format!(
            "SELECT {SPECIES_COLS} FROM species s
             WHERE s.species_id IN (
               SELECT species_id FROM individuals
                WHERE enclosure_id = ?1 AND active = 1
               UNION
               SELECT species_id FROM animal_groups
                WHERE enclosure_id = ?1 AND active = 1)
             ORDER BY UPPER(s.common_name)"
          ))?
          .query_map(rusqlite::params![id_str], RawSpecies::read)?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok((individuals, groups, species))
      })
      .await?;

    Ok(Roster {
      species:     species
        .into_iter()
        .map(RawSpecies::into_species)
        .collect::<Result<_>>()?,
      individuals: individuals
        .into_iter()
        .map(RawIndividual::into_individual)
        .collect::<Result<_>>()?,
      groups:      groups
        .into_iter()
        .map(RawGroup::into_group)
        .collect::<Result<_>>()?,
    })
  }

  // ── Writes ────────────────────────────────────────────────────────────────

  async fn upsert(&self, input: NewObservation) -> Result<Observation> {
    let body    = input.body.normalized();
    let subject = body.subject();
    let t       = table(subject.kind());
    let stamp   = Stamp {
      user_id:      input.user_id,
      enclosure_id: input.enclosure_id,
      recorded_at:  input.recorded_at,
      day:          calendar_day(input.recorded_at, self.tz),
    };
    if !is_storable(stamp.day) {
      return Err(CoreError::DayOutOfRange(stamp.day).into());
    }

    let subject_str   = encode_uuid(subject.id());
    let user_str      = stamp.user_id.map(encode_uuid);
    let enclosure_str = stamp.enclosure_id.map(encode_uuid);
    let at_str        = encode_dt(stamp.recorded_at);
    let day_str       = encode_day(stamp.day);
    let (user_id, enclosure_id) = (stamp.user_id, stamp.enclosure_id);
    let write_body = body.clone();

    let lookup = format!(
      "SELECT observation_id FROM {}
       WHERE {} = ?1 AND user_id IS ?2 AND enclosure_id IS ?3 AND calendar_day = ?4
       ORDER BY observation_id DESC LIMIT 1",
      t.observations, t.subject_col
    );

    // Check, look up and write inside one immediate transaction so two
    // submissions for the same identity cannot both insert.
    let outcome: Outcome<(i64, bool)> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        if !exists(&tx, t.subjects, t.subject_col, &subject_str)? {
          return Ok(Err(CoreError::SubjectNotFound(subject)));
        }
        if let (Some(id), Some(s)) = (enclosure_id, &enclosure_str) {
          if !exists(&tx, "enclosures", "enclosure_id", s)? {
            return Ok(Err(CoreError::EnclosureNotFound(id)));
          }
        }
        if let (Some(id), Some(s)) = (user_id, &user_str) {
          if !exists(&tx, "users", "user_id", s)? {
            return Ok(Err(CoreError::UserNotFound(id)));
          }
        }

        let existing: Option<i64> = tx
          .query_row(
            &lookup,
            rusqlite::params![subject_str, user_str, enclosure_str, day_str],
            |r| r.get(0),
          )
          .optional()?;

        let id = match existing {
          Some(id) => {
            update_observation(&tx, id, &at_str, &write_body)?;
            id
          }
          None => insert_observation(
            &tx,
            &subject_str,
            user_str.as_deref(),
            enclosure_str.as_deref(),
            &at_str,
            &day_str,
            &write_body,
          )?,
        };

        tx.commit()?;
        Ok(Ok((id, existing.is_some())))
      })
      .await?;
    let (observation_id, replaced) = outcome?;

    tracing::debug!(
      %subject,
      day = %stamp.day,
      observation_id,
      replaced,
      "observation upserted"
    );

    Ok(Observation { observation_id, stamp, body })
  }

  // ── Per-subject reads ─────────────────────────────────────────────────────

  async fn resolve(
    &self,
    subject: SubjectRef,
    day: NaiveDate,
    enclosure_id: Option<Uuid>,
  ) -> Result<Option<Observation>> {
    let t = table(subject.kind());
    let sql = format!(
      "{select}
       WHERE o.{col} = ?1
         AND o.calendar_day = ?2
         AND (?3 IS NULL OR o.enclosure_id = ?3)
       ORDER BY {LATEST_FIRST}
       LIMIT 1",
      select = t.select_observations(),
      col = t.subject_col,
    );
    let params = vec![
      Some(encode_uuid(subject.id())),
      Some(encode_day(day)),
      enclosure_id.map(encode_uuid),
    ];

    Ok(self.fetch_observations(t, sql, params).await?.into_iter().next())
  }

  async fn window(
    &self,
    subject: SubjectRef,
    days: i64,
    reference: NaiveDate,
    enclosure_id: Option<Uuid>,
  ) -> Result<Vec<WindowEntry>> {
    if days > MAX_WINDOW_DAYS {
      return Err(CoreError::WindowTooLong { requested: days, limit: MAX_WINDOW_DAYS }.into());
    }
    let Some((start, end)) = window_range(reference, days) else {
      return Ok(Vec::new());
    };
    if let Some(day) = [start, end].into_iter().find(|d| !is_storable(*d)) {
      return Err(CoreError::DayOutOfRange(day).into());
    }

    let t = table(subject.kind());
    let sql = format!(
      "{select}
       WHERE o.{col} = ?1
         AND o.calendar_day >= ?2
         AND o.calendar_day < ?3
         AND (?4 IS NULL OR o.enclosure_id = ?4)
       ORDER BY o.calendar_day DESC, {LATEST_FIRST}",
      select = t.select_observations(),
      col = t.subject_col,
    );
    let params = vec![
      Some(encode_uuid(subject.id())),
      Some(encode_day(start)),
      Some(encode_day(end)),
      enclosure_id.map(encode_uuid),
    ];

    let rows = self.fetch_observations(t, sql, params).await?;
    Ok(build_window(rows, reference, days))
  }

  async fn history(
    &self,
    subject: SubjectRef,
    enclosure_id: Option<Uuid>,
    limit: usize,
    offset: usize,
  ) -> Result<Vec<Observation>> {
    let t = table(subject.kind());
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);
    let offset = i64::try_from(offset).unwrap_or(i64::MAX);
    let sql = format!(
      "{select}
       WHERE o.{col} = ?1
         AND (?2 IS NULL OR o.enclosure_id = ?2)
       ORDER BY {LATEST_FIRST}
       LIMIT {limit} OFFSET {offset}",
      select = t.select_observations(),
      col = t.subject_col,
    );
    let params = vec![Some(encode_uuid(subject.id())), enclosure_id.map(encode_uuid)];

    self.fetch_observations(t, sql, params).await
  }

  async fn condition_tally(&self, individual_id: Uuid) -> Result<Vec<(Condition, u64)>> {
    let id_str = encode_uuid(individual_id);

    let raws: Vec<(String, i64)> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT condition, COUNT(*) FROM individual_observations
           WHERE individual_id = ?1
           GROUP BY condition",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![id_str], |row| Ok((row.get(0)?, row.get(1)?)))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    let mut counts: HashMap<Condition, u64> = HashMap::new();
    for (code, n) in raws {
      counts.insert(Condition::from_code(&code)?, n.max(0) as u64);
    }

    Ok(
      Condition::ALL
        .into_iter()
        .map(|c| (c, counts.get(&c).copied().unwrap_or(0)))
        .collect(),
    )
  }

  // ── Per-enclosure reads ───────────────────────────────────────────────────

  async fn aggregate<'a>(
    &'a self,
    enclosures: &'a [Uuid],
    day: NaiveDate,
  ) -> Result<EnclosureCounts> {
    if enclosures.is_empty() {
      return Ok(EnclosureCounts::default());
    }

    let individuals = self.latest_per_subject(&INDIVIDUALS, enclosures, day).await?;
    let groups = self.latest_per_subject(&GROUPS, enclosures, day).await?;

    tracing::debug!(
      enclosures = enclosures.len(),
      %day,
      individuals = individuals.len(),
      groups = groups.len(),
      "aggregated enclosure counts"
    );

    Ok(EnclosureCounts { individuals, groups })
  }

  async fn count_observed(&self, enclosure_id: Uuid, day: NaiveDate) -> Result<u64> {
    let scalar = |t: &KindTable| {
      format!(
        "(SELECT COUNT(DISTINCT o.{col}) FROM {obs} o
           JOIN {subjects} s ON s.{col} = o.{col}
          WHERE s.active = 1 AND o.enclosure_id = ?1 AND o.calendar_day = ?2)",
        col = t.subject_col,
        obs = t.observations,
        subjects = t.subjects,
      )
    };
    let sql = format!("SELECT {} + {}", scalar(&INDIVIDUALS), scalar(&GROUPS));
    let params = (encode_uuid(enclosure_id), encode_day(day));

    let n: i64 = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(&sql, rusqlite::params![params.0, params.1], |r| r.get(0))?)
      })
      .await?;
    Ok(n.max(0) as u64)
  }

  async fn count_total_subjects(&self, enclosure_id: Uuid) -> Result<u64> {
    let id_str = encode_uuid(enclosure_id);

    let n: i64 = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(
          "SELECT
             (SELECT COUNT(*) FROM individuals WHERE enclosure_id = ?1 AND active = 1)
           + (SELECT COUNT(*) FROM animal_groups WHERE enclosure_id = ?1 AND active = 1)",
          rusqlite::params![id_str],
          |r| r.get(0),
        )?)
      })
      .await?;
    Ok(n.max(0) as u64)
  }

  async fn species_counts_on_day(
    &self,
    enclosure_id: Uuid,
    day: NaiveDate,
  ) -> Result<Vec<Observation>> {
    let sql = format!(
      "{select}
       JOIN species s ON s.species_id = o.species_id
       WHERE o.enclosure_id = ?1
         AND o.calendar_day = ?2
         AND o.species_id IN (
           SELECT species_id FROM individuals WHERE enclosure_id = ?1 AND active = 1
           UNION
           SELECT species_id FROM animal_groups WHERE enclosure_id = ?1 AND active = 1)
       ORDER BY UPPER(s.common_name), {LATEST_FIRST}",
      select = SPECIES.select_observations(),
    );
    let params = vec![Some(encode_uuid(enclosure_id)), Some(encode_day(day))];

    let rows = self.fetch_observations(&SPECIES, sql, params).await?;
    Ok(first_per_group(rows, |o| o.subject()))
  }

  async fn enclosure_summaries<'a>(
    &'a self,
    enclosures: &'a [Uuid],
    day: NaiveDate,
  ) -> Result<Vec<EnclosureSummary>> {
    if enclosures.is_empty() {
      return Ok(Vec::new());
    }
    let totals = self.roster_totals(enclosures).await?;
    let counts = self.aggregate(enclosures, day).await?;
    Ok(summarize(&totals, day, &counts))
  }
}
