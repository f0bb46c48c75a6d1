//! SQL schema for the zootally SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
///
/// Deleting an enclosure or a user nulls the references held by subjects
/// and observations. Deleting a subject (or its species) removes its
/// observations.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS enclosures (
    enclosure_id TEXT PRIMARY KEY,
    name         TEXT NOT NULL UNIQUE,
    created_at   TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS users (
    user_id  TEXT PRIMARY KEY,
    username TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS species (
    species_id   TEXT PRIMARY KEY,
    common_name  TEXT NOT NULL UNIQUE,
    class_name   TEXT NOT NULL DEFAULT '',
    order_name   TEXT NOT NULL DEFAULT '',
    family_name  TEXT NOT NULL DEFAULT '',
    genus_name   TEXT NOT NULL DEFAULT '',
    species_name TEXT NOT NULL DEFAULT ''
);

CREATE TABLE IF NOT EXISTS individuals (
    individual_id    TEXT PRIMARY KEY,
    accession_number TEXT NOT NULL UNIQUE,
    name             TEXT NOT NULL,
    identifier       TEXT NOT NULL DEFAULT '',
    sex              TEXT NOT NULL DEFAULT 'U',   -- 'M' | 'F' | 'U'
    active           INTEGER NOT NULL DEFAULT 1,
    species_id       TEXT NOT NULL REFERENCES species(species_id) ON DELETE CASCADE,
    enclosure_id     TEXT REFERENCES enclosures(enclosure_id) ON DELETE SET NULL
);

-- `groups` is a keyword in recent SQLite releases.
CREATE TABLE IF NOT EXISTS animal_groups (
    group_id           TEXT PRIMARY KEY,
    accession_number   TEXT NOT NULL UNIQUE,
    population_male    INTEGER NOT NULL DEFAULT 0,
    population_female  INTEGER NOT NULL DEFAULT 0,
    population_unknown INTEGER NOT NULL DEFAULT 0,
    population_total   INTEGER NOT NULL DEFAULT 0,
    active             INTEGER NOT NULL DEFAULT 1,
    species_id         TEXT NOT NULL REFERENCES species(species_id) ON DELETE CASCADE,
    enclosure_id       TEXT REFERENCES enclosures(enclosure_id) ON DELETE SET NULL
);

-- One table per observation kind. Rows are replaced in place by the
-- upsert path and never deleted except by cascade.
-- recorded_at:  RFC 3339 UTC, fixed microsecond width (sorts lexically)
-- calendar_day: YYYY-MM-DD of recorded_at in the store's time zone
CREATE TABLE IF NOT EXISTS individual_observations (
    observation_id INTEGER PRIMARY KEY AUTOINCREMENT,
    individual_id  TEXT NOT NULL REFERENCES individuals(individual_id) ON DELETE CASCADE,
    user_id        TEXT REFERENCES users(user_id) ON DELETE SET NULL,
    enclosure_id   TEXT REFERENCES enclosures(enclosure_id) ON DELETE SET NULL,
    recorded_at    TEXT NOT NULL,
    calendar_day   TEXT NOT NULL,
    condition      TEXT NOT NULL,               -- 'BA' | 'SE' | 'NA' | 'NS' | ''
    comment        TEXT NOT NULL DEFAULT ''
);

CREATE TABLE IF NOT EXISTS group_observations (
    observation_id  INTEGER PRIMARY KEY AUTOINCREMENT,
    group_id        TEXT NOT NULL REFERENCES animal_groups(group_id) ON DELETE CASCADE,
    user_id         TEXT REFERENCES users(user_id) ON DELETE SET NULL,
    enclosure_id    TEXT REFERENCES enclosures(enclosure_id) ON DELETE SET NULL,
    recorded_at     TEXT NOT NULL,
    calendar_day    TEXT NOT NULL,
    count_total     INTEGER NOT NULL DEFAULT 0,
    count_seen      INTEGER NOT NULL DEFAULT 0,
    count_not_seen  INTEGER NOT NULL DEFAULT 0,
    count_bar       INTEGER NOT NULL DEFAULT 0,
    needs_attention INTEGER NOT NULL DEFAULT 0,
    comment         TEXT NOT NULL DEFAULT ''
);

CREATE TABLE IF NOT EXISTS species_observations (
    observation_id INTEGER PRIMARY KEY AUTOINCREMENT,
    species_id     TEXT NOT NULL REFERENCES species(species_id) ON DELETE CASCADE,
    user_id        TEXT REFERENCES users(user_id) ON DELETE SET NULL,
    enclosure_id   TEXT REFERENCES enclosures(enclosure_id) ON DELETE SET NULL,
    recorded_at    TEXT NOT NULL,
    calendar_day   TEXT NOT NULL,
    count          INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS individuals_enclosure_idx ON individuals(enclosure_id, active);
CREATE INDEX IF NOT EXISTS groups_enclosure_idx      ON animal_groups(enclosure_id, active);

CREATE INDEX IF NOT EXISTS individual_obs_subject_day_idx   ON individual_observations(individual_id, calendar_day);
CREATE INDEX IF NOT EXISTS individual_obs_enclosure_day_idx ON individual_observations(enclosure_id, calendar_day);
CREATE INDEX IF NOT EXISTS individual_obs_day_idx           ON individual_observations(calendar_day);

CREATE INDEX IF NOT EXISTS group_obs_subject_day_idx   ON group_observations(group_id, calendar_day);
CREATE INDEX IF NOT EXISTS group_obs_enclosure_day_idx ON group_observations(enclosure_id, calendar_day);
CREATE INDEX IF NOT EXISTS group_obs_day_idx           ON group_observations(calendar_day);

CREATE INDEX IF NOT EXISTS species_obs_subject_day_idx   ON species_observations(species_id, calendar_day);
CREATE INDEX IF NOT EXISTS species_obs_enclosure_day_idx ON species_observations(enclosure_id, calendar_day);
CREATE INDEX IF NOT EXISTS species_obs_day_idx           ON species_observations(calendar_day);

PRAGMA user_version = 1;
";
