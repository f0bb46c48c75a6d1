//! The `CountStore` trait.
//!
//! The trait is implemented by storage backends (e.g.
//! `zootally-store-sqlite`). Higher layers (`zootally-api`) depend on this
//! abstraction, not on any concrete backend.

use std::future::Future;

use chrono::NaiveDate;
use chrono_tz::Tz;
use uuid::Uuid;

use crate::{
  error::AsCoreError,
  observation::{Condition, NewObservation, Observation},
  registry::{
    Enclosure, Group, Individual, NewGroup, NewIndividual, NewSpecies,
    Roster, Species, Subject, SubjectRef, User,
  },
  rollup::{EnclosureCounts, EnclosureSummary},
  window::WindowEntry,
};

/// Abstraction over a zootally store backend.
///
/// Observations are only ever written through [`CountStore::upsert`], which
/// keeps at most one record per `(subject, user, enclosure, day)`. All read
/// methods normalise absence into `None`, empty collections or zero.
///
/// Every day-sensitive read takes its day explicitly; the store never
/// consults a clock.
pub trait CountStore: Send + Sync {
  type Error: std::error::Error + AsCoreError + Send + Sync + 'static;

  /// The zone calendar days are derived in.
  fn time_zone(&self) -> Tz;

  // ── Registry ──────────────────────────────────────────────────────────

  fn add_enclosure(
    &self,
    name: String,
  ) -> impl Future<Output = Result<Enclosure, Self::Error>> + Send + '_;

  fn get_enclosure(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Enclosure>, Self::Error>> + Send + '_;

  /// All enclosures ordered by name. With `active_only`, only enclosures
  /// holding at least one active individual or group.
  fn list_enclosures(
    &self,
    active_only: bool,
  ) -> impl Future<Output = Result<Vec<Enclosure>, Self::Error>> + Send + '_;

  /// Delete an enclosure. Subjects and observations that referenced it are
  /// kept with a null reference. Returns `false` if it did not exist.
  fn delete_enclosure(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  fn add_user(
    &self,
    username: String,
  ) -> impl Future<Output = Result<User, Self::Error>> + Send + '_;

  /// Delete a user; their observations stay with a null user.
  fn delete_user(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  fn add_species(
    &self,
    input: NewSpecies,
  ) -> impl Future<Output = Result<Species, Self::Error>> + Send + '_;

  fn add_individual(
    &self,
    input: NewIndividual,
  ) -> impl Future<Output = Result<Individual, Self::Error>> + Send + '_;

  fn add_group(
    &self,
    input: NewGroup,
  ) -> impl Future<Output = Result<Group, Self::Error>> + Send + '_;

  /// Retrieve any subject. Returns `None` if not found.
  fn get_subject(
    &self,
    subject: SubjectRef,
  ) -> impl Future<Output = Result<Option<Subject>, Self::Error>> + Send + '_;

  /// Activate or deactivate an individual or group. Inactive subjects keep
  /// their history but drop out of every enclosure-scoped read.
  fn set_active(
    &self,
    subject: SubjectRef,
    active: bool,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Move an individual or group to another enclosure, or detach it with
  /// `None`.
  fn assign_enclosure(
    &self,
    subject: SubjectRef,
    enclosure_id: Option<Uuid>,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Delete a subject and all of its observations. Deleting a species also
  /// deletes its individuals and groups. Returns `false` if it did not
  /// exist.
  fn delete_subject(
    &self,
    subject: SubjectRef,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Active individuals and groups of an enclosure and their distinct
  /// species.
  fn enclosure_roster(
    &self,
    enclosure_id: Uuid,
  ) -> impl Future<Output = Result<Roster, Self::Error>> + Send + '_;

  // ── Writes ────────────────────────────────────────────────────────────

  /// Replace the record for the same `(subject, user, enclosure, day)` in
  /// place, or insert one. Re-submitting converges; it never duplicates and
  /// never fails on the identity tuple.
  ///
  /// Fails with a referential error if the subject, enclosure or user does
  /// not exist.
  fn upsert(
    &self,
    input: NewObservation,
  ) -> impl Future<Output = Result<Observation, Self::Error>> + Send + '_;

  // ── Per-subject reads ─────────────────────────────────────────────────

  /// The authoritative record for `subject` on `day`, across all users.
  /// `enclosure_id` restricts to records taken in one enclosure.
  fn resolve(
    &self,
    subject: SubjectRef,
    day: NaiveDate,
    enclosure_id: Option<Uuid>,
  ) -> impl Future<Output = Result<Option<Observation>, Self::Error>> + Send + '_;

  /// Exactly `max(days, 0)` entries for `reference - 1` down to
  /// `reference - days`, zero-filled, from a single range query.
  fn window(
    &self,
    subject: SubjectRef,
    days: i64,
    reference: NaiveDate,
    enclosure_id: Option<Uuid>,
  ) -> impl Future<Output = Result<Vec<WindowEntry>, Self::Error>> + Send + '_;

  /// Every observation of `subject`, newest first.
  fn history(
    &self,
    subject: SubjectRef,
    enclosure_id: Option<Uuid>,
    limit: usize,
    offset: usize,
  ) -> impl Future<Output = Result<Vec<Observation>, Self::Error>> + Send + '_;

  /// Lifetime number of observations per condition for an individual.
  /// Every condition is present, in [`Condition::ALL`] order.
  fn condition_tally(
    &self,
    individual_id: Uuid,
  ) -> impl Future<Output = Result<Vec<(Condition, u64)>, Self::Error>> + Send + '_;

  // ── Per-enclosure reads ───────────────────────────────────────────────

  /// Authoritative records of every active individual and group observed
  /// in any of `enclosures` on `day`. One query per subject kind,
  /// regardless of how many enclosures or subjects are involved.
  fn aggregate<'a>(
    &'a self,
    enclosures: &'a [Uuid],
    day: NaiveDate,
  ) -> impl Future<Output = Result<EnclosureCounts, Self::Error>> + Send + 'a;

  /// Distinct active individuals and groups observed in the enclosure on
  /// `day`.
  fn count_observed(
    &self,
    enclosure_id: Uuid,
    day: NaiveDate,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  /// Active individuals plus active groups assigned to the enclosure.
  fn count_total_subjects(
    &self,
    enclosure_id: Uuid,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  /// Authoritative species count per distinct species of the enclosure,
  /// ordered by common name. Single query.
  fn species_counts_on_day(
    &self,
    enclosure_id: Uuid,
    day: NaiveDate,
  ) -> impl Future<Output = Result<Vec<Observation>, Self::Error>> + Send + '_;

  /// Dashboard summaries for `enclosures`, in input order. Unknown ids are
  /// skipped.
  fn enclosure_summaries<'a>(
    &'a self,
    enclosures: &'a [Uuid],
    day: NaiveDate,
  ) -> impl Future<Output = Result<Vec<EnclosureSummary>, Self::Error>> + Send + 'a;
}
