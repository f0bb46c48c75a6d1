//! Integration tests for `SqliteStore` against an in-memory database.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use zootally_core::{
  Error as CoreError,
  observation::{
    Condition, GroupObservation, IndividualObservation, NewObservation,
    ObservationBody, SpeciesObservation,
  },
  registry::{
    Enclosure, Group, Individual, NewGroup, NewIndividual, NewSpecies,
    Population, Sex, Species, Subject, SubjectRef, Taxonomy, User,
  },
  store::CountStore,
};
use uuid::Uuid;

use crate::{Error, SqliteStore};

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
  NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn at(d: u32, h: u32, min: u32) -> DateTime<Utc> {
  Utc.with_ymd_and_hms(2024, 1, d, h, min, 0).unwrap()
}

fn core_err(e: Error) -> CoreError {
  match e {
    Error::Core(e) => e,
    other => panic!("expected a domain error, got {other:?}"),
  }
}

/// The Savanna fixture: one zebra individual (A101), one zebra group (G200)
/// and one keeper.
struct Savanna {
  enclosure:  Enclosure,
  zebra:      Species,
  individual: Individual,
  group:      Group,
  keeper:     User,
}

async fn species(s: &SqliteStore, name: &str) -> Species {
  s.add_species(NewSpecies {
    common_name: name.into(),
    taxonomy:    Taxonomy {
      class_name: "Mammalia".into(),
      ..Default::default()
    },
  })
  .await
  .unwrap()
}

async fn individual(
  s: &SqliteStore,
  accession: &str,
  name: &str,
  species_id: Uuid,
  enclosure_id: Option<Uuid>,
) -> Individual {
  s.add_individual(NewIndividual {
    accession_number: accession.into(),
    name: name.into(),
    identifier: String::new(),
    sex: Sex::Female,
    species_id,
    enclosure_id,
  })
  .await
  .unwrap()
}

async fn group(
  s: &SqliteStore,
  accession: &str,
  total: u32,
  species_id: Uuid,
  enclosure_id: Option<Uuid>,
) -> Group {
  s.add_group(NewGroup {
    accession_number: accession.into(),
    population: Population { male: 0, female: 0, unknown: total, total },
    species_id,
    enclosure_id,
  })
  .await
  .unwrap()
}

async fn savanna(s: &SqliteStore) -> Savanna {
  let enclosure = s.add_enclosure("Savanna".into()).await.unwrap();
  let zebra = species(s, "Zebra").await;
  let individual =
    individual(s, "A101", "Zuri", zebra.species_id, Some(enclosure.enclosure_id)).await;
  let group = group(s, "G200", 12, zebra.species_id, Some(enclosure.enclosure_id)).await;
  let keeper = s.add_user("keeper".into()).await.unwrap();
  Savanna { enclosure, zebra, individual, group, keeper }
}

fn condition_body(individual_id: Uuid, condition: Condition) -> ObservationBody {
  ObservationBody::Individual(IndividualObservation {
    individual_id,
    condition,
    comment: String::new(),
  })
}

fn group_body(group_id: Uuid, total: u32, seen: u32, not_seen: u32) -> ObservationBody {
  ObservationBody::Group(GroupObservation {
    group_id,
    count_total: total,
    count_seen: seen,
    count_not_seen: not_seen,
    count_bar: 0,
    needs_attention: false,
    comment: String::new(),
  })
}

fn species_body(species_id: Uuid, count: u32) -> ObservationBody {
  ObservationBody::Species(SpeciesObservation { species_id, count })
}

// ─── Scenario ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn savanna_scenario() {
  let s = store().await;
  let z = savanna(&s).await;
  let a101 = SubjectRef::Individual(z.individual.individual_id);
  let e = z.enclosure.enclosure_id;

  s.upsert(NewObservation::new(
    z.keeper.user_id,
    e,
    at(10, 9, 0),
    condition_body(z.individual.individual_id, Condition::Bar),
  ))
  .await
  .unwrap();
  s.upsert(NewObservation::new(
    z.keeper.user_id,
    e,
    at(10, 14, 0),
    condition_body(z.individual.individual_id, Condition::Seen),
  ))
  .await
  .unwrap();

  let resolved = s.resolve(a101, date(2024, 1, 10), None).await.unwrap().unwrap();
  assert_eq!(resolved.condition(), Some(Condition::Seen));

  assert_eq!(s.count_observed(e, date(2024, 1, 10)).await.unwrap(), 1);
  assert_eq!(s.count_total_subjects(e).await.unwrap(), 2);

  let window = s.window(a101, 3, date(2024, 1, 11), None).await.unwrap();
  let days: Vec<_> = window.iter().map(|w| w.day).collect();
  assert_eq!(days, vec![date(2024, 1, 10), date(2024, 1, 9), date(2024, 1, 8)]);
  assert_eq!(
    window[0].observation.as_ref().and_then(|o| o.condition()),
    Some(Condition::Seen)
  );
  assert!(window[1].observation.is_none());
  assert_eq!(window[1].count(), 0);
  assert_eq!(window[2].count(), 0);
}

// ─── Upsert ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn upsert_is_idempotent() {
  let s = store().await;
  let z = savanna(&s).await;
  let subject = SubjectRef::Individual(z.individual.individual_id);

  let first = s
    .upsert(NewObservation::new(
      z.keeper.user_id,
      z.enclosure.enclosure_id,
      at(10, 9, 0),
      condition_body(z.individual.individual_id, Condition::Bar),
    ))
    .await
    .unwrap();
  let second = s
    .upsert(NewObservation::new(
      z.keeper.user_id,
      z.enclosure.enclosure_id,
      at(10, 9, 30),
      condition_body(z.individual.individual_id, Condition::NeedsAttention),
    ))
    .await
    .unwrap();

  assert_eq!(first.observation_id, second.observation_id);

  let history = s.history(subject, None, 10, 0).await.unwrap();
  assert_eq!(history.len(), 1);
  assert_eq!(history[0].condition(), Some(Condition::NeedsAttention));
  assert_eq!(history[0].stamp.recorded_at, at(10, 9, 30));
}

#[tokio::test]
async fn different_users_keep_separate_records() {
  let s = store().await;
  let z = savanna(&s).await;
  let other = s.add_user("relief".into()).await.unwrap();
  let subject = SubjectRef::Individual(z.individual.individual_id);
  let e = z.enclosure.enclosure_id;

  s.upsert(NewObservation::new(
    z.keeper.user_id,
    e,
    at(10, 9, 0),
    condition_body(z.individual.individual_id, Condition::Bar),
  ))
  .await
  .unwrap();
  s.upsert(NewObservation::new(
    other.user_id,
    e,
    at(10, 15, 0),
    condition_body(z.individual.individual_id, Condition::Absent),
  ))
  .await
  .unwrap();

  assert_eq!(s.history(subject, None, 10, 0).await.unwrap().len(), 2);

  let resolved = s.resolve(subject, date(2024, 1, 10), None).await.unwrap().unwrap();
  assert_eq!(resolved.stamp.user_id, Some(other.user_id));
  assert_eq!(resolved.condition(), Some(Condition::Absent));
}

#[tokio::test]
async fn equal_timestamps_resolve_to_the_later_insert() {
  let s = store().await;
  let z = savanna(&s).await;
  let other = s.add_user("relief".into()).await.unwrap();
  let subject = SubjectRef::Individual(z.individual.individual_id);

  s.upsert(NewObservation::new(
    z.keeper.user_id,
    z.enclosure.enclosure_id,
    at(10, 9, 0),
    condition_body(z.individual.individual_id, Condition::Seen),
  ))
  .await
  .unwrap();
  let later = s
    .upsert(NewObservation::new(
      other.user_id,
      z.enclosure.enclosure_id,
      at(10, 9, 0),
      condition_body(z.individual.individual_id, Condition::Bar),
    ))
    .await
    .unwrap();

  let resolved = s.resolve(subject, date(2024, 1, 10), None).await.unwrap().unwrap();
  assert_eq!(resolved.observation_id, later.observation_id);
}

#[tokio::test]
async fn group_upsert_recomputes_count_not_seen() {
  let s = store().await;
  let z = savanna(&s).await;

  let stored = s
    .upsert(NewObservation::new(
      z.keeper.user_id,
      z.enclosure.enclosure_id,
      at(10, 9, 0),
      group_body(z.group.group_id, 12, 9, 40),
    ))
    .await
    .unwrap();
  assert_eq!(stored.as_group().unwrap().count_not_seen, 3);

  let over = s
    .upsert(NewObservation::new(
      z.keeper.user_id,
      z.enclosure.enclosure_id,
      at(10, 10, 0),
      group_body(z.group.group_id, 5, 8, 1),
    ))
    .await
    .unwrap();
  assert_eq!(over.as_group().unwrap().count_not_seen, 0);

  let resolved = s
    .resolve(SubjectRef::Group(z.group.group_id), date(2024, 1, 10), None)
    .await
    .unwrap()
    .unwrap();
  assert_eq!(resolved.as_group().unwrap().count_not_seen, 0);
  assert_eq!(resolved.as_group().unwrap().count_seen, 8);
}

#[tokio::test]
async fn calendar_day_follows_the_store_time_zone() {
  let s = store()
    .await
    .with_time_zone(chrono_tz::America::Chicago);
  let z = savanna(&s).await;

  // 03:30 UTC on the 10th is the evening of the 9th in Chicago.
  let stored = s
    .upsert(NewObservation::new(
      z.keeper.user_id,
      z.enclosure.enclosure_id,
      at(10, 3, 30),
      condition_body(z.individual.individual_id, Condition::Seen),
    ))
    .await
    .unwrap();
  assert_eq!(stored.stamp.day, date(2024, 1, 9));

  let subject = SubjectRef::Individual(z.individual.individual_id);
  assert!(s.resolve(subject, date(2024, 1, 9), None).await.unwrap().is_some());
  assert!(s.resolve(subject, date(2024, 1, 10), None).await.unwrap().is_none());
}

#[tokio::test]
async fn upsert_rejects_unknown_references() {
  let s = store().await;
  let z = savanna(&s).await;

  let missing_subject = Uuid::new_v4();
  let err = s
    .upsert(NewObservation::new(
      z.keeper.user_id,
      z.enclosure.enclosure_id,
      at(10, 9, 0),
      condition_body(missing_subject, Condition::Seen),
    ))
    .await
    .unwrap_err();
  assert!(matches!(
    core_err(err),
    CoreError::SubjectNotFound(SubjectRef::Individual(id)) if id == missing_subject
  ));

  let err = s
    .upsert(NewObservation::new(
      z.keeper.user_id,
      Uuid::new_v4(),
      at(10, 9, 0),
      condition_body(z.individual.individual_id, Condition::Seen),
    ))
    .await
    .unwrap_err();
  assert!(matches!(core_err(err), CoreError::EnclosureNotFound(_)));

  let err = s
    .upsert(NewObservation::new(
      Uuid::new_v4(),
      z.enclosure.enclosure_id,
      at(10, 9, 0),
      condition_body(z.individual.individual_id, Condition::Seen),
    ))
    .await
    .unwrap_err();
  assert!(matches!(core_err(err), CoreError::UserNotFound(_)));
}

// ─── Resolver & window ───────────────────────────────────────────────────────

#[tokio::test]
async fn unobserved_subject_resolves_to_none() {
  let s = store().await;
  let z = savanna(&s).await;

  let resolved = s
    .resolve(SubjectRef::Group(z.group.group_id), date(2024, 1, 10), None)
    .await
    .unwrap();
  assert!(resolved.is_none());
  assert_eq!(
    s.count_observed(z.enclosure.enclosure_id, date(2024, 1, 10))
      .await
      .unwrap(),
    0
  );
}

#[tokio::test]
async fn single_observation_resolves_unchanged() {
  let s = store().await;
  let z = savanna(&s).await;

  let body = ObservationBody::Individual(IndividualObservation {
    individual_id: z.individual.individual_id,
    condition:     Condition::NeedsAttention,
    comment:       "limping on left hind".into(),
  });
  s.upsert(NewObservation::new(
    z.keeper.user_id,
    z.enclosure.enclosure_id,
    at(10, 8, 15),
    body.clone(),
  ))
  .await
  .unwrap();

  let resolved = s
    .resolve(
      SubjectRef::Individual(z.individual.individual_id),
      date(2024, 1, 10),
      Some(z.enclosure.enclosure_id),
    )
    .await
    .unwrap()
    .unwrap();
  assert_eq!(resolved.body, body);
  assert_eq!(resolved.stamp.recorded_at, at(10, 8, 15));
}

#[tokio::test]
async fn resolve_can_be_scoped_to_an_enclosure() {
  let s = store().await;
  let z = savanna(&s).await;
  let barn = s.add_enclosure("Barn".into()).await.unwrap();
  let subject = SubjectRef::Individual(z.individual.individual_id);

  s.upsert(NewObservation::new(
    z.keeper.user_id,
    barn.enclosure_id,
    at(10, 9, 0),
    condition_body(z.individual.individual_id, Condition::Seen),
  ))
  .await
  .unwrap();

  let day = date(2024, 1, 10);
  assert!(s.resolve(subject, day, None).await.unwrap().is_some());
  assert!(s.resolve(subject, day, Some(barn.enclosure_id)).await.unwrap().is_some());
  assert!(
    s.resolve(subject, day, Some(z.enclosure.enclosure_id))
      .await
      .unwrap()
      .is_none()
  );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_upserts_for_one_identity_converge() {
  let s = store().await;
  let z = savanna(&s).await;
  let subject = SubjectRef::Individual(z.individual.individual_id);
  let submitted =
    [Condition::Seen, Condition::Bar, Condition::Absent, Condition::NeedsAttention];

  let mut tasks = tokio::task::JoinSet::new();
  for (minute, condition) in submitted.into_iter().enumerate() {
    let s = s.clone();
    let input = NewObservation::new(
      z.keeper.user_id,
      z.enclosure.enclosure_id,
      at(10, 9, minute as u32),
      condition_body(z.individual.individual_id, condition),
    );
    tasks.spawn(async move { s.upsert(input).await });
  }

  let mut ids = Vec::new();
  while let Some(joined) = tasks.join_next().await {
    ids.push(joined.unwrap().unwrap().observation_id);
  }
  ids.dedup();
  assert_eq!(ids.len(), 1);

  let history = s.history(subject, None, 10, 0).await.unwrap();
  assert_eq!(history.len(), 1);
  let winner = history[0].condition().unwrap();
  assert!(submitted.contains(&winner));

  let resolved = s.resolve(subject, date(2024, 1, 10), None).await.unwrap().unwrap();
  assert_eq!(resolved.condition(), Some(winner));
}

#[tokio::test]
async fn upsert_rejects_days_that_cannot_be_stored() {
  let s = store().await;
  let z = savanna(&s).await;

  let err = s
    .upsert(NewObservation::new(
      z.keeper.user_id,
      z.enclosure.enclosure_id,
      Utc.with_ymd_and_hms(10_000, 1, 1, 9, 0, 0).unwrap(),
      condition_body(z.individual.individual_id, Condition::Seen),
    ))
    .await
    .unwrap_err();
  assert!(matches!(core_err(err), CoreError::DayOutOfRange(_)));
}

#[tokio::test]
async fn oversized_windows_are_errors() {
  let s = store().await;
  let z = savanna(&s).await;
  let subject = SubjectRef::Individual(z.individual.individual_id);

  let err = s.window(subject, 200_000_000, date(2024, 1, 11), None).await.unwrap_err();
  assert!(matches!(
    core_err(err),
    CoreError::WindowTooLong { requested: 200_000_000, .. }
  ));

  let err = s.window(subject, 3, date(0, 1, 2), None).await.unwrap_err();
  assert!(matches!(core_err(err), CoreError::DayOutOfRange(_)));

  let year = s.window(subject, 366, date(2024, 1, 11), None).await.unwrap();
  assert_eq!(year.len(), 366);
  assert!(year.iter().all(|w| !w.is_observed()));
}

#[tokio::test]
async fn window_has_fixed_length_and_order() {
  let s = store().await;
  let z = savanna(&s).await;
  let subject = SubjectRef::Species(z.zebra.species_id);

  for (day, count) in [(8, 5), (6, 2), (3, 9), (9, 4)] {
    s.upsert(NewObservation::new(
      z.keeper.user_id,
      z.enclosure.enclosure_id,
      at(day, 12, 0),
      species_body(z.zebra.species_id, count),
    ))
    .await
    .unwrap();
  }

  // The reference day itself is never part of the window.
  let window = s.window(subject, 4, date(2024, 1, 9), None).await.unwrap();
  let shape: Vec<_> = window.iter().map(|w| (w.day, w.count())).collect();
  assert_eq!(shape, vec![
    (date(2024, 1, 8), 5),
    (date(2024, 1, 7), 0),
    (date(2024, 1, 6), 2),
    (date(2024, 1, 5), 0),
  ]);

  assert!(s.window(subject, 0, date(2024, 1, 9), None).await.unwrap().is_empty());
  assert!(s.window(subject, -2, date(2024, 1, 9), None).await.unwrap().is_empty());
}

#[tokio::test]
async fn window_counts_group_seen_totals() {
  let s = store().await;
  let z = savanna(&s).await;

  s.upsert(NewObservation::new(
    z.keeper.user_id,
    z.enclosure.enclosure_id,
    at(10, 9, 0),
    group_body(z.group.group_id, 12, 11, 0),
  ))
  .await
  .unwrap();

  let window = s
    .window(SubjectRef::Group(z.group.group_id), 3, date(2024, 1, 11), None)
    .await
    .unwrap();
  assert_eq!(window.len(), 3);
  assert_eq!(window[0].count(), 11);
  assert!(window[0].is_observed());
}

// ─── Aggregator ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn aggregate_keeps_enclosures_apart() {
  let s = store().await;
  let z = savanna(&s).await;
  let lions = species(&s, "Lion").await;
  let den = s.add_enclosure("Lion Den".into()).await.unwrap();
  let leo = individual(&s, "A300", "Leo", lions.species_id, Some(den.enclosure_id)).await;
  let (e1, e2) = (z.enclosure.enclosure_id, den.enclosure_id);
  let day = date(2024, 1, 10);

  s.upsert(NewObservation::new(
    z.keeper.user_id,
    e1,
    at(10, 9, 0),
    condition_body(z.individual.individual_id, Condition::Bar),
  ))
  .await
  .unwrap();
  s.upsert(NewObservation::new(
    z.keeper.user_id,
    e1,
    at(10, 9, 5),
    group_body(z.group.group_id, 12, 10, 0),
  ))
  .await
  .unwrap();
  s.upsert(NewObservation::new(
    z.keeper.user_id,
    e2,
    at(10, 10, 0),
    condition_body(leo.individual_id, Condition::Absent),
  ))
  .await
  .unwrap();

  let both = s.aggregate(&[e1, e2], day).await.unwrap();
  assert_eq!(both.individuals.len(), 2);
  assert_eq!(both.groups.len(), 1);

  let only_e1 = s.aggregate(&[e1], day).await.unwrap();
  assert_eq!(both.for_enclosure(e1), only_e1);
  assert_eq!(only_e1.individuals.len(), 1);

  let empty = s.aggregate(&[], day).await.unwrap();
  assert_eq!(empty.observed_subjects(), 0);
}

#[tokio::test]
async fn aggregate_orders_by_accession_and_takes_latest() {
  let s = store().await;
  let z = savanna(&s).await;
  let e = z.enclosure.enclosure_id;
  let other = s.add_user("relief".into()).await.unwrap();
  let a050 =
    individual(&s, "A050", "Abeni", z.zebra.species_id, Some(e)).await;

  for (user, minute, condition) in [
    (z.keeper.user_id, 0, Condition::Seen),
    (other.user_id, 30, Condition::NeedsAttention),
  ] {
    s.upsert(NewObservation::new(
      user,
      e,
      at(10, 9, minute),
      condition_body(z.individual.individual_id, condition),
    ))
    .await
    .unwrap();
  }
  s.upsert(NewObservation::new(
    z.keeper.user_id,
    e,
    at(10, 11, 0),
    condition_body(a050.individual_id, Condition::Bar),
  ))
  .await
  .unwrap();

  let counts = s.aggregate(&[e], date(2024, 1, 10)).await.unwrap();
  let got: Vec<_> = counts
    .individuals
    .iter()
    .map(|o| (o.subject(), o.condition()))
    .collect();
  assert_eq!(got, vec![
    (SubjectRef::Individual(a050.individual_id), Some(Condition::Bar)),
    (
      SubjectRef::Individual(z.individual.individual_id),
      Some(Condition::NeedsAttention)
    ),
  ]);
}

#[tokio::test]
async fn inactive_subjects_drop_out_of_enclosure_reads() {
  let s = store().await;
  let z = savanna(&s).await;
  let e = z.enclosure.enclosure_id;
  let day = date(2024, 1, 10);

  s.upsert(NewObservation::new(
    z.keeper.user_id,
    e,
    at(10, 9, 0),
    condition_body(z.individual.individual_id, Condition::Seen),
  ))
  .await
  .unwrap();
  assert_eq!(s.count_observed(e, day).await.unwrap(), 1);

  let subject = SubjectRef::Individual(z.individual.individual_id);
  s.set_active(subject, false).await.unwrap();

  assert_eq!(s.count_observed(e, day).await.unwrap(), 0);
  assert_eq!(s.count_total_subjects(e).await.unwrap(), 1);
  assert!(s.aggregate(&[e], day).await.unwrap().individuals.is_empty());
  // History is kept.
  assert!(s.resolve(subject, day, None).await.unwrap().is_some());

  let roster = s.enclosure_roster(e).await.unwrap();
  assert!(roster.individuals.is_empty());
  assert_eq!(roster.groups.len(), 1);
}

#[tokio::test]
async fn species_counts_cover_species_present_in_the_enclosure() {
  let s = store().await;
  let z = savanna(&s).await;
  let e = z.enclosure.enclosure_id;
  let giraffe = species(&s, "giraffe").await;
  let lion = species(&s, "Lion").await;
  group(&s, "G210", 4, giraffe.species_id, Some(e)).await;
  let day = date(2024, 1, 10);

  for (species_id, hour, count) in [
    (z.zebra.species_id, 8, 10),
    (z.zebra.species_id, 16, 13),
    (giraffe.species_id, 9, 4),
    // No lion lives here, so this count is ignored.
    (lion.species_id, 9, 2),
  ] {
    s.upsert(NewObservation::new(
      z.keeper.user_id,
      e,
      at(10, hour, 0),
      species_body(species_id, count),
    ))
    .await
    .unwrap();
  }

  let counts = s.species_counts_on_day(e, day).await.unwrap();
  let got: Vec<_> = counts
    .iter()
    .map(|o| (o.subject().id(), o.as_species().unwrap().count))
    .collect();
  assert_eq!(got, vec![(giraffe.species_id, 4), (z.zebra.species_id, 13)]);
}

#[tokio::test]
async fn summaries_roll_up_each_enclosure_in_input_order() {
  let s = store().await;
  let z = savanna(&s).await;
  let e = z.enclosure.enclosure_id;
  let empty = s.add_enclosure("Aviary".into()).await.unwrap();
  let day = date(2024, 1, 10);

  s.upsert(NewObservation::new(
    z.keeper.user_id,
    e,
    at(10, 9, 0),
    condition_body(z.individual.individual_id, Condition::Bar),
  ))
  .await
  .unwrap();
  s.upsert(NewObservation::new(
    z.keeper.user_id,
    e,
    at(10, 9, 0),
    group_body(z.group.group_id, 12, 9, 0),
  ))
  .await
  .unwrap();

  let summaries = s
    .enclosure_summaries(&[empty.enclosure_id, Uuid::new_v4(), e], day)
    .await
    .unwrap();
  assert_eq!(summaries.len(), 2);
  assert_eq!(summaries[0].enclosure_id, empty.enclosure_id);
  assert_eq!(summaries[0].total_subjects, 0);

  let savanna = &summaries[1];
  assert_eq!(savanna.enclosure_id, e);
  assert_eq!(savanna.individuals_observed, 1);
  assert_eq!(savanna.conditions[&Condition::Bar], 1);
  assert_eq!(savanna.groups_seen, 9);
  assert_eq!(savanna.total_group_population, 12);
  assert_eq!(savanna.observed_subjects, 2);
  assert_eq!(savanna.total_subjects, 2);
}

// ─── History & tally ─────────────────────────────────────────────────────────

#[tokio::test]
async fn history_pages_newest_first() {
  let s = store().await;
  let z = savanna(&s).await;
  let subject = SubjectRef::Individual(z.individual.individual_id);

  for d in [3, 5, 4] {
    s.upsert(NewObservation::new(
      z.keeper.user_id,
      z.enclosure.enclosure_id,
      at(d, 9, 0),
      condition_body(z.individual.individual_id, Condition::Seen),
    ))
    .await
    .unwrap();
  }

  let page: Vec<_> = s
    .history(subject, None, 2, 0)
    .await
    .unwrap()
    .into_iter()
    .map(|o| o.stamp.day)
    .collect();
  assert_eq!(page, vec![date(2024, 1, 5), date(2024, 1, 4)]);

  let rest = s.history(subject, None, 2, 2).await.unwrap();
  assert_eq!(rest.len(), 1);
  assert_eq!(rest[0].stamp.day, date(2024, 1, 3));
}

#[tokio::test]
async fn condition_tally_lists_every_condition() {
  let s = store().await;
  let z = savanna(&s).await;

  for (d, condition) in [(3, Condition::Bar), (4, Condition::Bar), (5, Condition::Absent)] {
    s.upsert(NewObservation::new(
      z.keeper.user_id,
      z.enclosure.enclosure_id,
      at(d, 9, 0),
      condition_body(z.individual.individual_id, condition),
    ))
    .await
    .unwrap();
  }

  let tally = s.condition_tally(z.individual.individual_id).await.unwrap();
  assert_eq!(tally, vec![
    (Condition::Bar, 2),
    (Condition::Seen, 0),
    (Condition::NeedsAttention, 0),
    (Condition::Absent, 1),
    (Condition::NotObserved, 0),
  ]);
}

// ─── Registry ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn roster_lists_active_subjects_and_their_species() {
  let s = store().await;
  let z = savanna(&s).await;
  let e = z.enclosure.enclosure_id;
  let ostrich = species(&s, "Ostrich").await;
  individual(&s, "A102", "Ozzy", ostrich.species_id, Some(e)).await;

  let roster = s.enclosure_roster(e).await.unwrap();
  let species: Vec<_> = roster.species.iter().map(|s| s.common_name.as_str()).collect();
  assert_eq!(species, vec!["Ostrich", "Zebra"]);
  let names: Vec<_> = roster.individuals.iter().map(|i| i.name.as_str()).collect();
  assert_eq!(names, vec!["Ozzy", "Zuri"]);
  assert_eq!(roster.total_subjects(), 3);
}

#[tokio::test]
async fn active_enclosures_hold_active_subjects() {
  let s = store().await;
  let z = savanna(&s).await;
  s.add_enclosure("aviary".into()).await.unwrap();

  let all = s.list_enclosures(false).await.unwrap();
  let names: Vec<_> = all.iter().map(|e| e.name.as_str()).collect();
  assert_eq!(names, vec!["aviary", "Savanna"]);

  let active = s.list_enclosures(true).await.unwrap();
  assert_eq!(active.len(), 1);
  assert_eq!(active[0].enclosure_id, z.enclosure.enclosure_id);
}

#[tokio::test]
async fn duplicate_names_conflict() {
  let s = store().await;
  let z = savanna(&s).await;

  let err = s.add_enclosure("Savanna".into()).await.unwrap_err();
  assert!(matches!(core_err(err), CoreError::Conflict(_)));

  let err = s.add_user("keeper".into()).await.unwrap_err();
  assert!(matches!(core_err(err), CoreError::Conflict(_)));

  // Individuals and groups share one accession namespace.
  let err = s
    .add_group(NewGroup {
      accession_number: "A101".into(),
      population:       Population::default(),
      species_id:       z.zebra.species_id,
      enclosure_id:     None,
    })
    .await
    .unwrap_err();
  assert!(matches!(core_err(err), CoreError::Conflict(_)));
}

#[tokio::test]
async fn registry_rejects_unknown_references() {
  let s = store().await;
  let z = savanna(&s).await;

  let err = s
    .add_individual(NewIndividual {
      accession_number: "A999".into(),
      name:             "Ghost".into(),
      identifier:       String::new(),
      sex:              Sex::Unknown,
      species_id:       Uuid::new_v4(),
      enclosure_id:     None,
    })
    .await
    .unwrap_err();
  assert!(matches!(core_err(err), CoreError::SpeciesNotFound(_)));

  let subject = SubjectRef::Group(z.group.group_id);
  let err = s.assign_enclosure(subject, Some(Uuid::new_v4())).await.unwrap_err();
  assert!(matches!(core_err(err), CoreError::EnclosureNotFound(_)));

  let err = s
    .set_active(SubjectRef::Individual(Uuid::new_v4()), false)
    .await
    .unwrap_err();
  assert!(matches!(core_err(err), CoreError::SubjectNotFound(_)));

  let err = s
    .set_active(SubjectRef::Species(z.zebra.species_id), false)
    .await
    .unwrap_err();
  assert!(matches!(core_err(err), CoreError::NotAssignable(_)));
}

#[tokio::test]
async fn assigning_moves_a_subject_between_enclosures() {
  let s = store().await;
  let z = savanna(&s).await;
  let paddock = s.add_enclosure("Paddock".into()).await.unwrap();
  let subject = SubjectRef::Group(z.group.group_id);

  s.assign_enclosure(subject, Some(paddock.enclosure_id)).await.unwrap();
  let Some(Subject::Group(moved)) = s.get_subject(subject).await.unwrap() else {
    panic!("expected group");
  };
  assert_eq!(moved.enclosure_id, Some(paddock.enclosure_id));
  assert_eq!(s.count_total_subjects(paddock.enclosure_id).await.unwrap(), 1);
  assert_eq!(s.count_total_subjects(z.enclosure.enclosure_id).await.unwrap(), 1);

  s.assign_enclosure(subject, None).await.unwrap();
  let detached = s.get_subject(subject).await.unwrap().unwrap();
  assert_eq!(detached.enclosure_id(), None);
}

#[tokio::test]
async fn deleting_an_enclosure_keeps_observations() {
  let s = store().await;
  let z = savanna(&s).await;
  let subject = SubjectRef::Individual(z.individual.individual_id);

  s.upsert(NewObservation::new(
    z.keeper.user_id,
    z.enclosure.enclosure_id,
    at(10, 9, 0),
    condition_body(z.individual.individual_id, Condition::Seen),
  ))
  .await
  .unwrap();

  assert!(s.delete_enclosure(z.enclosure.enclosure_id).await.unwrap());
  assert!(!s.delete_enclosure(z.enclosure.enclosure_id).await.unwrap());

  let kept = s.resolve(subject, date(2024, 1, 10), None).await.unwrap().unwrap();
  assert_eq!(kept.stamp.enclosure_id, None);
  assert_eq!(s.get_subject(subject).await.unwrap().unwrap().enclosure_id(), None);
}

#[tokio::test]
async fn deleting_a_user_keeps_their_observations() {
  let s = store().await;
  let z = savanna(&s).await;
  let subject = SubjectRef::Individual(z.individual.individual_id);

  s.upsert(NewObservation::new(
    z.keeper.user_id,
    z.enclosure.enclosure_id,
    at(10, 9, 0),
    condition_body(z.individual.individual_id, Condition::Seen),
  ))
  .await
  .unwrap();
  assert!(s.delete_user(z.keeper.user_id).await.unwrap());

  let kept = s.resolve(subject, date(2024, 1, 10), None).await.unwrap().unwrap();
  assert_eq!(kept.stamp.user_id, None);

  // An anonymous re-submission for the same day converges on that record.
  let again = s
    .upsert(NewObservation {
      user_id:      None,
      enclosure_id: Some(z.enclosure.enclosure_id),
      recorded_at:  at(10, 11, 0),
      body:         condition_body(z.individual.individual_id, Condition::Bar),
    })
    .await
    .unwrap();
  assert_eq!(again.observation_id, kept.observation_id);
  assert_eq!(s.history(subject, None, 10, 0).await.unwrap().len(), 1);
}

#[tokio::test]
async fn deleting_a_species_cascades() {
  let s = store().await;
  let z = savanna(&s).await;
  let individual = SubjectRef::Individual(z.individual.individual_id);

  s.upsert(NewObservation::new(
    z.keeper.user_id,
    z.enclosure.enclosure_id,
    at(10, 9, 0),
    condition_body(z.individual.individual_id, Condition::Seen),
  ))
  .await
  .unwrap();

  assert!(s.delete_subject(SubjectRef::Species(z.zebra.species_id)).await.unwrap());
  assert!(s.get_subject(individual).await.unwrap().is_none());
  assert!(s.get_subject(SubjectRef::Group(z.group.group_id)).await.unwrap().is_none());
  assert!(s.history(individual, None, 10, 0).await.unwrap().is_empty());
  assert_eq!(s.count_total_subjects(z.enclosure.enclosure_id).await.unwrap(), 0);
}
