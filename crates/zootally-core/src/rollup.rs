//! Per-enclosure rollups over authoritative daily records.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::observation::{Condition, Observation};

// ─── Aggregate ───────────────────────────────────────────────────────────────

/// The authoritative record of every observed active individual and group
/// across a set of enclosures for one day. Subjects nobody observed are
/// simply absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnclosureCounts {
  /// Ordered by accession number.
  pub individuals: Vec<Observation>,
  /// Ordered by accession number.
  pub groups:      Vec<Observation>,
}

impl EnclosureCounts {
  /// Distinct subjects with at least one observation.
  pub fn observed_subjects(&self) -> usize {
    self.individuals.len() + self.groups.len()
  }

  /// The portion of these counts recorded in `enclosure_id`.
  pub fn for_enclosure(&self, enclosure_id: Uuid) -> EnclosureCounts {
    let keep = |o: &&Observation| o.stamp.enclosure_id == Some(enclosure_id);
    EnclosureCounts {
      individuals: self.individuals.iter().filter(keep).cloned().collect(),
      groups:      self.groups.iter().filter(keep).cloned().collect(),
    }
  }

  fn partition(&self) -> HashMap<Uuid, EnclosureCounts> {
    let mut parts: HashMap<Uuid, EnclosureCounts> = HashMap::new();
    for o in &self.individuals {
      if let Some(id) = o.stamp.enclosure_id {
        parts.entry(id).or_default().individuals.push(o.clone());
      }
    }
    for o in &self.groups {
      if let Some(id) = o.stamp.enclosure_id {
        parts.entry(id).or_default().groups.push(o.clone());
      }
    }
    parts
  }
}

// ─── Summary ─────────────────────────────────────────────────────────────────

/// Active-roster sizes for one enclosure; no observation access needed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterTotals {
  pub enclosure_id:     Uuid,
  pub individuals:      u32,
  pub groups:           u32,
  /// Sum of the active groups' total population.
  pub group_population: u32,
}

impl RosterTotals {
  pub fn total_subjects(&self) -> u32 { self.individuals.saturating_add(self.groups) }
}

/// Dashboard line for one enclosure on one day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnclosureSummary {
  pub enclosure_id:             Uuid,
  pub day:                      NaiveDate,
  /// Individuals whose authoritative condition is an observed condition.
  pub individuals_observed:     u32,
  /// Authoritative individual records per condition; every condition is
  /// present.
  pub conditions:               BTreeMap<Condition, u32>,
  pub groups_seen:              u64,
  pub groups_bar:               u64,
  pub groups_needing_attention: u32,
  /// `groups_seen + groups_bar`.
  pub groups_counted:           u64,
  pub total_individuals:        u32,
  pub total_group_population:   u32,
  /// Distinct individuals and groups with any record that day.
  pub observed_subjects:        u32,
  pub total_subjects:           u32,
}

impl EnclosureSummary {
  /// Summarise `counts`, which must already be scoped to the enclosure of
  /// `totals`.
  pub fn new(
    totals: &RosterTotals,
    day: NaiveDate,
    counts: &EnclosureCounts,
  ) -> Self {
    let mut conditions: BTreeMap<Condition, u32> =
      Condition::ALL.into_iter().map(|c| (c, 0)).collect();
    for condition in counts.individuals.iter().filter_map(Observation::condition) {
      *conditions.entry(condition).or_default() += 1;
    }
    let individuals_observed: u32 = conditions
      .iter()
      .filter(|(c, _)| c.is_observed())
      .map(|(_, n)| n)
      .sum();

    let groups = counts.groups.iter().filter_map(Observation::as_group);
    // Group counts are caller-supplied and unbounded; sum them wide.
    let (mut seen, mut bar, mut attention) = (0u64, 0u64, 0u32);
    for g in groups {
      seen += u64::from(g.count_seen);
      bar += u64::from(g.count_bar);
      attention += u32::from(g.needs_attention);
    }

    Self {
      enclosure_id: totals.enclosure_id,
      day,
      individuals_observed,
      conditions,
      groups_seen: seen,
      groups_bar: bar,
      groups_needing_attention: attention,
      groups_counted: seen + bar,
      total_individuals: totals.individuals,
      total_group_population: totals.group_population,
      observed_subjects: u32::try_from(counts.observed_subjects()).unwrap_or(u32::MAX),
      total_subjects: totals.total_subjects(),
    }
  }
}

/// Summarise every enclosure in `totals`, in that order, from one
/// multi-enclosure aggregate.
pub fn summarize(
  totals: &[RosterTotals],
  day: NaiveDate,
  counts: &EnclosureCounts,
) -> Vec<EnclosureSummary> {
  let mut parts = counts.partition();
  totals
    .iter()
    .map(|t| {
      let scoped = parts.remove(&t.enclosure_id).unwrap_or_default();
      EnclosureSummary::new(t, day, &scoped)
    })
    .collect()
}

#[cfg(test)]
mod tests {
  use chrono::{TimeZone, Utc};

  use super::*;
  use crate::observation::{
    GroupObservation, IndividualObservation, ObservationBody, Stamp,
  };

  fn day() -> NaiveDate { NaiveDate::from_ymd_opt(2024, 1, 10).unwrap() }

  fn stamp(enclosure_id: Uuid) -> Stamp {
    Stamp {
      user_id:      None,
      enclosure_id: Some(enclosure_id),
      recorded_at:  Utc.with_ymd_and_hms(2024, 1, 10, 9, 0, 0).unwrap(),
      day:          day(),
    }
  }

  fn individual(id: i64, enclosure_id: Uuid, condition: Condition) -> Observation {
    Observation {
      observation_id: id,
      stamp:          stamp(enclosure_id),
      body:           ObservationBody::Individual(IndividualObservation {
        individual_id: Uuid::new_v4(),
        condition,
        comment: String::new(),
      }),
    }
  }

  fn group(id: i64, enclosure_id: Uuid, seen: u32, bar: u32, attn: bool) -> Observation {
    Observation {
      observation_id: id,
      stamp:          stamp(enclosure_id),
      body:           ObservationBody::Group(GroupObservation {
        group_id:        Uuid::new_v4(),
        count_total:     10,
        count_seen:      seen,
        count_not_seen:  10u32.saturating_sub(seen),
        count_bar:       bar,
        needs_attention: attn,
        comment:         String::new(),
      }),
    }
  }

  fn totals(enclosure_id: Uuid) -> RosterTotals {
    RosterTotals { enclosure_id, individuals: 3, groups: 2, group_population: 25 }
  }

  #[test]
  fn summary_tallies_conditions_and_group_counts() {
    let e = Uuid::new_v4();
    let counts = EnclosureCounts {
      individuals: vec![
        individual(1, e, Condition::Bar),
        individual(2, e, Condition::Absent),
        individual(3, e, Condition::NeedsAttention),
      ],
      groups:      vec![group(4, e, 6, 2, true), group(5, e, 3, 1, false)],
    };

    let summary = EnclosureSummary::new(&totals(e), day(), &counts);
    assert_eq!(summary.individuals_observed, 2);
    assert_eq!(summary.conditions[&Condition::Absent], 1);
    assert_eq!(summary.conditions[&Condition::Seen], 0);
    assert_eq!(summary.conditions.len(), Condition::ALL.len());
    assert_eq!(summary.groups_seen, 9);
    assert_eq!(summary.groups_bar, 3);
    assert_eq!(summary.groups_counted, 12);
    assert_eq!(summary.groups_needing_attention, 1);
    assert_eq!(summary.observed_subjects, 5);
    assert_eq!(summary.total_subjects, 5);
    assert_eq!(summary.total_group_population, 25);
  }

  #[test]
  fn summarize_keeps_enclosures_apart() {
    let (e1, e2) = (Uuid::new_v4(), Uuid::new_v4());
    let counts = EnclosureCounts {
      individuals: vec![individual(1, e1, Condition::Seen)],
      groups:      vec![group(2, e2, 4, 0, false)],
    };

    let both = summarize(&[totals(e1), totals(e2)], day(), &counts);
    assert_eq!(both.len(), 2);
    assert_eq!(both[0].enclosure_id, e1);
    assert_eq!(both[0].individuals_observed, 1);
    assert_eq!(both[0].groups_seen, 0);
    assert_eq!(both[1].individuals_observed, 0);
    assert_eq!(both[1].groups_seen, 4);

    let only_e1 = summarize(&[totals(e1)], day(), &counts.for_enclosure(e1));
    assert_eq!(only_e1[0], both[0]);
  }

  #[test]
  fn huge_group_counts_do_not_overflow() {
    let e = Uuid::new_v4();
    let counts = EnclosureCounts {
      individuals: vec![],
      groups:      vec![
        group(1, e, 3_000_000_000, 3_000_000_000, false),
        group(2, e, 3_000_000_000, u32::MAX, true),
      ],
    };

    let summary = &summarize(&[totals(e)], day(), &counts)[0];
    assert_eq!(summary.groups_seen, 6_000_000_000);
    assert_eq!(summary.groups_bar, 3_000_000_000 + u64::from(u32::MAX));
    assert_eq!(summary.groups_counted, summary.groups_seen + summary.groups_bar);
    assert_eq!(summary.groups_needing_attention, 1);
  }

  #[test]
  fn unobserved_enclosure_summarises_to_zero() {
    let e = Uuid::new_v4();
    let summary = summarize(&[totals(e)], day(), &EnclosureCounts::default());
    assert_eq!(summary[0].observed_subjects, 0);
    assert_eq!(summary[0].individuals_observed, 0);
    assert_eq!(summary[0].total_subjects, 5);
  }
}
