//! "Latest wins" reduction.
//!
//! The authoritative record for a subject on a day is the one with the
//! latest `recorded_at`, ties broken by the highest observation id. Every
//! read path (single subject, whole enclosure sets, trailing windows) uses
//! the same two steps: order rows by `(group key, recency DESC)`, then keep
//! the first row of each group. Stores do the ordering in their query and
//! hand the rows to [`first_per_group`].

use chrono::{DateTime, Utc};

use crate::observation::Observation;

/// Something that can compete to be the authoritative record.
pub trait Recency {
  /// Larger is more recent.
  fn recency(&self) -> (DateTime<Utc>, i64);
}

impl Recency for Observation {
  fn recency(&self) -> (DateTime<Utc>, i64) {
    (self.stamp.recorded_at, self.observation_id)
  }
}

/// Keep the first item of every run of equal keys.
///
/// `items` must already be ordered so that equal keys are adjacent and the
/// winner of each run comes first.
pub fn first_per_group<T, K, F>(items: impl IntoIterator<Item = T>, mut key: F) -> Vec<T>
where
  K: PartialEq,
  F: FnMut(&T) -> K,
{
  let mut out: Vec<T> = Vec::new();
  let mut current: Option<K> = None;
  for item in items {
    let k = key(&item);
    if current.as_ref() != Some(&k) {
      current = Some(k);
      out.push(item);
    }
  }
  out
}

/// The most recent candidate, or `None` for no candidates.
pub fn latest<T: Recency>(items: impl IntoIterator<Item = T>) -> Option<T> {
  items.into_iter().max_by_key(|item| item.recency())
}

/// In-memory form of the ordered-query reduction: sort by `key` ascending
/// and recency descending, then keep the winner of each key.
pub fn latest_per_group<T, K, F>(mut items: Vec<T>, key: F) -> Vec<T>
where
  T: Recency,
  K: Ord,
  F: Fn(&T) -> K,
{
  items.sort_by(|a, b| {
    key(a)
      .cmp(&key(b))
      .then_with(|| b.recency().cmp(&a.recency()))
  });
  first_per_group(items, key)
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;

  use super::*;

  #[derive(Debug, Clone, PartialEq)]
  struct Row {
    key: &'static str,
    at:  u32,
    id:  i64,
  }

  impl Recency for Row {
    fn recency(&self) -> (DateTime<Utc>, i64) {
      (Utc.with_ymd_and_hms(2024, 1, 10, self.at, 0, 0).unwrap(), self.id)
    }
  }

  fn row(key: &'static str, at: u32, id: i64) -> Row { Row { key, at, id } }

  #[test]
  fn first_per_group_keeps_run_heads() {
    let rows = vec![row("a", 14, 2), row("a", 9, 1), row("b", 10, 3)];
    let kept = first_per_group(rows, |r| r.key);
    assert_eq!(kept, vec![row("a", 14, 2), row("b", 10, 3)]);
  }

  #[test]
  fn first_per_group_of_nothing_is_empty() {
    let kept = first_per_group(Vec::<Row>::new(), |r| r.key);
    assert!(kept.is_empty());
  }

  #[test]
  fn latest_prefers_later_timestamp() {
    let winner = latest(vec![row("a", 14, 1), row("a", 9, 2)]).unwrap();
    assert_eq!(winner.id, 1);
  }

  #[test]
  fn latest_breaks_timestamp_ties_by_highest_id() {
    let winner = latest(vec![row("a", 9, 5), row("a", 9, 7), row("a", 9, 6)]).unwrap();
    assert_eq!(winner.id, 7);
  }

  #[test]
  fn latest_of_nothing_is_none() {
    assert!(latest(Vec::<Row>::new()).is_none());
  }

  #[test]
  fn latest_per_group_handles_unordered_input() {
    let rows = vec![
      row("b", 8, 1),
      row("a", 9, 2),
      row("b", 11, 3),
      row("a", 9, 4),
    ];
    let kept = latest_per_group(rows, |r| r.key);
    assert_eq!(kept, vec![row("a", 9, 4), row("b", 11, 3)]);
  }
}
