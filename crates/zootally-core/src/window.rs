//! Trailing windows, one authoritative record per prior day.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{calendar::prior_days, latest::first_per_group, observation::Observation};

/// One day of a trailing window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowEntry {
  pub day:         NaiveDate,
  /// `None` is the zero-fill placeholder for a day nobody observed.
  pub observation: Option<Observation>,
}

impl WindowEntry {
  pub fn is_observed(&self) -> bool { self.observation.is_some() }

  /// Headline count for numeric subjects: the species count or the
  /// group's seen count. Zero for unobserved days and for individuals.
  pub fn count(&self) -> u32 {
    let Some(observation) = &self.observation else { return 0 };
    if let Some(s) = observation.as_species() {
      s.count
    } else if let Some(g) = observation.as_group() {
      g.count_seen
    } else {
      0
    }
  }
}

/// Assemble a window of exactly `max(days, 0)` entries, most recent first,
/// covering `[reference - days, reference)`.
///
/// `rows` must be ordered by `(day DESC, recorded_at DESC, id DESC)`, which
/// is how stores return the single range query backing a window. Rows
/// outside the window are ignored.
pub fn build_window(
  rows: impl IntoIterator<Item = Observation>,
  reference: NaiveDate,
  days: i64,
) -> Vec<WindowEntry> {
  let mut by_day: HashMap<NaiveDate, Observation> =
    first_per_group(rows, |o| o.stamp.day)
      .into_iter()
      .map(|o| (o.stamp.day, o))
      .collect();

  prior_days(reference, days)
    .map(|day| WindowEntry { day, observation: by_day.remove(&day) })
    .collect()
}
