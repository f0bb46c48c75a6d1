//! Per-kind table names, so each query family is written once and
//! instantiated for individuals, groups and species.

use zootally_core::registry::SubjectKind;

pub struct KindTable {
  pub kind:         SubjectKind,
  /// The registry table holding subjects of this kind.
  pub subjects:     &'static str,
  /// Primary key of `subjects`; also the subject column of `observations`.
  pub subject_col:  &'static str,
  pub observations: &'static str,
  /// Kind-specific observation columns, in decode order.
  pub payload_cols: &'static str,
}

pub const INDIVIDUALS: KindTable = KindTable {
  kind:         SubjectKind::Individual,
  subjects:     "individuals",
  subject_col:  "individual_id",
  observations: "individual_observations",
  payload_cols: "o.condition, o.comment",
};

pub const GROUPS: KindTable = KindTable {
  kind:         SubjectKind::Group,
  subjects:     "animal_groups",
  subject_col:  "group_id",
  observations: "group_observations",
  payload_cols: "o.count_total, o.count_seen, o.count_not_seen, o.count_bar, \
                 o.needs_attention, o.comment",
};

pub const SPECIES: KindTable = KindTable {
  kind:         SubjectKind::Species,
  subjects:     "species",
  subject_col:  "species_id",
  observations: "species_observations",
  payload_cols: "o.count",
};

pub fn table(kind: SubjectKind) -> &'static KindTable {
  match kind {
    SubjectKind::Individual => &INDIVIDUALS,
    SubjectKind::Group => &GROUPS,
    SubjectKind::Species => &SPECIES,
  }
}

impl KindTable {
  /// Column list for an observation row aliased as `o`; decoded by
  /// [`crate::encode::RawObservation::read`].
  pub fn observation_cols(&self) -> String {
    format!(
      "o.observation_id, o.{}, o.user_id, o.enclosure_id, o.recorded_at, \
       o.calendar_day, {}",
      self.subject_col, self.payload_cols
    )
  }

  /// `SELECT ... FROM <observations> o` with no filter.
  pub fn select_observations(&self) -> String {
    format!("SELECT {} FROM {} o", self.observation_cols(), self.observations)
  }
}

/// `?start, ?start+1, ...` for `n` bound parameters.
pub fn placeholders(start: usize, n: usize) -> String {
  (start..start + n)
    .map(|i| format!("?{i}"))
    .collect::<Vec<_>>()
    .join(", ")
}
