//! Calendar-day arithmetic.
//!
//! A calendar day is the date of an instant in the configured time zone.
//! Nothing here reads the system clock; callers pass `now` in.

use chrono::{DateTime, Datelike, Days, NaiveDate, Utc};
use chrono_tz::Tz;

/// Longest trailing window a store will build.
pub const MAX_WINDOW_DAYS: i64 = 366;

/// Days are stored as `YYYY-MM-DD` text, which only sorts chronologically
/// for four-digit years.
pub fn is_storable(day: NaiveDate) -> bool { (0..=9999).contains(&day.year()) }

/// The calendar day `at` falls on in `tz`.
pub fn calendar_day(at: DateTime<Utc>, tz: Tz) -> NaiveDate {
  at.with_timezone(&tz).date_naive()
}

/// The `days` days before `reference`, most recent first: `reference - 1`,
/// `reference - 2`, ... `reference - days`. Empty when `days <= 0`; stops
/// early at the start of the representable calendar.
pub fn prior_days(
  reference: NaiveDate,
  days: i64,
) -> impl Iterator<Item = NaiveDate> {
  let days = u64::try_from(days).unwrap_or(0);
  (1..=days).map_while(move |offset| reference.checked_sub_days(Days::new(offset)))
}

/// The half-open range `[reference - days, reference)` covered by a
/// trailing window, or `None` when the window is empty or its start is
/// not representable.
pub fn window_range(
  reference: NaiveDate,
  days: i64,
) -> Option<(NaiveDate, NaiveDate)> {
  let days = u64::try_from(days).ok().filter(|d| *d > 0)?;
  Some((reference.checked_sub_days(Days::new(days))?, reference))
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;

  use super::*;

  fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
  }

  #[test]
  fn day_is_taken_in_the_configured_zone() {
    // 03:30 UTC is still the previous evening in Chicago.
    let at = Utc.with_ymd_and_hms(2024, 1, 10, 3, 30, 0).unwrap();
    assert_eq!(calendar_day(at, Tz::UTC), date(2024, 1, 10));
    assert_eq!(calendar_day(at, chrono_tz::America::Chicago), date(2024, 1, 9));
  }

  #[test]
  fn prior_days_excludes_the_reference_day() {
    let days: Vec<_> = prior_days(date(2024, 1, 11), 3).collect();
    assert_eq!(days, vec![date(2024, 1, 10), date(2024, 1, 9), date(2024, 1, 8)]);
  }

  #[test]
  fn prior_days_crosses_month_boundaries() {
    let days: Vec<_> = prior_days(date(2024, 3, 1), 2).collect();
    assert_eq!(days, vec![date(2024, 2, 29), date(2024, 2, 28)]);
  }

  #[test]
  fn non_positive_windows_are_empty() {
    assert_eq!(prior_days(date(2024, 1, 11), 0).count(), 0);
    assert_eq!(prior_days(date(2024, 1, 11), -4).count(), 0);
    assert_eq!(window_range(date(2024, 1, 11), 0), None);
  }

  #[test]
  fn window_range_is_half_open() {
    assert_eq!(
      window_range(date(2024, 1, 11), 3),
      Some((date(2024, 1, 8), date(2024, 1, 11)))
    );
  }

  #[test]
  fn windows_past_the_start_of_the_calendar_do_not_panic() {
    assert_eq!(window_range(date(2024, 1, 11), 200_000_000), None);
    assert_eq!(window_range(date(2024, 1, 11), i64::MAX), None);
    assert_eq!(window_range(NaiveDate::MIN, 1), None);
    assert_eq!(prior_days(NaiveDate::MIN + Days::new(2), 5).count(), 2);
  }

  #[test]
  fn only_four_digit_years_are_storable() {
    assert!(is_storable(date(2024, 1, 10)));
    assert!(is_storable(date(0, 1, 1)));
    assert!(!is_storable(date(10_000, 1, 1)));
    assert!(!is_storable(date(-1, 12, 31)));
  }
}
