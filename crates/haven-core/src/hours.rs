//! Business-hours-aware elapsed-time calculation.
//!
//! Windows are naive UTC — time zones and holidays are deliberately out of
//! scope for this schedule. Policies that are not business-hours-scoped use
//! plain wall-clock subtraction instead (see `haven-sla`).

use chrono::{DateTime, Datelike, Duration, NaiveTime, Utc};

/// One `(open, close)` window per weekday, indexed Monday = 0. A `None` entry
/// means the whole day is outside business hours.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusinessHours {
  windows: [Option<(NaiveTime, NaiveTime)>; 7],
}

impl Default for BusinessHours {
  /// Monday–Friday, 09:00–17:00 UTC.
  fn default() -> Self {
    let open = NaiveTime::from_hms_opt(9, 0, 0).unwrap();
    let close = NaiveTime::from_hms_opt(17, 0, 0).unwrap();
    let weekday = Some((open, close));
    Self {
      windows: [weekday, weekday, weekday, weekday, weekday, None, None],
    }
  }
}

impl BusinessHours {
  /// A schedule with the same window every day of the week.
  pub fn every_day(open: NaiveTime, close: NaiveTime) -> Self {
    Self { windows: [Some((open, close)); 7] }
  }

  /// Replace the window for one weekday (Monday = 0). `None` closes the day.
  pub fn with_window(
    mut self,
    weekday: usize,
    window: Option<(NaiveTime, NaiveTime)>,
  ) -> Self {
    self.windows[weekday] = window;
    self
  }

  /// Minutes of `[from, to]` that fall inside the configured windows,
  /// computed by walking each calendar day and intersecting its window with
  /// the span. Returns 0 when `to <= from`.
  pub fn elapsed_minutes(
    &self,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
  ) -> i64 {
    if to <= from {
      return 0;
    }

    let mut total = Duration::zero();
    let mut day = from.date_naive();
    let last = to.date_naive();

    while day <= last {
      let idx = day.weekday().num_days_from_monday() as usize;
      if let Some((open, close)) = self.windows[idx] {
        let window_start = day.and_time(open).and_utc();
        let window_end = day.and_time(close).and_utc();

        let start = window_start.max(from);
        let end = window_end.min(to);
        if end > start {
          total += end - start;
        }
      }
      day += Duration::days(1);
    }

    total.num_minutes()
  }
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;

  use super::*;

  fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
  }

  #[test]
  fn span_inside_one_window() {
    let hours = BusinessHours::default();
    // Monday 2024-01-08, 10:00 -> 11:30.
    assert_eq!(
      hours.elapsed_minutes(at(2024, 1, 8, 10, 0), at(2024, 1, 8, 11, 30)),
      90
    );
  }

  #[test]
  fn span_clipped_to_window_edges() {
    let hours = BusinessHours::default();
    // 07:00 -> 18:00 on a Monday only counts 09:00 -> 17:00.
    assert_eq!(
      hours.elapsed_minutes(at(2024, 1, 8, 7, 0), at(2024, 1, 8, 18, 0)),
      8 * 60
    );
  }

  #[test]
  fn weekend_contributes_nothing() {
    let hours = BusinessHours::default();
    // Saturday 2024-01-06 -> Sunday 2024-01-07.
    assert_eq!(
      hours.elapsed_minutes(at(2024, 1, 6, 9, 0), at(2024, 1, 7, 17, 0)),
      0
    );
  }

  #[test]
  fn overnight_span_crosses_days() {
    let hours = BusinessHours::default();
    // Monday 16:00 -> Tuesday 10:00: 60 min Monday + 60 min Tuesday.
    assert_eq!(
      hours.elapsed_minutes(at(2024, 1, 8, 16, 0), at(2024, 1, 9, 10, 0)),
      120
    );
  }

  #[test]
  fn friday_to_monday_skips_the_weekend() {
    let hours = BusinessHours::default();
    // Friday 2024-01-05 16:00 -> Monday 2024-01-08 10:00.
    assert_eq!(
      hours.elapsed_minutes(at(2024, 1, 5, 16, 0), at(2024, 1, 8, 10, 0)),
      120
    );
  }

  #[test]
  fn reversed_span_is_zero() {
    let hours = BusinessHours::default();
    assert_eq!(
      hours.elapsed_minutes(at(2024, 1, 8, 12, 0), at(2024, 1, 8, 11, 0)),
      0
    );
  }
}
