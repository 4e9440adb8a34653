use std::str::FromStr;

use anyhow::anyhow;
use chrono::{
  Datelike,
  NaiveDate,
  Weekday
};
use serde::Serialize;
use tracing::trace;

use crate::bucket::Buckets;
use crate::datetime::{
  DateKey,
  add_days,
  first_day_of_month,
  last_day_of_month,
  parse_weekday_name,
  shift_months,
  start_of_week
};
use crate::schedule::ScheduleOccurrence;

const DAYS_PER_WEEK: i64 = 7;

#[derive(
  Debug, Clone, Copy, PartialEq, Eq,
)]
pub enum ViewMode {
  Month,
  Week
}

impl ViewMode {
  #[must_use]
  pub fn as_key(self) -> &'static str {
    match self {
      | Self::Month => "month",
      | Self::Week => "week"
    }
  }
}

/// Where the week view starts.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Default,
)]
pub enum WeekAnchor {
  /// The reference date is day 0 of a
  /// rolling seven-day window.
  #[default]
  Reference,
  /// The week containing the reference
  /// date, starting on this weekday.
  StartOf(Weekday)
}

impl WeekAnchor {
  #[must_use]
  pub fn first_day(
    self,
    reference: NaiveDate
  ) -> NaiveDate {
    match self {
      | Self::Reference => reference,
      | Self::StartOf(weekday) => {
        start_of_week(reference, weekday)
      }
    }
  }
}

impl FromStr for WeekAnchor {
  type Err = anyhow::Error;

  fn from_str(
    s: &str
  ) -> Result<Self, Self::Err> {
    let trimmed = s.trim();
    if trimmed
      .eq_ignore_ascii_case("reference")
    {
      return Ok(Self::Reference);
    }
    parse_weekday_name(trimmed)
      .map(Self::StartOf)
      .ok_or_else(|| {
        anyhow!(
          "invalid week anchor: \
           {trimmed} (expected \
           reference or a weekday name)"
        )
      })
  }
}

#[derive(
  Debug,
  Clone,
  PartialEq,
  Eq,
  Serialize,
)]
#[serde(rename_all = "camelCase")]
pub struct CalendarCell {
  pub date:           NaiveDate,
  pub key:            DateKey,
  pub is_other_month: bool,
  pub is_today:       bool,
  pub occurrences:
    Vec<ScheduleOccurrence>
}

impl CalendarCell {
  #[must_use]
  pub fn has_occurrences(&self) -> bool {
    !self.occurrences.is_empty()
  }
}

/// Builds month and week cell grids from
/// a bucketed occurrence set.
#[derive(Debug, Clone, Copy)]
pub struct GridBuilder<'a> {
  buckets: &'a Buckets,
  today:   DateKey,
  anchor:  WeekAnchor
}

impl<'a> GridBuilder<'a> {
  #[must_use]
  pub fn new(
    buckets: &'a Buckets,
    today: DateKey
  ) -> Self {
    Self {
      buckets,
      today,
      anchor: WeekAnchor::default()
    }
  }

  #[must_use]
  pub fn with_week_anchor(
    mut self,
    anchor: WeekAnchor
  ) -> Self {
    self.anchor = anchor;
    self
  }

  /// Sunday-first rows of seven covering
  /// the whole month of `reference`,
  /// padded with adjacent-month days.
  #[tracing::instrument(skip(self))]
  pub fn build_month_grid(
    &self,
    reference: NaiveDate
  ) -> Vec<Vec<CalendarCell>> {
    let (start, end) =
      month_grid_range(reference);
    let total =
      (end - start).num_days() + 1;

    let cells = (0..total)
      .map(|offset| {
        self.cell(
          add_days(start, offset),
          reference
        )
      })
      .collect::<Vec<_>>();

    let rows = cells
      .chunks(DAYS_PER_WEEK as usize)
      .map(<[CalendarCell]>::to_vec)
      .collect::<Vec<_>>();
    trace!(
      rows = rows.len(),
      %start,
      %end,
      "month grid built"
    );
    rows
  }

  /// Exactly seven contiguous days.
  #[tracing::instrument(skip(self))]
  pub fn build_week_grid(
    &self,
    reference: NaiveDate
  ) -> Vec<CalendarCell> {
    let start =
      self.anchor.first_day(reference);
    (0..DAYS_PER_WEEK)
      .map(|offset| {
        self.cell(
          add_days(start, offset),
          reference
        )
      })
      .collect()
  }

  fn cell(
    &self,
    date: NaiveDate,
    reference: NaiveDate
  ) -> CalendarCell {
    let key = DateKey::from_date(date);
    CalendarCell {
      date,
      key,
      is_other_month: date.year()
        != reference.year()
        || date.month()
          != reference.month(),
      is_today: key == self.today,
      occurrences: self
        .buckets
        .get(&key)
        .to_vec()
    }
  }
}

/// First and last day shown by the month
/// grid: Sunday on or before the 1st to
/// Saturday on or after the last day.
#[must_use]
pub fn month_grid_range(
  reference: NaiveDate
) -> (NaiveDate, NaiveDate) {
  let first = first_day_of_month(
    reference.year(),
    reference.month()
  );
  let last = last_day_of_month(
    reference.year(),
    reference.month()
  );
  let start =
    start_of_week(first, Weekday::Sun);
  let trailing = 6
    - i64::from(
      last
        .weekday()
        .num_days_from_sunday()
    );
  (start, add_days(last, trailing))
}

#[must_use]
pub fn previous_month(
  reference: NaiveDate
) -> NaiveDate {
  shift_months(reference, -1)
}

#[must_use]
pub fn next_month(
  reference: NaiveDate
) -> NaiveDate {
  shift_months(reference, 1)
}

#[must_use]
pub fn previous_week(
  reference: NaiveDate
) -> NaiveDate {
  add_days(reference, -DAYS_PER_WEEK)
}

#[must_use]
pub fn next_week(
  reference: NaiveDate
) -> NaiveDate {
  add_days(reference, DAYS_PER_WEEK)
}

/// Moves the reference date `step` pages
/// in the given view. Month pages land on
/// day 1.
#[must_use]
pub fn shift_reference(
  reference: NaiveDate,
  view: ViewMode,
  step: i32
) -> NaiveDate {
  match view {
    | ViewMode::Month => {
      shift_months(reference, step)
    }
    | ViewMode::Week => {
      add_days(
        reference,
        i64::from(step) * DAYS_PER_WEEK
      )
    }
  }
}

#[must_use]
pub fn weekday_labels(
  first: Weekday
) -> Vec<&'static str> {
  let mut labels =
    Vec::with_capacity(7);
  let mut day = first;
  for _ in 0..DAYS_PER_WEEK {
    labels.push(weekday_label(day));
    day = day.succ();
  }
  labels
}

fn weekday_label(
  day: Weekday
) -> &'static str {
  match day {
    | Weekday::Mon => "Mon",
    | Weekday::Tue => "Tue",
    | Weekday::Wed => "Wed",
    | Weekday::Thu => "Thu",
    | Weekday::Fri => "Fri",
    | Weekday::Sat => "Sat",
    | Weekday::Sun => "Sun"
  }
}

#[must_use]
pub fn month_title(
  reference: NaiveDate
) -> String {
  reference.format("%B %Y").to_string()
}

#[must_use]
pub fn week_title(
  cells: &[CalendarCell]
) -> String {
  match (cells.first(), cells.last()) {
    | (Some(first), Some(last)) => {
      format!(
        "{} - {}",
        first.date.format("%Y-%m-%d"),
        last.date.format("%Y-%m-%d")
      )
    }
    | _ => String::new()
  }
}
