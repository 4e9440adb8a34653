use std::collections::HashSet;

use chrono::{
  DateTime,
  Datelike,
  Duration,
  FixedOffset,
  NaiveDate,
  NaiveTime
};
use serde::Serialize;
use tracing::{
  debug,
  trace,
  warn
};

use crate::datetime::{
  add_days,
  combine,
  first_day_of_month,
  local_midnight,
  parse_calendar_date,
  parse_clock_time,
  shift_months
};
use crate::schedule::{
  Frequency,
  RecurrenceRule,
  Schedule,
  ScheduleDates,
  ScheduleOccurrence,
  SelectedDate
};

/// Result of expanding one schedule.
///
/// An empty `instants` list is a valid
/// outcome: the rule currently matches no
/// dates.
#[derive(
  Debug, Clone, Default, PartialEq, Eq,
)]
pub struct Expansion {
  pub instants: Vec<DateTime<FixedOffset>>,
  /// Entries dropped because their date or
  /// time could not be parsed.
  pub skipped:  usize
}

impl Expansion {
  #[must_use]
  pub fn is_empty(&self) -> bool {
    self.instants.is_empty()
  }

  #[must_use]
  pub fn len(&self) -> usize {
    self.instants.len()
  }

  /// The schedule form only accepts a rule
  /// that yields at least one date.
  #[must_use]
  pub fn is_submittable(&self) -> bool {
    !self.instants.is_empty()
  }

  fn finish(mut self) -> Self {
    self.instants.sort();
    self.instants.dedup();
    self
  }
}

/// Time-of-day policy applied to every
/// generated date.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq,
)]
pub enum Clock {
  AllDay,
  At(NaiveTime)
}

impl Clock {
  fn stamp(
    self,
    date: NaiveDate
  ) -> Option<DateTime<FixedOffset>> {
    match self {
      | Self::AllDay => {
        local_midnight(date)
      }
      | Self::At(time) => {
        combine(date, time)
      }
    }
  }
}

/// Calendar days matched by a repeat
/// rule, ascending and without duplicates.
#[tracing::instrument(
  skip(rule),
  fields(
    frequency = ?rule.frequency,
    interval = rule.interval
  )
)]
pub fn rule_dates(
  rule: &RecurrenceRule
) -> Vec<NaiveDate> {
  if rule.interval < 1 {
    debug!(
      "interval below one; rule \
       matches nothing"
    );
    return vec![];
  }
  if rule.start_date > rule.end_date {
    debug!(
      start = %rule.start_date,
      end = %rule.end_date,
      "start after end; rule matches \
       nothing"
    );
    return vec![];
  }

  let mut dates = match rule.frequency {
    | Frequency::Day => daily_dates(rule),
    | Frequency::Week => {
      weekly_dates(rule)
    }
    | Frequency::Month => {
      monthly_dates(rule)
    }
  };

  dates.sort();
  dates.dedup();
  trace!(
    count = dates.len(),
    "rule dates generated"
  );
  dates
}

fn daily_dates(
  rule: &RecurrenceRule
) -> Vec<NaiveDate> {
  let step = Duration::days(i64::from(
    rule.interval
  ));
  let mut out = Vec::new();
  let mut current = rule.start_date;

  while current <= rule.end_date {
    out.push(current);
    match current.checked_add_signed(step)
    {
      | Some(next) => current = next,
      | None => break
    }
  }

  out
}

// Scans seven-day blocks from the start
// date. Every selected weekday inside a
// block is emitted, then `interval - 1`
// whole blocks are skipped, so the same
// weekday recurs every `interval` weeks.
fn weekly_dates(
  rule: &RecurrenceRule
) -> Vec<NaiveDate> {
  if rule.days_of_week.is_empty() {
    return vec![];
  }

  let stride = Duration::days(
    i64::from(rule.interval) * 7
  );
  let mut out = Vec::new();
  let mut block_start = rule.start_date;

  while block_start <= rule.end_date {
    for offset in 0..7 {
      let Some(current) = block_start
        .checked_add_signed(Duration::days(
          offset
        ))
      else {
        break;
      };
      if current > rule.end_date {
        break;
      }
      if rule
        .days_of_week
        .contains(&current.weekday())
      {
        out.push(current);
      }
    }

    match block_start
      .checked_add_signed(stride)
    {
      | Some(next) => block_start = next,
      | None => break
    }
  }

  out
}

// Interval is not applied to the month
// stride. Day numbers past the end of a
// month roll over into the next month
// before the range check.
fn monthly_dates(
  rule: &RecurrenceRule
) -> Vec<NaiveDate> {
  let days = rule
    .days_of_month
    .iter()
    .copied()
    .filter(|day| {
      let valid = (1..=31).contains(day);
      if !valid {
        warn!(
          day,
          "ignoring day of month outside \
           1..=31"
        );
      }
      valid
    })
    .collect::<Vec<_>>();
  if days.is_empty() {
    return vec![];
  }

  let mut out = Vec::new();
  let mut month_start =
    first_day_of_month(
      rule.start_date.year(),
      rule.start_date.month()
    );
  let last_month = first_day_of_month(
    rule.end_date.year(),
    rule.end_date.month()
  );

  while month_start <= last_month {
    for day in &days {
      let date = add_days(
        month_start,
        i64::from(*day) - 1
      );
      if date >= rule.start_date
        && date <= rule.end_date
      {
        out.push(date);
      }
    }

    let next =
      shift_months(month_start, 1);
    if next <= month_start {
      break;
    }
    month_start = next;
  }

  out
}

#[must_use]
pub fn expand_rule(
  rule: &RecurrenceRule,
  clock: Clock
) -> Expansion {
  let mut expansion =
    Expansion::default();
  for date in rule_dates(rule) {
    match clock.stamp(date) {
      | Some(instant) => {
        expansion.instants.push(instant)
      }
      | None => {
        warn!(%date, "could not stamp generated date");
        expansion.skipped += 1;
      }
    }
  }
  expansion.finish()
}

/// Expands the one-off date picker
/// entries. Malformed pairs are skipped
/// and counted; an empty time means
/// midnight.
#[must_use]
pub fn expand_selected_dates(
  selected: &[SelectedDate],
  all_day: bool
) -> Expansion {
  let mut expansion =
    Expansion::default();

  for entry in selected {
    let Some(date) =
      parse_calendar_date(&entry.date)
    else {
      warn!(
        date = %entry.date,
        "skipping malformed date"
      );
      expansion.skipped += 1;
      continue;
    };

    let clock = if all_day
      || entry.time.trim().is_empty()
    {
      Clock::AllDay
    } else {
      match parse_clock_time(&entry.time)
      {
        | Some(time) => Clock::At(time),
        | None => {
          warn!(
            date = %entry.date,
            time = %entry.time,
            "skipping malformed time"
          );
          expansion.skipped += 1;
          continue;
        }
      }
    };

    match clock.stamp(date) {
      | Some(instant) => {
        expansion.instants.push(instant)
      }
      | None => expansion.skipped += 1
    }
  }

  expansion.finish()
}

#[tracing::instrument(
  skip(schedule),
  fields(schedule_id = schedule.id)
)]
pub fn expand_schedule(
  schedule: &Schedule
) -> Expansion {
  let expansion = match &schedule.dates {
    | ScheduleDates::Once {
      selected_dates
    } => expand_selected_dates(
      selected_dates,
      schedule.all_day
    ),
    | ScheduleDates::Repeat(rule) => {
      match repeat_clock(schedule) {
        | Some(clock) => {
          expand_rule(rule, clock)
        }
        | None => {
          Expansion {
            instants: vec![],
            skipped:  1
          }
        }
      }
    }
  };

  debug!(
    count = expansion.len(),
    skipped = expansion.skipped,
    "expanded schedule"
  );
  expansion
}

fn repeat_clock(
  schedule: &Schedule
) -> Option<Clock> {
  if schedule.all_day {
    return Some(Clock::AllDay);
  }

  let raw = schedule
    .time
    .as_deref()
    .map(str::trim)
    .unwrap_or_default();
  if raw.is_empty() {
    return Some(Clock::AllDay);
  }

  let parsed =
    parse_clock_time(raw).map(Clock::At);
  if parsed.is_none() {
    warn!(
      time = raw,
      "malformed repeat time; schedule \
       yields no occurrences"
    );
  }
  parsed
}

/// Occurrences of every schedule, in input
/// order, with duplicate
/// `(schedule, instant)` pairs removed.
#[derive(
  Debug,
  Clone,
  Default,
  PartialEq,
  Eq,
  Serialize,
)]
pub struct OccurrenceSet {
  pub occurrences:
    Vec<ScheduleOccurrence>,
  pub skipped:     usize
}

#[tracing::instrument(skip_all, fields(schedules = schedules.len()))]
pub fn collect_occurrences(
  schedules: &[Schedule]
) -> OccurrenceSet {
  let mut seen = HashSet::new();
  let mut set = OccurrenceSet::default();

  for schedule in schedules {
    let expansion =
      expand_schedule(schedule);
    set.skipped += expansion.skipped;

    for instant in expansion.instants {
      if !seen
        .insert((schedule.id, instant))
      {
        trace!(
          schedule_id = schedule.id,
          %instant,
          "dropping duplicate occurrence"
        );
        continue;
      }
      set.occurrences.push(
        ScheduleOccurrence::from_schedule(
          schedule, instant
        )
      );
    }
  }

  debug!(
    occurrences = set.occurrences.len(),
    skipped = set.skipped,
    "collected occurrences"
  );
  set
}
