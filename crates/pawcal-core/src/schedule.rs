use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use anyhow::{
  Context,
  anyhow
};
use chrono::{
  DateTime,
  FixedOffset,
  NaiveDate,
  Weekday
};
use serde::{
  Deserialize,
  Serialize
};

use crate::datetime::{
  DateKey,
  normalize
};

#[derive(
  Debug,
  Clone,
  Copy,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
  Hash,
  Default,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum Priority {
  Low,
  #[default]
  Medium,
  High
}

impl Priority {
  /// Sort weight; higher is more urgent.
  #[must_use]
  pub fn weight(self) -> u8 {
    match self {
      | Self::Low => 1,
      | Self::Medium => 2,
      | Self::High => 3
    }
  }

  #[must_use]
  pub fn label(self) -> &'static str {
    match self {
      | Self::Low => "LOW",
      | Self::Medium => "MEDIUM",
      | Self::High => "HIGH"
    }
  }
}

#[derive(
  Debug,
  Clone,
  Copy,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum Frequency {
  Day,
  Week,
  Month
}

/// Repeat rule as submitted by the
/// schedule form. Dates are business
/// calendar days, both ends inclusive.
#[derive(
  Debug, Clone, Serialize, Deserialize,
)]
#[serde(rename_all = "camelCase")]
pub struct RecurrenceRule {
  pub frequency:     Frequency,
  pub interval:      u32,
  pub start_date:    NaiveDate,
  pub end_date:      NaiveDate,
  #[serde(default)]
  pub days_of_week:  Vec<Weekday>,
  #[serde(default)]
  pub days_of_month: BTreeSet<u32>
}

impl RecurrenceRule {
  #[must_use]
  pub fn daily(
    interval: u32,
    start_date: NaiveDate,
    end_date: NaiveDate
  ) -> Self {
    Self {
      frequency: Frequency::Day,
      interval,
      start_date,
      end_date,
      days_of_week: vec![],
      days_of_month: BTreeSet::new()
    }
  }

  #[must_use]
  pub fn weekly(
    interval: u32,
    days_of_week: Vec<Weekday>,
    start_date: NaiveDate,
    end_date: NaiveDate
  ) -> Self {
    Self {
      frequency: Frequency::Week,
      interval,
      start_date,
      end_date,
      days_of_week,
      days_of_month: BTreeSet::new()
    }
  }

  #[must_use]
  pub fn monthly(
    days_of_month: BTreeSet<u32>,
    start_date: NaiveDate,
    end_date: NaiveDate
  ) -> Self {
    Self {
      frequency: Frequency::Month,
      interval: 1,
      start_date,
      end_date,
      days_of_week: vec![],
      days_of_month
    }
  }
}

/// One `(date, time)` pair picked in the
/// one-off date picker. Kept as raw text
/// because malformed entries are skipped
/// during expansion rather than rejected.
#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
)]
pub struct SelectedDate {
  pub date: String,
  #[serde(default)]
  pub time: String
}

impl SelectedDate {
  pub fn new(
    date: impl Into<String>,
    time: impl Into<String>
  ) -> Self {
    Self {
      date: date.into(),
      time: time.into()
    }
  }
}

#[derive(
  Debug, Clone, Serialize, Deserialize,
)]
#[serde(
  tag = "kind",
  rename_all = "lowercase"
)]
pub enum ScheduleDates {
  Once {
    #[serde(
      rename = "selectedDates",
      default
    )]
    selected_dates: Vec<SelectedDate>
  },
  Repeat(RecurrenceRule)
}

/// Schedule record supplied by the
/// schedule service.
#[derive(
  Debug, Clone, Serialize, Deserialize,
)]
#[serde(rename_all = "camelCase")]
pub struct Schedule {
  pub id:          u64,
  pub title:       String,
  #[serde(default)]
  pub priority:    Priority,
  pub category_id: u64,
  #[serde(default)]
  pub pet_ids:     Vec<u64>,
  #[serde(default)]
  pub all_day:     bool,
  /// Time of day applied to every repeat
  /// occurrence. Ignored for all-day and
  /// one-off schedules.
  #[serde(default)]
  pub time:        Option<String>,
  #[serde(flatten)]
  pub dates:       ScheduleDates
}

/// Composite selection key: a schedule on
/// one particular day.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  PartialOrd,
  Ord,
  Serialize,
  Deserialize,
)]
pub struct ScheduleKey {
  pub schedule_id: u64,
  pub date:        DateKey
}

impl ScheduleKey {
  #[must_use]
  pub fn new(
    schedule_id: u64,
    date: DateKey
  ) -> Self {
    Self {
      schedule_id,
      date
    }
  }
}

impl fmt::Display for ScheduleKey {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    write!(
      f,
      "{}@{}",
      self.schedule_id, self.date
    )
  }
}

impl FromStr for ScheduleKey {
  type Err = anyhow::Error;

  fn from_str(
    s: &str
  ) -> Result<Self, Self::Err> {
    let (id, date) =
      s.split_once('@').ok_or_else(
        || {
          anyhow!(
            "expected ID@YYYY-MM-DD, \
             got: {s}"
          )
        }
      )?;
    let schedule_id = id
      .trim()
      .parse::<u64>()
      .with_context(|| {
        format!(
          "invalid schedule id in {s}"
        )
      })?;
    let date = DateKey::parse(date);
    if date.is_unknown() {
      return Err(anyhow!(
        "invalid date in schedule key: \
         {s}"
      ));
    }
    Ok(Self::new(schedule_id, date))
  }
}

/// One concrete calendar instant of a
/// schedule.
#[derive(
  Debug,
  Clone,
  Serialize,
  PartialEq,
  Eq,
)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleOccurrence {
  pub schedule_id: u64,
  pub title:       String,
  pub priority:    Priority,
  pub category_id: u64,
  pub pet_ids:     Vec<u64>,
  pub timestamp:   DateTime<FixedOffset>,
  pub all_day:     bool
}

impl ScheduleOccurrence {
  #[must_use]
  pub fn from_schedule(
    schedule: &Schedule,
    timestamp: DateTime<FixedOffset>
  ) -> Self {
    Self {
      schedule_id: schedule.id,
      title: schedule.title.clone(),
      priority: schedule.priority,
      category_id: schedule.category_id,
      pet_ids: schedule.pet_ids.clone(),
      timestamp,
      all_day: schedule.all_day
    }
  }

  #[must_use]
  pub fn date_key(&self) -> DateKey {
    normalize(Some(&self.timestamp))
  }

  #[must_use]
  pub fn schedule_key(
    &self
  ) -> ScheduleKey {
    ScheduleKey::new(
      self.schedule_id,
      self.date_key()
    )
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parses_repeat_schedule_record() {
    let raw = r#"{
      "id": 7,
      "title": "Walk Bori",
      "priority": "HIGH",
      "categoryId": 2,
      "petIds": [9, 11],
      "allDay": false,
      "time": "08:30",
      "kind": "repeat",
      "frequency": "WEEK",
      "interval": 1,
      "startDate": "2024-01-01",
      "endDate": "2024-01-14",
      "daysOfWeek": ["MONDAY", "Wed"]
    }"#;

    let schedule: Schedule =
      serde_json::from_str(raw)
        .expect("parse schedule");
    assert_eq!(
      schedule.priority,
      Priority::High
    );
    assert_eq!(
      schedule.pet_ids,
      vec![9, 11]
    );
    let ScheduleDates::Repeat(rule) =
      &schedule.dates
    else {
      panic!("expected repeat rule");
    };
    assert_eq!(
      rule.frequency,
      Frequency::Week
    );
    assert_eq!(
      rule.days_of_week,
      vec![Weekday::Mon, Weekday::Wed]
    );
    assert!(
      rule.days_of_month.is_empty()
    );
  }

  #[test]
  fn parses_one_off_schedule_record() {
    let raw = r#"{
      "id": 3,
      "title": "Vet visit",
      "categoryId": 1,
      "kind": "once",
      "selectedDates": [
        {"date": "2024-02-10", "time": "14:00"},
        {"date": "2024-02-31", "time": "10:00"}
      ]
    }"#;

    let schedule: Schedule =
      serde_json::from_str(raw)
        .expect("parse schedule");
    assert_eq!(
      schedule.priority,
      Priority::Medium
    );
    assert!(!schedule.all_day);
    let ScheduleDates::Once {
      selected_dates
    } = &schedule.dates
    else {
      panic!("expected one-off dates");
    };
    assert_eq!(selected_dates.len(), 2);
  }

  #[test]
  fn schedule_key_round_trips_through_text()
   {
    let key: ScheduleKey = "12@2024-01-03"
      .parse()
      .expect("parse key");
    assert_eq!(key.schedule_id, 12);
    assert_eq!(
      key.to_string(),
      "12@2024-01-03"
    );
    assert!(
      "12@not-a-date"
        .parse::<ScheduleKey>()
        .is_err()
    );
    assert!(
      "2024-01-03"
        .parse::<ScheduleKey>()
        .is_err()
    );
  }

  #[test]
  fn priority_weights_are_ordered() {
    assert!(
      Priority::High.weight()
        > Priority::Medium.weight()
    );
    assert!(
      Priority::Medium.weight()
        > Priority::Low.weight()
    );
  }
}
