use std::collections::BTreeMap;
use std::str::FromStr;

use anyhow::anyhow;
use tracing::debug;

use crate::datetime::DateKey;
use crate::schedule::ScheduleOccurrence;

/// Ordering applied inside one day.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Default,
)]
pub enum SortMode {
  #[default]
  TimeAsc,
  TimeDesc,
  PriorityDesc,
  PriorityAsc
}

impl SortMode {
  #[must_use]
  pub fn as_key(self) -> &'static str {
    match self {
      | Self::TimeAsc => "time-asc",
      | Self::TimeDesc => "time-desc",
      | Self::PriorityDesc => {
        "priority-desc"
      }
      | Self::PriorityAsc => {
        "priority-asc"
      }
    }
  }

  /// Stable sort; ties keep the order the
  /// occurrences were supplied in.
  pub fn apply(
    self,
    entries: &mut [ScheduleOccurrence]
  ) {
    match self {
      | Self::TimeAsc => {
        entries
          .sort_by_key(|o| o.timestamp)
      }
      | Self::TimeDesc => {
        entries.sort_by(|a, b| {
          b.timestamp.cmp(&a.timestamp)
        })
      }
      | Self::PriorityDesc => {
        entries.sort_by(|a, b| {
          b.priority
            .weight()
            .cmp(&a.priority.weight())
        })
      }
      | Self::PriorityAsc => {
        entries.sort_by_key(|o| {
          o.priority.weight()
        })
      }
    }
  }
}

impl FromStr for SortMode {
  type Err = anyhow::Error;

  fn from_str(
    s: &str
  ) -> Result<Self, Self::Err> {
    match s
      .trim()
      .to_ascii_lowercase()
      .as_str()
    {
      | "time-asc" | "time" => {
        Ok(Self::TimeAsc)
      }
      | "time-desc" => Ok(Self::TimeDesc),
      | "priority-desc" | "priority" => {
        Ok(Self::PriorityDesc)
      }
      | "priority-asc" => {
        Ok(Self::PriorityAsc)
      }
      | other => {
        Err(anyhow!(
          "invalid sort mode: {other} \
           (expected time-asc, \
           time-desc, priority-desc or \
           priority-asc)"
        ))
      }
    }
  }
}

/// Occurrences grouped by business
/// calendar day.
#[derive(
  Debug, Clone, Default, PartialEq, Eq,
)]
pub struct Buckets {
  map: BTreeMap<
    DateKey,
    Vec<ScheduleOccurrence>
  >
}

impl Buckets {
  #[tracing::instrument(
    skip(occurrences),
    fields(count = occurrences.len())
  )]
  pub fn build(
    occurrences: &[ScheduleOccurrence],
    mode: SortMode
  ) -> Self {
    let mut map: BTreeMap<
      DateKey,
      Vec<ScheduleOccurrence>
    > = BTreeMap::new();

    for occurrence in occurrences {
      map
        .entry(occurrence.date_key())
        .or_default()
        .push(occurrence.clone());
    }

    for entries in map.values_mut() {
      mode.apply(entries);
    }

    debug!(
      days = map.len(),
      mode = mode.as_key(),
      "bucketed occurrences"
    );
    Self { map }
  }

  /// Entries for one day; empty for days
  /// without occurrences and for the
  /// unknown key.
  #[must_use]
  pub fn get(
    &self,
    key: &DateKey
  ) -> &[ScheduleOccurrence] {
    if key.is_unknown() {
      return &[];
    }
    self
      .map
      .get(key)
      .map(Vec::as_slice)
      .unwrap_or_default()
  }

  /// Number of distinct days.
  #[must_use]
  pub fn len(&self) -> usize {
    self.map.len()
  }

  #[must_use]
  pub fn is_empty(&self) -> bool {
    self.map.is_empty()
  }
}

#[cfg(test)]
mod tests {
  use chrono::{
    DateTime,
    FixedOffset,
    NaiveDate,
    TimeZone
  };

  use super::*;
  use crate::schedule::Priority;

  fn kst() -> FixedOffset {
    FixedOffset::east_opt(9 * 3600)
      .expect("valid offset")
  }

  fn at(
    d: u32,
    h: u32
  ) -> DateTime<FixedOffset> {
    kst()
      .with_ymd_and_hms(2024, 1, d, h, 0, 0)
      .single()
      .expect("valid instant")
  }

  fn occ(
    id: u64,
    priority: Priority,
    timestamp: DateTime<FixedOffset>
  ) -> ScheduleOccurrence {
    ScheduleOccurrence {
      schedule_id: id,
      title: format!("s{id}"),
      priority,
      category_id: 1,
      pet_ids: vec![],
      timestamp,
      all_day: false
    }
  }

  fn key(d: u32) -> DateKey {
    DateKey::from_date(
      NaiveDate::from_ymd_opt(2024, 1, d)
        .expect("valid date")
    )
  }

  fn ids(
    entries: &[ScheduleOccurrence]
  ) -> Vec<u64> {
    entries
      .iter()
      .map(|o| o.schedule_id)
      .collect()
  }

  fn sample() -> Vec<ScheduleOccurrence> {
    vec![
      occ(1, Priority::Low, at(2, 9)),
      occ(2, Priority::High, at(2, 7)),
      occ(3, Priority::Medium, at(2, 12)),
      occ(4, Priority::High, at(2, 20)),
      occ(5, Priority::Low, at(3, 8)),
    ]
  }

  #[test]
  fn groups_by_business_day() {
    let buckets = Buckets::build(
      &sample(),
      SortMode::TimeAsc
    );
    assert_eq!(buckets.len(), 2);
    assert_eq!(
      ids(buckets.get(&key(2))),
      vec![2, 1, 3, 4]
    );
    assert_eq!(
      ids(buckets.get(&key(3))),
      vec![5]
    );
    assert!(
      buckets.get(&key(4)).is_empty()
    );
    assert!(
      buckets
        .get(&DateKey::Unknown)
        .is_empty()
    );
  }

  #[test]
  fn time_descending() {
    let buckets = Buckets::build(
      &sample(),
      SortMode::TimeDesc
    );
    assert_eq!(
      ids(buckets.get(&key(2))),
      vec![4, 3, 1, 2]
    );
  }

  #[test]
  fn priority_sort_is_stable() {
    let desc = Buckets::build(
      &sample(),
      SortMode::PriorityDesc
    );
    assert_eq!(
      ids(desc.get(&key(2))),
      vec![2, 4, 3, 1]
    );

    let asc = Buckets::build(
      &sample(),
      SortMode::PriorityAsc
    );
    assert_eq!(
      ids(asc.get(&key(2))),
      vec![1, 3, 2, 4]
    );
  }

  #[test]
  fn rebucketing_is_repeatable() {
    let input = sample();
    let first = Buckets::build(
      &input,
      SortMode::PriorityDesc
    );
    let second = Buckets::build(
      &input,
      SortMode::PriorityDesc
    );
    assert_eq!(first, second);
  }

  #[test]
  fn parses_sort_modes() {
    assert_eq!(
      "priority-desc"
        .parse::<SortMode>()
        .expect("parse"),
      SortMode::PriorityDesc
    );
    assert_eq!(
      " TIME-DESC "
        .parse::<SortMode>()
        .expect("parse"),
      SortMode::TimeDesc
    );
    assert!(
      "random".parse::<SortMode>().is_err()
    );
  }
}
