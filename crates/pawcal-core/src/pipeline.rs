use chrono::NaiveDate;
use serde::Serialize;
use tracing::{
  debug,
  info
};

use crate::bucket::{
  Buckets,
  SortMode
};
use crate::datetime::DateKey;
use crate::grid::{
  CalendarCell,
  GridBuilder,
  ViewMode,
  WeekAnchor,
  month_title,
  week_title
};
use crate::recurrence::collect_occurrences;
use crate::schedule::{
  Schedule,
  ScheduleOccurrence
};
use crate::selection::{
  ActiveGroup,
  AvailableIds,
  SelectionState
};

/// Inputs of one render pass besides the
/// schedules and the selection.
#[derive(Debug, Clone, Copy)]
pub struct CalendarRequest {
  pub view:      ViewMode,
  pub reference: NaiveDate,
  pub today:     DateKey,
  pub sort:      SortMode,
  pub anchor:    WeekAnchor
}

#[derive(
  Debug,
  Clone,
  PartialEq,
  Eq,
  Serialize,
)]
#[serde(rename_all = "camelCase")]
pub struct CalendarPage {
  pub title:     String,
  pub reference: NaiveDate,
  /// Month view: up to six rows. Week
  /// view: one row.
  pub rows:      Vec<Vec<CalendarCell>>,
  pub generated: usize,
  pub visible:   usize,
  pub skipped:   usize,
  pub active:    ActiveGroup
}

impl CalendarPage {
  pub fn cells(
    &self
  ) -> impl Iterator<Item = &CalendarCell>
  {
    self.rows.iter().flatten()
  }
}

/// Full recompute: expand, filter, bucket,
/// lay out. Identical inputs give
/// identical pages.
#[tracing::instrument(
  skip(schedules, selection),
  fields(schedules = schedules.len())
)]
pub fn render_pass(
  schedules: &[Schedule],
  selection: &SelectionState,
  request: CalendarRequest
) -> CalendarPage {
  let set = collect_occurrences(schedules);
  let visible =
    selection.apply(&set.occurrences);
  let buckets =
    Buckets::build(&visible, request.sort);
  let builder =
    GridBuilder::new(&buckets, request.today)
      .with_week_anchor(request.anchor);

  let (title, rows) = match request.view {
    | ViewMode::Month => {
      (
        month_title(request.reference),
        builder.build_month_grid(
          request.reference
        )
      )
    }
    | ViewMode::Week => {
      let cells = builder
        .build_week_grid(
          request.reference
        );
      (week_title(&cells), vec![cells])
    }
  };

  info!(
    view = request.view.as_key(),
    reference = %request.reference,
    generated = set.occurrences.len(),
    visible = visible.len(),
    skipped = set.skipped,
    "calendar page computed"
  );

  CalendarPage {
    title,
    reference: request.reference,
    rows,
    generated: set.occurrences.len(),
    visible: visible.len(),
    skipped: set.skipped,
    active: selection.active()
  }
}

/// Occurrences of one business day after
/// selection, in the requested order.
#[tracing::instrument(skip(
  schedules, selection
))]
pub fn day_agenda(
  schedules: &[Schedule],
  selection: &SelectionState,
  date: NaiveDate,
  sort: SortMode
) -> Vec<ScheduleOccurrence> {
  let set = collect_occurrences(schedules);
  let visible =
    selection.apply(&set.occurrences);
  let buckets =
    Buckets::build(&visible, sort);
  let agenda = buckets
    .get(&DateKey::from_date(date))
    .to_vec();
  debug!(
    count = agenda.len(),
    "day agenda computed"
  );
  agenda
}

/// Selection universe derived from the
/// occurrences themselves, for callers
/// without separate category and pet
/// listings.
#[must_use]
pub fn available_from_occurrences(
  occurrences: &[ScheduleOccurrence]
) -> AvailableIds {
  AvailableIds::new(
    occurrences
      .iter()
      .map(|o| o.category_id),
    occurrences
      .iter()
      .flat_map(|o| o.pet_ids.clone()),
    std::iter::empty(),
    occurrences
  )
}

#[cfg(test)]
mod tests {
  use std::collections::BTreeSet;

  use chrono::{
    NaiveDate,
    Weekday
  };

  use super::*;
  use crate::schedule::{
    Priority,
    RecurrenceRule,
    ScheduleDates,
    SelectedDate
  };
  use crate::selection::{
    SelectionGroup,
    SelectionItem
  };

  fn day(
    y: i32,
    m: u32,
    d: u32
  ) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d)
      .expect("valid date")
  }

  fn schedules() -> Vec<Schedule> {
    vec![
      Schedule {
        id:          1,
        title:       "Walk".to_string(),
        priority:    Priority::Low,
        category_id: 10,
        pet_ids:     vec![100],
        all_day:     false,
        time:        Some(
          "07:00".to_string()
        ),
        dates:       ScheduleDates::Repeat(
          RecurrenceRule::weekly(
            1,
            vec![Weekday::Mon, Weekday::Wed],
            day(2024, 1, 1),
            day(2024, 1, 14)
          )
        )
      },
      Schedule {
        id:          2,
        title:       "Vaccination"
          .to_string(),
        priority:    Priority::High,
        category_id: 20,
        pet_ids:     vec![200],
        all_day:     true,
        time:        None,
        dates:       ScheduleDates::Once {
          selected_dates: vec![
            SelectedDate::new(
              "2024-01-03",
              ""
            ),
            SelectedDate::new(
              "2024-13-01",
              ""
            ),
          ]
        }
      },
      Schedule {
        id:          3,
        title:       "Grooming".to_string(),
        priority:    Priority::Medium,
        category_id: 10,
        pet_ids:     vec![100, 200],
        all_day:     false,
        time:        Some(
          "18:00".to_string()
        ),
        dates:       ScheduleDates::Repeat(
          RecurrenceRule::monthly(
            BTreeSet::new(),
            day(2024, 1, 1),
            day(2024, 12, 31)
          )
        )
      },
    ]
  }

  fn request(
    view: ViewMode,
    sort: SortMode
  ) -> CalendarRequest {
    CalendarRequest {
      view,
      reference: day(2024, 1, 1),
      today: DateKey::from_date(day(
        2024, 1, 3
      )),
      sort,
      anchor: WeekAnchor::Reference
    }
  }

  #[test]
  fn month_page_places_occurrences() {
    let page = render_pass(
      &schedules(),
      &SelectionState::default(),
      request(
        ViewMode::Month,
        SortMode::PriorityDesc
      )
    );

    assert_eq!(page.title, "January 2024");
    assert_eq!(page.generated, 5);
    assert_eq!(page.visible, 5);
    assert_eq!(page.skipped, 1);
    assert!(
      page
        .rows
        .iter()
        .all(|row| row.len() == 7)
    );

    let jan3 = page
      .cells()
      .find(|c| c.date == day(2024, 1, 3))
      .expect("jan 3 cell");
    assert!(jan3.is_today);
    let titles = jan3
      .occurrences
      .iter()
      .map(|o| o.title.as_str())
      .collect::<Vec<_>>();
    assert_eq!(
      titles,
      vec!["Vaccination", "Walk"]
    );
  }

  #[test]
  fn week_page_has_single_row() {
    let page = render_pass(
      &schedules(),
      &SelectionState::default(),
      request(
        ViewMode::Week,
        SortMode::TimeAsc
      )
    );
    assert_eq!(page.rows.len(), 1);
    assert_eq!(page.rows[0].len(), 7);
    assert_eq!(
      page.title,
      "2024-01-01 - 2024-01-07"
    );
    let with_entries = page
      .cells()
      .filter(|c| c.has_occurrences())
      .count();
    assert_eq!(with_entries, 2);
  }

  #[test]
  fn selection_narrows_before_bucketing() {
    let selection = SelectionState::default()
      .toggle(SelectionItem::Pet(200));
    let page = render_pass(
      &schedules(),
      &selection,
      request(
        ViewMode::Month,
        SortMode::TimeAsc
      )
    );
    assert_eq!(page.visible, 1);
    assert_eq!(page.active, ActiveGroup::Pet);

    let agenda = day_agenda(
      &schedules(),
      &selection,
      day(2024, 1, 3),
      SortMode::TimeAsc
    );
    assert_eq!(agenda.len(), 1);
    assert_eq!(agenda[0].schedule_id, 2);
  }

  #[test]
  fn render_pass_is_repeatable() {
    let available =
      available_from_occurrences(
        &collect_occurrences(&schedules())
          .occurrences
      );
    let selection = SelectionState::default()
      .select_all(
        SelectionGroup::Category,
        &available
      );
    let req = request(
      ViewMode::Month,
      SortMode::PriorityAsc
    );
    let first = render_pass(
      &schedules(),
      &selection,
      req
    );
    let second = render_pass(
      &schedules(),
      &selection,
      req
    );
    assert_eq!(first, second);
    assert_eq!(
      serde_json::to_string(&first)
        .expect("serialize"),
      serde_json::to_string(&second)
        .expect("serialize")
    );
  }
}
