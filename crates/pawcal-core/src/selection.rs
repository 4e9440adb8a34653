use std::collections::BTreeSet;

use serde::Serialize;
use tracing::debug;

use crate::schedule::{
  ScheduleKey,
  ScheduleOccurrence
};

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Serialize,
)]
#[serde(rename_all = "lowercase")]
pub enum SelectionGroup {
  Category,
  Pet,
  Schedule
}

/// One selectable entry, tagged with its
/// group.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq,
)]
pub enum SelectionItem {
  Category(u64),
  Pet(u64),
  Schedule(ScheduleKey)
}

impl SelectionItem {
  #[must_use]
  pub fn group(self) -> SelectionGroup {
    match self {
      | Self::Category(_) => {
        SelectionGroup::Category
      }
      | Self::Pet(_) => {
        SelectionGroup::Pet
      }
      | Self::Schedule(_) => {
        SelectionGroup::Schedule
      }
    }
  }
}

/// Which group currently filters the
/// calendar.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Serialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ActiveGroup {
  None,
  Category,
  Pet,
  Schedule
}

/// Everything that could be selected in
/// each group.
#[derive(
  Debug, Clone, Default, PartialEq, Eq,
)]
pub struct AvailableIds {
  pub categories: BTreeSet<u64>,
  pub pets:       BTreeSet<u64>,
  pub schedules:  BTreeSet<ScheduleKey>
}

impl AvailableIds {
  /// Pets are the union of owned pets and
  /// pets the user cares for. Schedule
  /// keys come from the occurrences on
  /// screen.
  pub fn new(
    categories: impl IntoIterator<
      Item = u64
    >,
    owned_pets: impl IntoIterator<
      Item = u64
    >,
    caregiver_pets: impl IntoIterator<
      Item = u64
    >,
    occurrences: &[ScheduleOccurrence]
  ) -> Self {
    Self {
      categories: categories
        .into_iter()
        .collect(),
      pets:       owned_pets
        .into_iter()
        .chain(caregiver_pets)
        .collect(),
      schedules:  occurrences
        .iter()
        .map(
          ScheduleOccurrence::schedule_key
        )
        .collect()
    }
  }
}

/// Three mutually exclusive selection
/// groups. At most one set is non-empty.
#[derive(
  Debug,
  Clone,
  Default,
  PartialEq,
  Eq,
  Serialize,
)]
#[serde(rename_all = "camelCase")]
pub struct SelectionState {
  selected_category_ids:  BTreeSet<u64>,
  selected_pet_ids:       BTreeSet<u64>,
  selected_schedule_keys:
    BTreeSet<ScheduleKey>
}

impl SelectionState {
  #[must_use]
  pub fn categories(
    &self
  ) -> &BTreeSet<u64> {
    &self.selected_category_ids
  }

  #[must_use]
  pub fn pets(&self) -> &BTreeSet<u64> {
    &self.selected_pet_ids
  }

  #[must_use]
  pub fn schedules(
    &self
  ) -> &BTreeSet<ScheduleKey> {
    &self.selected_schedule_keys
  }

  #[must_use]
  pub fn active(&self) -> ActiveGroup {
    if !self
      .selected_category_ids
      .is_empty()
    {
      ActiveGroup::Category
    } else if !self
      .selected_pet_ids
      .is_empty()
    {
      ActiveGroup::Pet
    } else if !self
      .selected_schedule_keys
      .is_empty()
    {
      ActiveGroup::Schedule
    } else {
      ActiveGroup::None
    }
  }

  #[must_use]
  pub fn contains(
    &self,
    item: SelectionItem
  ) -> bool {
    match item {
      | SelectionItem::Category(id) => {
        self
          .selected_category_ids
          .contains(&id)
      }
      | SelectionItem::Pet(id) => {
        self
          .selected_pet_ids
          .contains(&id)
      }
      | SelectionItem::Schedule(key) => {
        self
          .selected_schedule_keys
          .contains(&key)
      }
    }
  }

  /// Flips one entry. The other two groups
  /// are cleared first.
  #[must_use]
  #[tracing::instrument(skip(self))]
  pub fn toggle(
    &self,
    item: SelectionItem
  ) -> Self {
    let mut next =
      self.only(item.group());
    match item {
      | SelectionItem::Category(id) => {
        flip(
          &mut next.selected_category_ids,
          id
        )
      }
      | SelectionItem::Pet(id) => {
        flip(&mut next.selected_pet_ids, id)
      }
      | SelectionItem::Schedule(key) => {
        flip(
          &mut next.selected_schedule_keys,
          key
        )
      }
    }
    debug!(
      active = ?next.active(),
      "selection toggled"
    );
    next
  }

  /// Selects the whole group, or clears it
  /// when it already holds every available
  /// id. The other two groups are cleared
  /// first.
  #[must_use]
  #[tracing::instrument(skip(
    self, available
  ))]
  pub fn select_all(
    &self,
    group: SelectionGroup,
    available: &AvailableIds
  ) -> Self {
    let mut next = self.only(group);
    match group {
      | SelectionGroup::Category => {
        fill_or_clear(
          &mut next.selected_category_ids,
          &available.categories
        )
      }
      | SelectionGroup::Pet => {
        fill_or_clear(
          &mut next.selected_pet_ids,
          &available.pets
        )
      }
      | SelectionGroup::Schedule => {
        fill_or_clear(
          &mut next
            .selected_schedule_keys,
          &available.schedules
        )
      }
    }
    debug!(
      active = ?next.active(),
      "selection filled"
    );
    next
  }

  #[must_use]
  pub fn clear(&self) -> Self {
    Self::default()
  }

  /// Keeps occurrences that pass every
  /// active group, in input order.
  #[must_use]
  pub fn apply(
    &self,
    occurrences: &[ScheduleOccurrence]
  ) -> Vec<ScheduleOccurrence> {
    let filtered = occurrences
      .iter()
      .filter(|o| self.matches(o))
      .cloned()
      .collect::<Vec<_>>();
    debug!(
      before = occurrences.len(),
      after = filtered.len(),
      "selection applied"
    );
    filtered
  }

  #[must_use]
  pub fn matches(
    &self,
    occurrence: &ScheduleOccurrence
  ) -> bool {
    let category_ok = self
      .selected_category_ids
      .is_empty()
      || self
        .selected_category_ids
        .contains(&occurrence.category_id);
    let pet_ok = self
      .selected_pet_ids
      .is_empty()
      || occurrence.pet_ids.iter().any(
        |id| self.selected_pet_ids.contains(id)
      );
    let schedule_ok = self
      .selected_schedule_keys
      .is_empty()
      || self
        .selected_schedule_keys
        .contains(
          &occurrence.schedule_key()
        );
    category_ok && pet_ok && schedule_ok
  }

  fn only(
    &self,
    group: SelectionGroup
  ) -> Self {
    let mut next = Self::default();
    match group {
      | SelectionGroup::Category => {
        next.selected_category_ids = self
          .selected_category_ids
          .clone()
      }
      | SelectionGroup::Pet => {
        next.selected_pet_ids =
          self.selected_pet_ids.clone()
      }
      | SelectionGroup::Schedule => {
        next.selected_schedule_keys = self
          .selected_schedule_keys
          .clone()
      }
    }
    next
  }
}

fn flip<T: Ord>(
  set: &mut BTreeSet<T>,
  value: T
) {
  if !set.remove(&value) {
    set.insert(value);
  }
}

fn fill_or_clear<T: Ord + Clone>(
  set: &mut BTreeSet<T>,
  available: &BTreeSet<T>
) {
  if set == available {
    set.clear();
  } else {
    set.clone_from(available);
  }
}
