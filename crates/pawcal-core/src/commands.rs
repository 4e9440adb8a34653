use std::io::Write;

use anyhow::{Context, anyhow};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::bucket::SortMode;
use crate::cli::{Command, SelectArg, ViewArgs};
use crate::config::Config;
use crate::datetime::{add_days, parse_calendar_date, today_in_business_offset, today_key};
use crate::grid::{ViewMode, shift_reference};
use crate::pipeline::{CalendarRequest, available_from_occurrences, day_agenda, render_pass};
use crate::recurrence::collect_occurrences;
use crate::render::Renderer;
use crate::schedule::{Schedule, ScheduleOccurrence};
use crate::selection::{ActiveGroup, SelectionState};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DayAgenda<'a> {
    date: NaiveDate,
    active: ActiveGroup,
    occurrences: &'a [ScheduleOccurrence],
}

#[instrument(skip(schedules, cfg, renderer, command, now, out))]
pub fn dispatch<W: Write>(
    schedules: &[Schedule],
    cfg: &Config,
    renderer: &Renderer,
    command: Command,
    now: DateTime<Utc>,
    out: &mut W,
) -> anyhow::Result<()> {
    debug!(?command, schedules = schedules.len(), "dispatching command");

    match command {
        Command::Month(args) => cmd_view(schedules, cfg, renderer, ViewMode::Month, &args, now, out),
        Command::Week(args) => cmd_view(schedules, cfg, renderer, ViewMode::Week, &args, now, out),
        Command::Day(args) => cmd_day(schedules, cfg, renderer, &args, now, out),
        Command::Expand { json } => cmd_expand(schedules, renderer, json, out),
    }
}

#[instrument(skip(schedules, cfg, renderer, args, now, out))]
fn cmd_view<W: Write>(
    schedules: &[Schedule],
    cfg: &Config,
    renderer: &Renderer,
    view: ViewMode,
    args: &ViewArgs,
    now: DateTime<Utc>,
    out: &mut W,
) -> anyhow::Result<()> {
    info!(view = view.as_key(), "command view");

    let base = resolve_reference(args.date.as_deref(), now)?;
    let reference = if args.page == 0 {
        base
    } else {
        shift_reference(base, view, args.page)
    };

    let request = CalendarRequest {
        view,
        reference,
        today: today_key(now),
        sort: resolve_sort(cfg, args.sort.as_deref())?,
        anchor: cfg.week_anchor()?,
    };
    let selection = replay_selection(schedules, &args.select);
    let page = render_pass(schedules, &selection, request);

    if args.json {
        let json = serde_json::to_string(&page)?;
        writeln!(out, "{json}")?;
        return Ok(());
    }
    renderer.write_page(out, &page)
}

#[instrument(skip(schedules, cfg, renderer, args, now, out))]
fn cmd_day<W: Write>(
    schedules: &[Schedule],
    cfg: &Config,
    renderer: &Renderer,
    args: &ViewArgs,
    now: DateTime<Utc>,
    out: &mut W,
) -> anyhow::Result<()> {
    info!("command day");

    let base = resolve_reference(args.date.as_deref(), now)?;
    let date = add_days(base, i64::from(args.page));
    let sort = resolve_sort(cfg, args.sort.as_deref())?;
    let selection = replay_selection(schedules, &args.select);
    let agenda = day_agenda(schedules, &selection, date, sort);

    if args.json {
        let json = serde_json::to_string(&DayAgenda {
            date,
            active: selection.active(),
            occurrences: &agenda,
        })?;
        writeln!(out, "{json}")?;
        return Ok(());
    }
    renderer.write_day(out, date, &agenda, selection.active())
}

#[instrument(skip(schedules, renderer, out))]
fn cmd_expand<W: Write>(
    schedules: &[Schedule],
    renderer: &Renderer,
    json: bool,
    out: &mut W,
) -> anyhow::Result<()> {
    info!("command expand");

    let set = collect_occurrences(schedules);
    if json {
        let json = serde_json::to_string(&set)?;
        writeln!(out, "{json}")?;
        return Ok(());
    }
    renderer.write_occurrences(out, &set)
}

fn resolve_reference(raw: Option<&str>, now: DateTime<Utc>) -> anyhow::Result<NaiveDate> {
    match raw {
        Some(text) => parse_calendar_date(text)
            .ok_or_else(|| anyhow!("invalid --date {text:?}; expected YYYY-MM-DD")),
        None => Ok(today_in_business_offset(now)),
    }
}

fn resolve_sort(cfg: &Config, flag: Option<&str>) -> anyhow::Result<SortMode> {
    match flag {
        Some(raw) => raw
            .parse::<SortMode>()
            .with_context(|| format!("invalid --sort {raw:?}")),
        None => cfg.sort_mode(),
    }
}

/// Replays `--select` flags, in order, through the selection reducer. The
/// "all" universe is every id present in the expanded occurrences.
fn replay_selection(schedules: &[Schedule], flags: &[SelectArg]) -> SelectionState {
    if flags.is_empty() {
        return SelectionState::default();
    }

    let set = collect_occurrences(schedules);
    let available = available_from_occurrences(&set.occurrences);

    let state = flags
        .iter()
        .fold(SelectionState::default(), |state, flag| match *flag {
            SelectArg::Item(item) => state.toggle(item),
            SelectArg::All(group) => state.select_all(group, &available),
            SelectArg::Clear => state.clear(),
        });
    debug!(active = ?state.active(), "selection replayed");
    state
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::schedule::{Priority, ScheduleDates, SelectedDate};
    use crate::selection::{SelectionGroup, SelectionItem};

    fn schedule(id: u64, category_id: u64, pets: Vec<u64>, date: &str) -> Schedule {
        Schedule {
            id,
            title: format!("schedule {id}"),
            priority: Priority::Medium,
            category_id,
            pet_ids: pets,
            all_day: true,
            time: None,
            dates: ScheduleDates::Once {
                selected_dates: vec![SelectedDate::new(date, "")],
            },
        }
    }

    #[test]
    fn reference_defaults_to_business_today() {
        // 16:00 UTC is already the next day at UTC+9.
        let now = Utc
            .with_ymd_and_hms(2024, 3, 31, 16, 0, 0)
            .single()
            .expect("valid instant");
        assert_eq!(
            resolve_reference(None, now).expect("today"),
            NaiveDate::from_ymd_opt(2024, 4, 1).expect("date")
        );
        assert!(resolve_reference(Some("31/03/2024"), now).is_err());
    }

    #[test]
    fn month_json_marks_business_today() {
        let now = Utc
            .with_ymd_and_hms(2024, 3, 31, 16, 0, 0)
            .single()
            .expect("valid instant");
        let cfg = Config::default();
        let renderer = Renderer::new(&cfg).expect("renderer");
        let command = Command::Month(ViewArgs {
            date: None,
            page: 0,
            sort: None,
            select: vec![],
            json: true,
        });

        let mut out = Vec::new();
        dispatch(
            &[schedule(1, 10, vec![100], "2024-04-01")],
            &cfg,
            &renderer,
            command,
            now,
            &mut out,
        )
        .expect("dispatch");

        let page: serde_json::Value = serde_json::from_slice(&out).expect("json");
        assert_eq!(page["title"], "April 2024");
        let today = page["rows"]
            .as_array()
            .expect("rows")
            .iter()
            .flat_map(|row| row.as_array().expect("row"))
            .filter(|cell| cell["isToday"] == true)
            .collect::<Vec<_>>();
        assert_eq!(today.len(), 1);
        assert_eq!(today[0]["date"], "2024-04-01");
        assert_eq!(today[0]["key"], "2024-04-01");
    }

    #[test]
    fn sort_flag_overrides_config() {
        let cfg = Config::default();
        assert_eq!(
            resolve_sort(&cfg, Some("priority-asc")).expect("sort"),
            SortMode::PriorityAsc
        );
        assert_eq!(resolve_sort(&cfg, None).expect("sort"), SortMode::TimeAsc);
        assert!(resolve_sort(&cfg, Some("random")).is_err());
    }

    #[test]
    fn replays_flags_through_reducer() {
        let schedules = vec![
            schedule(1, 10, vec![100], "2024-01-03"),
            schedule(2, 20, vec![200], "2024-01-04"),
        ];

        let state = replay_selection(
            &schedules,
            &[
                SelectArg::Item(SelectionItem::Category(10)),
                SelectArg::All(SelectionGroup::Pet),
            ],
        );
        assert_eq!(state.active(), ActiveGroup::Pet);
        assert!(state.categories().is_empty());
        assert_eq!(state.pets().len(), 2);

        let cleared = replay_selection(
            &schedules,
            &[SelectArg::All(SelectionGroup::Category), SelectArg::Clear],
        );
        assert_eq!(cleared, SelectionState::default());
    }
}
