use std::io::{self, IsTerminal, Write};

use chrono::{Datelike, NaiveDate, Weekday};
use unicode_width::UnicodeWidthStr;

use crate::config::Config;
use crate::grid::{CalendarCell, weekday_labels};
use crate::pipeline::CalendarPage;
use crate::recurrence::OccurrenceSet;
use crate::schedule::{Priority, ScheduleOccurrence};
use crate::selection::ActiveGroup;

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(cfg: &Config) -> anyhow::Result<Self> {
        let color = cfg.get_bool("color")?.unwrap_or(true);

        Ok(Self { color })
    }

    /// Grid first, then every occurrence shown in the grid.
    #[tracing::instrument(skip(self, out, page), fields(title = %page.title))]
    pub fn write_page<W: Write>(&self, mut out: W, page: &CalendarPage) -> anyhow::Result<()> {
        writeln!(out, "{}", self.paint(&page.title, "1"))?;

        let first = page
            .rows
            .first()
            .and_then(|row| row.first())
            .map(|cell| cell.date.weekday())
            .unwrap_or(Weekday::Sun);
        let headers = weekday_labels(first)
            .into_iter()
            .map(str::to_string)
            .collect::<Vec<_>>();
        let rows = page
            .rows
            .iter()
            .map(|row| row.iter().map(|cell| self.cell_label(cell)).collect())
            .collect::<Vec<_>>();
        write_table(&mut out, headers, rows)?;

        let shown = page
            .cells()
            .flat_map(|cell| cell.occurrences.iter())
            .collect::<Vec<_>>();
        if !shown.is_empty() {
            writeln!(out)?;
            self.write_agenda(&mut out, shown)?;
        }

        writeln!(out)?;
        writeln!(
            out,
            "{}",
            summary_line(page.visible, page.generated, page.skipped, page.active)
        )?;
        Ok(())
    }

    pub fn write_day<W: Write>(
        &self,
        mut out: W,
        date: NaiveDate,
        agenda: &[ScheduleOccurrence],
        active: ActiveGroup,
    ) -> anyhow::Result<()> {
        let title = date.format("%A %Y-%m-%d").to_string();
        writeln!(out, "{}", self.paint(&title, "1"))?;

        if agenda.is_empty() {
            writeln!(out, "No schedules.")?;
        } else {
            self.write_agenda(&mut out, agenda.iter().collect())?;
        }

        if let Some(group) = active_label(active) {
            writeln!(out, "filtered by {group}")?;
        }
        Ok(())
    }

    pub fn write_occurrences<W: Write>(
        &self,
        mut out: W,
        set: &OccurrenceSet,
    ) -> anyhow::Result<()> {
        let headers = vec![
            "Key".to_string(),
            "Date".to_string(),
            "Time".to_string(),
            "Priority".to_string(),
            "Title".to_string(),
        ];
        let rows = set
            .occurrences
            .iter()
            .map(|occ| {
                vec![
                    self.paint(&occ.schedule_key().to_string(), "33"),
                    occ.date_key().to_string(),
                    time_label(occ),
                    occ.priority.label().to_string(),
                    occ.title.clone(),
                ]
            })
            .collect::<Vec<_>>();
        write_table(&mut out, headers, rows)?;

        if set.skipped > 0 {
            writeln!(out, "{} malformed date entries skipped", set.skipped)?;
        }
        Ok(())
    }

    fn write_agenda<W: Write>(
        &self,
        mut out: W,
        occurrences: Vec<&ScheduleOccurrence>,
    ) -> anyhow::Result<()> {
        let headers = vec![
            "Date".to_string(),
            "Time".to_string(),
            "Priority".to_string(),
            "Title".to_string(),
            "Category".to_string(),
            "Pets".to_string(),
            "Key".to_string(),
        ];

        let mut rows = Vec::with_capacity(occurrences.len());
        for occ in occurrences {
            let priority = match occ.priority {
                Priority::High => self.paint(occ.priority.label(), "31"),
                _ => occ.priority.label().to_string(),
            };
            let pets = occ
                .pet_ids
                .iter()
                .map(|id| id.to_string())
                .collect::<Vec<_>>()
                .join(",");

            rows.push(vec![
                occ.date_key().to_string(),
                time_label(occ),
                priority,
                occ.title.clone(),
                occ.category_id.to_string(),
                pets,
                self.paint(&occ.schedule_key().to_string(), "33"),
            ]);
        }

        write_table(&mut out, headers, rows)
    }

    fn cell_label(&self, cell: &CalendarCell) -> String {
        let mut label = format!("{:>2}", cell.date.day());
        if cell.has_occurrences() {
            label.push_str(&format!(" +{}", cell.occurrences.len()));
        }
        if cell.is_today {
            label.push('*');
            return self.paint(&label, "7");
        }
        if cell.is_other_month {
            return self.paint(&label, "90");
        }
        label
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color || !io::stdout().is_terminal() {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

fn time_label(occ: &ScheduleOccurrence) -> String {
    if occ.all_day {
        "all day".to_string()
    } else {
        occ.timestamp.format("%H:%M").to_string()
    }
}

fn active_label(active: ActiveGroup) -> Option<&'static str> {
    match active {
        ActiveGroup::None => None,
        ActiveGroup::Category => Some("category"),
        ActiveGroup::Pet => Some("pet"),
        ActiveGroup::Schedule => Some("schedule"),
    }
}

fn summary_line(visible: usize, generated: usize, skipped: usize, active: ActiveGroup) -> String {
    let mut line = format!("{visible} of {generated} occurrences shown");
    if skipped > 0 {
        line.push_str(&format!(", {skipped} skipped"));
    }
    if let Some(group) = active_label(active) {
        line.push_str(&format!(", filtered by {group}"));
    }
    line
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(header.as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate().take(column_count) {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    for idx in 0..column_count {
        write!(writer, "{:width$} ", headers[idx], width = widths[idx])?;
    }
    writeln!(writer)?;

    for width in &widths {
        write!(writer, "{:-<width$} ", "", width = *width)?;
    }
    writeln!(writer)?;

    for row in rows {
        for (idx, cell) in row.iter().enumerate().take(column_count) {
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = widths[idx].saturating_sub(visible_width);
            write!(writer, "{}{} ", cell, " ".repeat(padding))?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::bucket::SortMode;
    use crate::datetime::DateKey;
    use crate::grid::{ViewMode, WeekAnchor};
    use crate::pipeline::{CalendarRequest, render_pass};
    use crate::recurrence::collect_occurrences;
    use crate::schedule::{Schedule, ScheduleDates, SelectedDate};
    use crate::selection::SelectionState;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn plain_renderer() -> Renderer {
        let mut cfg = Config::default();
        cfg.apply_overrides([("color".to_string(), "off".to_string())]);
        Renderer::new(&cfg).expect("renderer")
    }

    fn vet_visit() -> Schedule {
        Schedule {
            id: 4,
            title: "Vet visit".to_string(),
            priority: Priority::High,
            category_id: 2,
            pet_ids: vec![7, 8],
            all_day: false,
            time: None,
            dates: ScheduleDates::Once {
                selected_dates: vec![SelectedDate::new("2024-02-14", "10:30")],
            },
        }
    }

    fn as_text(bytes: Vec<u8>) -> String {
        String::from_utf8(bytes).expect("utf8")
    }

    #[test]
    fn rejects_unknown_color_setting() {
        let mut cfg = Config::default();
        cfg.apply_overrides([("color".to_string(), "sometimes".to_string())]);
        assert!(Renderer::new(&cfg).is_err());
    }

    #[test]
    fn month_page_lists_grid_and_agenda() {
        let page = render_pass(
            &[vet_visit()],
            &SelectionState::default(),
            CalendarRequest {
                view: ViewMode::Month,
                reference: day(2024, 2, 1),
                today: DateKey::from_date(day(2024, 2, 20)),
                sort: SortMode::TimeAsc,
                anchor: WeekAnchor::Reference,
            },
        );

        let mut buf = Vec::new();
        plain_renderer().write_page(&mut buf, &page).expect("write");
        let text = as_text(buf);

        assert!(text.starts_with("February 2024\n"));
        assert!(text.contains("Sun"));
        assert!(text.contains("14 +1"));
        assert!(text.contains("20*"));
        assert!(text.contains("2024-02-14 10:30 HIGH"));
        assert!(text.contains("7,8"));
        assert!(text.contains("4@2024-02-14"));
        assert!(text.trim_end().ends_with("1 of 1 occurrences shown"));
    }

    #[test]
    fn empty_day_says_so() {
        let mut buf = Vec::new();
        plain_renderer()
            .write_day(&mut buf, day(2024, 2, 15), &[], ActiveGroup::Pet)
            .expect("write");
        let text = as_text(buf);
        assert!(text.contains("Thursday 2024-02-15"));
        assert!(text.contains("No schedules."));
        assert!(text.contains("filtered by pet"));
    }

    #[test]
    fn occurrence_list_reports_skipped_entries() {
        let mut broken = vet_visit();
        broken.dates = ScheduleDates::Once {
            selected_dates: vec![
                SelectedDate::new("2024-02-14", "10:30"),
                SelectedDate::new("not-a-date", ""),
            ],
        };
        let set = collect_occurrences(&[broken]);

        let mut buf = Vec::new();
        plain_renderer()
            .write_occurrences(&mut buf, &set)
            .expect("write");
        let text = as_text(buf);
        assert!(text.contains("4@2024-02-14"));
        assert!(text.contains("1 malformed date entries skipped"));
    }

    #[test]
    fn table_pads_by_display_width() {
        let mut buf = Vec::new();
        write_table(
            &mut buf,
            vec!["Title".to_string(), "Pets".to_string()],
            vec![
                vec!["산책".to_string(), "1".to_string()],
                vec!["Walk".to_string(), "2".to_string()],
            ],
        )
        .expect("write");
        let text = as_text(buf);
        let lines = text.lines().collect::<Vec<_>>();
        assert_eq!(lines[2], "산책  1    ");
        assert_eq!(lines[3], "Walk  2    ");
    }

    #[test]
    fn strips_escape_sequences() {
        assert_eq!(strip_ansi("\x1b[31mHIGH\x1b[0m"), "HIGH");
    }
}
