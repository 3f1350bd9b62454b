// src/period.rs
//
// Periods are derived, never stored: every data load rebuilds them from the
// flat entry list. A period is the week (Sunday..Saturday) of one associate.

use chrono::{Datelike, Duration, NaiveDate};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::warn;

use crate::model::{parse_work_date, Associate, EntryStatus, TimeEntry};

/// The Sunday on or before `date`.
pub fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(date.weekday().num_days_from_sunday() as i64)
}

/// Display label for a week, e.g. "Mar 2 - Mar 8".
pub fn period_label(start: NaiveDate) -> String {
    let end = start + Duration::days(6);
    format!(
        "{} - {}",
        start.format("%b %-d"),
        end.format("%b %-d")
    )
}

/// Weekly aggregate of one associate's entries. Recomputed on every load;
/// mutating a period means replacing its underlying entries through the
/// workflow, never editing the period itself.
#[derive(Debug, Clone, Serialize)]
pub struct Period {
    pub associate_id: String,
    pub associate_name: String,
    pub week_start: NaiveDate,
    pub label: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_hours: Decimal,
    pub status: EntryStatus,
    pub comments: String,
    pub entries: Vec<TimeEntry>,
}

impl Period {
    /// Row references of every entry, for batched status transitions.
    pub fn row_refs(&self) -> Vec<u32> {
        self.entries.iter().map(|e| e.row_index).collect()
    }
}

/// One editable grid row: entries sharing project and task merge into a row
/// of per-day hour cells. Distinct project/task combinations stay distinct.
#[derive(Debug, Clone, Serialize)]
pub struct PeriodRow {
    pub project_id: String,
    pub task: String,
    pub cells: BTreeMap<NaiveDate, Decimal>,
}

impl Period {
    pub fn rows(&self) -> Vec<PeriodRow> {
        let mut rows: Vec<PeriodRow> = Vec::new();
        for entry in &self.entries {
            let Some(date) = parse_work_date(&entry.work_date) else {
                continue;
            };
            let row = match rows
                .iter_mut()
                .find(|r| r.project_id == entry.project_id && r.task == entry.task)
            {
                Some(row) => row,
                None => {
                    rows.push(PeriodRow {
                        project_id: entry.project_id.clone(),
                        task: entry.task.clone(),
                        cells: BTreeMap::new(),
                    });
                    rows.last_mut().expect("row was just pushed")
                }
            };
            *row.cells.entry(date).or_insert(Decimal::ZERO) += entry.hours;
        }
        rows
    }
}

/// Group a flat entry list into periods keyed by (associate, week start).
///
/// Entries whose work date cannot be parsed are logged and skipped; one bad
/// row must not abort the whole aggregation. Display names resolve through
/// `associates` with the raw id as fallback. Output is sorted by associate,
/// newest week first.
pub fn derive_periods(entries: &[TimeEntry], associates: &[Associate]) -> Vec<Period> {
    let mut groups: BTreeMap<(String, NaiveDate), Period> = BTreeMap::new();

    for entry in entries {
        let Some(date) = parse_work_date(&entry.work_date) else {
            warn!(
                row_index = entry.row_index,
                work_date = %entry.work_date,
                "skipping time entry with unparsable work date"
            );
            continue;
        };
        let start = week_start(date);
        let key = (entry.associate_id.clone(), start);

        let period = groups.entry(key).or_insert_with(|| Period {
            associate_id: entry.associate_id.clone(),
            associate_name: associates
                .iter()
                .find(|a| a.associate_id == entry.associate_id)
                .map(|a| a.associate_name.clone())
                .unwrap_or_else(|| entry.associate_id.clone()),
            week_start: start,
            label: period_label(start),
            total_hours: Decimal::ZERO,
            status: entry.status,
            comments: String::new(),
            entries: Vec::new(),
        });

        period.total_hours += entry.hours;
        // Submitted dominates whatever status the group recorded so far.
        if entry.status == EntryStatus::Submitted {
            period.status = EntryStatus::Submitted;
        }
        if period.comments.is_empty() && !entry.comments.trim().is_empty() {
            period.comments = entry.comments.clone();
        }
        period.entries.push(entry.clone());
    }

    let mut periods: Vec<Period> = groups.into_values().collect();
    periods.sort_by(|a, b| {
        a.associate_id
            .cmp(&b.associate_id)
            .then(b.week_start.cmp(&a.week_start))
    });
    periods
}

/// The single period for one associate and week, if any entries exist.
pub fn find_period(periods: &[Period], associate_id: &str, start: NaiveDate) -> Option<Period> {
    periods
        .iter()
        .find(|p| p.associate_id == associate_id && p.week_start == start)
        .cloned()
}
