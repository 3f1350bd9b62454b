// src/summary.rs
//
// Month-to-date / year-to-date hour rollups plus the pending-submission
// counter shown on the timesheet dashboard. Pure functions over the raw
// entry and allocation lists; callers pass "today" so the windows are
// testable.

use chrono::{Datelike, Duration, NaiveDate};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::warn;

use crate::model::{is_time_off, parse_work_date, Allocation, EntryStatus, TimeEntry};
use crate::period::week_start;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct HoursBucket {
    #[serde(with = "rust_decimal::serde::float")]
    pub total: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub billable: Decimal,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SummaryStats {
    pub month_to_date: HoursBucket,
    pub year_to_date: HoursBucket,
    /// Sunday-aligned weeks since the earliest allocation with nothing
    /// submitted or approved, current week excluded.
    pub pending_submissions: u32,
}

/// An entry is billable when its project is not a time-off code and some
/// allocation of the same associate to the same project whose date window
/// contains the work date is classified billable.
pub fn is_billable_entry(entry: &TimeEntry, date: NaiveDate, allocations: &[Allocation]) -> bool {
    if is_time_off(&entry.project_id) {
        return false;
    }
    allocations
        .iter()
        .find(|a| {
            a.associate_id == entry.associate_id
                && a.project_id == entry.project_id
                && a.covers(date)
        })
        .map(|a| a.is_billable())
        .unwrap_or(false)
}

/// Roll up one associate's entries into MTD/YTD buckets and count pending
/// weeks. `entries` is expected to cover the relevant year; rows for other
/// associates are ignored.
pub fn summarize(
    entries: &[TimeEntry],
    allocations: &[Allocation],
    associate_id: &str,
    today: NaiveDate,
) -> SummaryStats {
    let mut stats = SummaryStats::default();

    for entry in entries.iter().filter(|e| e.associate_id == associate_id) {
        let Some(date) = parse_work_date(&entry.work_date) else {
            warn!(
                row_index = entry.row_index,
                work_date = %entry.work_date,
                "skipping time entry with unparsable work date in summary"
            );
            continue;
        };
        let billable = if is_billable_entry(entry, date, allocations) {
            entry.hours
        } else {
            Decimal::ZERO
        };

        // Month and year windows are evaluated independently; an in-month
        // entry counts toward both.
        if date.year() == today.year() && date.month() == today.month() {
            stats.month_to_date.total += entry.hours;
            stats.month_to_date.billable += billable;
        }
        if date.year() == today.year() {
            stats.year_to_date.total += entry.hours;
            stats.year_to_date.billable += billable;
        }
    }

    stats.pending_submissions = pending_weeks(entries, allocations, associate_id, today);
    stats
}

/// Walk Sunday-aligned weeks from the earliest allocation start up to (but
/// excluding) the current week; a week is pending unless at least one entry
/// of that week is Submitted or Approved. No allocations means zero pending
/// weeks.
fn pending_weeks(
    entries: &[TimeEntry],
    allocations: &[Allocation],
    associate_id: &str,
    today: NaiveDate,
) -> u32 {
    let earliest = allocations
        .iter()
        .filter(|a| a.associate_id == associate_id)
        .filter_map(|a| a.start_date.as_deref().and_then(parse_work_date))
        .min();
    let Some(earliest) = earliest else {
        return 0;
    };

    // Week starts of covered submissions, pre-collected so the walk below is
    // a lookup rather than a rescan per week.
    let covered: std::collections::HashSet<NaiveDate> = entries
        .iter()
        .filter(|e| {
            e.associate_id == associate_id
                && matches!(e.status, EntryStatus::Submitted | EntryStatus::Approved)
        })
        .filter_map(|e| parse_work_date(&e.work_date))
        .map(week_start)
        .collect();

    let current_week = week_start(today);
    let mut week = week_start(earliest);
    let mut pending = 0;
    while week < current_week {
        if !covered.contains(&week) {
            pending += 1;
        }
        week += Duration::days(7);
    }
    pending
}
