// src/workflow.rs
//
// State transitions over a period's entries:
//
//   Saved ("Draft") -> Submitted -> Approved | Rejected
//   Submitted -> Saved  (withdraw, submitter only)
//   Rejected  -> Submitted (edit and resubmit)
//
// Approved is terminal; there is no unlock path. Save and Submit replace the
// whole period (delete every existing row, insert the new set); Approve,
// Reject and Withdraw are one batched status update over the period's row
// references.

use chrono::{Duration, NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::info;

use crate::audit::{self, AuditAction};
use crate::model::{format_work_date, Actor, EntryStatus, NewTimeEntry};
use crate::period::{week_start, Period};
use crate::store::{EntryFilter, StoreError, TimesheetStore};

#[derive(Error, Debug)]
pub enum WorkflowError {
    #[error("please enter at least one hour value")]
    EmptyTimesheet,
    #[error("a reason is required to reject a timesheet")]
    MissingReason,
    #[error("timesheet is {status} and can no longer be edited")]
    PeriodLocked { status: EntryStatus },
    #[error("timesheet is {status}, expected Submitted")]
    NotSubmitted { status: EntryStatus },
    #[error("{0}")]
    NotPermitted(&'static str),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// One grid row of the entry form: a project/task pair with per-day hours.
#[derive(Debug, Clone, Deserialize)]
pub struct DraftRow {
    pub project_id: String,
    #[serde(default)]
    pub task: String,
    pub cells: BTreeMap<NaiveDate, Decimal>,
}

/// The whole week as edited in the grid, including the audit trail carried
/// over from the period being edited (empty for a fresh week).
#[derive(Debug, Clone, Deserialize)]
pub struct WeekDraft {
    pub associate_id: String,
    pub week_start: NaiveDate,
    pub rows: Vec<DraftRow>,
    #[serde(default)]
    pub comments: String,
}

/// Save the week as a draft: replace every existing row of the period with
/// one `Saved` entry per positive-hour cell. Zero and blank cells are never
/// persisted. Returns the number of rows written.
pub async fn save_week(
    store: &dyn TimesheetStore,
    draft: &WeekDraft,
    actor: &Actor,
    now: NaiveDateTime,
) -> Result<usize, WorkflowError> {
    replace_week(store, draft, actor, now, EntryStatus::Saved).await
}

/// Submit the week: same replacement as `save_week` but entries are
/// `Submitted` and one audit line is appended to the shared trail.
pub async fn submit_week(
    store: &dyn TimesheetStore,
    draft: &WeekDraft,
    actor: &Actor,
    now: NaiveDateTime,
) -> Result<usize, WorkflowError> {
    replace_week(store, draft, actor, now, EntryStatus::Submitted).await
}

async fn replace_week(
    store: &dyn TimesheetStore,
    draft: &WeekDraft,
    actor: &Actor,
    now: NaiveDateTime,
    status: EntryStatus,
) -> Result<usize, WorkflowError> {
    if actor.associate_id != draft.associate_id {
        return Err(WorkflowError::NotPermitted(
            "time can only be logged on your own timesheet",
        ));
    }

    let start = week_start(draft.week_start);
    let comments = match status {
        EntryStatus::Submitted => audit::append_line(
            &draft.comments,
            &audit::format_line(now, actor.audit_name(), AuditAction::Submitted, None),
        ),
        _ => draft.comments.clone(),
    };
    let entries = build_entries(draft, start, status, &comments);

    // Validation happens before any store call is issued.
    if entries.is_empty() {
        return Err(WorkflowError::EmptyTimesheet);
    }

    let filter = EntryFilter {
        associate_id: Some(draft.associate_id.clone()),
        start_date: Some(start),
        end_date: Some(start + Duration::days(6)),
    };
    let existing = store.list_time_entries(&filter).await?;
    if let Some(locked) = existing.iter().find(|e| e.status.is_locked()) {
        return Err(WorkflowError::PeriodLocked {
            status: locked.status,
        });
    }

    // Replace-by-delete-then-insert, as the store offers no atomic swap.
    // Deletes go in descending row order because earlier deletes shift the
    // references of later rows. A failure between the delete and the insert
    // leaves the period with missing entries; that gap is inherent to the
    // two-call contract and is surfaced to the caller, not papered over.
    let mut refs: Vec<u32> = existing.iter().map(|e| e.row_index).collect();
    refs.sort_unstable_by(|a, b| b.cmp(a));
    for row_index in refs {
        store.delete_time_entry(row_index).await?;
    }

    let written = entries.len();
    store.create_time_entries(entries).await?;
    info!(
        associate_id = %draft.associate_id,
        week_start = %start,
        status = %status,
        rows = written,
        "timesheet week replaced"
    );
    Ok(written)
}

fn build_entries(
    draft: &WeekDraft,
    start: NaiveDate,
    status: EntryStatus,
    comments: &str,
) -> Vec<NewTimeEntry> {
    let end = start + Duration::days(6);
    let mut entries = Vec::new();
    for row in &draft.rows {
        for (&date, &hours) in &row.cells {
            if hours <= Decimal::ZERO || date < start || date > end {
                continue;
            }
            entries.push(NewTimeEntry {
                associate_id: draft.associate_id.clone(),
                work_date: format_work_date(date),
                project_id: row.project_id.clone(),
                task: row.task.clone(),
                hours,
                status,
                comments: comments.to_string(),
            });
        }
    }
    entries
}

/// Approve a submitted period: one batched transition of every entry to
/// `Approved`, with an optional comment recorded in the audit trail.
pub async fn approve_period(
    store: &dyn TimesheetStore,
    period: &Period,
    actor: &Actor,
    comment: Option<&str>,
) -> Result<(), WorkflowError> {
    if !actor.role.can_approve() {
        return Err(WorkflowError::NotPermitted(
            "only project managers and admins can approve timesheets",
        ));
    }
    if period.status != EntryStatus::Submitted {
        return Err(WorkflowError::NotSubmitted {
            status: period.status,
        });
    }
    store
        .update_entry_statuses(
            &period.row_refs(),
            EntryStatus::Approved,
            actor.audit_name(),
            comment,
        )
        .await?;
    info!(
        associate_id = %period.associate_id,
        week_start = %period.week_start,
        approver = %actor.associate_id,
        "timesheet approved"
    );
    Ok(())
}

/// Reject a submitted period. The reason is mandatory and lands in the audit
/// trail; the check runs before any store call.
pub async fn reject_period(
    store: &dyn TimesheetStore,
    period: &Period,
    actor: &Actor,
    reason: &str,
) -> Result<(), WorkflowError> {
    let reason = reason.trim();
    if reason.is_empty() {
        return Err(WorkflowError::MissingReason);
    }
    if !actor.role.can_approve() {
        return Err(WorkflowError::NotPermitted(
            "only project managers and admins can reject timesheets",
        ));
    }
    if period.status != EntryStatus::Submitted {
        return Err(WorkflowError::NotSubmitted {
            status: period.status,
        });
    }
    store
        .update_entry_statuses(
            &period.row_refs(),
            EntryStatus::Rejected,
            actor.audit_name(),
            Some(reason),
        )
        .await?;
    info!(
        associate_id = %period.associate_id,
        week_start = %period.week_start,
        approver = %actor.associate_id,
        "timesheet rejected"
    );
    Ok(())
}

/// Withdraw a submitted period back to `Saved` so it becomes editable again.
/// Only the submitter may withdraw, and no audit line is written.
pub async fn withdraw_period(
    store: &dyn TimesheetStore,
    period: &Period,
    actor: &Actor,
) -> Result<(), WorkflowError> {
    let is_owner = actor.associate_id == period.associate_id;
    if !actor.role.can_withdraw(is_owner) {
        return Err(WorkflowError::NotPermitted(
            "a timesheet can only be withdrawn by its submitter",
        ));
    }
    if period.status != EntryStatus::Submitted {
        return Err(WorkflowError::NotSubmitted {
            status: period.status,
        });
    }
    store
        .update_entry_statuses(
            &period.row_refs(),
            EntryStatus::Saved,
            actor.audit_name(),
            None,
        )
        .await?;
    info!(
        associate_id = %period.associate_id,
        week_start = %period.week_start,
        "timesheet withdrawn"
    );
    Ok(())
}
