// src/store.rs
//
// Boundary to the collaborator store that owns the raw rows. The HRMS REST
// backend implements this in production (`hrms_client`); `MemoryStore` backs
// tests and local runs with the same observable behavior, including the
// sheet-style row references that shift when an earlier row is deleted.

use async_trait::async_trait;
use chrono::{Local, NaiveDateTime};
use std::sync::Mutex;
use thiserror::Error;

use crate::audit::{self, AuditAction};
use crate::model::{parse_work_date, Allocation, Associate, EntryStatus, NewTimeEntry, TimeEntry};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("time entry row {row_index} not found")]
    RowNotFound { row_index: u32 },
    #[error("store request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("store returned {status}: {message}")]
    Api { status: u16, message: String },
}

/// Filter for `list_time_entries`. All fields optional; date bounds apply to
/// the parsed work date and silently exclude rows whose date cannot be
/// parsed, matching the backend's behavior.
#[derive(Debug, Clone, Default)]
pub struct EntryFilter {
    pub associate_id: Option<String>,
    pub start_date: Option<chrono::NaiveDate>,
    pub end_date: Option<chrono::NaiveDate>,
}

impl EntryFilter {
    pub fn for_associate(associate_id: &str) -> Self {
        EntryFilter {
            associate_id: Some(associate_id.to_string()),
            ..Default::default()
        }
    }

    fn matches(&self, entry: &TimeEntry) -> bool {
        if let Some(aid) = &self.associate_id {
            if &entry.associate_id != aid {
                return false;
            }
        }
        if self.start_date.is_some() || self.end_date.is_some() {
            let Some(date) = parse_work_date(&entry.work_date) else {
                return false;
            };
            if let Some(start) = self.start_date {
                if date < start {
                    return false;
                }
            }
            if let Some(end) = self.end_date {
                if date > end {
                    return false;
                }
            }
        }
        true
    }
}

#[async_trait]
pub trait TimesheetStore: Send + Sync {
    async fn list_time_entries(&self, filter: &EntryFilter) -> Result<Vec<TimeEntry>, StoreError>;

    /// Bulk insert. The store assigns row references.
    async fn create_time_entries(&self, entries: Vec<NewTimeEntry>) -> Result<(), StoreError>;

    /// Delete one row. Row references after the deleted row shift down by
    /// one, so callers deleting several rows must go in descending order.
    async fn delete_time_entry(&self, row_index: u32) -> Result<(), StoreError>;

    /// Batch status transition over a set of row references, appending an
    /// audit line for Approved/Rejected transitions. One call per period is
    /// the intended contract; the store offers no transaction beyond that.
    async fn update_entry_statuses(
        &self,
        row_refs: &[u32],
        status: EntryStatus,
        actor_name: &str,
        note: Option<&str>,
    ) -> Result<(), StoreError>;

    async fn list_allocations(
        &self,
        associate_id: Option<&str>,
    ) -> Result<Vec<Allocation>, StoreError>;

    async fn list_associates(&self) -> Result<Vec<Associate>, StoreError>;
}

// --- In-memory store ---

/// Rows start at index 2 like the sheet the backend wraps (row 1 holds the
/// column headers).
const FIRST_ROW_INDEX: u32 = 2;

struct StoredRow {
    associate_id: String,
    work_date: String,
    project_id: String,
    task: String,
    hours: rust_decimal::Decimal,
    status: EntryStatus,
    comments: String,
}

pub struct MemoryStore {
    rows: Mutex<Vec<StoredRow>>,
    allocations: Mutex<Vec<Allocation>>,
    associates: Mutex<Vec<Associate>>,
    /// Fixed clock for deterministic audit timestamps in tests.
    fixed_now: Option<NaiveDateTime>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore {
            rows: Mutex::new(Vec::new()),
            allocations: Mutex::new(Vec::new()),
            associates: Mutex::new(Vec::new()),
            fixed_now: None,
        }
    }

    pub fn with_clock(now: NaiveDateTime) -> Self {
        MemoryStore {
            fixed_now: Some(now),
            ..MemoryStore::new()
        }
    }

    pub fn set_allocations(&self, allocations: Vec<Allocation>) {
        *self.allocations.lock().expect("memory store mutex poisoned") = allocations;
    }

    pub fn set_associates(&self, associates: Vec<Associate>) {
        *self.associates.lock().expect("memory store mutex poisoned") = associates;
    }

    fn now(&self) -> NaiveDateTime {
        self.fixed_now
            .unwrap_or_else(|| Local::now().naive_local())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        MemoryStore::new()
    }
}

#[async_trait]
impl TimesheetStore for MemoryStore {
    async fn list_time_entries(&self, filter: &EntryFilter) -> Result<Vec<TimeEntry>, StoreError> {
        let rows = self.rows.lock().expect("memory store mutex poisoned");
        Ok(rows
            .iter()
            .enumerate()
            .map(|(i, r)| TimeEntry {
                row_index: FIRST_ROW_INDEX + i as u32,
                associate_id: r.associate_id.clone(),
                work_date: r.work_date.clone(),
                project_id: r.project_id.clone(),
                task: r.task.clone(),
                hours: r.hours,
                status: r.status,
                comments: r.comments.clone(),
            })
            .filter(|e| filter.matches(e))
            .collect())
    }

    async fn create_time_entries(&self, entries: Vec<NewTimeEntry>) -> Result<(), StoreError> {
        let mut rows = self.rows.lock().expect("memory store mutex poisoned");
        for e in entries {
            rows.push(StoredRow {
                associate_id: e.associate_id,
                work_date: e.work_date,
                project_id: e.project_id,
                task: e.task,
                hours: e.hours,
                status: e.status,
                comments: e.comments,
            });
        }
        Ok(())
    }

    async fn delete_time_entry(&self, row_index: u32) -> Result<(), StoreError> {
        let mut rows = self.rows.lock().expect("memory store mutex poisoned");
        let pos = row_index
            .checked_sub(FIRST_ROW_INDEX)
            .map(|p| p as usize)
            .filter(|p| *p < rows.len())
            .ok_or(StoreError::RowNotFound { row_index })?;
        rows.remove(pos);
        Ok(())
    }

    async fn update_entry_statuses(
        &self,
        row_refs: &[u32],
        status: EntryStatus,
        actor_name: &str,
        note: Option<&str>,
    ) -> Result<(), StoreError> {
        let line = match status {
            EntryStatus::Approved => Some(audit::format_line(
                self.now(),
                actor_name,
                AuditAction::Approved,
                note,
            )),
            EntryStatus::Rejected => Some(audit::format_line(
                self.now(),
                actor_name,
                AuditAction::Rejected,
                note,
            )),
            // Withdraw (back to Saved) leaves the trail untouched.
            EntryStatus::Saved | EntryStatus::Submitted => None,
        };

        let mut rows = self.rows.lock().expect("memory store mutex poisoned");
        for &row_index in row_refs {
            let pos = row_index
                .checked_sub(FIRST_ROW_INDEX)
                .map(|p| p as usize)
                .filter(|p| *p < rows.len())
                .ok_or(StoreError::RowNotFound { row_index })?;
            let row = &mut rows[pos];
            row.status = status;
            if let Some(line) = &line {
                row.comments = audit::append_line(&row.comments, line);
            }
        }
        Ok(())
    }

    async fn list_allocations(
        &self,
        associate_id: Option<&str>,
    ) -> Result<Vec<Allocation>, StoreError> {
        let allocations = self.allocations.lock().expect("memory store mutex poisoned");
        Ok(allocations
            .iter()
            .filter(|a| associate_id.map_or(true, |aid| a.associate_id == aid))
            .cloned()
            .collect())
    }

    async fn list_associates(&self) -> Result<Vec<Associate>, StoreError> {
        Ok(self
            .associates
            .lock()
            .expect("memory store mutex poisoned")
            .clone())
    }
}
