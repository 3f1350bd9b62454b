// src/model.rs

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// --- Reserved time-off codes ---

// "HOLIDAY" is a legacy spelling that still exists in older sheet rows.
pub const TIME_OFF_CODES: [&str; 3] = ["PTO", "HLDY", "HOLIDAY"];

pub fn is_time_off(project_id: &str) -> bool {
    TIME_OFF_CODES.contains(&project_id)
}

// --- Entry lifecycle status ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntryStatus {
    // "Draft" is the spelling some older rows carry for the same state.
    #[serde(alias = "Draft")]
    Saved,
    Submitted,
    Approved,
    Rejected,
}

impl EntryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryStatus::Saved => "Saved",
            EntryStatus::Submitted => "Submitted",
            EntryStatus::Approved => "Approved",
            EntryStatus::Rejected => "Rejected",
        }
    }

    /// A period in one of these states is read-only for its owner.
    pub fn is_locked(&self) -> bool {
        matches!(self, EntryStatus::Submitted | EntryStatus::Approved)
    }
}

impl std::fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// --- Time entries ---

/// One logged (associate, date, project/task, hours) row as stored by the
/// HRMS backend. `row_index` is the opaque row reference the store assigns;
/// it is only valid until a delete shifts later rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeEntry {
    pub row_index: u32,
    pub associate_id: String,
    /// Raw date string as stored. Parsed tolerantly at use sites; rows with
    /// garbage dates are skipped during aggregation, not rejected.
    pub work_date: String,
    pub project_id: String,
    #[serde(default)]
    pub task: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub hours: Decimal,
    pub status: EntryStatus,
    /// Newline-delimited audit log shared by all entries of one submission.
    #[serde(default)]
    pub comments: String,
}

/// Insert payload for the bulk-create endpoint. The store assigns the row
/// reference, so there is none here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTimeEntry {
    pub associate_id: String,
    pub work_date: String,
    pub project_id: String,
    #[serde(default)]
    pub task: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub hours: Decimal,
    pub status: EntryStatus,
    #[serde(default)]
    pub comments: String,
}

// --- Allocations (collaborator-owned, read-only here) ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Allocation {
    pub associate_id: String,
    pub project_id: String,
    #[serde(default)]
    pub allocation_type: String,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
}

impl Allocation {
    pub fn is_billable(&self) -> bool {
        self.allocation_type.trim().eq_ignore_ascii_case("billable")
    }

    /// Whether `date` falls inside the allocation window. A missing or
    /// unparsable start date is treated as negative infinity, a missing or
    /// unparsable end date as positive infinity.
    pub fn covers(&self, date: NaiveDate) -> bool {
        let after_start = match self.start_date.as_deref().and_then(parse_work_date) {
            Some(start) => date >= start,
            None => true,
        };
        let before_end = match self.end_date.as_deref().and_then(parse_work_date) {
            Some(end) => date <= end,
            None => true,
        };
        after_start && before_end
    }
}

// --- Associates ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Associate {
    pub associate_id: String,
    pub associate_name: String,
}

// --- Actor identity (supplied by the auth gateway) ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Associate,
    ProjectManager,
    Admin,
}

impl Role {
    /// Parse the role strings the auth context emits. Anything unrecognized
    /// falls back to the least-privileged role.
    pub fn parse(s: &str) -> Role {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Role::Admin,
            "project manager" | "projectmanager" | "project_manager" => Role::ProjectManager,
            _ => Role::Associate,
        }
    }

    pub fn can_approve(&self) -> bool {
        matches!(self, Role::Admin | Role::ProjectManager)
    }

    /// Withdraw is restricted to the submitter; role does not widen it.
    pub fn can_withdraw(&self, is_owner: bool) -> bool {
        is_owner
    }
}

#[derive(Debug, Clone)]
pub struct Actor {
    pub associate_id: String,
    pub display_name: String,
    pub role: Role,
}

impl Actor {
    /// Name used in audit lines, falling back to the id like the UI does.
    pub fn audit_name(&self) -> &str {
        if self.display_name.trim().is_empty() {
            &self.associate_id
        } else {
            &self.display_name
        }
    }
}

// --- Date handling ---

/// Formats the sheet-backed store has been observed to hold. ISO first since
/// that is what this service writes.
const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%d/%m/%Y", "%m/%d/%Y"];

pub fn parse_work_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
}

pub fn format_work_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}
