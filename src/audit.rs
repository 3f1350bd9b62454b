// src/audit.rs
//
// The audit trail is a newline-delimited text blob shared by every entry of a
// submission batch. Each line is "<dd-Mmm-yyyy hh:mm:ss> <actor> <Action>"
// with an optional free-text note after the action. Old data contains lines
// that never matched the pattern; those render as opaque text, they are not
// errors.

use chrono::NaiveDateTime;
use once_cell::sync::Lazy;
use regex::Regex;

pub const AUDIT_TIMESTAMP_FORMAT: &str = "%d-%b-%Y %H:%M:%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditAction {
    Submitted,
    Approved,
    Rejected,
    Saved,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Submitted => "Submitted",
            AuditAction::Approved => "Approved",
            AuditAction::Rejected => "Rejected",
            AuditAction::Saved => "Saved",
        }
    }

    fn from_str(s: &str) -> Option<AuditAction> {
        match s {
            "Submitted" => Some(AuditAction::Submitted),
            "Approved" => Some(AuditAction::Approved),
            "Rejected" => Some(AuditAction::Rejected),
            "Saved" => Some(AuditAction::Saved),
            _ => None,
        }
    }
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One parsed line of the trail. `Opaque` carries lines that do not match the
/// standard pattern so callers can still display them verbatim.
#[derive(Debug, Clone, PartialEq)]
pub enum AuditLine {
    Event {
        timestamp: String,
        actor: String,
        action: AuditAction,
        note: Option<String>,
    },
    Opaque(String),
}

// Timestamp tolerates both "-" and " " separators because early rows were
// written by hand. The optional colon after the action exists in the wild too.
static AUDIT_LINE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(\d{2}[- ][A-Za-z]{3}[- ]\d{4}\s\d{2}:\d{2}:\d{2})\s+(.+?)\s+(Submitted|Approved|Rejected|Saved)(?::)?(?:\s+(.*))?$",
    )
    .expect("audit line regex is valid")
});

pub fn format_timestamp(now: NaiveDateTime) -> String {
    now.format(AUDIT_TIMESTAMP_FORMAT).to_string()
}

/// Build one audit line: `"<timestamp> <actor> <Action>[ <note>]"`.
pub fn format_line(
    now: NaiveDateTime,
    actor_name: &str,
    action: AuditAction,
    note: Option<&str>,
) -> String {
    let stamp = format_timestamp(now);
    match note.map(str::trim).filter(|n| !n.is_empty()) {
        Some(note) => format!("{stamp} {actor_name} {action} {note}"),
        None => format!("{stamp} {actor_name} {action}"),
    }
}

/// Append `line` to an existing trail, never overwriting prior lines.
pub fn append_line(trail: &str, line: &str) -> String {
    if trail.trim().is_empty() {
        line.to_string()
    } else {
        format!("{trail}\n{line}")
    }
}

pub fn parse_line(line: &str) -> AuditLine {
    match AUDIT_LINE_RE.captures(line) {
        Some(caps) => {
            let action = AuditAction::from_str(&caps[3])
                .expect("regex alternation only matches known actions");
            AuditLine::Event {
                timestamp: caps[1].to_string(),
                actor: caps[2].to_string(),
                action,
                note: caps.get(4).map(|m| m.as_str().to_string()),
            }
        }
        None => AuditLine::Opaque(line.to_string()),
    }
}

/// Parse a whole trail, skipping blank lines.
pub fn parse_trail(trail: &str) -> Vec<AuditLine> {
    trail
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(parse_line)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 2)
            .unwrap()
            .and_hms_opt(14, 30, 5)
            .unwrap()
    }

    #[test]
    fn formats_timestamp_in_day_month_abbr_year_form() {
        assert_eq!(format_timestamp(ts()), "02-Mar-2025 14:30:05");
    }

    #[test]
    fn format_line_omits_empty_note() {
        let line = format_line(ts(), "Jane Doe", AuditAction::Submitted, None);
        assert_eq!(line, "02-Mar-2025 14:30:05 Jane Doe Submitted");
        let line = format_line(ts(), "Jane Doe", AuditAction::Approved, Some("  "));
        assert_eq!(line, "02-Mar-2025 14:30:05 Jane Doe Approved");
    }

    #[test]
    fn generated_lines_parse_back() {
        let line = format_line(ts(), "Jane Doe", AuditAction::Rejected, Some("hours mismatch"));
        match parse_line(&line) {
            AuditLine::Event {
                timestamp,
                actor,
                action,
                note,
            } => {
                assert_eq!(timestamp, "02-Mar-2025 14:30:05");
                assert_eq!(actor, "Jane Doe");
                assert_eq!(action, AuditAction::Rejected);
                assert_eq!(note.as_deref(), Some("hours mismatch"));
            }
            other => panic!("expected parsed event, got {other:?}"),
        }
    }

    #[test]
    fn space_separated_timestamp_and_colon_are_tolerated() {
        let line = "02 Mar 2025 09:00:00 Sam Lee Approved: looks good";
        match parse_line(line) {
            AuditLine::Event { action, note, .. } => {
                assert_eq!(action, AuditAction::Approved);
                assert_eq!(note.as_deref(), Some("looks good"));
            }
            other => panic!("expected parsed event, got {other:?}"),
        }
    }

    #[test]
    fn non_matching_lines_become_opaque() {
        let trail = "migrated from legacy sheet\n02-Mar-2025 14:30:05 Jane Doe Submitted\n";
        let parsed = parse_trail(trail);
        assert_eq!(parsed.len(), 2);
        assert_eq!(
            parsed[0],
            AuditLine::Opaque("migrated from legacy sheet".to_string())
        );
        assert!(matches!(parsed[1], AuditLine::Event { .. }));
    }

    #[test]
    fn append_line_never_overwrites() {
        let first = format_line(ts(), "Jane", AuditAction::Submitted, None);
        let trail = append_line("", &first);
        let second = format_line(ts(), "Sam", AuditAction::Approved, Some("ok"));
        let trail = append_line(&trail, &second);
        assert_eq!(trail.lines().count(), 2);
        assert!(trail.starts_with(&first));
        assert!(trail.ends_with(&second));
    }
}
