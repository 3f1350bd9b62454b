// src/workflow_tests.rs

#[cfg(test)]
mod tests {
    use crate::audit::{parse_trail, AuditAction, AuditLine};
    use crate::model::{Actor, EntryStatus, NewTimeEntry, Role};
    use crate::period::{derive_periods, find_period, Period};
    use crate::store::{EntryFilter, MemoryStore, TimesheetStore};
    use crate::workflow::{
        approve_period, reject_period, save_week, submit_week, withdraw_period, DraftRow,
        WeekDraft, WorkflowError,
    };
    use chrono::{NaiveDate, NaiveDateTime};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use std::collections::BTreeMap;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    // All store-side audit stamps (approve/reject) use this fixed clock.
    fn manager_clock() -> NaiveDateTime {
        d("2025-03-10").and_hms_opt(9, 0, 0).unwrap()
    }

    fn submit_time() -> NaiveDateTime {
        d("2025-03-02").and_hms_opt(14, 30, 5).unwrap()
    }

    fn store() -> MemoryStore {
        MemoryStore::with_clock(manager_clock())
    }

    fn alice() -> Actor {
        Actor {
            associate_id: "A1".to_string(),
            display_name: "Alice Example".to_string(),
            role: Role::Associate,
        }
    }

    fn mona() -> Actor {
        Actor {
            associate_id: "M1".to_string(),
            display_name: "Mona Manager".to_string(),
            role: Role::ProjectManager,
        }
    }

    fn draft(associate_id: &str, week: &str, rows: &[(&str, &str, &[(&str, Decimal)])]) -> WeekDraft {
        WeekDraft {
            associate_id: associate_id.to_string(),
            week_start: d(week),
            rows: rows
                .iter()
                .map(|(project_id, task, cells)| DraftRow {
                    project_id: project_id.to_string(),
                    task: task.to_string(),
                    cells: cells
                        .iter()
                        .map(|(date, hours)| (d(date), *hours))
                        .collect::<BTreeMap<_, _>>(),
                })
                .collect(),
            comments: String::new(),
        }
    }

    async fn load_period(store: &MemoryStore, associate_id: &str, week: &str) -> Period {
        let entries = store
            .list_time_entries(&EntryFilter::default())
            .await
            .unwrap();
        let periods = derive_periods(&entries, &[]);
        find_period(&periods, associate_id, d(week)).expect("period should exist")
    }

    #[tokio::test]
    async fn save_persists_only_positive_cells_as_saved() {
        let store = store();
        let draft = draft(
            "A1",
            "2025-03-02",
            &[
                ("PX", "dev", &[("2025-03-03", dec!(8)), ("2025-03-04", dec!(0))]),
                ("PTO", "", &[("2025-03-07", dec!(4))]),
            ],
        );
        let written = save_week(&store, &draft, &alice(), submit_time()).await.unwrap();
        assert_eq!(written, 2);

        let entries = store.list_time_entries(&EntryFilter::default()).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().all(|e| e.status == EntryStatus::Saved));
        assert!(entries.iter().all(|e| e.comments.is_empty()));
        assert!(entries.iter().any(|e| e.project_id == "PTO" && e.hours == dec!(4)));
    }

    #[tokio::test]
    async fn saving_twice_with_identical_data_is_idempotent() {
        let store = store();
        let draft = draft(
            "A1",
            "2025-03-02",
            &[("PX", "dev", &[("2025-03-03", dec!(8)), ("2025-03-05", dec!(2))])],
        );
        save_week(&store, &draft, &alice(), submit_time()).await.unwrap();
        let first: Vec<_> = store
            .list_time_entries(&EntryFilter::default())
            .await
            .unwrap();

        save_week(&store, &draft, &alice(), submit_time()).await.unwrap();
        let second: Vec<_> = store
            .list_time_entries(&EntryFilter::default())
            .await
            .unwrap();

        assert_eq!(first.len(), second.len());
        for (a, b) in first.iter().zip(second.iter()) {
            assert_eq!(a.work_date, b.work_date);
            assert_eq!(a.project_id, b.project_id);
            assert_eq!(a.task, b.task);
            assert_eq!(a.hours, b.hours);
            assert_eq!(a.status, b.status);
        }
    }

    #[tokio::test]
    async fn empty_draft_is_rejected_before_touching_the_store() {
        let store = store();
        let seed = draft("A1", "2025-03-02", &[("PX", "", &[("2025-03-03", dec!(8))])]);
        save_week(&store, &seed, &alice(), submit_time()).await.unwrap();

        let empty = draft(
            "A1",
            "2025-03-02",
            &[("PX", "", &[("2025-03-03", dec!(0))])],
        );
        let err = submit_week(&store, &empty, &alice(), submit_time())
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::EmptyTimesheet));

        // Nothing was deleted or inserted.
        let entries = store.list_time_entries(&EntryFilter::default()).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].hours, dec!(8));
    }

    #[tokio::test]
    async fn submit_tags_entries_and_appends_one_audit_line() {
        let store = store();
        let draft = draft(
            "A1",
            "2025-03-02",
            &[("PX", "dev", &[("2025-03-03", dec!(8)), ("2025-03-04", dec!(6))])],
        );
        submit_week(&store, &draft, &alice(), submit_time()).await.unwrap();

        let entries = store.list_time_entries(&EntryFilter::default()).await.unwrap();
        assert_eq!(entries.len(), 2);
        for e in &entries {
            assert_eq!(e.status, EntryStatus::Submitted);
            assert_eq!(e.comments, "02-Mar-2025 14:30:05 Alice Example Submitted");
        }
    }

    #[tokio::test]
    async fn replacing_a_week_leaves_other_rows_untouched() {
        let store = store();
        // Interleave another associate's row between A1's rows so the
        // descending delete order actually matters.
        store
            .create_time_entries(vec![
                NewTimeEntry {
                    associate_id: "A1".into(),
                    work_date: "2025-03-03".into(),
                    project_id: "PX".into(),
                    task: "dev".into(),
                    hours: dec!(8),
                    status: EntryStatus::Saved,
                    comments: String::new(),
                },
                NewTimeEntry {
                    associate_id: "B2".into(),
                    work_date: "2025-03-03".into(),
                    project_id: "PZ".into(),
                    task: "ops".into(),
                    hours: dec!(5),
                    status: EntryStatus::Submitted,
                    comments: String::new(),
                },
                NewTimeEntry {
                    associate_id: "A1".into(),
                    work_date: "2025-03-04".into(),
                    project_id: "PX".into(),
                    task: "dev".into(),
                    hours: dec!(8),
                    status: EntryStatus::Saved,
                    comments: String::new(),
                },
            ])
            .await
            .unwrap();

        let draft = draft("A1", "2025-03-02", &[("PX", "dev", &[("2025-03-05", dec!(3))])]);
        save_week(&store, &draft, &alice(), submit_time()).await.unwrap();

        let entries = store.list_time_entries(&EntryFilter::default()).await.unwrap();
        assert_eq!(entries.len(), 2);
        let b2 = entries.iter().find(|e| e.associate_id == "B2").unwrap();
        assert_eq!(b2.project_id, "PZ");
        assert_eq!(b2.hours, dec!(5));
        let a1 = entries.iter().find(|e| e.associate_id == "A1").unwrap();
        assert_eq!(a1.work_date, "2025-03-05");
        assert_eq!(a1.hours, dec!(3));
    }

    #[tokio::test]
    async fn logging_time_on_someone_elses_sheet_is_refused() {
        let store = store();
        let draft = draft("B2", "2025-03-02", &[("PX", "", &[("2025-03-03", dec!(8))])]);
        let err = save_week(&store, &draft, &alice(), submit_time())
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::NotPermitted(_)));
    }

    #[tokio::test]
    async fn reject_without_reason_is_refused_before_any_store_call() {
        let store = store();
        let draft = draft("A1", "2025-03-02", &[("PX", "", &[("2025-03-03", dec!(8))])]);
        submit_week(&store, &draft, &alice(), submit_time()).await.unwrap();

        let period = load_period(&store, "A1", "2025-03-02").await;
        let err = reject_period(&store, &period, &mona(), "   ")
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::MissingReason));

        let after = load_period(&store, "A1", "2025-03-02").await;
        assert_eq!(after.status, EntryStatus::Submitted);
        assert_eq!(after.comments, period.comments);
    }

    #[tokio::test]
    async fn reject_with_reason_transitions_all_rows_and_records_it() {
        let store = store();
        let draft = draft(
            "A1",
            "2025-03-02",
            &[("PX", "", &[("2025-03-03", dec!(8)), ("2025-03-04", dec!(8))])],
        );
        submit_week(&store, &draft, &alice(), submit_time()).await.unwrap();

        let period = load_period(&store, "A1", "2025-03-02").await;
        reject_period(&store, &period, &mona(), "hours mismatch")
            .await
            .unwrap();

        let entries = store.list_time_entries(&EntryFilter::default()).await.unwrap();
        assert!(entries.iter().all(|e| e.status == EntryStatus::Rejected));
        let trail = parse_trail(&entries[0].comments);
        assert_eq!(trail.len(), 2);
        match &trail[1] {
            AuditLine::Event { action, note, actor, .. } => {
                assert_eq!(*action, AuditAction::Rejected);
                assert_eq!(note.as_deref(), Some("hours mismatch"));
                assert_eq!(actor, "Mona Manager");
            }
            other => panic!("expected rejection event, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn rejected_week_can_be_edited_and_resubmitted() {
        let store = store();
        let first = draft("A1", "2025-03-02", &[("PX", "", &[("2025-03-03", dec!(8))])]);
        submit_week(&store, &first, &alice(), submit_time()).await.unwrap();
        let period = load_period(&store, "A1", "2025-03-02").await;
        reject_period(&store, &period, &mona(), "wrong project").await.unwrap();

        // Resubmission carries the prior trail forward.
        let period = load_period(&store, "A1", "2025-03-02").await;
        let mut again = draft("A1", "2025-03-02", &[("PY", "", &[("2025-03-03", dec!(8))])]);
        again.comments = period.comments.clone();
        submit_week(&store, &again, &alice(), submit_time()).await.unwrap();

        let after = load_period(&store, "A1", "2025-03-02").await;
        assert_eq!(after.status, EntryStatus::Submitted);
        let trail = parse_trail(&after.comments);
        assert_eq!(trail.len(), 3);
        assert!(matches!(
            trail[2],
            AuditLine::Event { action: AuditAction::Submitted, .. }
        ));
    }

    #[tokio::test]
    async fn approve_requires_an_approver_role() {
        let store = store();
        let draft = draft("A1", "2025-03-02", &[("PX", "", &[("2025-03-03", dec!(8))])]);
        submit_week(&store, &draft, &alice(), submit_time()).await.unwrap();

        let period = load_period(&store, "A1", "2025-03-02").await;
        let err = approve_period(&store, &period, &alice(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::NotPermitted(_)));
    }

    #[tokio::test]
    async fn approve_refuses_a_period_that_is_not_submitted() {
        let store = store();
        let draft = draft("A1", "2025-03-02", &[("PX", "", &[("2025-03-03", dec!(8))])]);
        save_week(&store, &draft, &alice(), submit_time()).await.unwrap();

        let period = load_period(&store, "A1", "2025-03-02").await;
        let err = approve_period(&store, &period, &mona(), None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            WorkflowError::NotSubmitted { status: EntryStatus::Saved }
        ));
    }

    #[tokio::test]
    async fn withdraw_returns_the_period_to_saved_without_an_audit_line() {
        let store = store();
        let draft = draft("A1", "2025-03-02", &[("PX", "", &[("2025-03-03", dec!(8))])]);
        submit_week(&store, &draft, &alice(), submit_time()).await.unwrap();

        let period = load_period(&store, "A1", "2025-03-02").await;
        let trail_before = period.comments.clone();
        withdraw_period(&store, &period, &alice()).await.unwrap();

        let after = load_period(&store, "A1", "2025-03-02").await;
        assert_eq!(after.status, EntryStatus::Saved);
        assert_eq!(after.comments, trail_before);
    }

    #[tokio::test]
    async fn only_the_submitter_may_withdraw() {
        let store = store();
        let draft = draft("A1", "2025-03-02", &[("PX", "", &[("2025-03-03", dec!(8))])]);
        submit_week(&store, &draft, &alice(), submit_time()).await.unwrap();

        let period = load_period(&store, "A1", "2025-03-02").await;
        let err = withdraw_period(&store, &period, &mona()).await.unwrap_err();
        assert!(matches!(err, WorkflowError::NotPermitted(_)));
    }

    #[tokio::test]
    async fn submitted_and_approved_weeks_cannot_be_overwritten() {
        let store = store();
        let draft = draft("A1", "2025-03-02", &[("PX", "", &[("2025-03-03", dec!(8))])]);
        submit_week(&store, &draft, &alice(), submit_time()).await.unwrap();

        let err = save_week(&store, &draft, &alice(), submit_time())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            WorkflowError::PeriodLocked { status: EntryStatus::Submitted }
        ));
    }

    #[tokio::test]
    async fn submit_then_approve_end_to_end() {
        let store = store();
        // One row on PX, eight hours on Monday of the 2025-03-02 week.
        let draft = draft("A1", "2025-03-02", &[("PX", "", &[("2025-03-03", dec!(8))])]);
        submit_week(&store, &draft, &alice(), submit_time()).await.unwrap();

        let period = load_period(&store, "A1", "2025-03-02").await;
        assert_eq!(period.status, EntryStatus::Submitted);
        assert_eq!(period.total_hours, dec!(8));

        approve_period(&store, &period, &mona(), Some("looks good"))
            .await
            .unwrap();

        let period = load_period(&store, "A1", "2025-03-02").await;
        assert_eq!(period.status, EntryStatus::Approved);
        let trail = parse_trail(&period.comments);
        assert_eq!(trail.len(), 2);
        match (&trail[0], &trail[1]) {
            (
                AuditLine::Event { action: first, .. },
                AuditLine::Event {
                    action: second,
                    note,
                    ..
                },
            ) => {
                assert_eq!(*first, AuditAction::Submitted);
                assert_eq!(*second, AuditAction::Approved);
                assert_eq!(note.as_deref(), Some("looks good"));
            }
            other => panic!("expected two parsed events, got {other:?}"),
        }

        // Approved is terminal: a new submission for that week is refused.
        let err = submit_week(&store, &draft, &alice(), submit_time())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            WorkflowError::PeriodLocked { status: EntryStatus::Approved }
        ));
    }
}
