mod common;

use common::*;
use dayplan::model::{Frequency, Recurrence, Scheduling, TaskDraft, TaskOrigin};

#[test]
fn test_weekly_expansion_with_inclusive_end_date() {
    let rule = Recurrence {
        frequency: Frequency::Weekly,
        end_date: Some(date(2024, 1, 22)),
    };
    let dates = rule.occurrences(date(2024, 1, 1), date(2024, 1, 1));
    assert_eq!(
        dates,
        vec![date(2024, 1, 1), date(2024, 1, 8), date(2024, 1, 15), date(2024, 1, 22)]
    );
}

#[test]
fn test_daily_expansion_defaults_to_a_year() {
    let rule = Recurrence {
        frequency: Frequency::Daily,
        end_date: None,
    };
    let today = date(2024, 1, 1);
    let dates = rule.occurrences(today, today);
    // Anchor plus 365 days, both ends included
    assert_eq!(dates.len(), 366);
    assert_eq!(*dates.first().unwrap(), today);
    assert_eq!(*dates.last().unwrap(), date(2024, 12, 31));
}

#[test]
fn test_monthly_expansion_handles_short_months() {
    let rule = Recurrence {
        frequency: Frequency::Monthly,
        end_date: Some(date(2024, 4, 30)),
    };
    let dates = rule.occurrences(date(2024, 1, 31), date(2024, 1, 1));
    assert_eq!(
        dates,
        vec![date(2024, 1, 31), date(2024, 2, 29), date(2024, 3, 29), date(2024, 4, 29)]
    );
}

#[test]
fn test_end_date_before_anchor_yields_nothing() {
    let rule = Recurrence {
        frequency: Frequency::Daily,
        end_date: Some(date(2023, 12, 31)),
    };
    assert!(rule.occurrences(date(2024, 1, 1), date(2024, 1, 1)).is_empty());
}

#[test]
fn test_occurrence_drafts_drop_the_rule() {
    let draft = TaskDraft {
        title: "Standup".to_string(),
        note: None,
        origin: TaskOrigin::Remote,
        scheduling: scheduled(date(2024, 1, 1), 9, 30, 15),
        recurrence: Some(Recurrence {
            frequency: Frequency::Weekly,
            end_date: None,
        }),
        reminder: None,
    };

    let occurrence = draft.occurrence_on(date(2024, 1, 8));
    assert!(occurrence.recurrence.is_none());
    match occurrence.scheduling {
        Scheduling::Scheduled { date: d, time, duration_minutes } => {
            assert_eq!(d, date(2024, 1, 8));
            assert_eq!(time, chrono::NaiveTime::from_hms_opt(9, 30, 0).unwrap());
            assert_eq!(duration_minutes, 15);
        }
        other => panic!("unexpected scheduling: {:?}", other),
    }
}

#[test]
fn test_id_prefixes_mark_origin() {
    let local = dayplan::model::new_local_id();
    let pending = dayplan::model::new_pending_id();
    assert!(local.starts_with("local-"));
    assert!(pending.starts_with("pending-"));

    let task = TaskDraft {
        title: "T".to_string(),
        note: None,
        origin: TaskOrigin::LocalOnly,
        scheduling: Scheduling::Unscheduled,
        recurrence: None,
        reminder: None,
    }
    .into_task(local);
    assert!(!task.has_remote_id());
}
