//! Read-side queries over the unified task collection.
//!
//! The planner's day runs from the configured day-start hour to the same
//! hour the next morning, so a 01:00 task belongs to the previous calendar
//! date's logical day.

use chrono::{Duration, NaiveDate, NaiveDateTime, Timelike};

use crate::model::{Scheduling, Task, TaskOrigin};

/// Tasks belonging to the logical day anchored on `date`: everything on
/// `date` at or after the day-start hour, plus the early hours of the next
/// calendar date. All-day tasks sort before timed ones; timed tasks sort by
/// time of day with the after-midnight tail ordered last.
pub fn tasks_for_date(tasks: &[Task], date: NaiveDate, day_start_hour: u32) -> Vec<Task> {
    let mut day: Vec<Task> = tasks
        .iter()
        .filter(|task| in_logical_day(task, date, day_start_hour))
        .cloned()
        .collect();
    day.sort_by_key(|task| sort_key(task, day_start_hour));
    day
}

fn in_logical_day(task: &Task, date: NaiveDate, day_start_hour: u32) -> bool {
    match &task.scheduling {
        Scheduling::Unscheduled => false,
        Scheduling::AllDay { date: d } => *d == date,
        Scheduling::Scheduled { date: d, time, .. } => {
            if *d == date {
                time.hour() >= day_start_hour
            } else if *d == date + Duration::days(1) {
                time.hour() < day_start_hour
            } else {
                false
            }
        }
    }
}

fn sort_key(task: &Task, day_start_hour: u32) -> (u32, u32, u32) {
    match &task.scheduling {
        Scheduling::Scheduled { time, .. } => {
            let hour = time.hour();
            let logical_hour = if hour < day_start_hour { hour + 24 } else { hour };
            (1, logical_hour, time.minute())
        }
        _ => (0, 0, 0),
    }
}

/// The list view: every local-only task, plus remote-tagged tasks that have
/// no scheduling, no recurrence and no real remote id. The latter filter
/// keeps partially-mapped remote data out of the list.
pub fn unscheduled_tasks(tasks: &[Task]) -> Vec<Task> {
    tasks
        .iter()
        .filter(|task| {
            task.origin == TaskOrigin::LocalOnly
                || (!task.scheduling.is_scheduled()
                    && task.recurrence.is_none()
                    && !task.has_remote_id())
        })
        .cloned()
        .collect()
}

/// The earliest incomplete timed task strictly after `after`, optionally
/// skipping one id. Drives the "up next" display and reminder scheduling.
pub fn next_incomplete_task<'a>(
    tasks: &'a [Task],
    after: NaiveDateTime,
    excluding: Option<&str>,
) -> Option<&'a Task> {
    tasks
        .iter()
        .filter(|task| !task.completed && Some(task.id.as_str()) != excluding)
        .filter_map(|task| match &task.scheduling {
            Scheduling::Scheduled { date, time, .. } => {
                Some((NaiveDateTime::new(*date, *time), task))
            }
            _ => None,
        })
        .filter(|(start, _)| *start > after)
        .min_by_key(|(start, _)| *start)
        .map(|(_, task)| task)
}
