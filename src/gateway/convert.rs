//! Translation rules between the internal task model and the remote event
//! wire representation.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime};

use super::{EventDraft, EventPatch, EventTime, GatewayError, RemoteEvent};
use crate::model::{Frequency, Recurrence, Scheduling, Task, TaskOrigin, TaskPatch};

const DATE_FORMAT: &str = "%Y-%m-%d";
const DATE_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Build the start/end pair for a scheduling. Timed events carry the resolved
/// time zone; all-day events carry calendar dates with an exclusive end one
/// day after the start, never a same-day end.
pub fn event_times(scheduling: &Scheduling, time_zone: &str) -> Result<(EventTime, EventTime), GatewayError> {
    match scheduling {
        Scheduling::Unscheduled => Err(GatewayError::Rejected(
            "cannot create a remote event without a date".to_string(),
        )),
        Scheduling::Scheduled {
            date,
            time,
            duration_minutes,
        } => {
            let start = NaiveDateTime::new(*date, *time);
            let mut end = start + Duration::minutes(*duration_minutes);
            if end <= start {
                end = start + Duration::minutes(1);
            }
            Ok((
                EventTime {
                    date_time: Some(start.format(DATE_TIME_FORMAT).to_string()),
                    date: None,
                    time_zone: Some(time_zone.to_string()),
                },
                EventTime {
                    date_time: Some(end.format(DATE_TIME_FORMAT).to_string()),
                    date: None,
                    time_zone: Some(time_zone.to_string()),
                },
            ))
        }
        Scheduling::AllDay { date } => Ok((
            EventTime {
                date_time: None,
                date: Some(date.format(DATE_FORMAT).to_string()),
                time_zone: None,
            },
            EventTime {
                date_time: None,
                date: Some((*date + Duration::days(1)).format(DATE_FORMAT).to_string()),
                time_zone: None,
            },
        )),
    }
}

/// Build a creation payload from a task's display fields and scheduling.
pub fn draft_for(
    title: &str,
    note: Option<&str>,
    scheduling: &Scheduling,
    time_zone: &str,
) -> Result<EventDraft, GatewayError> {
    let (start, end) = event_times(scheduling, time_zone)?;
    Ok(EventDraft {
        summary: title.to_string(),
        description: note.map(str::to_string),
        start,
        end,
    })
}

/// Build a partial update payload. Fields absent from the patch are omitted
/// from the outgoing body entirely.
pub fn patch_for(patch: &TaskPatch, time_zone: &str) -> Result<EventPatch, GatewayError> {
    let mut out = EventPatch {
        summary: patch.title.clone(),
        description: patch.note.clone(),
        ..EventPatch::default()
    };
    if let Some(scheduling) = &patch.scheduling {
        let (start, end) = event_times(scheduling, time_zone)?;
        out.start = Some(start);
        out.end = Some(end);
    }
    Ok(out)
}

/// Map a fetched remote event to a task. Returns `None` for events that are
/// cancelled or too malformed to surface (no id, no usable start).
pub fn task_from_event(event: &RemoteEvent) -> Option<Task> {
    if event.id.is_empty() || event.status.as_deref() == Some("cancelled") {
        return None;
    }
    let scheduling = scheduling_from_times(event.start.as_ref()?, event.end.as_ref())?;
    Some(Task {
        id: event.id.clone(),
        title: event
            .summary
            .clone()
            .unwrap_or_else(|| "(untitled)".to_string()),
        note: event.description.clone(),
        origin: TaskOrigin::Remote,
        scheduling,
        recurrence: recurrence_from_rules(event.recurrence.as_deref()),
        completed: false,
        reminder: None,
    })
}

/// Materialize a task from a not-yet-created event payload, under a
/// temporary id. Used to surface queued creations optimistically.
pub fn task_from_draft(id: &str, draft: &EventDraft) -> Option<Task> {
    let event = RemoteEvent {
        id: id.to_string(),
        summary: Some(draft.summary.clone()),
        description: draft.description.clone(),
        status: None,
        start: Some(draft.start.clone()),
        end: Some(draft.end.clone()),
        recurrence: None,
    };
    task_from_event(&event)
}

fn scheduling_from_times(start: &EventTime, end: Option<&EventTime>) -> Option<Scheduling> {
    if let Some(raw) = start.date_time.as_deref() {
        let start_dt = parse_date_time(raw)?;
        let duration_minutes = end
            .and_then(|e| e.date_time.as_deref())
            .and_then(parse_date_time)
            .map(|end_dt| (end_dt - start_dt).num_minutes())
            .filter(|m| *m > 0)
            .unwrap_or(60);
        return Some(Scheduling::Scheduled {
            date: start_dt.date(),
            time: truncate_to_minute(start_dt.time()),
            duration_minutes,
        });
    }
    if let Some(raw) = start.date.as_deref() {
        let date = NaiveDate::parse_from_str(raw, DATE_FORMAT).ok()?;
        return Some(Scheduling::AllDay { date });
    }
    None
}

fn parse_date_time(raw: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_local());
    }
    NaiveDateTime::parse_from_str(raw, DATE_TIME_FORMAT).ok()
}

fn truncate_to_minute(time: NaiveTime) -> NaiveTime {
    NaiveTime::from_hms_opt(
        chrono::Timelike::hour(&time),
        chrono::Timelike::minute(&time),
        0,
    )
    .unwrap_or(time)
}

/// Only the first recurrence rule is consumed on read; anything unrecognized
/// maps to no recurrence.
fn recurrence_from_rules(rules: Option<&[String]>) -> Option<Recurrence> {
    let rule = rules?.first()?;
    let frequency = if rule.contains("FREQ=DAILY") {
        Frequency::Daily
    } else if rule.contains("FREQ=WEEKLY") {
        Frequency::Weekly
    } else if rule.contains("FREQ=MONTHLY") {
        Frequency::Monthly
    } else {
        return None;
    };
    Some(Recurrence {
        frequency,
        end_date: None,
    })
}
