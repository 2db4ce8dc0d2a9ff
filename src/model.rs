//! Core task model shared by the engine, store, gateway and query surface.

use chrono::{Duration, Months, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Prefix for ids of tasks that never leave the client.
pub const LOCAL_ID_PREFIX: &str = "local-";

/// Prefix for temporary ids of tasks created while offline, replaced by the
/// canonical remote id after the next full fetch.
pub const PENDING_ID_PREFIX: &str = "pending-";

/// Default expansion horizon for recurring tasks without an end date, in days.
pub const RECURRENCE_HORIZON_DAYS: i64 = 365;

/// Where a task came from, which determines its sync behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskOrigin {
    /// Authored and persisted purely client-side; never round-trips to the
    /// remote calendar until explicitly promoted.
    LocalOnly,
    /// Materialized from (or destined for) a remote calendar event.
    Remote,
}

/// Scheduling state of a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Scheduling {
    Unscheduled,
    Scheduled {
        date: NaiveDate,
        time: NaiveTime,
        duration_minutes: i64,
    },
    AllDay {
        date: NaiveDate,
    },
}

impl Scheduling {
    /// Calendar date this task resolves to, if any.
    pub fn date(&self) -> Option<NaiveDate> {
        match self {
            Scheduling::Unscheduled => None,
            Scheduling::Scheduled { date, .. } | Scheduling::AllDay { date } => Some(*date),
        }
    }

    /// Time of day for timed tasks.
    pub fn time(&self) -> Option<NaiveTime> {
        match self {
            Scheduling::Scheduled { time, .. } => Some(*time),
            _ => None,
        }
    }

    pub fn is_scheduled(&self) -> bool {
        !matches!(self, Scheduling::Unscheduled)
    }
}

/// Recurrence frequency for locally authored recurring tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
}

/// Recurrence rule. Locally authored recurring tasks are expanded into
/// discrete occurrences at creation time; remote recurrence stays remote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recurrence {
    pub frequency: Frequency,
    pub end_date: Option<NaiveDate>,
}

impl Recurrence {
    /// Expand an anchor date into every occurrence date up to the rule's end
    /// date (inclusive) or the default horizon from `today`.
    pub fn occurrences(&self, anchor: NaiveDate, today: NaiveDate) -> Vec<NaiveDate> {
        let end = self
            .end_date
            .unwrap_or_else(|| today + Duration::days(RECURRENCE_HORIZON_DAYS));
        let mut dates = Vec::new();
        let mut current = anchor;
        while current <= end {
            dates.push(current);
            current = match self.frequency {
                Frequency::Daily => current + Duration::days(1),
                Frequency::Weekly => current + Duration::days(7),
                Frequency::Monthly => match current.checked_add_months(Months::new(1)) {
                    Some(next) => next,
                    None => break,
                },
            };
        }
        dates
    }
}

/// The unified task entity exposed to every consumer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    pub origin: TaskOrigin,
    pub scheduling: Scheduling,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recurrence: Option<Recurrence>,
    pub completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reminder: Option<bool>,
}

impl Task {
    /// Whether the id is traceable to a raw remote event id.
    pub fn has_remote_id(&self) -> bool {
        !self.id.starts_with(LOCAL_ID_PREFIX) && !self.id.starts_with(PENDING_ID_PREFIX)
    }
}

/// Input for task creation; the engine assigns the id and completion state.
#[derive(Debug, Clone)]
pub struct TaskDraft {
    pub title: String,
    pub note: Option<String>,
    pub origin: TaskOrigin,
    pub scheduling: Scheduling,
    pub recurrence: Option<Recurrence>,
    pub reminder: Option<bool>,
}

impl TaskDraft {
    /// Materialize a task from this draft with the given id.
    pub fn into_task(self, id: String) -> Task {
        Task {
            id,
            title: self.title,
            note: self.note,
            origin: self.origin,
            scheduling: self.scheduling,
            recurrence: self.recurrence,
            completed: false,
            reminder: self.reminder,
        }
    }

    /// Copy of this draft re-anchored on a single occurrence date, with the
    /// recurrence rule stripped.
    pub fn occurrence_on(&self, date: NaiveDate) -> TaskDraft {
        let scheduling = match &self.scheduling {
            Scheduling::Scheduled {
                time,
                duration_minutes,
                ..
            } => Scheduling::Scheduled {
                date,
                time: *time,
                duration_minutes: *duration_minutes,
            },
            Scheduling::AllDay { .. } => Scheduling::AllDay { date },
            Scheduling::Unscheduled => Scheduling::Unscheduled,
        };
        TaskDraft {
            title: self.title.clone(),
            note: self.note.clone(),
            origin: self.origin,
            scheduling,
            recurrence: None,
            reminder: self.reminder,
        }
    }
}

/// Partial update applied to an existing task.
#[derive(Debug, Clone, Default)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub note: Option<String>,
    pub scheduling: Option<Scheduling>,
    pub completed: Option<bool>,
    pub reminder: Option<bool>,
}

impl TaskPatch {
    /// Whether the patch touches anything besides the completion flag.
    pub fn has_remote_fields(&self) -> bool {
        self.title.is_some() || self.note.is_some() || self.scheduling.is_some()
    }
}

/// Generate an id for a local-only task.
pub fn new_local_id() -> String {
    format!("{}{}", LOCAL_ID_PREFIX, Uuid::new_v4())
}

/// Generate a temporary id for a task queued for remote creation.
pub fn new_pending_id() -> String {
    format!("{}{}", PENDING_ID_PREFIX, Uuid::new_v4())
}
