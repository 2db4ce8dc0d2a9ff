#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};

use dayplan::engine::{EngineSettings, PlannerEngine};
use dayplan::gateway::{
    CalendarGateway, EventDraft, EventPatch, EventTime, GatewayError, RemoteEvent,
};
use dayplan::model::{Recurrence, Scheduling, TaskDraft, TaskOrigin};
use dayplan::notify::LogNotifier;
use dayplan::session::SessionContext;
use dayplan::store::LocalStore;

/// One recorded gateway invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    List,
    Create(String),
    Update(String),
    Delete(String),
}

/// Failure mode injected into the mock gateway.
#[derive(Debug, Clone, Copy)]
pub enum Failure {
    Transient,
    Auth,
    Rejected,
}

/// In-memory calendar double that records every call and can be told to
/// fail the next N requests.
pub struct MockGateway {
    calls: Mutex<Vec<Call>>,
    events: Mutex<Vec<RemoteEvent>>,
    fail: Mutex<Option<(Failure, usize)>>,
    next_id: AtomicUsize,
}

impl MockGateway {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            events: Mutex::new(Vec::new()),
            fail: Mutex::new(None),
            next_id: AtomicUsize::new(1),
        })
    }

    pub fn seed(&self, events: Vec<RemoteEvent>) {
        *self.events.lock().unwrap() = events;
    }

    /// Fail the next `count` requests with the given mode.
    pub fn fail_next(&self, failure: Failure, count: usize) {
        *self.fail.lock().unwrap() = Some((failure, count));
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn create_calls(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Create(summary) => Some(summary),
                _ => None,
            })
            .collect()
    }

    pub fn remote_events(&self) -> Vec<RemoteEvent> {
        self.events.lock().unwrap().clone()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn take_failure(&self) -> Option<GatewayError> {
        let mut fail = self.fail.lock().unwrap();
        match fail.take() {
            Some((mode, count)) if count > 0 => {
                if count > 1 {
                    *fail = Some((mode, count - 1));
                }
                Some(match mode {
                    Failure::Transient => GatewayError::Transient("mock outage".to_string()),
                    Failure::Auth => GatewayError::AuthExpired,
                    Failure::Rejected => GatewayError::Rejected("mock rejection".to_string()),
                })
            }
            _ => None,
        }
    }
}

#[async_trait]
impl CalendarGateway for MockGateway {
    async fn list(&self, _since: DateTime<Utc>) -> Result<Vec<RemoteEvent>, GatewayError> {
        tokio::task::yield_now().await;
        self.record(Call::List);
        if let Some(err) = self.take_failure() {
            return Err(err);
        }
        Ok(self.remote_events())
    }

    async fn create(&self, draft: &EventDraft) -> Result<RemoteEvent, GatewayError> {
        tokio::task::yield_now().await;
        self.record(Call::Create(draft.summary.clone()));
        if let Some(err) = self.take_failure() {
            return Err(err);
        }
        let id = format!("evt-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        let event = RemoteEvent {
            id,
            summary: Some(draft.summary.clone()),
            description: draft.description.clone(),
            status: None,
            start: Some(draft.start.clone()),
            end: Some(draft.end.clone()),
            recurrence: None,
        };
        self.events.lock().unwrap().push(event.clone());
        Ok(event)
    }

    async fn update(&self, id: &str, patch: &EventPatch) -> Result<(), GatewayError> {
        tokio::task::yield_now().await;
        self.record(Call::Update(id.to_string()));
        if let Some(err) = self.take_failure() {
            return Err(err);
        }
        let mut events = self.events.lock().unwrap();
        let event = events
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or_else(|| GatewayError::Rejected("not found".to_string()))?;
        if let Some(summary) = &patch.summary {
            event.summary = Some(summary.clone());
        }
        if let Some(description) = &patch.description {
            event.description = Some(description.clone());
        }
        if let Some(start) = &patch.start {
            event.start = Some(start.clone());
        }
        if let Some(end) = &patch.end {
            event.end = Some(end.clone());
        }
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), GatewayError> {
        tokio::task::yield_now().await;
        self.record(Call::Delete(id.to_string()));
        if let Some(err) = self.take_failure() {
            return Err(err);
        }
        let mut events = self.events.lock().unwrap();
        let before = events.len();
        events.retain(|e| e.id != id);
        if events.len() == before {
            return Err(GatewayError::Rejected("not found".to_string()));
        }
        Ok(())
    }
}

/// Unique scratch directory for a store.
pub fn temp_store_dir(tag: &str) -> PathBuf {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .subsec_nanos();
    std::env::temp_dir().join(format!("dayplan-test-{}-{}-{}", tag, std::process::id(), nanos))
}

pub fn default_settings() -> EngineSettings {
    EngineSettings {
        time_zone: "UTC".to_string(),
        lookback_days: 365,
        max_replay_attempts: 5,
    }
}

/// Fully wired engine on a scratch store, already loaded.
pub async fn engine_with(
    tag: &str,
    gateway: Arc<MockGateway>,
    session: SessionContext,
    settings: EngineSettings,
) -> Arc<PlannerEngine> {
    let store = LocalStore::open(temp_store_dir(tag)).unwrap();
    let engine = Arc::new(PlannerEngine::new(
        store,
        gateway,
        session,
        Arc::new(LogNotifier),
        settings,
    ));
    engine.load().await.unwrap();
    engine
}

pub fn scheduled(date: NaiveDate, hour: u32, minute: u32, duration_minutes: i64) -> Scheduling {
    Scheduling::Scheduled {
        date,
        time: NaiveTime::from_hms_opt(hour, minute, 0).unwrap(),
        duration_minutes,
    }
}

pub fn remote_draft(title: &str, scheduling: Scheduling) -> TaskDraft {
    TaskDraft {
        title: title.to_string(),
        note: None,
        origin: TaskOrigin::Remote,
        scheduling,
        recurrence: None,
        reminder: None,
    }
}

pub fn local_draft(title: &str, scheduling: Scheduling) -> TaskDraft {
    TaskDraft {
        origin: TaskOrigin::LocalOnly,
        ..remote_draft(title, scheduling)
    }
}

pub fn recurring_draft(title: &str, scheduling: Scheduling, recurrence: Recurrence) -> TaskDraft {
    TaskDraft {
        recurrence: Some(recurrence),
        ..remote_draft(title, scheduling)
    }
}

/// Remote event with a timed start, as the calendar would return it.
pub fn timed_event(id: &str, summary: &str, date: &str, start: &str, end: &str) -> RemoteEvent {
    RemoteEvent {
        id: id.to_string(),
        summary: Some(summary.to_string()),
        description: None,
        status: None,
        start: Some(EventTime {
            date_time: Some(format!("{}T{}:00", date, start)),
            date: None,
            time_zone: Some("UTC".to_string()),
        }),
        end: Some(EventTime {
            date_time: Some(format!("{}T{}:00", date, end)),
            date: None,
            time_zone: Some("UTC".to_string()),
        }),
        recurrence: None,
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}
