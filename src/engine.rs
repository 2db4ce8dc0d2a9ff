//! Reconciliation engine.
//!
//! Owns the unified task collection and every mutation path: immediate
//! remote writes when the session can reach the calendar, durable queueing
//! with optimistic local application when it cannot, and the FIFO replay
//! that drains the queue once connectivity returns. The completion overlay
//! is purely client-side and never touches the network.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{Duration, NaiveDate, NaiveTime, Utc};
use log::{debug, info, warn};
use tokio::sync::Mutex;

use crate::gateway::convert::{draft_for, patch_for, task_from_draft, task_from_event};
use crate::gateway::{CalendarGateway, EventDraft, EventPatch, GatewayError};
use crate::model::{new_local_id, new_pending_id, Scheduling, Task, TaskDraft, TaskOrigin, TaskPatch};
use crate::notify::NotificationSink;
use crate::session::SessionContext;
use crate::store::{LocalStore, MutationKind, QueuedMutation};

/// How a mutation request resolved from the caller's point of view.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Took effect remotely (or was purely local).
    Applied,
    /// Applied locally and queued for replay.
    Queued,
    /// Refused by the remote service or invalid; not queued.
    Rejected(String),
}

/// Per-occurrence tally of a task addition. Recurring drafts expand into
/// independent creations, so a single add can partially succeed; the counts
/// carry that best-effort result to the caller.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AddReport {
    pub applied: usize,
    pub queued: usize,
    pub rejected: usize,
    pub error: Option<String>,
}

impl AddReport {
    /// Collapse the tally into a single terminal state. Partial success
    /// counts as success; `Rejected` only when nothing went through.
    pub fn outcome(&self) -> Outcome {
        if self.applied == 0 && self.queued == 0 {
            if let Some(msg) = &self.error {
                return Outcome::Rejected(msg.clone());
            }
        }
        if self.queued > 0 {
            Outcome::Queued
        } else {
            Outcome::Applied
        }
    }
}

/// Result of promoting local-only tasks to the remote calendar.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PromotionReport {
    pub promoted: usize,
    pub duplicates_removed: usize,
    pub failed: usize,
}

/// Engine tuning knobs, lifted from the sync section of the config.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub time_zone: String,
    pub lookback_days: i64,
    pub max_replay_attempts: u32,
}

struct EngineInner {
    store: LocalStore,
    tasks: Vec<Task>,
    completion: HashMap<String, bool>,
}

impl EngineInner {
    fn local_subset(&self) -> Vec<Task> {
        self.tasks
            .iter()
            .filter(|t| t.origin == TaskOrigin::LocalOnly)
            .cloned()
            .collect()
    }

    fn persist_local(&self) -> Result<()> {
        self.store.save_local_tasks(&self.local_subset())
    }

    fn is_completed(&self, id: &str) -> bool {
        self.completion.get(id).copied().unwrap_or(false)
    }
}

/// Central reconciliation engine. Clone-free; share it behind an `Arc`.
pub struct PlannerEngine {
    inner: Mutex<EngineInner>,
    gateway: Arc<dyn CalendarGateway>,
    session: SessionContext,
    notifier: Arc<dyn NotificationSink>,
    task_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    replay_gate: Mutex<()>,
    settings: EngineSettings,
}

impl PlannerEngine {
    pub fn new(
        store: LocalStore,
        gateway: Arc<dyn CalendarGateway>,
        session: SessionContext,
        notifier: Arc<dyn NotificationSink>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            inner: Mutex::new(EngineInner {
                store,
                tasks: Vec::new(),
                completion: HashMap::new(),
            }),
            gateway,
            session,
            notifier,
            task_locks: Mutex::new(HashMap::new()),
            replay_gate: Mutex::new(()),
            settings,
        }
    }

    /// Rehydrate in-memory state from the store: the local-only list, the
    /// completion overlay, and an optimistic task for every queued creation.
    pub async fn load(&self) -> Result<()> {
        let mut inner = self.inner.lock().await;
        let mut tasks = inner.store.load_local_tasks();
        inner.completion = inner.store.load_completion();
        for entry in inner.store.load_queue() {
            if let MutationKind::Create { draft } = &entry.mutation {
                if let Some(task) = task_from_draft(&entry.task_id, draft) {
                    tasks.push(task);
                }
            }
        }
        for task in &mut tasks {
            task.completed = inner.is_completed(&task.id);
        }
        let queued = inner.store.load_queue().len();
        info!("loaded {} tasks, {} queued mutations", tasks.len(), queued);
        inner.tasks = tasks;
        Ok(())
    }

    /// Snapshot of the unified task collection.
    pub async fn tasks(&self) -> Vec<Task> {
        self.inner.lock().await.tasks.clone()
    }

    pub async fn queue_len(&self) -> usize {
        self.inner.lock().await.store.load_queue().len()
    }

    /// Serialize mutations per task id; the collection lock is never held
    /// across a gateway call, this one is.
    async fn task_lock(&self, id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.task_locks.lock().await;
        locks
            .entry(id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Drop a per-id lock nobody else is holding, so the map stays bounded
    /// by in-flight mutations.
    async fn prune_task_lock(&self, id: &str) {
        let mut locks = self.task_locks.lock().await;
        if let Some(lock) = locks.get(id) {
            if Arc::strong_count(lock) == 1 {
                locks.remove(id);
            }
        }
    }

    /// Number of per-task mutation locks currently retained.
    pub async fn task_lock_count(&self) -> usize {
        self.task_locks.lock().await.len()
    }

    /// Add a task. Local-only drafts persist immediately and never reach the
    /// network. Remote drafts with a recurrence rule are expanded into one
    /// creation per occurrence date before leaving the client; occurrences
    /// succeed or fail independently and the report carries the tally.
    pub async fn add_task(&self, draft: TaskDraft) -> Result<AddReport> {
        if draft.origin == TaskOrigin::LocalOnly {
            let task = draft.into_task(new_local_id());
            let mut inner = self.inner.lock().await;
            inner.tasks.push(task);
            inner.persist_local()?;
            drop(inner);
            self.notifier.notify("Task added", "Saved on this device");
            return Ok(AddReport {
                applied: 1,
                ..AddReport::default()
            });
        }

        let occurrences: Vec<TaskDraft> = match (draft.recurrence.clone(), draft.scheduling.date())
        {
            (Some(rule), Some(anchor)) => rule
                .occurrences(anchor, Utc::now().date_naive())
                .into_iter()
                .map(|date| draft.occurrence_on(date))
                .collect(),
            _ => vec![draft],
        };

        let mut report = AddReport::default();
        for occurrence in occurrences {
            match self.create_remote(&occurrence).await? {
                Outcome::Applied => report.applied += 1,
                Outcome::Queued => report.queued += 1,
                Outcome::Rejected(msg) => {
                    report.rejected += 1;
                    report.error = Some(msg);
                }
            }
        }

        // Direct creations are reconciled against the canonical remote view
        if report.applied > 0 {
            if let Err(err) = self.fetch_all().await {
                warn!("post-create refresh failed: {}", err);
            }
        }

        if report.rejected > 0 {
            warn!(
                "{} occurrence(s) rejected: {}",
                report.rejected,
                report.error.as_deref().unwrap_or("unknown")
            );
        }
        if report.queued > 0 {
            self.notifier
                .notify("Task added", "Will sync when back online");
        } else if report.applied > 0 {
            self.notifier.notify("Task added", "Synced to calendar");
        }
        Ok(report)
    }

    /// One remote creation: straight to the gateway when reachable, queued
    /// with an optimistic placeholder otherwise.
    async fn create_remote(&self, draft: &TaskDraft) -> Result<Outcome> {
        let event_draft = match draft_for(
            &draft.title,
            draft.note.as_deref(),
            &draft.scheduling,
            &self.settings.time_zone,
        ) {
            Ok(event_draft) => event_draft,
            Err(err) => return Ok(Outcome::Rejected(err.to_string())),
        };

        if !self.session.can_reach_remote() {
            return self.queue_create(event_draft).await;
        }

        match self.gateway.create(&event_draft).await {
            Ok(event) => {
                if let Some(task) = task_from_event(&event) {
                    let mut inner = self.inner.lock().await;
                    inner.tasks.push(task);
                }
                Ok(Outcome::Applied)
            }
            Err(GatewayError::AuthExpired) => {
                self.session.invalidate();
                Ok(Outcome::Rejected("calendar session expired".to_string()))
            }
            Err(GatewayError::Transient(err)) => {
                debug!("create failed transiently, queueing: {}", err);
                self.queue_create(event_draft).await
            }
            Err(GatewayError::Rejected(msg)) => Ok(Outcome::Rejected(msg)),
        }
    }

    async fn queue_create(&self, event_draft: EventDraft) -> Result<Outcome> {
        let pending_id = new_pending_id();
        let mut inner = self.inner.lock().await;
        let mut queue = inner.store.load_queue();
        queue.push(QueuedMutation {
            task_id: pending_id.clone(),
            mutation: MutationKind::Create { draft: event_draft.clone() },
            attempts: 0,
        });
        inner.store.save_queue(&queue)?;
        if let Some(task) = task_from_draft(&pending_id, &event_draft) {
            inner.tasks.push(task);
        }
        Ok(Outcome::Queued)
    }

    /// Apply a partial update. The completion flag is written through to the
    /// local overlay and always succeeds; other fields follow the same
    /// remote-or-queue path as creation.
    pub async fn update_task(&self, id: &str, patch: TaskPatch) -> Result<Outcome> {
        let lock = self.task_lock(id).await;
        let guard = lock.lock().await;
        let result = self.apply_update(id, patch).await;
        drop(guard);
        drop(lock);
        self.prune_task_lock(id).await;
        result
    }

    async fn apply_update(&self, id: &str, patch: TaskPatch) -> Result<Outcome> {
        if let Some(done) = patch.completed {
            let mut inner = self.inner.lock().await;
            inner.completion.insert(id.to_string(), done);
            inner.store.save_completion(&inner.completion)?;
            if let Some(task) = inner.tasks.iter_mut().find(|t| t.id == id) {
                task.completed = done;
            }
        }
        if !patch.has_remote_fields() {
            return Ok(Outcome::Applied);
        }

        let target = {
            let inner = self.inner.lock().await;
            inner.tasks.iter().find(|t| t.id == id).cloned()
        };
        let Some(target) = target else {
            return Ok(Outcome::Rejected(format!("no such task: {}", id)));
        };

        if !target.has_remote_id() {
            if target.origin == TaskOrigin::LocalOnly {
                let mut inner = self.inner.lock().await;
                if let Some(task) = inner.tasks.iter_mut().find(|t| t.id == id) {
                    apply_patch(task, &patch);
                }
                inner.persist_local()?;
                return Ok(Outcome::Applied);
            }
            return self.amend_queued_create(id, &patch).await;
        }

        let event_patch = match patch_for(&patch, &self.settings.time_zone) {
            Ok(event_patch) => event_patch,
            Err(err) => return Ok(Outcome::Rejected(err.to_string())),
        };

        if !self.session.can_reach_remote() {
            return self.queue_update(id, &patch, event_patch).await;
        }

        match self.gateway.update(id, &event_patch).await {
            Ok(()) => {
                let mut inner = self.inner.lock().await;
                if let Some(task) = inner.tasks.iter_mut().find(|t| t.id == id) {
                    apply_patch(task, &patch);
                }
                Ok(Outcome::Applied)
            }
            Err(GatewayError::AuthExpired) => {
                self.session.invalidate();
                Ok(Outcome::Rejected("calendar session expired".to_string()))
            }
            Err(GatewayError::Transient(err)) => {
                debug!("update failed transiently, queueing: {}", err);
                self.queue_update(id, &patch, event_patch).await
            }
            Err(GatewayError::Rejected(msg)) => Ok(Outcome::Rejected(msg)),
        }
    }

    /// Fold an edit into the stored draft of a not-yet-created task, so the
    /// eventual replayed create carries it. The optimistic placeholder and
    /// the persisted queue stay in step.
    async fn amend_queued_create(&self, id: &str, patch: &TaskPatch) -> Result<Outcome> {
        let event_patch = match patch_for(patch, &self.settings.time_zone) {
            Ok(event_patch) => event_patch,
            Err(err) => return Ok(Outcome::Rejected(err.to_string())),
        };
        let mut inner = self.inner.lock().await;
        if let Some(task) = inner.tasks.iter_mut().find(|t| t.id == id) {
            apply_patch(task, patch);
        }
        let mut queue = inner.store.load_queue();
        for entry in queue.iter_mut().filter(|e| e.task_id == id) {
            if let MutationKind::Create { draft } = &mut entry.mutation {
                amend_draft(draft, &event_patch);
            }
        }
        inner.store.save_queue(&queue)?;
        Ok(Outcome::Queued)
    }

    async fn queue_update(
        &self,
        id: &str,
        patch: &TaskPatch,
        event_patch: EventPatch,
    ) -> Result<Outcome> {
        let mut inner = self.inner.lock().await;
        let mut queue = inner.store.load_queue();
        queue.push(QueuedMutation {
            task_id: id.to_string(),
            mutation: MutationKind::Update { patch: event_patch },
            attempts: 0,
        });
        inner.store.save_queue(&queue)?;
        if let Some(task) = inner.tasks.iter_mut().find(|t| t.id == id) {
            apply_patch(task, patch);
        }
        Ok(Outcome::Queued)
    }

    /// Delete a task. The local copy disappears immediately in every case;
    /// the remote deletion is issued now or queued.
    pub async fn delete_task(&self, id: &str) -> Result<Outcome> {
        let lock = self.task_lock(id).await;
        let guard = lock.lock().await;
        let result = self.apply_delete(id).await;
        drop(guard);
        drop(lock);
        self.prune_task_lock(id).await;
        result
    }

    async fn apply_delete(&self, id: &str) -> Result<Outcome> {
        let removed = {
            let mut inner = self.inner.lock().await;
            let before = inner.tasks.len();
            inner.tasks.retain(|t| t.id != id);
            inner.completion.remove(id);
            inner.store.save_completion(&inner.completion)?;
            inner.persist_local()?;
            inner.tasks.len() != before
        };
        if !removed {
            return Ok(Outcome::Rejected(format!("no such task: {}", id)));
        }

        if id.starts_with(crate::model::PENDING_ID_PREFIX) {
            // The creation never left this device; cancel it instead of
            // deleting remotely.
            let mut inner = self.inner.lock().await;
            let mut queue = inner.store.load_queue();
            queue.retain(|entry| {
                !(entry.task_id == id && matches!(entry.mutation, MutationKind::Create { .. }))
            });
            inner.store.save_queue(&queue)?;
            return Ok(Outcome::Applied);
        }
        if id.starts_with(crate::model::LOCAL_ID_PREFIX) {
            return Ok(Outcome::Applied);
        }

        if !self.session.can_reach_remote() {
            return self.queue_delete(id).await;
        }
        match self.gateway.delete(id).await {
            Ok(()) => Ok(Outcome::Applied),
            Err(GatewayError::AuthExpired) => {
                self.session.invalidate();
                self.queue_delete(id).await
            }
            Err(GatewayError::Transient(err)) => {
                debug!("delete failed transiently, queueing: {}", err);
                self.queue_delete(id).await
            }
            Err(GatewayError::Rejected(msg)) => {
                // Most likely already gone remotely; the local removal stands.
                warn!("remote delete rejected for {}: {}", id, msg);
                Ok(Outcome::Applied)
            }
        }
    }

    async fn queue_delete(&self, id: &str) -> Result<Outcome> {
        let mut inner = self.inner.lock().await;
        let mut queue = inner.store.load_queue();
        queue.push(QueuedMutation {
            task_id: id.to_string(),
            mutation: MutationKind::Delete,
            attempts: 0,
        });
        inner.store.save_queue(&queue)?;
        Ok(Outcome::Queued)
    }

    /// Convenience for dragging an unscheduled task onto the planner grid.
    pub async fn schedule_task(
        &self,
        id: &str,
        date: NaiveDate,
        time: NaiveTime,
        duration_minutes: i64,
    ) -> Result<Outcome> {
        let outcome = self
            .update_task(
                id,
                TaskPatch {
                    scheduling: Some(Scheduling::Scheduled {
                        date,
                        time,
                        duration_minutes,
                    }),
                    ..TaskPatch::default()
                },
            )
            .await?;
        if !matches!(outcome, Outcome::Rejected(_)) {
            self.notifier
                .notify("Task scheduled", &format!("{} at {}", date, time.format("%H:%M")));
        }
        Ok(outcome)
    }

    /// Refresh the remote subset of the collection from the calendar. The
    /// completion overlay is re-applied on top of whatever comes back; on any
    /// failure the previous collection stays untouched.
    pub async fn fetch_all(&self) -> Result<usize> {
        let since = Utc::now() - Duration::days(self.settings.lookback_days);
        let events = match self.gateway.list(since).await {
            Ok(events) => events,
            Err(GatewayError::AuthExpired) => {
                self.session.invalidate();
                return Err(anyhow::anyhow!("calendar session expired"));
            }
            Err(err) => return Err(err).context("fetching remote events"),
        };

        let mut inner = self.inner.lock().await;
        let mut remote: Vec<Task> = events.iter().filter_map(task_from_event).collect();
        for task in &mut remote {
            task.completed = inner.is_completed(&task.id);
        }
        let count = remote.len();
        inner.tasks.retain(|t| !t.has_remote_id());
        inner.tasks.extend(remote);
        debug!("fetched {} remote tasks", count);
        Ok(count)
    }

    /// Drain the pending queue in order. Transient failures go back to the
    /// tail with their attempt count bumped, up to the configured ceiling;
    /// rejections are dropped with a notification; an expired session halts
    /// the pass with the remaining entries intact. A fully drained queue is
    /// followed by a full refresh. Passes are serialized: a second caller
    /// waits, then sees whatever queue the first pass left behind.
    pub async fn replay_queue(&self) -> Result<()> {
        let _pass = self.replay_gate.lock().await;
        let mut pending = {
            let inner = self.inner.lock().await;
            inner.store.load_queue()
        };
        if pending.is_empty() {
            return Ok(());
        }
        info!("replaying {} queued mutations", pending.len());

        let mut retries: Vec<QueuedMutation> = Vec::new();
        let mut halted = false;
        while !pending.is_empty() {
            let entry = pending.remove(0);
            match self.apply_queued(&entry).await {
                Ok(()) => {}
                Err(GatewayError::AuthExpired) => {
                    self.session.invalidate();
                    self.notifier
                        .notify("Sign-in required", "Calendar session expired");
                    pending.insert(0, entry);
                    halted = true;
                }
                Err(GatewayError::Transient(err)) => {
                    let attempts = entry.attempts + 1;
                    if attempts >= self.settings.max_replay_attempts {
                        warn!(
                            "dropping {} for {} after {} attempts: {}",
                            kind_name(&entry.mutation),
                            entry.task_id,
                            attempts,
                            err
                        );
                        self.notifier
                            .notify("Sync failed", "A pending change could not be synced");
                        self.discard_optimistic(&entry).await;
                    } else {
                        retries.push(QueuedMutation { attempts, ..entry });
                    }
                }
                Err(GatewayError::Rejected(msg)) => {
                    warn!(
                        "remote rejected queued {} for {}: {}",
                        kind_name(&entry.mutation),
                        entry.task_id,
                        msg
                    );
                    self.notifier
                        .notify("Sync failed", "A pending change was rejected");
                    self.discard_optimistic(&entry).await;
                }
            }

            let mut snapshot = pending.clone();
            snapshot.extend(retries.iter().cloned());
            {
                let inner = self.inner.lock().await;
                inner.store.save_queue(&snapshot)?;
            }
            if halted {
                return Ok(());
            }
        }

        if retries.is_empty() {
            if let Err(err) = self.fetch_all().await {
                warn!("post-replay refresh failed: {}", err);
            }
        }
        Ok(())
    }

    async fn apply_queued(&self, entry: &QueuedMutation) -> Result<(), GatewayError> {
        match &entry.mutation {
            MutationKind::Create { draft } => {
                let event = self.gateway.create(draft).await?;
                let mut inner = self.inner.lock().await;
                inner.tasks.retain(|t| t.id != entry.task_id);
                if let Some(done) = inner.completion.remove(&entry.task_id) {
                    inner.completion.insert(event.id.clone(), done);
                    if let Err(err) = inner.store.save_completion(&inner.completion) {
                        warn!("failed to migrate completion overlay: {}", err);
                    }
                }
                if let Some(mut task) = task_from_event(&event) {
                    task.completed = inner.is_completed(&task.id);
                    inner.tasks.push(task);
                }
                Ok(())
            }
            MutationKind::Update { patch } => self.gateway.update(&entry.task_id, patch).await,
            MutationKind::Delete => self.gateway.delete(&entry.task_id).await,
        }
    }

    /// Remove the optimistic placeholder of a queued creation that will
    /// never happen.
    async fn discard_optimistic(&self, entry: &QueuedMutation) {
        if matches!(entry.mutation, MutationKind::Create { .. }) {
            let mut inner = self.inner.lock().await;
            inner.tasks.retain(|t| t.id != entry.task_id);
        }
    }

    /// Promote local-only tasks with a resolved date to the remote calendar.
    /// A local task whose title and resolved date/time exactly match an
    /// existing remote task is a duplicate and is dropped instead.
    pub async fn sync_local_tasks(&self) -> Result<PromotionReport> {
        let snapshot = self.tasks().await;
        let remote: Vec<&Task> = snapshot.iter().filter(|t| t.has_remote_id()).collect();
        let mut report = PromotionReport::default();

        for task in snapshot.iter().filter(|t| {
            t.origin == TaskOrigin::LocalOnly && t.scheduling.date().is_some()
        }) {
            let duplicate = remote.iter().any(|r| {
                r.title == task.title
                    && r.scheduling.date() == task.scheduling.date()
                    && r.scheduling.time() == task.scheduling.time()
            });
            if duplicate {
                let mut inner = self.inner.lock().await;
                inner.tasks.retain(|t| t.id != task.id);
                inner.persist_local()?;
                report.duplicates_removed += 1;
                continue;
            }

            let draft = TaskDraft {
                title: task.title.clone(),
                note: task.note.clone(),
                origin: TaskOrigin::Remote,
                scheduling: task.scheduling.clone(),
                recurrence: None,
                reminder: task.reminder,
            };
            match self.create_remote(&draft).await? {
                Outcome::Rejected(msg) => {
                    warn!("could not promote {}: {}", task.id, msg);
                    report.failed += 1;
                }
                _ => {
                    let mut inner = self.inner.lock().await;
                    inner.tasks.retain(|t| t.id != task.id);
                    if inner.completion.remove(&task.id).is_some() {
                        inner.store.save_completion(&inner.completion)?;
                    }
                    inner.persist_local()?;
                    report.promoted += 1;
                }
            }
        }

        info!(
            "local sync: {} promoted, {} duplicates removed, {} failed",
            report.promoted, report.duplicates_removed, report.failed
        );
        Ok(report)
    }
}

fn apply_patch(task: &mut Task, patch: &TaskPatch) {
    if let Some(title) = &patch.title {
        task.title = title.clone();
    }
    if let Some(note) = &patch.note {
        task.note = Some(note.clone());
    }
    if let Some(scheduling) = &patch.scheduling {
        task.scheduling = scheduling.clone();
    }
    if let Some(reminder) = patch.reminder {
        task.reminder = Some(reminder);
    }
}

fn amend_draft(draft: &mut EventDraft, patch: &EventPatch) {
    if let Some(summary) = &patch.summary {
        draft.summary = summary.clone();
    }
    if let Some(description) = &patch.description {
        draft.description = Some(description.clone());
    }
    if let Some(start) = &patch.start {
        draft.start = start.clone();
    }
    if let Some(end) = &patch.end {
        draft.end = end.clone();
    }
}

fn kind_name(kind: &MutationKind) -> &'static str {
    match kind {
        MutationKind::Create { .. } => "create",
        MutationKind::Update { .. } => "update",
        MutationKind::Delete => "delete",
    }
}
