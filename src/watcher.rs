//! Background session watcher.
//!
//! Listens to session state transitions and drives the engine: when the
//! client regains a usable session (online with a token) it drains the
//! pending queue and refreshes the remote view.

use std::sync::Arc;

use log::{info, warn};

use crate::engine::PlannerEngine;
use crate::session::SessionContext;

pub struct SyncWatcher {
    engine: Arc<PlannerEngine>,
    session: SessionContext,
}

impl SyncWatcher {
    pub fn new(engine: Arc<PlannerEngine>, session: SessionContext) -> Self {
        Self { engine, session }
    }

    /// Run until every session handle is dropped.
    pub async fn run(self) {
        let mut rx = self.session.subscribe();
        let mut was_reachable = rx.borrow_and_update().can_reach_remote();
        if was_reachable {
            self.reconcile().await;
        }
        loop {
            if rx.changed().await.is_err() {
                break;
            }
            let state = rx.borrow_and_update().clone();
            let reachable = state.can_reach_remote();
            if reachable && !was_reachable {
                info!("session usable again, reconciling");
                self.reconcile().await;
            }
            if state.sign_in_required {
                info!("interactive sign-in required before syncing can resume");
            }
            was_reachable = reachable;
        }
    }

    /// One reconciliation pass: drain the queue if anything is pending
    /// (a full drain already refreshes), otherwise just refresh.
    async fn reconcile(&self) {
        if self.engine.queue_len().await == 0 {
            if let Err(err) = self.engine.fetch_all().await {
                warn!("refresh failed: {}", err);
            }
        } else if let Err(err) = self.engine.replay_queue().await {
            warn!("queue replay failed: {}", err);
        }
    }
}
