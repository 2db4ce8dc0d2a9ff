//! Explicit session and connectivity context.
//!
//! One injectable object holding the bearer token, the online flag and the
//! sign-in-required marker. State transitions flow through a watch channel
//! so the sync watcher can react to token acquisition and online/offline
//! flips.

use tokio::sync::watch;

/// Snapshot of the session and connectivity state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    pub token: Option<String>,
    pub online: bool,
    pub sign_in_required: bool,
}

impl SessionState {
    /// Whether mutations can go straight to the remote gateway.
    pub fn can_reach_remote(&self) -> bool {
        self.online && self.token.is_some()
    }
}

/// Shared handle on the session state. Cheap to clone; all clones observe the
/// same state.
#[derive(Debug, Clone)]
pub struct SessionContext {
    tx: watch::Sender<SessionState>,
}

impl SessionContext {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(SessionState::default());
        Self { tx }
    }

    /// Start already online and authenticated; mostly useful in tests.
    pub fn online_with_token(token: &str) -> Self {
        let ctx = Self::new();
        ctx.set_online(true);
        ctx.set_token(token.to_string());
        ctx
    }

    pub fn state(&self) -> SessionState {
        self.tx.borrow().clone()
    }

    pub fn current_token(&self) -> Option<String> {
        self.tx.borrow().token.clone()
    }

    pub fn is_online(&self) -> bool {
        self.tx.borrow().online
    }

    pub fn sign_in_required(&self) -> bool {
        self.tx.borrow().sign_in_required
    }

    pub fn can_reach_remote(&self) -> bool {
        self.tx.borrow().can_reach_remote()
    }

    /// Record a freshly acquired bearer token.
    pub fn set_token(&self, token: String) {
        self.tx.send_modify(|state| {
            state.token = Some(token);
            state.sign_in_required = false;
        });
    }

    /// Drop the token and flag that interactive sign-in is needed. Invoked
    /// when the gateway reports an expired session.
    pub fn invalidate(&self) {
        self.tx.send_modify(|state| {
            state.token = None;
            state.sign_in_required = true;
        });
    }

    /// Record an online/offline transition.
    pub fn set_online(&self, online: bool) {
        self.tx.send_modify(|state| state.online = online);
    }

    /// Subscribe to state transitions.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.tx.subscribe()
    }
}

impl Default for SessionContext {
    fn default() -> Self {
        Self::new()
    }
}
