//! Single-writer tracking of the server-issued action token.
//!
//! Every mutating call must echo the latest token, and the reply carries the
//! next one. [`ActionTokenTracker::lease`] serializes callers so the token is
//! read, sent, and advanced by one call at a time.

use tokio::sync::{Mutex, MutexGuard, watch};

use client_api_core::ActionToken;

pub struct ActionTokenTracker {
    gate: Mutex<()>,
    current: watch::Sender<Option<ActionToken>>,
}

impl ActionTokenTracker {
    pub fn new() -> Self {
        Self {
            gate: Mutex::new(()),
            current: watch::Sender::new(None),
        }
    }

    /// Wait for exclusive use of the token.
    pub async fn lease(&self) -> TokenLease<'_> {
        let guard = self.gate.lock().await;
        let token = self.current.borrow().clone();
        TokenLease {
            _guard: guard,
            token,
            tracker: self,
        }
    }

    /// Latest known token, without waiting for in-flight calls.
    pub fn current(&self) -> Option<ActionToken> {
        self.current.borrow().clone()
    }

    /// Receiver that observes every token change.
    pub fn watch(&self) -> watch::Receiver<Option<ActionToken>> {
        self.current.subscribe()
    }

    /// Forget the token, e.g. when switching accounts.
    pub async fn reset(&self) {
        let _guard = self.gate.lock().await;
        self.current.send_replace(None);
    }
}

impl Default for ActionTokenTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Exclusive access to the token for one mutating call.
pub struct TokenLease<'a> {
    _guard: MutexGuard<'a, ()>,
    token: Option<ActionToken>,
    tracker: &'a ActionTokenTracker,
}

impl TokenLease<'_> {
    pub fn token(&self) -> Option<&ActionToken> {
        self.token.as_ref()
    }

    /// Store the token from a successful reply. A reply without a token
    /// leaves the current one in place.
    pub fn advance(&mut self, next: Option<ActionToken>) {
        if let Some(next) = next {
            tracing::trace!(target: "runtime::token", token = %next, "action token advanced");
            self.tracker.current.send_replace(Some(next.clone()));
            self.token = Some(next);
        }
    }
}
