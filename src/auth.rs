//! Authentication collaborator surface
//!
//! The core consumes two things from the auth collaborator: a stable
//! current-user identifier and a change signal gating whether view models
//! may run. Both are carried by a watch channel; the host application owns
//! the [`AuthProvider`] side and the core holds [`AuthSession`] handles.

use crate::store::types::UserId;
use crate::{Error, Result};
use tokio::sync::watch;

/// Host-side handle feeding auth state into the core
pub struct AuthProvider {
    tx: watch::Sender<Option<UserId>>,
}

impl AuthProvider {
    /// Create a provider with no signed-in user
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self { tx }
    }

    /// Create a provider already signed in as `user`
    pub fn signed_in(user: UserId) -> Self {
        let (tx, _) = watch::channel(Some(user));
        Self { tx }
    }

    /// Record a sign-in
    pub fn sign_in(&self, user: UserId) {
        let _ = self.tx.send(Some(user));
    }

    /// Record a sign-out
    pub fn sign_out(&self) {
        let _ = self.tx.send(None);
    }

    /// Open a session handle observing this provider
    pub fn session(&self) -> AuthSession {
        AuthSession {
            rx: self.tx.subscribe(),
        }
    }
}

impl Default for AuthProvider {
    fn default() -> Self {
        Self::new()
    }
}

/// Core-side view of the auth state
#[derive(Debug, Clone)]
pub struct AuthSession {
    rx: watch::Receiver<Option<UserId>>,
}

impl AuthSession {
    /// The current user, if signed in
    pub fn current(&self) -> Option<UserId> {
        self.rx.borrow().clone()
    }

    /// The current user, or [`Error::SignedOut`]
    pub fn require(&self) -> Result<UserId> {
        self.current().ok_or(Error::SignedOut)
    }

    /// Wait for the next auth-state change and return the new state
    ///
    /// Returns `None` (signed out) if the provider has gone away.
    pub async fn changed(&mut self) -> Option<UserId> {
        if self.rx.changed().await.is_err() {
            return None;
        }
        self.rx.borrow_and_update().clone()
    }
}
