//! Global handling of expired sessions.
//!
//! The interceptor sits on the failure path of every outbound call. The first
//! auth failure of a cycle clears the cached session and sends the user to the
//! login entry point for their area; every later one is ignored until the
//! guard is reset.

use std::sync::Arc;

use tracing::{info, warn};

use super::guard::SessionExpiryGuard;
use super::navigation::{Navigator, RedirectPolicy};
use super::store::SessionStore;
use crate::error::{classify, ErrorKind, RawFailure};

/// Default key under which the dashboard caches the signed-in user.
pub const DEFAULT_SESSION_KEY: &str = "user";

/// What the interceptor did with a failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InterceptOutcome {
    /// The failure is not an auth failure; nothing was done.
    NotAuth,
    /// A redirect was already issued this cycle; nothing was done.
    Suppressed,
    /// The session was cleared but the user is already on an entry point.
    AlreadyAtEntryPoint,
    /// The session was cleared and the user was sent to `destination`.
    Redirected(String),
}

/// Clears the session and redirects once per cycle on auth failures.
pub struct SessionExpiryInterceptor {
    guard: SessionExpiryGuard,
    store: Arc<dyn SessionStore>,
    navigator: Arc<dyn Navigator>,
    policy: RedirectPolicy,
    session_key: String,
}

impl std::fmt::Debug for SessionExpiryInterceptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionExpiryInterceptor")
            .field("guard", &self.guard)
            .field("policy", &self.policy)
            .field("session_key", &self.session_key)
            .finish_non_exhaustive()
    }
}

impl SessionExpiryInterceptor {
    /// Creates an interceptor with its own guard and the default session key.
    pub fn new(
        store: Arc<dyn SessionStore>,
        navigator: Arc<dyn Navigator>,
        policy: RedirectPolicy,
    ) -> Self {
        Self {
            guard: SessionExpiryGuard::new(),
            store,
            navigator,
            policy,
            session_key: DEFAULT_SESSION_KEY.to_string(),
        }
    }

    /// Uses an existing guard, e.g. one shared with another client.
    pub fn with_guard(mut self, guard: SessionExpiryGuard) -> Self {
        self.guard = guard;
        self
    }

    /// Sets the key cleared from the session store.
    pub fn with_session_key(mut self, key: impl Into<String>) -> Self {
        self.session_key = key.into();
        self
    }

    pub fn guard(&self) -> &SessionExpiryGuard {
        &self.guard
    }

    pub fn policy(&self) -> &RedirectPolicy {
        &self.policy
    }

    /// Inspects a failed call. Only `Auth` failures have any effect.
    pub fn on_failure(&self, failure: &RawFailure) -> InterceptOutcome {
        if classify(failure) != ErrorKind::Auth {
            return InterceptOutcome::NotAuth;
        }

        if !self.guard.try_claim() {
            return InterceptOutcome::Suppressed;
        }

        warn!(
            status = failure.status_code(),
            key = %self.session_key,
            "session expired, clearing cached session"
        );
        if let Err(e) = self.store.remove(&self.session_key) {
            warn!(error = %e, "failed to clear cached session");
        }

        let current = self.navigator.current_path();
        if self.policy.is_entry_point(&current) {
            info!(path = %current, "already at login entry point, not redirecting");
            return InterceptOutcome::AlreadyAtEntryPoint;
        }

        let destination = self.policy.destination_for(&current).to_string();
        info!(from = %current, to = %destination, "redirecting to login");
        self.navigator.replace(&destination);
        InterceptOutcome::Redirected(destination)
    }
}
