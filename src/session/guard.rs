//! One-shot guard for session-expiry redirects.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Records whether the session-expiry redirect has already been issued.
///
/// Clones share state; independently constructed guards do not, so each
/// client instance owns its own cycle.
#[derive(Debug, Clone, Default)]
pub struct SessionExpiryGuard {
    fired: Arc<AtomicBool>,
}

impl SessionExpiryGuard {
    /// Creates a guard in the not-fired state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims the guard. Returns true only for the first caller.
    pub fn try_claim(&self) -> bool {
        self.fired
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Whether the redirect has been issued.
    pub fn is_set(&self) -> bool {
        self.fired.load(Ordering::Acquire)
    }

    /// Returns the guard to the not-fired state, starting a new cycle.
    pub fn reset(&self) {
        self.fired.store(false, Ordering::Release);
    }
}
