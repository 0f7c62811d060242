//! Session-expiry handling.
//!
//! This module provides the guard, storage, navigation and redirect policy
//! pieces that make up the [`SessionExpiryInterceptor`].

pub mod guard;
pub mod interceptor;
pub mod navigation;
pub mod store;

pub use guard::SessionExpiryGuard;
pub use interceptor::{InterceptOutcome, SessionExpiryInterceptor, DEFAULT_SESSION_KEY};
pub use navigation::{
    MemoryNavigator, Navigation, NavigationKind, Navigator, RedirectPolicy, RedirectRule,
};
pub use store::{
    FileSessionStore, MemorySessionStore, SessionStore, SessionStoreError, SessionStoreResult,
};
