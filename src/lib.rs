//! Tutordesk - resilient API client for the tutoring dashboard
//!
//! Classifies failed API calls, retries the transient ones, handles expired
//! sessions once per cycle, and renders a recoverable fallback when a view
//! fails to render.

pub mod boundary;
pub mod client;
pub mod config;
pub mod error;
pub mod logging;
pub mod retry;
pub mod session;

pub use boundary::{BoundaryState, BuildMode, ErrorBoundary, FallbackView, RecoveryAction, Rendered};
pub use client::{ApiClient, ApiResponse};
pub use error::{classify, is_retryable, resolve_message, CustomMessageMap, ErrorKind, RawFailure};
pub use retry::{retry, Retrier, RetryPolicy};
pub use session::{SessionExpiryGuard, SessionExpiryInterceptor};
