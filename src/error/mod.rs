//! Failure classification and display.
//!
//! This module turns failed outbound calls into a closed taxonomy of
//! [`ErrorKind`]s, decides which kinds are retryable, and resolves the
//! message a user should see.

pub mod classification;
pub mod messages;

// Re-export main types for convenient access
pub use classification::{
    classify, is_retryable, ErrorKind, FailurePayload, NoResponseReason, RawFailure,
};
pub use messages::{default_message, resolve_message, CustomMessageMap};
