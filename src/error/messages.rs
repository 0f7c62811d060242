//! User-facing messages for failed calls.

use std::collections::HashMap;

use super::{classify, ErrorKind, RawFailure};

/// Per-call-site overrides for the generic taxonomy messages.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CustomMessageMap {
    messages: HashMap<ErrorKind, String>,
}

impl CustomMessageMap {
    /// Creates an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an override for `kind`, replacing any previous one.
    pub fn with(mut self, kind: ErrorKind, message: impl Into<String>) -> Self {
        self.insert(kind, message);
        self
    }

    /// Sets the override for `kind`.
    pub fn insert(&mut self, kind: ErrorKind, message: impl Into<String>) {
        self.messages.insert(kind, message.into());
    }

    /// Returns the override for `kind`, ignoring blank entries.
    pub fn get(&self, kind: ErrorKind) -> Option<&str> {
        self.messages
            .get(&kind)
            .map(String::as_str)
            .filter(|m| !m.trim().is_empty())
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

impl FromIterator<(ErrorKind, String)> for CustomMessageMap {
    fn from_iter<I: IntoIterator<Item = (ErrorKind, String)>>(iter: I) -> Self {
        Self {
            messages: iter.into_iter().collect(),
        }
    }
}

/// The generic message shown for a kind when nothing more specific exists.
pub fn default_message(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::Network => {
            "Unable to connect to the server. Please check your internet connection."
        }
        ErrorKind::Auth => "Your session has expired. Please log in again.",
        ErrorKind::Validation => "Please check your input and try again.",
        ErrorKind::NotFound => "The requested resource was not found.",
        ErrorKind::Server => "Something went wrong on our end. Please try again later.",
        ErrorKind::Timeout => "The request timed out. Please try again.",
        ErrorKind::Unknown => "An unexpected error occurred. Please try again.",
    }
}

/// Produces the message to display for a failed call.
///
/// The peer's own message wins, then the call site's override for the
/// classified kind, then the kind's default. The result is never empty.
pub fn resolve_message(raw: &RawFailure, overrides: Option<&CustomMessageMap>) -> String {
    if let Some(message) = raw.payload().and_then(|p| p.display_message()) {
        return message.to_string();
    }

    let kind = classify(raw);
    overrides
        .and_then(|map| map.get(kind))
        .unwrap_or_else(|| default_message(kind))
        .to_string()
}
