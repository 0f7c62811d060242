//! Failure taxonomy for outbound API calls.
//!
//! Every failed call produces a [`RawFailure`]. [`classify`] maps it onto the
//! closed [`ErrorKind`] taxonomy and [`is_retryable`] decides whether the
//! kind describes a transient condition worth re-issuing the call for.

use std::fmt;

use serde::Deserialize;
use thiserror::Error;

/// The classified kind of a failed call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// No response was received (DNS, TCP, TLS, connection dropped).
    Network,
    /// The peer rejected the credentials (HTTP 401 / 403).
    Auth,
    /// The request itself was rejected (HTTP 4xx other than 401/403/404).
    Validation,
    /// The requested resource does not exist (HTTP 404).
    NotFound,
    /// The peer failed while handling the request (HTTP 5xx).
    Server,
    /// The call was aborted after exceeding its time budget.
    Timeout,
    /// Anything the other kinds do not describe.
    Unknown,
}

impl ErrorKind {
    /// All kinds, in declaration order.
    pub const ALL: [ErrorKind; 7] = [
        ErrorKind::Network,
        ErrorKind::Auth,
        ErrorKind::Validation,
        ErrorKind::NotFound,
        ErrorKind::Server,
        ErrorKind::Timeout,
        ErrorKind::Unknown,
    ];

    /// Returns true if re-issuing a call that failed with this kind can succeed.
    ///
    /// Validation and not-found outcomes are determined by the request itself,
    /// and auth failures need a new login rather than a repeat.
    pub fn is_retryable(self) -> bool {
        match self {
            ErrorKind::Network | ErrorKind::Timeout | ErrorKind::Server => true,
            ErrorKind::Auth | ErrorKind::Validation | ErrorKind::NotFound | ErrorKind::Unknown => {
                false
            }
        }
    }

    /// Stable lowercase name, used in logs and CLI output.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Network => "network",
            ErrorKind::Auth => "auth",
            ErrorKind::Validation => "validation",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Server => "server",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why no response arrived from the peer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoResponseReason {
    /// The peer could not be reached or the connection broke.
    Unreachable,
    /// The call was aborted because it ran past its time budget.
    TimedOut,
}

/// Structured error body sent by the API, e.g. `{ "message": ..., "errors": ... }`.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct FailurePayload {
    /// Human-readable message from the peer.
    #[serde(default)]
    pub message: Option<String>,
    /// Field-level validation details.
    #[serde(default)]
    pub errors: Option<serde_json::Value>,
}

impl FailurePayload {
    /// Creates a payload carrying only a message.
    pub fn with_message(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            errors: None,
        }
    }

    /// Parses a response body. Bodies that are not a JSON object yield `None`.
    pub fn from_body(body: &[u8]) -> Option<Self> {
        if body.is_empty() {
            return None;
        }
        serde_json::from_slice(body).ok()
    }

    /// The peer's message exactly as sent, if present and not blank.
    pub fn display_message(&self) -> Option<&str> {
        self.message.as_deref().filter(|m| !m.trim().is_empty())
    }

    /// Flattens the `errors` object into `(field, message)` pairs.
    ///
    /// Accepts both `{ "email": "taken" }` and `{ "email": ["taken", "invalid"] }`.
    /// Entries that are neither strings nor arrays of strings are skipped.
    pub fn field_errors(&self) -> Vec<(String, String)> {
        let Some(serde_json::Value::Object(map)) = &self.errors else {
            return Vec::new();
        };

        let mut out = Vec::new();
        for (field, value) in map {
            match value {
                serde_json::Value::String(msg) => out.push((field.clone(), msg.clone())),
                serde_json::Value::Array(items) => {
                    for item in items {
                        if let serde_json::Value::String(msg) = item {
                            out.push((field.clone(), msg.clone()));
                        }
                    }
                }
                _ => {}
            }
        }
        out
    }
}

/// An unclassified failure produced by the HTTP client wrapper.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum RawFailure {
    /// The call never received a response.
    #[error("no response received: {detail}")]
    NoResponse {
        reason: NoResponseReason,
        detail: String,
    },

    /// The peer answered with a non-success status.
    #[error("request failed with status {status}")]
    Response {
        status: u16,
        payload: Option<FailurePayload>,
    },

    /// The call failed outside the transport and status paths.
    #[error("request failed: {detail}")]
    Other { detail: String },
}

impl RawFailure {
    /// A transport failure where the peer could not be reached.
    pub fn unreachable(detail: impl Into<String>) -> Self {
        RawFailure::NoResponse {
            reason: NoResponseReason::Unreachable,
            detail: detail.into(),
        }
    }

    /// A transport failure caused by exceeding the time budget.
    pub fn timed_out(detail: impl Into<String>) -> Self {
        RawFailure::NoResponse {
            reason: NoResponseReason::TimedOut,
            detail: detail.into(),
        }
    }

    /// A status failure without a structured body.
    pub fn status(status: u16) -> Self {
        RawFailure::Response {
            status,
            payload: None,
        }
    }

    /// A status failure with a structured body.
    pub fn with_payload(status: u16, payload: FailurePayload) -> Self {
        RawFailure::Response {
            status,
            payload: Some(payload),
        }
    }

    /// A failure outside the transport and status paths.
    pub fn other(detail: impl Into<String>) -> Self {
        RawFailure::Other {
            detail: detail.into(),
        }
    }

    /// The HTTP status, if a response was received.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            RawFailure::Response { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// The structured body, if the peer sent one.
    pub fn payload(&self) -> Option<&FailurePayload> {
        match self {
            RawFailure::Response { payload, .. } => payload.as_ref(),
            _ => None,
        }
    }

    /// Shorthand for `classify(self)`.
    pub fn kind(&self) -> ErrorKind {
        classify(self)
    }
}

/// Maps a raw failure onto exactly one [`ErrorKind`].
///
/// Transport failures are checked first, then the status code; anything left
/// over is `Unknown`.
pub fn classify(raw: &RawFailure) -> ErrorKind {
    match raw {
        RawFailure::NoResponse {
            reason: NoResponseReason::TimedOut,
            ..
        } => ErrorKind::Timeout,
        RawFailure::NoResponse {
            reason: NoResponseReason::Unreachable,
            ..
        } => ErrorKind::Network,
        RawFailure::Response { status, .. } => match *status {
            401 | 403 => ErrorKind::Auth,
            404 => ErrorKind::NotFound,
            400..=499 => ErrorKind::Validation,
            500.. => ErrorKind::Server,
            _ => ErrorKind::Unknown,
        },
        RawFailure::Other { .. } => ErrorKind::Unknown,
    }
}

/// Returns true if a failure of this kind is safe to retry.
pub fn is_retryable(kind: ErrorKind) -> bool {
    kind.is_retryable()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_unreachable_is_network() {
        let raw = RawFailure::unreachable("connection refused");
        assert_eq!(classify(&raw), ErrorKind::Network);
    }

    #[test]
    fn test_classify_timed_out_is_timeout() {
        let raw = RawFailure::timed_out("operation timed out");
        assert_eq!(classify(&raw), ErrorKind::Timeout);
    }

    #[test]
    fn test_classify_auth_statuses() {
        assert_eq!(classify(&RawFailure::status(401)), ErrorKind::Auth);
        assert_eq!(classify(&RawFailure::status(403)), ErrorKind::Auth);
    }

    #[test]
    fn test_classify_not_found() {
        assert_eq!(classify(&RawFailure::status(404)), ErrorKind::NotFound);
    }

    #[test]
    fn test_classify_remaining_client_errors_are_validation() {
        for status in (400..=499).filter(|s| ![401, 403, 404].contains(s)) {
            assert_eq!(
                classify(&RawFailure::status(status)),
                ErrorKind::Validation,
                "status {}",
                status
            );
        }
    }

    #[test]
    fn test_classify_server_errors() {
        for status in [500, 502, 503, 504, 599, 600, 999] {
            assert_eq!(classify(&RawFailure::status(status)), ErrorKind::Server);
        }
    }

    #[test]
    fn test_classify_unexpected_statuses_are_unknown() {
        for status in [0, 200, 204, 302, 399] {
            assert_eq!(classify(&RawFailure::status(status)), ErrorKind::Unknown);
        }
        assert_eq!(
            classify(&RawFailure::other("could not decode body")),
            ErrorKind::Unknown
        );
    }

    #[test]
    fn test_classify_ignores_payload() {
        let raw = RawFailure::with_payload(422, FailurePayload::with_message("Email already exists"));
        assert_eq!(classify(&raw), ErrorKind::Validation);
    }

    #[test]
    fn test_retryable_kinds() {
        let retryable: Vec<ErrorKind> = ErrorKind::ALL
            .into_iter()
            .filter(|k| is_retryable(*k))
            .collect();
        assert_eq!(
            retryable,
            vec![ErrorKind::Network, ErrorKind::Server, ErrorKind::Timeout]
        );
    }

    #[test]
    fn test_payload_from_body() {
        let payload =
            FailurePayload::from_body(br#"{"message":"Invalid course","errors":{"title":"required"}}"#)
                .unwrap();
        assert_eq!(payload.display_message(), Some("Invalid course"));
        assert_eq!(
            payload.field_errors(),
            vec![("title".to_string(), "required".to_string())]
        );

        assert!(FailurePayload::from_body(b"").is_none());
        assert!(FailurePayload::from_body(b"<html>Bad Gateway</html>").is_none());
    }

    #[test]
    fn test_payload_message_is_not_trimmed() {
        let payload = FailurePayload::with_message("  Email already exists\n");
        assert_eq!(payload.display_message(), Some("  Email already exists\n"));
    }

    #[test]
    fn test_payload_blank_message_is_absent() {
        let payload = FailurePayload::with_message("   ");
        assert_eq!(payload.display_message(), None);
    }

    #[test]
    fn test_field_errors_with_arrays() {
        let payload = FailurePayload {
            message: None,
            errors: Some(serde_json::json!({
                "email": ["taken", "invalid"],
                "age": 12
            })),
        };
        let errors = payload.field_errors();
        assert_eq!(errors.len(), 2);
        assert!(errors.contains(&("email".to_string(), "taken".to_string())));
        assert!(errors.contains(&("email".to_string(), "invalid".to_string())));
    }

    #[test]
    fn test_raw_failure_display() {
        assert_eq!(
            RawFailure::status(500).to_string(),
            "request failed with status 500"
        );
        assert_eq!(
            RawFailure::unreachable("dns error").to_string(),
            "no response received: dns error"
        );
    }

    #[test]
    fn test_raw_failure_accessors() {
        let raw = RawFailure::with_payload(400, FailurePayload::with_message("bad"));
        assert_eq!(raw.status_code(), Some(400));
        assert_eq!(raw.payload().and_then(|p| p.display_message()), Some("bad"));
        assert_eq!(raw.kind(), ErrorKind::Validation);

        let raw = RawFailure::timed_out("slow");
        assert_eq!(raw.status_code(), None);
        assert!(raw.payload().is_none());
    }
}
