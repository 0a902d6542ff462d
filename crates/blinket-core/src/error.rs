//! Error taxonomy shared by every sync component.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Categories of sync errors for consistent handling by callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncErrorKind {
    /// Credential persistence unavailable or corrupt
    StorageFailure,
    /// No response received (timeout, DNS, connection reset)
    NetworkFailure,
    /// Missing credential or 401 from the backend
    Unauthenticated,
    /// 4xx other than authentication
    ClientError,
    /// 5xx
    ServerError,
    /// Response body did not match the expected shape
    DecodeFailure,
    /// Workflow precondition violated
    InvalidState,
    /// User input rejected before any network call
    ValidationError,
}

impl fmt::Display for SyncErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SyncErrorKind::StorageFailure => "storage_failure",
            SyncErrorKind::NetworkFailure => "network_failure",
            SyncErrorKind::Unauthenticated => "unauthenticated",
            SyncErrorKind::ClientError => "client_error",
            SyncErrorKind::ServerError => "server_error",
            SyncErrorKind::DecodeFailure => "decode_failure",
            SyncErrorKind::InvalidState => "invalid_state",
            SyncErrorKind::ValidationError => "validation_error",
        };
        f.write_str(label)
    }
}

/// Structured error with kind and details.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncError {
    /// Error category
    pub kind: SyncErrorKind,
    /// One-line summary suitable for display
    pub message: String,
    /// HTTP status, when the error came from a response
    pub status: Option<u16>,
    /// Optional additional details (e.g., raw response body)
    pub details: Option<String>,
}

impl SyncError {
    pub fn new(kind: SyncErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status: None,
            details: None,
        }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::new(SyncErrorKind::StorageFailure, message)
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(SyncErrorKind::NetworkFailure, message)
    }

    pub fn unauthenticated(message: impl Into<String>) -> Self {
        Self::new(SyncErrorKind::Unauthenticated, message)
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::new(SyncErrorKind::DecodeFailure, message)
    }

    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::new(SyncErrorKind::InvalidState, message)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(SyncErrorKind::ValidationError, message)
    }

    /// Classifies a non-success HTTP status.
    ///
    /// 401 maps to `Unauthenticated`, other 4xx to `ClientError` and 5xx to
    /// `ServerError`. Anything else (an informational status, or a redirect
    /// the client did not follow) is an unexpected response: `DecodeFailure`.
    /// The message prefers a server-provided `message` (or
    /// `error.message`) from a JSON body.
    pub fn http_status(status: u16, body: &str) -> Self {
        let kind = match status {
            401 => SyncErrorKind::Unauthenticated,
            400..=499 => SyncErrorKind::ClientError,
            500..=599 => SyncErrorKind::ServerError,
            _ => SyncErrorKind::DecodeFailure,
        };

        let server_message = serde_json::from_str::<Value>(body).ok().and_then(|json| {
            json.get("message")
                .and_then(Value::as_str)
                .or_else(|| json.pointer("/error/message").and_then(Value::as_str))
                .map(str::to_string)
        });

        let message = match server_message {
            Some(msg) => format!("HTTP {status}: {msg}"),
            None => format!("HTTP {status}"),
        };

        Self {
            kind,
            message,
            status: Some(status),
            details: (!body.is_empty()).then(|| body.to_string()),
        }
    }

    /// Returns true for failures a caller may retry (with backoff for server errors).
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind,
            SyncErrorKind::NetworkFailure | SyncErrorKind::ServerError
        )
    }

    pub fn is_not_found(&self) -> bool {
        self.status == Some(404)
    }
}

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for SyncError {}

/// Result type for sync operations.
pub type SyncResult<T> = std::result::Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_status_classification() {
        assert_eq!(
            SyncError::http_status(401, "").kind,
            SyncErrorKind::Unauthenticated
        );
        assert_eq!(
            SyncError::http_status(404, "").kind,
            SyncErrorKind::ClientError
        );
        assert_eq!(
            SyncError::http_status(503, "").kind,
            SyncErrorKind::ServerError
        );
    }

    #[test]
    fn test_non_error_status_is_unexpected_response() {
        for status in [101, 302, 304] {
            let err = SyncError::http_status(status, "");
            assert_eq!(err.kind, SyncErrorKind::DecodeFailure, "status {status}");
            assert_eq!(err.status, Some(status));
            assert!(!err.is_retryable());
        }
    }

    #[test]
    fn test_http_status_extracts_server_message() {
        let err = SyncError::http_status(400, r#"{"code":400,"message":"User not found"}"#);
        assert_eq!(err.message, "HTTP 400: User not found");
        assert_eq!(err.status, Some(400));
        assert!(err.details.is_some());

        let nested = SyncError::http_status(422, r#"{"error":{"message":"bad dob"}}"#);
        assert_eq!(nested.message, "HTTP 422: bad dob");

        let plain = SyncError::http_status(500, "");
        assert_eq!(plain.message, "HTTP 500");
        assert_eq!(plain.details, None);
    }

    #[test]
    fn test_retryable_kinds() {
        assert!(SyncError::network("reset").is_retryable());
        assert!(SyncError::http_status(502, "").is_retryable());
        assert!(!SyncError::http_status(400, "").is_retryable());
        assert!(!SyncError::validation("empty").is_retryable());
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(SyncErrorKind::DecodeFailure.to_string(), "decode_failure");
        assert_eq!(SyncErrorKind::InvalidState.to_string(), "invalid_state");
    }
}
