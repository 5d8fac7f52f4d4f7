//! Errors returned by callable functions

use serde_json::Value;
use std::str::FromStr;
use thiserror::Error;

/// Canonical error codes of callable functions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpsErrorCode {
    /// Not an error
    Ok,
    /// The operation was cancelled
    Cancelled,
    /// Unknown error or an error from a different error domain
    Unknown,
    /// Client specified an invalid argument
    InvalidArgument,
    /// Deadline expired before the operation could complete
    DeadlineExceeded,
    /// Some requested entity was not found
    NotFound,
    /// The entity the client tried to create already exists
    AlreadyExists,
    /// The caller lacks permission
    PermissionDenied,
    /// A resource has been exhausted
    ResourceExhausted,
    /// The system is not in a state required for the operation
    FailedPrecondition,
    /// The operation was aborted
    Aborted,
    /// Operation was attempted past the valid range
    OutOfRange,
    /// Operation is not implemented or supported
    Unimplemented,
    /// Internal error
    Internal,
    /// The service is currently unavailable
    Unavailable,
    /// Unrecoverable data loss or corruption
    DataLoss,
    /// The request lacks valid authentication credentials
    Unauthenticated,
}

const CODES: [(HttpsErrorCode, &str); 17] = [
    (HttpsErrorCode::Ok, "ok"),
    (HttpsErrorCode::Cancelled, "cancelled"),
    (HttpsErrorCode::Unknown, "unknown"),
    (HttpsErrorCode::InvalidArgument, "invalid-argument"),
    (HttpsErrorCode::DeadlineExceeded, "deadline-exceeded"),
    (HttpsErrorCode::NotFound, "not-found"),
    (HttpsErrorCode::AlreadyExists, "already-exists"),
    (HttpsErrorCode::PermissionDenied, "permission-denied"),
    (HttpsErrorCode::ResourceExhausted, "resource-exhausted"),
    (HttpsErrorCode::FailedPrecondition, "failed-precondition"),
    (HttpsErrorCode::Aborted, "aborted"),
    (HttpsErrorCode::OutOfRange, "out-of-range"),
    (HttpsErrorCode::Unimplemented, "unimplemented"),
    (HttpsErrorCode::Internal, "internal"),
    (HttpsErrorCode::Unavailable, "unavailable"),
    (HttpsErrorCode::DataLoss, "data-loss"),
    (HttpsErrorCode::Unauthenticated, "unauthenticated"),
];

impl HttpsErrorCode {
    /// Kebab-case name, e.g. `deadline-exceeded`
    pub fn as_str(&self) -> &'static str {
        CODES
            .iter()
            .find(|(code, _)| code == self)
            .map(|(_, name)| *name)
            .unwrap_or("unknown")
    }

    /// Code implied by an HTTP status when the body carries none
    pub fn from_http_status(status: u16) -> Self {
        match status {
            200..=299 => HttpsErrorCode::Ok,
            400 => HttpsErrorCode::InvalidArgument,
            401 => HttpsErrorCode::Unauthenticated,
            403 => HttpsErrorCode::PermissionDenied,
            404 => HttpsErrorCode::NotFound,
            409 => HttpsErrorCode::Aborted,
            429 => HttpsErrorCode::ResourceExhausted,
            499 => HttpsErrorCode::Cancelled,
            500 => HttpsErrorCode::Internal,
            501 => HttpsErrorCode::Unimplemented,
            503 => HttpsErrorCode::Unavailable,
            504 => HttpsErrorCode::DeadlineExceeded,
            _ => HttpsErrorCode::Unknown,
        }
    }
}

impl FromStr for HttpsErrorCode {
    type Err = ();

    /// Accepts `NOT_FOUND`, `not-found` and `functions/not-found`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s
            .trim_start_matches("functions/")
            .to_ascii_lowercase()
            .replace('_', "-");
        CODES
            .iter()
            .find(|(_, name)| *name == normalized)
            .map(|(code, _)| *code)
            .ok_or(())
    }
}

impl std::fmt::Display for HttpsErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error from a callable function: code, message and optional details
#[derive(Debug, Clone, PartialEq, Error)]
#[error("functions/{code}: {message}")]
pub struct HttpsError {
    code: HttpsErrorCode,
    message: String,
    details: Option<Value>,
}

impl HttpsError {
    /// Create an error
    pub fn new(code: HttpsErrorCode, message: impl Into<String>, details: Option<Value>) -> Self {
        Self {
            code,
            message: message.into(),
            details,
        }
    }

    /// Error code
    pub fn code(&self) -> HttpsErrorCode {
        self.code
    }

    /// Human readable message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Details attached by the function, if any
    pub fn details(&self) -> Option<&Value> {
        self.details.as_ref()
    }

    /// Error for a callable response, `None` when the call succeeded
    ///
    /// The body's `error.status` wins over the HTTP status; an unrecognized
    /// status string becomes `internal`.
    pub(crate) fn from_response(status: u16, body: Option<&Value>) -> Option<Self> {
        let mut code = HttpsErrorCode::from_http_status(status);
        let mut message = code.as_str().to_string();
        let mut details = None;

        if let Some(error) = body.and_then(|b| b.get("error")) {
            if let Some(status) = error.get("status").and_then(Value::as_str) {
                code = status.parse().unwrap_or(HttpsErrorCode::Internal);
                message = code.as_str().to_string();
            }
            if let Some(msg) = error.get("message").and_then(Value::as_str) {
                message = msg.to_string();
            }
            details = error.get("details").cloned();
        }

        if code == HttpsErrorCode::Ok {
            return None;
        }
        Some(Self::new(code, message, details))
    }
}
