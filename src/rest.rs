//! Shared handling of Google API error bodies

use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct GoogleErrorResponse {
    error: GoogleError,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum GoogleError {
    Details {
        #[serde(default)]
        code: u16,
        message: String,
        status: Option<String>,
    },
    // Realtime Database replies `{"error": "Permission denied"}`
    Message(String),
}

/// Failure extracted from a non-success response
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ApiFailure {
    pub status: u16,
    pub message: String,
    /// Canonical status name (`PERMISSION_DENIED`, ...) when the body has one
    pub code: Option<String>,
}

impl std::fmt::Display for ApiFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (code: {})", self.message, self.status)
    }
}

/// Read the error body of a failed response
pub(crate) async fn api_failure(response: reqwest::Response) -> ApiFailure {
    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    parse_failure(status.as_u16(), status.canonical_reason().unwrap_or("Unknown"), &text)
}

fn parse_failure(status: u16, reason: &str, body: &str) -> ApiFailure {
    match serde_json::from_str::<GoogleErrorResponse>(body) {
        Ok(GoogleErrorResponse {
            error: GoogleError::Details { message, status: code, .. },
        }) => ApiFailure { status, message, code },
        Ok(GoogleErrorResponse {
            error: GoogleError::Message(message),
        }) => ApiFailure {
            status,
            message,
            code: None,
        },
        Err(_) if !body.trim().is_empty() => ApiFailure {
            status,
            message: body.trim().to_string(),
            code: None,
        },
        Err(_) => ApiFailure {
            status,
            message: format!("{}: {}", reason, status),
            code: None,
        },
    }
}
