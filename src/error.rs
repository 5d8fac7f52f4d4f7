//! Firebase error types
//!
//! Provides a unified error type hierarchy for all Firebase operations.
//!
//! # Design
//! Uses thiserror for ergonomic error definitions. All errors implement
//! std::error::Error and can be converted to FirebaseError via From trait.
//! Backend failures are rewrapped, never retried.

use thiserror::Error;

pub use crate::functions::https_error::{HttpsError, HttpsErrorCode};

/// Top-level Firebase error type
///
/// Wraps specific error types (Auth, Storage, etc.) into a unified type.
/// Supports conversion from all module-specific errors via `From` trait.
///
/// # Example
/// ```
/// use firebase_client_sdk::{FirebaseError, AuthError};
///
/// let auth_err: FirebaseError = AuthError::InvalidEmail.into();
/// ```
#[derive(Debug, Error)]
pub enum FirebaseError {
    /// Authentication-related errors
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Remote Config errors
    #[error("Remote Config error: {0}")]
    RemoteConfig(#[from] RemoteConfigError),

    /// Callable function errors
    #[error("Functions error: {0}")]
    Functions(#[from] HttpsError),

    /// Cloud Storage errors
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Realtime Database errors
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// Analytics errors
    #[error("Analytics error: {0}")]
    Analytics(#[from] AnalyticsError),

    /// Installations errors
    #[error("Installations error: {0}")]
    Installations(#[from] InstallationsError),

    /// Cloud Messaging errors
    #[error("Messaging error: {0}")]
    Messaging(#[from] MessagingError),

    /// Network/HTTP errors
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Local file errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed URL built from options or arguments
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// A local precondition on an argument failed
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Generic internal errors
    #[error("Internal error: {0}")]
    Internal(String),

    /// API key not configured
    #[error("API key not configured")]
    ApiKeyNotConfigured,

    /// No app registered under the given name
    #[error("No Firebase App '{0}' has been created - call App::create()")]
    AppNotFound(String),

    /// An app with this name exists with different options
    #[error("Firebase App named '{0}' already exists with different options")]
    DuplicateApp(String),

    /// The app was deleted and can no longer hand out services
    #[error("Firebase App '{0}' has already been deleted")]
    AppDeleted(String),

    /// Operation cancelled
    #[error("Operation cancelled")]
    Cancelled,
}

/// Authentication errors
///
/// Maps Firebase Auth REST error codes to Rust enum variants.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// Email address is invalid
    #[error("Invalid email address")]
    InvalidEmail,

    /// Password is invalid
    #[error("Invalid password")]
    InvalidPassword,

    /// Password does not satisfy the project's password policy
    #[error("auth/password-does-not-meet-requirements: {0}")]
    PasswordDoesNotMeetRequirements(String),

    /// Password policy uses a schema this SDK cannot evaluate
    #[error("auth/unsupported-password-policy-schema-version: The password policy received from the backend uses a schema version that is not supported by this version of the SDK.")]
    UnsupportedPasswordPolicySchemaVersion,

    /// Email already in use by another account
    #[error("Email already in use")]
    EmailAlreadyInUse,

    /// User not found
    #[error("User not found")]
    UserNotFound,

    /// Wrong password
    #[error("Wrong password")]
    WrongPassword,

    /// User account has been disabled
    #[error("User account disabled")]
    UserDisabled,

    /// Too many failed login attempts
    #[error("Too many requests, try again later")]
    TooManyRequests,

    /// Operation not allowed (e.g., provider disabled)
    #[error("Operation not allowed")]
    OperationNotAllowed,

    /// Invalid credential
    #[error("Invalid credential: {0}")]
    InvalidCredential(String),

    /// Tenant id is invalid or does not match
    #[error("Invalid tenant id")]
    InvalidTenantId,

    /// User token has expired
    #[error("User token expired")]
    UserTokenExpired,

    /// Invalid user token
    #[error("Invalid user token")]
    InvalidUserToken,

    /// Network error
    #[error("Network error: {0}")]
    NetworkRequestFailed(String),

    /// Not authenticated
    #[error("Not authenticated")]
    NotAuthenticated,

    /// No signed-in user
    #[error("No user is currently signed in")]
    NoSignedInUser,

    /// Requires recent login
    #[error("This operation requires recent authentication")]
    RequiresRecentLogin,

    /// Invalid API key
    #[error("Invalid API key")]
    InvalidApiKey,

    /// Invalid action code
    #[error("Invalid action code")]
    InvalidActionCode,

    /// Action code expired
    #[error("Action code expired")]
    ExpiredActionCode,

    /// Backend code this SDK does not map
    #[error("Unknown auth error: {0}")]
    Unknown(String),
}

/// Remote Config errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RemoteConfigError {
    /// The fetch request failed
    #[error("remoteconfig/fetch-status: {0}")]
    FetchStatus(String),

    /// The fetch was throttled by the backend
    #[error("remoteconfig/fetch-throttle: fetch throttled, retry after the minimum fetch interval")]
    FetchThrottle,

    /// The fetch did not complete within the configured timeout
    #[error("remoteconfig/fetch-timeout: fetch did not complete within {0} ms")]
    FetchTimeout(u64),

    /// A setting or default failed validation
    #[error("remoteconfig/invalid-argument: {0}")]
    InvalidArgument(String),
}

/// Cloud Storage errors
///
/// Each variant maps to a `storage/*` code.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// No object exists at the reference
    #[error("storage/object-not-found: No object exists at {0}")]
    ObjectNotFound(String),

    /// The bucket is not configured
    #[error("storage/bucket-not-found: {0}")]
    BucketNotFound(String),

    /// No bucket configured on the app
    #[error("storage/no-default-bucket: No default bucket found. Did you set the 'storage_bucket' option?")]
    NoDefaultBucket,

    /// Caller not authenticated
    #[error("storage/unauthenticated: User is unauthenticated, authenticate and try again")]
    Unauthenticated,

    /// Caller lacks permission
    #[error("storage/unauthorized: User is not authorized to perform the desired action")]
    Unauthorized,

    /// Quota exceeded
    #[error("storage/quota-exceeded: Quota for bucket exceeded")]
    QuotaExceeded,

    /// Task cancelled by the caller
    #[error("storage/canceled: User canceled the upload/download")]
    Canceled,

    /// Object has no download token
    #[error("storage/no-download-url: The given file does not have any download URLs")]
    NoDownloadUrl,

    /// Argument validation failed
    #[error("storage/invalid-argument: {0}")]
    InvalidArgument(String),

    /// Upload session reported a failure
    #[error("storage/unknown: {0}")]
    Unknown(String),
}

/// Realtime Database errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DatabaseError {
    /// Path failed validation
    #[error("database/invalid-path: Paths must be non-empty strings and can't contain \".\", \"#\", \"$\", \"[\", or \"]\" ({0})")]
    InvalidPath(String),

    /// Query modifiers are inconsistent
    #[error("database/invalid-query: {0}")]
    InvalidQuery(String),

    /// Security rules rejected the operation
    #[error("database/permission-denied: Client doesn't have permission to access the desired data")]
    PermissionDenied,

    /// A transaction kept conflicting with concurrent writes
    #[error("database/max-retries: The transaction had too many retries")]
    MaxRetries,

    /// No database URL configured
    #[error("database/no-url: Can't determine Firebase Database URL. Set 'database_url' in AppOptions")]
    NoDatabaseUrl,

    /// Other server error
    #[error("database/unknown: {0}")]
    Unknown(String),
}

/// Analytics errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AnalyticsError {
    /// Reserved event name
    #[error("analytics/reserved-event-name: the event name '{0}' is reserved and can not be used")]
    ReservedEventName(String),

    /// Malformed event name
    #[error("analytics/invalid-event-name: invalid event name '{0}'. Names should contain 1 to 40 alphanumeric characters or underscores")]
    InvalidEventName(String),

    /// A parameter failed validation
    #[error("analytics/invalid-argument: {0}")]
    InvalidArgument(String),

    /// No measurement id configured
    #[error("analytics/no-measurement-id: 'measurement_id' must be set in AppOptions")]
    NoMeasurementId,
}

/// Installations errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InstallationsError {
    /// Registration request failed
    #[error("installations/request-failed: {0}")]
    RequestFailed(String),

    /// The installation was deleted server side
    #[error("installations/not-registered: Firebase Installation is not registered")]
    NotRegistered,

    /// Required app option missing
    #[error("installations/missing-app-config-values: {0}")]
    MissingAppConfigValues(&'static str),
}

/// Cloud Messaging errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MessagingError {
    /// Registration with FCM failed
    #[error("messaging/token-subscribe-failed: {0}")]
    TokenSubscribeFailed(String),

    /// Unregistration from FCM failed
    #[error("messaging/token-unsubscribe-failed: {0}")]
    TokenUnsubscribeFailed(String),

    /// Invalid push subscription
    #[error("messaging/invalid-argument: {0}")]
    InvalidArgument(String),

    /// Required app option missing
    #[error("messaging/missing-app-config-values: {0}")]
    MissingAppConfigValues(&'static str),
}

impl FirebaseError {
    /// Create an internal error from a string
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Create an invalid-argument error from a string
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_)
            | Self::Auth(AuthError::NetworkRequestFailed(_))
            | Self::Auth(AuthError::TooManyRequests)
            | Self::RemoteConfig(RemoteConfigError::FetchThrottle)
            | Self::RemoteConfig(RemoteConfigError::FetchTimeout(_))
            | Self::Storage(StorageError::QuotaExceeded) => true,
            Self::Functions(e) => matches!(
                e.code(),
                HttpsErrorCode::Unavailable
                    | HttpsErrorCode::DeadlineExceeded
                    | HttpsErrorCode::ResourceExhausted
            ),
            _ => false,
        }
    }

    /// Check if error indicates authentication is required
    pub fn requires_auth(&self) -> bool {
        match self {
            Self::Auth(AuthError::NoSignedInUser)
            | Self::Auth(AuthError::RequiresRecentLogin)
            | Self::Auth(AuthError::UserTokenExpired)
            | Self::Auth(AuthError::InvalidUserToken)
            | Self::Storage(StorageError::Unauthenticated) => true,
            Self::Functions(e) => e.code() == HttpsErrorCode::Unauthenticated,
            _ => false,
        }
    }
}

impl AuthError {
    /// Create from Firebase Auth REST API error message
    ///
    /// The backend sometimes appends detail after the code
    /// (`"WEAK_PASSWORD : Password should be at least 6 characters"`),
    /// only the leading code is matched.
    pub fn from_error_code(message: &str) -> Self {
        let (code, detail) = match message.split_once(" : ") {
            Some((code, detail)) => (code.trim(), detail.trim()),
            None => (message.trim(), ""),
        };
        match code {
            "EMAIL_NOT_FOUND" | "USER_NOT_FOUND" => Self::UserNotFound,
            "INVALID_PASSWORD" | "INVALID_LOGIN_CREDENTIALS" => Self::WrongPassword,
            "USER_DISABLED" => Self::UserDisabled,
            "TOO_MANY_ATTEMPTS_TRY_LATER" => Self::TooManyRequests,
            "EMAIL_EXISTS" => Self::EmailAlreadyInUse,
            "OPERATION_NOT_ALLOWED" | "ADMIN_ONLY_OPERATION" => Self::OperationNotAllowed,
            "INVALID_EMAIL" | "MISSING_EMAIL" => Self::InvalidEmail,
            "WEAK_PASSWORD" | "MISSING_PASSWORD" => Self::InvalidPassword,
            "PASSWORD_DOES_NOT_MEET_REQUIREMENTS" => {
                Self::PasswordDoesNotMeetRequirements(detail.to_string())
            }
            "INVALID_ID_TOKEN" => Self::InvalidUserToken,
            "TOKEN_EXPIRED" | "USER_TOKEN_EXPIRED" => Self::UserTokenExpired,
            "INVALID_API_KEY" | "API_KEY_INVALID" => Self::InvalidApiKey,
            "CREDENTIAL_TOO_OLD_LOGIN_AGAIN" => Self::RequiresRecentLogin,
            "INVALID_OOB_CODE" => Self::InvalidActionCode,
            "EXPIRED_OOB_CODE" => Self::ExpiredActionCode,
            "INVALID_TENANT_ID" | "TENANT_ID_MISMATCH" => Self::InvalidTenantId,
            "INVALID_IDP_RESPONSE" | "INVALID_CUSTOM_TOKEN" => {
                Self::InvalidCredential(code.to_string())
            }
            other => Self::Unknown(other.to_string()),
        }
    }

    /// Map a failure whose body carries no Identity Toolkit error code
    pub(crate) fn from_http_status(status: u16, body: &str) -> Self {
        let detail = if body.is_empty() {
            format!("HTTP {}", status)
        } else {
            format!("HTTP {}: {}", status, body)
        };
        match status {
            429 => Self::TooManyRequests,
            500..=599 => Self::NetworkRequestFailed(detail),
            _ => Self::Unknown(detail),
        }
    }
}

impl StorageError {
    /// Map an HTTP failure from the storage REST API to a `storage/*` error
    pub(crate) fn from_status(status: u16, path: &str, message: String) -> Self {
        match status {
            401 => Self::Unauthenticated,
            403 => Self::Unauthorized,
            404 => Self::ObjectNotFound(path.to_string()),
            429 => Self::QuotaExceeded,
            _ => Self::Unknown(message),
        }
    }
}
