//! Firebase client SDK for Rust
//!
//! Async clients for the Firebase REST backends: Authentication, Remote
//! Config, Installations, Cloud Functions, Cloud Storage, Realtime Database,
//! Analytics and Cloud Messaging. Every service hangs off an [`App`].
//!
//! # Example (Email/Password Auth)
//! ```no_run
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! use firebase_client_sdk::{App, AppOptions, Auth};
//!
//! let app = App::create(AppOptions::new("YOUR_API_KEY", "your-project")).await?;
//! let auth = Auth::get_auth(&app).await?;
//! let result = auth.sign_in_with_email_and_password("user@example.com", "password").await?;
//! println!("Signed in: {}", result.user.uid);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod app;
pub mod error;
pub mod modular;
mod rest;

// Auth module
pub mod auth {
    //! Firebase Authentication

    pub mod action_code;
    pub mod auth;
    pub(crate) mod endpoint;
    pub mod password_policy;
    pub mod types;

    pub use action_code::{ActionCodeInfo, ActionCodeOperation, ActionCodeSettings};
    pub use auth::Auth;
    pub use password_policy::{PasswordPolicy, PasswordValidationStatus};
    pub use types::{AuthResult, Credential, User};
}

// Remote Config module
pub mod remote_config {
    //! Firebase Remote Config

    pub mod remote_config;
    pub mod settings;
    pub mod value;

    pub use remote_config::{ConfigUpdate, RemoteConfig};
    pub use settings::{ConfigSettings, LastFetchStatus};
    pub use value::{ConfigValue, ValueSource};
}

// Installations module
pub mod installations {
    //! Firebase Installations

    pub mod installations;

    pub use installations::{InstallationToken, Installations};
}

// Functions module
pub mod functions {
    //! Cloud Functions callables

    pub mod functions;
    pub mod https_error;
    pub(crate) mod serializer;

    pub use functions::{Functions, HttpsCallable, HttpsCallableOptions, HttpsCallableResult, HttpsCallableStreamResult};
    pub use https_error::{HttpsError, HttpsErrorCode};
}

// Storage module
pub mod storage {
    //! Cloud Storage for Firebase

    pub mod metadata;
    pub mod reference;
    pub mod storage;
    pub mod string_format;
    pub mod task;

    pub use metadata::{FullMetadata, SettableMetadata};
    pub use reference::{ListOptions, ListResult, StorageReference};
    pub use storage::{Storage, StorageSettings};
    pub use string_format::StringFormat;
    pub use task::{TaskSnapshot, TaskState, UploadTask};
}

// Realtime Database module
pub mod database {
    //! Firebase Realtime Database

    pub mod database;
    pub mod push_id;
    pub mod query;
    pub mod reference;
    pub mod snapshot;

    pub use database::Database;
    pub use query::{OrderBy, Query};
    pub use reference::{DatabaseReference, TransactionResult, MAX_TRANSACTION_RETRIES};
    pub use snapshot::DataSnapshot;
}

// Analytics module
pub mod analytics {
    //! Google Analytics for Firebase

    pub mod analytics;
    pub(crate) mod dispatcher;
    pub mod events;

    pub use analytics::{Analytics, ConsentSettings};
}

// Messaging module
pub mod messaging {
    //! Firebase Cloud Messaging

    pub mod messaging;
    pub mod types;

    pub use messaging::Messaging;
    pub use types::{PushSubscription, RemoteMessage};
}

// Re-exports for convenience
pub use app::{set_log_level, App, AppOptions, LogLevel};
pub use error::{
    AnalyticsError, AuthError, DatabaseError, FirebaseError, HttpsError, HttpsErrorCode, InstallationsError,
    MessagingError, RemoteConfigError, StorageError,
};

pub use analytics::Analytics;
pub use auth::{Auth, User};
pub use database::Database;
pub use functions::Functions;
pub use installations::Installations;
pub use messaging::Messaging;
pub use remote_config::RemoteConfig;
pub use storage::Storage;
