//! Firebase App
//!
//! The App owns the project configuration, the shared HTTP client and the
//! per-app service instances (Auth, Storage, Functions, ...).

use crate::auth::auth::{Auth, AuthInner};
use crate::error::FirebaseError;
use once_cell::sync::Lazy;
use std::any::Any;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;
use tracing_subscriber::{fmt, prelude::*, reload, EnvFilter, Registry};

/// Name used when `AppOptions::app_name` is `None`
pub const DEFAULT_APP_NAME: &str = "[DEFAULT]";

/// Component key under which Auth registers itself
pub(crate) const AUTH_COMPONENT: &str = "auth";

/// Global map of App names to App instances
static APP_INSTANCES: Lazy<RwLock<HashMap<String, App>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

/// Reload handle of the filter installed by `set_log_level`
static LOG_FILTER: Lazy<std::sync::Mutex<Option<reload::Handle<EnvFilter, Registry>>>> =
    Lazy::new(|| std::sync::Mutex::new(None));

static LOG_LEVEL: AtomicU8 = AtomicU8::new(LogLevel::Warn as u8);

/// Firebase App instance
///
/// The App is the central configuration object for Firebase services.
/// It holds credentials and project configuration that every service uses.
///
/// Each app name has at most one App instance (singleton pattern).
#[derive(Clone)]
pub struct App {
    inner: Arc<AppInner>,
}

struct AppInner {
    name: String,
    options: AppOptions,
    http_client: reqwest::Client,
    deleted: AtomicBool,
    /// Service instances keyed by component name (`auth`, `storage:bucket`, ...)
    components: RwLock<HashMap<String, Arc<dyn Any + Send + Sync>>>,
}

/// Firebase App configuration options
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AppOptions {
    /// Firebase API key
    pub api_key: String,
    /// Google Cloud project ID
    pub project_id: String,
    /// Firebase app ID (`1:1234:web:abcd`), needed by Installations and Remote Config
    pub app_id: Option<String>,
    /// Default Cloud Storage bucket
    pub storage_bucket: Option<String>,
    /// Realtime Database URL
    pub database_url: Option<String>,
    /// Google Analytics measurement ID (`G-XXXX`)
    pub measurement_id: Option<String>,
    /// Cloud Messaging sender ID
    pub messaging_sender_id: Option<String>,
    /// Auth domain (`project.firebaseapp.com`)
    pub auth_domain: Option<String>,
    /// App name (optional, defaults to "[DEFAULT]")
    pub app_name: Option<String>,
}

impl AppOptions {
    /// Create options with the two mandatory fields set
    pub fn new(api_key: impl Into<String>, project_id: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            project_id: project_id.into(),
            ..Default::default()
        }
    }

    /// Set the app name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.app_name = Some(name.into());
        self
    }
}

impl App {
    /// Create a new Firebase App with the given options
    ///
    /// If an app with the same name already exists and was created with the
    /// same options, returns the existing instance. Different options under
    /// an existing name are rejected.
    ///
    /// # Example
    /// ```no_run
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// use firebase_client_sdk::{App, AppOptions};
    ///
    /// let options = AppOptions::new("YOUR_API_KEY", "your-project-id");
    /// let app = App::create(options).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn create(options: AppOptions) -> Result<Self, FirebaseError> {
        // Validate options (error case first)
        if options.api_key.is_empty() {
            return Err(FirebaseError::ApiKeyNotConfigured);
        }
        if options.project_id.is_empty() {
            return Err(FirebaseError::invalid_argument("Project ID cannot be empty"));
        }

        let name = match options.app_name.clone() {
            None => DEFAULT_APP_NAME.to_string(),
            Some(n) if n.is_empty() => {
                return Err(FirebaseError::invalid_argument("App name cannot be empty"));
            }
            Some(n) => n,
        };

        let mut instances = APP_INSTANCES.write().await;

        // Check if instance already exists
        if let Some(app) = instances.get(&name) {
            if app.inner.options != options {
                return Err(FirebaseError::DuplicateApp(name));
            }
            return Ok(app.clone());
        }

        let http_client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| FirebaseError::internal(format!("Failed to create HTTP client: {}", e)))?;

        let app = App {
            inner: Arc::new(AppInner {
                name: name.clone(),
                options,
                http_client,
                deleted: AtomicBool::new(false),
                components: RwLock::new(HashMap::new()),
            }),
        };

        debug!(app = %name, "created firebase app");
        instances.insert(name, app.clone());

        Ok(app)
    }

    /// Get the default Firebase App instance
    ///
    /// Returns the app with name "[DEFAULT]" if it exists.
    pub async fn get_instance() -> Result<Self, FirebaseError> {
        Self::get_instance_with_name(DEFAULT_APP_NAME).await
    }

    /// Get a named Firebase App instance
    pub async fn get_instance_with_name(name: &str) -> Result<Self, FirebaseError> {
        let instances = APP_INSTANCES.read().await;
        instances
            .get(name)
            .cloned()
            .ok_or_else(|| FirebaseError::AppNotFound(name.to_string()))
    }

    /// All live apps, sorted by name
    pub async fn get_apps() -> Vec<Self> {
        let instances = APP_INSTANCES.read().await;
        let mut apps: Vec<Self> = instances.values().cloned().collect();
        apps.sort_by(|a, b| a.name().cmp(b.name()));
        apps
    }

    /// Delete this app
    ///
    /// Removes the app from the registry and drops every service instance it
    /// handed out. Existing service handles keep working on their own state,
    /// but no new ones can be obtained from this App.
    pub async fn delete(&self) -> Result<(), FirebaseError> {
        // Error-first: deleting twice is a caller bug
        if self.inner.deleted.swap(true, Ordering::SeqCst) {
            return Err(FirebaseError::AppDeleted(self.inner.name.clone()));
        }

        let mut instances = APP_INSTANCES.write().await;
        let is_current = instances
            .get(&self.inner.name)
            .map(|app| Arc::ptr_eq(&app.inner, &self.inner))
            .unwrap_or(false);
        if is_current {
            instances.remove(&self.inner.name);
        }
        drop(instances);

        self.inner.components.write().await.clear();
        debug!(app = %self.inner.name, "deleted firebase app");
        Ok(())
    }

    /// Get the app name
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Get the app options
    pub fn options(&self) -> &AppOptions {
        &self.inner.options
    }

    /// Whether `delete()` was called on this app
    pub fn is_deleted(&self) -> bool {
        self.inner.deleted.load(Ordering::SeqCst)
    }

    /// Internal: shared HTTP client
    pub(crate) fn http_client(&self) -> &reqwest::Client {
        &self.inner.http_client
    }

    /// Internal: get or lazily create the service registered under `key`
    pub(crate) async fn component<T, F>(&self, key: &str, create: F) -> Result<Arc<T>, FirebaseError>
    where
        T: Any + Send + Sync,
        F: FnOnce() -> Result<T, FirebaseError>,
    {
        // Error-first: no services from a deleted app
        if self.is_deleted() {
            return Err(FirebaseError::AppDeleted(self.inner.name.clone()));
        }

        let mut components = self.inner.components.write().await;
        if let Some(existing) = components.get(key) {
            return Arc::clone(existing)
                .downcast::<T>()
                .map_err(|_| FirebaseError::internal(format!("Component '{}' has an unexpected type", key)));
        }

        let component = Arc::new(create()?);
        components.insert(key.to_string(), component.clone() as Arc<dyn Any + Send + Sync>);
        debug!(app = %self.inner.name, component = key, "registered component");
        Ok(component)
    }

    /// Internal: ID token of the signed-in user, if Auth was initialized for this app
    ///
    /// Storage, Functions and Database attach this token to their requests.
    pub(crate) async fn auth_token(&self) -> Result<Option<String>, FirebaseError> {
        let auth = {
            let components = self.inner.components.read().await;
            components.get(AUTH_COMPONENT).cloned()
        };
        let Some(auth) = auth.and_then(|c| c.downcast::<AuthInner>().ok()) else {
            return Ok(None);
        };
        Auth::from_inner(auth).current_id_token().await
    }
}

impl std::fmt::Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App")
            .field("name", &self.inner.name)
            .field("project_id", &self.inner.options.project_id)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

/// SDK log verbosity
///
/// Levels map onto `tracing` levels for the `firebase_client_sdk` target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum LogLevel {
    /// Everything, including per-request tracing
    Verbose = 0,
    /// Debug diagnostics
    Debug = 1,
    /// Informational messages
    Info = 2,
    /// Warnings only (default)
    Warn = 3,
    /// Errors only
    Error = 4,
    /// Nothing
    Silent = 5,
}

impl LogLevel {
    fn directive(self) -> &'static str {
        match self {
            LogLevel::Verbose => "firebase_client_sdk=trace",
            LogLevel::Debug => "firebase_client_sdk=debug",
            LogLevel::Info => "firebase_client_sdk=info",
            LogLevel::Warn => "firebase_client_sdk=warn",
            LogLevel::Error => "firebase_client_sdk=error",
            LogLevel::Silent => "firebase_client_sdk=off",
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            0 => LogLevel::Verbose,
            1 => LogLevel::Debug,
            2 => LogLevel::Info,
            3 => LogLevel::Warn,
            4 => LogLevel::Error,
            _ => LogLevel::Silent,
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = FirebaseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "verbose" => Ok(LogLevel::Verbose),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            "silent" => Ok(LogLevel::Silent),
            other => Err(FirebaseError::invalid_argument(format!(
                "Invalid log level '{}', expected one of verbose, debug, info, warn, error, silent",
                other
            ))),
        }
    }
}

/// Set the SDK log level
///
/// The first call installs a `tracing-subscriber` fmt subscriber filtered to
/// this crate; later calls swap the filter in place. If the application has
/// already installed its own global subscriber, that one keeps control and
/// only the recorded level changes.
///
/// # Example
/// ```no_run
/// use firebase_client_sdk::{set_log_level, LogLevel};
///
/// set_log_level(LogLevel::Debug);
/// ```
pub fn set_log_level(level: LogLevel) {
    LOG_LEVEL.store(level as u8, Ordering::SeqCst);

    let mut handle = LOG_FILTER.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    if let Some(existing) = handle.as_ref() {
        if existing.reload(EnvFilter::new(level.directive())).is_ok() {
            return;
        }
    }

    let (filter, reload_handle) = reload::Layer::new(EnvFilter::new(level.directive()));
    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .try_init()
        .is_ok();
    if installed {
        *handle = Some(reload_handle);
    }
}

/// The level last passed to `set_log_level`
pub fn log_level() -> LogLevel {
    LogLevel::from_u8(LOG_LEVEL.load(Ordering::SeqCst))
}
