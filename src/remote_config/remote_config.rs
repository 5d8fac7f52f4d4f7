//! Firebase Remote Config
//!
//! Every operation mutates the store, derives a [`ConfigConstants`] snapshot
//! from it and merges the snapshot into the view read by the accessors.

use crate::app::App;
use crate::error::{FirebaseError, RemoteConfigError};
use crate::installations::Installations;
use crate::remote_config::settings::{
    ConfigConstants, ConfigSettings, ConfigView, LastFetchStatus, SettingsUpdate,
};
use crate::remote_config::value::{ConfigValue, ValueSource};
use crate::rest::api_failure;
use async_stream::stream;
use futures::Stream;
use serde::Deserialize;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info, warn};

pub(crate) const REMOTE_CONFIG_BASE_URL: &str = "https://firebaseremoteconfig.googleapis.com/v1";
const COMPONENT: &str = "remote-config";
const SDK_VERSION: &str = concat!("rust:", env!("CARGO_PKG_VERSION"));
const CUSTOM_SIGNAL_KEY_MAX_LENGTH: usize = 250;
const CUSTOM_SIGNAL_VALUE_MAX_LENGTH: usize = 500;
const CUSTOM_SIGNAL_MAX_ALLOWED: usize = 100;

/// Keys changed by an activation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigUpdate {
    /// Keys added, removed or modified
    pub updated_keys: HashSet<String>,
}

/// Firebase Remote Config instance, one per App
#[derive(Clone)]
pub struct RemoteConfig {
    inner: Arc<RemoteConfigInner>,
}

struct RemoteConfigInner {
    api_key: String,
    project_id: String,
    app_id: Option<String>,
    http_client: reqwest::Client,
    installations: Installations,
    base_url: RwLock<String>,
    store: RwLock<ConfigStore>,
    view: RwLock<ConfigView>,
    update_tx: broadcast::Sender<ConfigUpdate>,
}

/// Backend-facing state
#[derive(Debug, Default)]
struct ConfigStore {
    settings: ConfigSettings,
    defaults: HashMap<String, String>,
    custom_signals: HashMap<String, String>,
    fetched: Option<Template>,
    active: Template,
    last_fetch_time: Option<i64>,
    last_successful_fetch_time: Option<i64>,
    last_fetch_status: Option<LastFetchStatus>,
    initialized: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
struct Template {
    entries: HashMap<String, String>,
    etag: Option<String>,
}

impl ConfigStore {
    fn constants(&self) -> ConfigConstants {
        let mut values: HashMap<String, ConfigValue> = self
            .defaults
            .iter()
            .map(|(k, v)| (k.clone(), ConfigValue::new(v.clone(), ValueSource::Default)))
            .collect();
        for (key, value) in &self.active.entries {
            values.insert(key.clone(), ConfigValue::new(value.clone(), ValueSource::Remote));
        }

        ConfigConstants {
            last_fetch_time: Some(self.last_fetch_time.unwrap_or(-1)),
            last_fetch_status: Some(self.last_fetch_status.unwrap_or(LastFetchStatus::NoFetchYet)),
            settings: Some(SettingsUpdate::Seconds {
                fetch_timeout: self.settings.fetch_timeout_millis as f64 / 1000.0,
                minimum_fetch_interval: self.settings.minimum_fetch_interval_millis as f64 / 1000.0,
            }),
            values: Some(values),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FetchResponse {
    #[serde(default)]
    entries: HashMap<String, String>,
    state: Option<String>,
}

impl RemoteConfig {
    /// Get or create the Remote Config instance for the given App
    ///
    /// # Example
    /// ```no_run
    /// # use firebase_client_sdk::{App, AppOptions, RemoteConfig};
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let app = App::create(AppOptions::new("YOUR_API_KEY", "your-project")).await?;
    /// let config = RemoteConfig::get_remote_config(&app).await?;
    /// config.fetch_and_activate().await?;
    /// println!("{}", config.get_string("welcome_message").await);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn get_remote_config(app: &App) -> Result<Self, FirebaseError> {
        let installations = Installations::get_installations(app).await?;
        let options = app.options().clone();
        let http_client = app.http_client().clone();

        let inner = app
            .component(COMPONENT, move || {
                let (update_tx, _) = broadcast::channel(16);
                let store = ConfigStore::default();
                let mut view = ConfigView::default();
                view.update_from_constants(store.constants());
                Ok(RemoteConfigInner {
                    api_key: options.api_key,
                    project_id: options.project_id,
                    app_id: options.app_id,
                    http_client,
                    installations,
                    base_url: RwLock::new(REMOTE_CONFIG_BASE_URL.to_string()),
                    store: RwLock::new(store),
                    view: RwLock::new(view),
                    update_tx,
                })
            })
            .await?;

        Ok(Self { inner })
    }

    /// Current settings
    pub async fn settings(&self) -> ConfigSettings {
        self.inner.view.read().await.settings
    }

    /// Replace the settings
    pub async fn set_config_settings(&self, settings: ConfigSettings) -> Result<(), FirebaseError> {
        // Error-first: a zero timeout would fail every fetch
        if settings.fetch_timeout_millis == 0 {
            return Err(RemoteConfigError::InvalidArgument(
                "'fetch_timeout_millis' must be greater than 0".to_string(),
            )
            .into());
        }

        self.mutate(|store| {
            store.settings = settings;
        })
        .await;
        debug!(?settings, "remote config settings updated");
        Ok(())
    }

    /// Set in-app defaults
    ///
    /// Values must be strings, numbers or booleans; they are stored as strings.
    pub async fn set_defaults(&self, defaults: HashMap<String, Value>) -> Result<(), FirebaseError> {
        let mut converted = HashMap::with_capacity(defaults.len());
        for (key, value) in defaults {
            let value = match value {
                Value::String(s) => s,
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                other => {
                    return Err(RemoteConfigError::InvalidArgument(format!(
                        "default for '{}' must be a string, number or boolean, got {}",
                        key, other
                    ))
                    .into())
                }
            };
            converted.insert(key, value);
        }

        self.mutate(|store| {
            store.defaults = converted;
        })
        .await;
        Ok(())
    }

    /// Merge custom signals into those sent with every fetch
    ///
    /// Values must be strings, numbers or `null`; `null` removes the signal.
    /// Keys are limited to 250 characters, values to 500, and at most 100
    /// signals are kept.
    pub async fn set_custom_signals(&self, signals: HashMap<String, Value>) -> Result<(), FirebaseError> {
        let mut updates = Vec::with_capacity(signals.len());
        for (key, value) in signals {
            // Error-first: check every signal before touching the store
            if key.chars().count() > CUSTOM_SIGNAL_KEY_MAX_LENGTH {
                return Err(RemoteConfigError::InvalidArgument(format!(
                    "custom signal key '{}' is longer than {} characters",
                    key, CUSTOM_SIGNAL_KEY_MAX_LENGTH
                ))
                .into());
            }
            let value = match value {
                Value::Null => None,
                Value::String(s) => Some(s),
                Value::Number(n) => Some(n.to_string()),
                other => {
                    return Err(RemoteConfigError::InvalidArgument(format!(
                        "custom signal '{}' must be a string, number or null, got {}",
                        key, other
                    ))
                    .into())
                }
            };
            if value.as_ref().is_some_and(|v| v.chars().count() > CUSTOM_SIGNAL_VALUE_MAX_LENGTH) {
                return Err(RemoteConfigError::InvalidArgument(format!(
                    "custom signal '{}' has a value longer than {} characters",
                    key, CUSTOM_SIGNAL_VALUE_MAX_LENGTH
                ))
                .into());
            }
            updates.push((key, value));
        }

        let mut store = self.inner.store.write().await;
        let mut merged = store.custom_signals.clone();
        for (key, value) in updates {
            match value {
                Some(value) => merged.insert(key, value),
                None => merged.remove(&key),
            };
        }
        if merged.len() > CUSTOM_SIGNAL_MAX_ALLOWED {
            return Err(RemoteConfigError::InvalidArgument(format!(
                "at most {} custom signals can be set",
                CUSTOM_SIGNAL_MAX_ALLOWED
            ))
            .into());
        }
        debug!(count = merged.len(), "custom signals updated");
        store.custom_signals = merged;
        Ok(())
    }

    /// Custom signals sent with fetches
    pub async fn custom_signals(&self) -> HashMap<String, String> {
        self.inner.store.read().await.custom_signals.clone()
    }

    /// The in-app defaults as strings
    pub async fn default_config(&self) -> HashMap<String, String> {
        self.inner.store.read().await.defaults.clone()
    }

    /// Fetch the template from the backend without activating it
    ///
    /// A successful fetch younger than `expiration_seconds` (or the minimum
    /// fetch interval when `None`) makes this a no-op.
    pub async fn fetch(&self, expiration_seconds: Option<u64>) -> Result<(), FirebaseError> {
        let (settings, etag, signals) = {
            let store = self.inner.store.read().await;
            let interval_millis = expiration_seconds
                .map(|s| s.saturating_mul(1000))
                .unwrap_or(store.settings.minimum_fetch_interval_millis);

            if let Some(last_success) = store.last_successful_fetch_time {
                let age = chrono::Utc::now().timestamp_millis() - last_success;
                if age >= 0 && (age as u64) < interval_millis {
                    debug!(age_millis = age, "serving cached remote config");
                    return Ok(());
                }
            }

            let etag = store
                .fetched
                .as_ref()
                .and_then(|t| t.etag.clone())
                .or_else(|| store.active.etag.clone());
            (store.settings, etag, store.custom_signals.clone())
        };

        let result = self.fetch_template(settings, etag, signals).await;
        let now = chrono::Utc::now().timestamp_millis();

        match result {
            Ok(template) => {
                self.mutate(|store| {
                    store.last_fetch_time = Some(now);
                    store.last_successful_fetch_time = Some(now);
                    store.last_fetch_status = Some(LastFetchStatus::Success);
                    if let Some(template) = template {
                        store.fetched = Some(template);
                    }
                })
                .await;
                Ok(())
            }
            Err(e) => {
                let status = match &e {
                    FirebaseError::RemoteConfig(RemoteConfigError::FetchThrottle) => LastFetchStatus::Throttled,
                    _ => LastFetchStatus::Failure,
                };
                self.mutate(|store| {
                    store.last_fetch_time = Some(now);
                    store.last_fetch_status = Some(status);
                })
                .await;
                warn!(error = %e, "remote config fetch failed");
                Err(e)
            }
        }
    }

    /// Promote the last fetched template to active
    ///
    /// Returns `false` when nothing was fetched or the fetched template is
    /// the one already active.
    pub async fn activate(&self) -> Result<bool, FirebaseError> {
        let mut updated_keys = HashSet::new();
        let activated = self
            .mutate(|store| {
                let Some(fetched) = store.fetched.take() else {
                    return false;
                };
                if fetched.etag.is_some() && fetched.etag == store.active.etag {
                    return false;
                }

                updated_keys = changed_keys(&store.active.entries, &fetched.entries);
                store.active = fetched;
                true
            })
            .await;

        if activated && !updated_keys.is_empty() {
            info!(count = updated_keys.len(), "activated remote config");
            // No subscribers is fine
            let _ = self.inner.update_tx.send(ConfigUpdate { updated_keys });
        }
        Ok(activated)
    }

    /// `fetch(None)` followed by `activate()`
    pub async fn fetch_and_activate(&self) -> Result<bool, FirebaseError> {
        self.fetch(None).await?;
        self.activate().await
    }

    /// Resolve once the stored config is ready to be read
    pub async fn ensure_initialized(&self) -> Result<(), FirebaseError> {
        self.mutate(|store| {
            store.initialized = true;
        })
        .await;
        Ok(())
    }

    /// Forget activated and fetched templates, defaults and settings
    pub async fn reset(&self) -> Result<(), FirebaseError> {
        self.mutate(|store| {
            *store = ConfigStore {
                initialized: store.initialized,
                ..ConfigStore::default()
            };
        })
        .await;
        info!("remote config reset");
        Ok(())
    }

    /// Value for `key`; a static empty value when the key is unknown
    pub async fn get_value(&self, key: &str) -> ConfigValue {
        self.inner
            .view
            .read()
            .await
            .values
            .get(key)
            .cloned()
            .unwrap_or_else(ConfigValue::static_value)
    }

    /// `get_value(key).as_boolean()`
    pub async fn get_boolean(&self, key: &str) -> bool {
        self.get_value(key).await.as_boolean()
    }

    /// `get_value(key).as_number()`
    pub async fn get_number(&self, key: &str) -> f64 {
        self.get_value(key).await.as_number()
    }

    /// `get_value(key).as_string()`
    pub async fn get_string(&self, key: &str) -> String {
        self.get_value(key).await.as_string().to_string()
    }

    /// Every known key
    pub async fn get_all(&self) -> HashMap<String, ConfigValue> {
        self.inner.view.read().await.values.clone()
    }

    /// Time of the last fetch attempt in milliseconds, -1 before any fetch
    pub async fn fetch_time_millis(&self) -> i64 {
        self.inner.view.read().await.last_fetch_time
    }

    /// Status of the last fetch
    pub async fn last_fetch_status(&self) -> LastFetchStatus {
        self.inner.view.read().await.last_fetch_status
    }

    /// Stream of key sets changed by `activate`
    pub fn on_config_updated(&self) -> std::pin::Pin<Box<dyn Stream<Item = ConfigUpdate> + Send>> {
        let mut rx = self.inner.update_tx.subscribe();

        Box::pin(stream! {
            loop {
                let update = match rx.recv().await {
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(_) => break,
                    Ok(u) => u,
                };
                yield update;
            }
        })
    }

    /// Internal: route fetches to another host
    pub(crate) async fn set_base_url(&self, base_url: impl Into<String>) {
        *self.inner.base_url.write().await = base_url.into();
    }

    /// Apply `f` to the store and reconcile the view with the result
    async fn mutate<R>(&self, f: impl FnOnce(&mut ConfigStore) -> R) -> R {
        let mut store = self.inner.store.write().await;
        let result = f(&mut store);
        let constants = store.constants();
        self.inner.view.write().await.update_from_constants(constants);
        result
    }

    /// `Ok(None)` when the backend reports no change
    async fn fetch_template(
        &self,
        settings: ConfigSettings,
        etag: Option<String>,
        custom_signals: HashMap<String, String>,
    ) -> Result<Option<Template>, FirebaseError> {
        let installation_id = self.inner.installations.get_id().await?;
        let installation_token = self.inner.installations.get_token(false).await?;

        let url = format!(
            "{}/projects/{}/namespaces/firebase:fetch?key={}",
            self.inner.base_url.read().await,
            self.inner.project_id,
            self.inner.api_key
        );
        let mut body = serde_json::json!({
            "sdk_version": SDK_VERSION,
            "app_instance_id": installation_id,
            "app_instance_id_token": installation_token.token,
            "app_id": self.inner.app_id,
            "language_code": "en-US"
        });
        if !custom_signals.is_empty() {
            body["custom_signals"] = serde_json::json!(custom_signals);
        }

        let response = match self
            .inner
            .http_client
            .post(&url)
            .header("If-None-Match", etag.as_deref().unwrap_or("*"))
            .timeout(Duration::from_millis(settings.fetch_timeout_millis))
            .json(&body)
            .send()
            .await
        {
            Err(e) if e.is_timeout() => {
                return Err(RemoteConfigError::FetchTimeout(settings.fetch_timeout_millis).into())
            }
            Err(e) => return Err(RemoteConfigError::FetchStatus(e.to_string()).into()),
            Ok(resp) => resp,
        };

        let status = response.status();
        if status == reqwest::StatusCode::NOT_MODIFIED {
            return Ok(None);
        }
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS || status == reqwest::StatusCode::SERVICE_UNAVAILABLE {
            return Err(RemoteConfigError::FetchThrottle.into());
        }
        if !status.is_success() {
            let failure = api_failure(response).await;
            return Err(RemoteConfigError::FetchStatus(failure.to_string()).into());
        }

        let etag = response
            .headers()
            .get(reqwest::header::ETAG)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let fetched: FetchResponse = response.json().await?;

        match fetched.state.as_deref() {
            Some("NO_CHANGE") => Ok(None),
            Some("NO_TEMPLATE") | Some("EMPTY_CONFIG") => Ok(Some(Template {
                entries: HashMap::new(),
                etag,
            })),
            Some("UPDATE") | None => Ok(Some(Template {
                entries: fetched.entries,
                etag,
            })),
            Some(other) => Err(RemoteConfigError::FetchStatus(format!("unexpected fetch state '{}'", other)).into()),
        }
    }
}

fn changed_keys(old: &HashMap<String, String>, new: &HashMap<String, String>) -> HashSet<String> {
    let mut keys: HashSet<String> = old
        .iter()
        .filter(|(k, v)| new.get(*k) != Some(*v))
        .map(|(k, _)| k.clone())
        .collect();
    keys.extend(new.keys().filter(|k| !old.contains_key(*k)).cloned());
    keys
}

impl std::fmt::Debug for RemoteConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteConfig")
            .field("project_id", &self.inner.project_id)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::AppOptions;
    use futures::StreamExt;
    use httpmock::prelude::*;

    async fn test_config(app_name: &str, server: &MockServer) -> RemoteConfig {
        let mut options = AppOptions::new("test-api-key", "test-project").with_name(app_name);
        options.app_id = Some("1:123:web:abc".to_string());
        let app = App::create(options).await.unwrap();

        let installations = Installations::get_installations(&app).await.unwrap();
        installations.set_base_url(server.url("/installations/v1")).await;
        server.mock(|when, then| {
            when.method(POST).path("/installations/v1/projects/test-project/installations");
            then.status(200).json_body(serde_json::json!({
                "fid": "fid-1",
                "refreshToken": "refresh",
                "authToken": { "token": "fis-token", "expiresIn": "604800s" }
            }));
        });

        let config = RemoteConfig::get_remote_config(&app).await.unwrap();
        config.set_base_url(server.url("/rc/v1")).await;
        config
    }

    const FETCH_PATH: &str = "/rc/v1/projects/test-project/namespaces/firebase:fetch";

    #[tokio::test]
    async fn test_initial_state() {
        let server = MockServer::start();
        let config = test_config("rc-initial", &server).await;

        assert_eq!(config.fetch_time_millis().await, -1);
        assert_eq!(config.last_fetch_status().await, LastFetchStatus::NoFetchYet);
        assert_eq!(config.settings().await, ConfigSettings::default());

        let missing = config.get_value("nope").await;
        assert_eq!(missing.source(), ValueSource::Static);
        assert_eq!(missing.as_string(), "");
        assert!(!config.get_boolean("nope").await);
        assert_eq!(config.get_number("nope").await, 0.0);
    }

    #[tokio::test]
    async fn test_defaults() {
        let server = MockServer::start();
        let config = test_config("rc-defaults", &server).await;

        let mut defaults = HashMap::new();
        defaults.insert("flag".to_string(), serde_json::json!(true));
        defaults.insert("count".to_string(), serde_json::json!(3));
        defaults.insert("greeting".to_string(), serde_json::json!("hi"));
        config.set_defaults(defaults).await.unwrap();

        assert!(config.get_boolean("flag").await);
        assert_eq!(config.get_number("count").await, 3.0);
        assert_eq!(config.get_value("greeting").await.source(), ValueSource::Default);
        assert_eq!(config.default_config().await["count"], "3");
        assert_eq!(config.get_all().await.len(), 3);
    }

    #[tokio::test]
    async fn test_defaults_reject_objects() {
        let server = MockServer::start();
        let config = test_config("rc-defaults-invalid", &server).await;

        let mut defaults = HashMap::new();
        defaults.insert("nested".to_string(), serde_json::json!({ "a": 1 }));
        let result = config.set_defaults(defaults).await;
        assert!(matches!(
            result,
            Err(FirebaseError::RemoteConfig(RemoteConfigError::InvalidArgument(_)))
        ));
    }

    #[tokio::test]
    async fn test_settings_round_trip_through_view() {
        let server = MockServer::start();
        let config = test_config("rc-settings", &server).await;

        let settings = ConfigSettings {
            fetch_timeout_millis: 5_000,
            minimum_fetch_interval_millis: 1_500,
        };
        config.set_config_settings(settings).await.unwrap();
        assert_eq!(config.settings().await, settings);

        let invalid = ConfigSettings {
            fetch_timeout_millis: 0,
            ..settings
        };
        assert!(config.set_config_settings(invalid).await.is_err());
    }

    #[tokio::test]
    async fn test_fetch_and_activate() {
        let server = MockServer::start();
        let fetch = server.mock(|when, then| {
            when.method(POST)
                .path(FETCH_PATH)
                .query_param("key", "test-api-key")
                .header("If-None-Match", "*")
                .body_includes("\"app_instance_id\":\"fid-1\"")
                .body_includes("\"app_instance_id_token\":\"fis-token\"");
            then.status(200).header("ETag", "etag-1").json_body(serde_json::json!({
                "entries": { "welcome": "hello", "enabled": "yes" },
                "state": "UPDATE",
                "templateVersion": "7"
            }));
        });

        let config = test_config("rc-fetch", &server).await;
        let mut defaults = HashMap::new();
        defaults.insert("welcome".to_string(), serde_json::json!("default"));
        config.set_defaults(defaults).await.unwrap();

        let mut updates = config.on_config_updated();
        assert!(config.fetch_and_activate().await.unwrap());
        fetch.assert();

        let welcome = config.get_value("welcome").await;
        assert_eq!(welcome.as_string(), "hello");
        assert_eq!(welcome.source(), ValueSource::Remote);
        assert!(config.get_boolean("enabled").await);
        assert_eq!(config.last_fetch_status().await, LastFetchStatus::Success);
        assert!(config.fetch_time_millis().await > 0);

        let update = updates.next().await.unwrap();
        assert_eq!(update.updated_keys.len(), 2);

        // Nothing new to activate
        assert!(!config.activate().await.unwrap());
    }

    #[tokio::test]
    async fn test_custom_signals_are_sent() {
        let server = MockServer::start();
        let config = test_config("rc-custom-signals", &server).await;

        let mut signals = HashMap::new();
        signals.insert("tier".to_string(), serde_json::json!("gold"));
        signals.insert("level".to_string(), serde_json::json!(12));
        signals.insert("legacy".to_string(), serde_json::json!("x"));
        config.set_custom_signals(signals).await.unwrap();

        // null removes, other keys are merged
        let mut signals = HashMap::new();
        signals.insert("legacy".to_string(), Value::Null);
        config.set_custom_signals(signals).await.unwrap();
        let stored = config.custom_signals().await;
        assert_eq!(stored.len(), 2);
        assert_eq!(stored["level"], "12");

        let fetch = server.mock(|when, then| {
            when.method(POST)
                .path(FETCH_PATH)
                .json_body_includes(r#"{"custom_signals": {"tier": "gold", "level": "12"}}"#);
            then.status(200)
                .json_body(serde_json::json!({ "entries": { "a": "1" }, "state": "UPDATE" }));
        });
        config.fetch(Some(0)).await.unwrap();
        fetch.assert();
    }

    #[tokio::test]
    async fn test_custom_signals_validation() {
        let server = MockServer::start();
        let config = test_config("rc-custom-signals-invalid", &server).await;

        let invalid = [
            ("flag".to_string(), serde_json::json!(true)),
            ("k".repeat(251), serde_json::json!("v")),
            ("long".to_string(), serde_json::json!("v".repeat(501))),
        ];
        for (key, value) in invalid {
            let result = config.set_custom_signals(HashMap::from([(key, value)])).await;
            assert!(matches!(
                result,
                Err(FirebaseError::RemoteConfig(RemoteConfigError::InvalidArgument(_)))
            ));
        }

        let too_many: HashMap<String, Value> = (0..=CUSTOM_SIGNAL_MAX_ALLOWED)
            .map(|i| (format!("signal_{}", i), serde_json::json!(i)))
            .collect();
        assert!(config.set_custom_signals(too_many).await.is_err());
        assert!(config.custom_signals().await.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_within_interval_is_cached() {
        let server = MockServer::start();
        let fetch = server.mock(|when, then| {
            when.method(POST).path(FETCH_PATH);
            then.status(200)
                .json_body(serde_json::json!({ "entries": { "a": "1" }, "state": "UPDATE" }));
        });

        let config = test_config("rc-cached", &server).await;
        config.fetch(None).await.unwrap();
        config.fetch(None).await.unwrap();
        fetch.assert_calls(1);

        // A zero expiration always goes to the backend
        config.fetch(Some(0)).await.unwrap();
        fetch.assert_calls(2);
    }

    #[tokio::test]
    async fn test_fetch_throttled() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path(FETCH_PATH);
            then.status(429).body("");
        });

        let config = test_config("rc-throttled", &server).await;
        let result = config.fetch(None).await;
        assert!(matches!(
            result,
            Err(FirebaseError::RemoteConfig(RemoteConfigError::FetchThrottle))
        ));
        assert_eq!(config.last_fetch_status().await, LastFetchStatus::Throttled);
        assert!(config.fetch_time_millis().await > 0);
    }

    #[tokio::test]
    async fn test_fetch_failure() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path(FETCH_PATH);
            then.status(400).json_body(serde_json::json!({
                "error": { "code": 400, "message": "bad app id", "status": "INVALID_ARGUMENT" }
            }));
        });

        let config = test_config("rc-failure", &server).await;
        let result = config.fetch(None).await;
        assert!(matches!(
            result,
            Err(FirebaseError::RemoteConfig(RemoteConfigError::FetchStatus(msg))) if msg.contains("bad app id")
        ));
        assert_eq!(config.last_fetch_status().await, LastFetchStatus::Failure);
    }

    #[tokio::test]
    async fn test_no_change_keeps_active() {
        let server = MockServer::start();
        let config = test_config("rc-no-change", &server).await;

        let mut first = server.mock(|when, then| {
            when.method(POST).path(FETCH_PATH);
            then.status(200)
                .header("ETag", "etag-1")
                .json_body(serde_json::json!({ "entries": { "a": "1" }, "state": "UPDATE" }));
        });
        assert!(config.fetch_and_activate().await.unwrap());
        first.delete();

        let second = server.mock(|when, then| {
            when.method(POST).path(FETCH_PATH).header("If-None-Match", "etag-1");
            then.status(304);
        });
        config.fetch(Some(0)).await.unwrap();
        second.assert();

        assert!(!config.activate().await.unwrap());
        assert_eq!(config.get_string("a").await, "1");
    }

    #[tokio::test]
    async fn test_reset() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path(FETCH_PATH);
            then.status(200)
                .json_body(serde_json::json!({ "entries": { "a": "1" }, "state": "UPDATE" }));
        });

        let config = test_config("rc-reset", &server).await;
        config.ensure_initialized().await.unwrap();
        config.fetch_and_activate().await.unwrap();
        config.reset().await.unwrap();

        assert!(config.get_all().await.is_empty());
        assert_eq!(config.fetch_time_millis().await, -1);
        assert_eq!(config.last_fetch_status().await, LastFetchStatus::NoFetchYet);
    }

    #[test]
    fn test_changed_keys() {
        let old: HashMap<String, String> = [("a", "1"), ("b", "2")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let new: HashMap<String, String> = [("a", "1"), ("b", "3"), ("c", "4")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let keys = changed_keys(&old, &new);
        assert_eq!(keys.len(), 2);
        assert!(keys.contains("b") && keys.contains("c"));
    }
}
