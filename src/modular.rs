//! Free-function API
//!
//! Every function forwards to the method of the same name on the service
//! handle. Service getters take `None` for the default App.
//!
//! # Example
//! ```no_run
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! use firebase_client_sdk::modular::{fetch_and_activate, get_remote_config, get_value, initialize_app};
//! use firebase_client_sdk::AppOptions;
//!
//! initialize_app(AppOptions::new("YOUR_API_KEY", "your-project")).await?;
//! let config = get_remote_config(None).await?;
//! fetch_and_activate(&config).await?;
//! println!("welcome: {}", get_value(&config, "welcome_message").await.as_string());
//! # Ok(())
//! # }
//! ```

use crate::analytics::Analytics;
use crate::app::{App, AppOptions};
use crate::auth::password_policy::PasswordValidationStatus;
use crate::auth::Auth;
use crate::database::{Database, DatabaseReference, TransactionResult};
use crate::error::FirebaseError;
use crate::functions::{Functions, HttpsCallable, HttpsCallableOptions};
use crate::installations::Installations;
use crate::messaging::{Messaging, PushSubscription};
use crate::remote_config::{ConfigValue, RemoteConfig};
use crate::storage::{Storage, StorageReference};
use serde_json::{Map, Value};
use std::collections::HashMap;

pub use crate::app::set_log_level;

async fn resolve(app: Option<&App>) -> Result<App, FirebaseError> {
    match app {
        Some(app) => Ok(app.clone()),
        None => App::get_instance().await,
    }
}

/// Create (or return the matching) App
pub async fn initialize_app(options: AppOptions) -> Result<App, FirebaseError> {
    App::create(options).await
}

/// App by name, the default App for `None`
pub async fn get_app(name: Option<&str>) -> Result<App, FirebaseError> {
    match name {
        Some(name) => App::get_instance_with_name(name).await,
        None => App::get_instance().await,
    }
}

/// All live Apps
pub async fn get_apps() -> Vec<App> {
    App::get_apps().await
}

/// Delete an App and its services
pub async fn delete_app(app: &App) -> Result<(), FirebaseError> {
    app.delete().await
}

/// Auth instance of `app`
pub async fn get_auth(app: Option<&App>) -> Result<Auth, FirebaseError> {
    Auth::get_auth(&resolve(app).await?).await
}

/// Check `password` against the cached password policy
pub async fn validate_password(auth: &Auth, password: &str) -> Result<PasswordValidationStatus, FirebaseError> {
    auth.validate_password(password).await
}

/// Whether `link` is an email sign-in link
pub fn is_sign_in_with_email_link(auth: &Auth, link: &str) -> bool {
    auth.is_sign_in_with_email_link(link)
}

/// Remote Config instance of `app`
pub async fn get_remote_config(app: Option<&App>) -> Result<RemoteConfig, FirebaseError> {
    RemoteConfig::get_remote_config(&resolve(app).await?).await
}

/// Value of a parameter
pub async fn get_value(config: &RemoteConfig, key: &str) -> ConfigValue {
    config.get_value(key).await
}

/// Fetch then activate; `true` when new values became active
pub async fn fetch_and_activate(config: &RemoteConfig) -> Result<bool, FirebaseError> {
    config.fetch_and_activate().await
}

/// Merge custom signals sent with every fetch
pub async fn set_custom_signals(config: &RemoteConfig, signals: HashMap<String, Value>) -> Result<(), FirebaseError> {
    config.set_custom_signals(signals).await
}

/// Functions instance of `app` for a region or custom domain
pub async fn get_functions(app: Option<&App>, region_or_custom_domain: Option<&str>) -> Result<Functions, FirebaseError> {
    Functions::get_functions(&resolve(app).await?, region_or_custom_domain).await
}

/// Callable for the function `name`
pub fn https_callable(functions: &Functions, name: &str, options: HttpsCallableOptions) -> HttpsCallable {
    functions.https_callable(name, options)
}

/// Storage instance of `app` for a bucket
pub async fn get_storage(app: Option<&App>, bucket: Option<&str>) -> Result<Storage, FirebaseError> {
    Storage::get_storage(&resolve(app).await?, bucket).await
}

/// Reference to `path`, the bucket root for `None`
pub fn storage_ref(storage: &Storage, path: Option<&str>) -> StorageReference {
    storage.reference(path.unwrap_or_default())
}

/// Realtime Database instance of `app`
pub async fn get_database(app: Option<&App>, url: Option<&str>) -> Result<Database, FirebaseError> {
    Database::get_database(&resolve(app).await?, url).await
}

/// Reference to `path`, the database root for `None`
pub fn database_ref(database: &Database, path: Option<&str>) -> Result<DatabaseReference, FirebaseError> {
    database.reference(path.unwrap_or_default())
}

/// Compare-and-set the value at `reference`
pub async fn run_transaction<F>(reference: &DatabaseReference, update: F) -> Result<TransactionResult, FirebaseError>
where
    F: FnMut(&Value) -> Option<Value>,
{
    reference.transaction(update).await
}

/// Analytics instance of `app`
pub async fn get_analytics(app: Option<&App>) -> Result<Analytics, FirebaseError> {
    Analytics::get_analytics(&resolve(app).await?).await
}

/// Queue an analytics event
pub async fn log_event(analytics: &Analytics, name: &str, params: Map<String, Value>) -> Result<(), FirebaseError> {
    analytics.log_event(name, params).await
}

/// Installations instance of `app`
pub async fn get_installations(app: Option<&App>) -> Result<Installations, FirebaseError> {
    Installations::get_installations(&resolve(app).await?).await
}

/// Messaging instance of `app`
pub async fn get_messaging(app: Option<&App>) -> Result<Messaging, FirebaseError> {
    Messaging::get_messaging(&resolve(app).await?).await
}

/// FCM registration token for `subscription`
pub async fn get_token(messaging: &Messaging, subscription: PushSubscription) -> Result<String, FirebaseError> {
    messaging.get_token(subscription).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    #[tokio::test]
    async fn test_named_app_round_trip() {
        let app = initialize_app(AppOptions::new("k", "p").with_name("modular-app")).await.unwrap();
        let found = get_app(Some("modular-app")).await.unwrap();
        assert_eq!(found.name(), app.name());
        assert!(get_apps().await.iter().any(|a| a.name() == "modular-app"));

        assert_ok!(delete_app(&app).await);
        assert_err!(get_app(Some("modular-app")).await);
    }

    #[tokio::test]
    async fn test_getters_share_instances() {
        let mut options = AppOptions::new("k", "p").with_name("modular-services");
        options.storage_bucket = Some("p.appspot.com".to_string());
        options.database_url = Some("https://p-default-rtdb.firebaseio.com".to_string());
        let app = initialize_app(options).await.unwrap();

        let storage = get_storage(Some(&app), None).await.unwrap();
        assert_eq!(storage.bucket(), "p.appspot.com");
        assert_eq!(storage_ref(&storage, Some("a/b")).full_path(), "a/b");
        assert_eq!(storage_ref(&storage, None).full_path(), "");

        let database = get_database(Some(&app), None).await.unwrap();
        assert_eq!(database_ref(&database, Some("users")).unwrap().path(), "users");
        assert_err!(database_ref(&database, Some("bad.path")));

        let functions = get_functions(Some(&app), Some("europe-west1")).await.unwrap();
        assert_eq!(functions.region(), "europe-west1");

        let auth = get_auth(Some(&app)).await.unwrap();
        assert!(is_sign_in_with_email_link(
            &auth,
            "https://p.firebaseapp.com/__/auth/action?mode=signIn&oobCode=abc&apiKey=k"
        ));
        assert!(!is_sign_in_with_email_link(&auth, "https://p.firebaseapp.com/"));
    }
}
