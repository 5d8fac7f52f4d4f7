//! Firebase Realtime Database over REST
//!
//! One instance per App and database URL. Locations are read and written
//! through [`DatabaseReference`]s.

use crate::app::App;
use crate::database::push_id::PushIdGenerator;
use crate::database::reference::DatabaseReference;
use crate::error::{DatabaseError, FirebaseError};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

/// Realtime Database instance
#[derive(Clone)]
pub struct Database {
    inner: Arc<DatabaseInner>,
}

struct DatabaseInner {
    app: App,
    url: String,
    namespace: String,
    emulator_origin: RwLock<Option<String>>,
    server_time_offset: RwLock<i64>,
    push_ids: Mutex<PushIdGenerator>,
}

impl Database {
    /// Get or create the Database instance for `url`
    ///
    /// The app's `database_url` option is used when `url` is `None`.
    ///
    /// # Example
    /// ```no_run
    /// # use firebase_client_sdk::{App, AppOptions, Database};
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let app = App::create(AppOptions::new("YOUR_API_KEY", "your-project")).await?;
    /// let db = Database::get_database(&app, Some("https://your-project-default-rtdb.firebaseio.com")).await?;
    /// db.reference("users/alice")?.set(serde_json::json!({ "age": 30 })).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn get_database(app: &App, url: Option<&str>) -> Result<Self, FirebaseError> {
        let Some(raw) = url.or(app.options().database_url.as_deref()) else {
            return Err(DatabaseError::NoDatabaseUrl.into());
        };
        let (url, namespace) = parse_database_url(raw)?;

        let owner = app.clone();
        let key = format!("database/{}", url);
        let inner = app
            .component(&key, move || {
                Ok(DatabaseInner {
                    app: owner,
                    url,
                    namespace,
                    emulator_origin: RwLock::new(None),
                    server_time_offset: RwLock::new(0),
                    push_ids: Mutex::new(PushIdGenerator::new()),
                })
            })
            .await?;

        Ok(Self { inner })
    }

    /// Database URL, without a trailing slash
    pub fn url(&self) -> &str {
        &self.inner.url
    }

    /// Reference to `path`; an empty path or `/` is the root
    pub fn reference(&self, path: &str) -> Result<DatabaseReference, FirebaseError> {
        DatabaseReference::new(self.clone(), path)
    }

    /// Reference from a full URL on this database
    pub fn reference_from_url(&self, url: &str) -> Result<DatabaseReference, FirebaseError> {
        let parsed = url::Url::parse(url)?;
        let (own, _) = parse_database_url(&self.inner.url)?;
        let origin = parsed.origin().ascii_serialization();
        if !own.starts_with(&origin) {
            return Err(DatabaseError::InvalidPath(format!(
                "URL '{}' does not belong to database '{}'",
                url, self.inner.url
            ))
            .into());
        }
        let path = urlencoding::decode(parsed.path()).map_err(|_| DatabaseError::InvalidPath(url.to_string()))?;
        self.reference(&path)
    }

    /// Route requests to the Database emulator at `http://host:port`
    pub async fn use_emulator(&self, host: &str, port: u16) -> Result<(), FirebaseError> {
        // Error-first
        if host.is_empty() {
            return Err(FirebaseError::invalid_argument("emulator host must not be empty"));
        }
        *self.inner.emulator_origin.write().await = Some(format!("http://{}:{}", host, port));
        debug!(host, port, namespace = %self.inner.namespace, "database emulator enabled");
        Ok(())
    }

    /// Estimated server clock offset in milliseconds, used for push ids
    pub async fn server_time_offset(&self) -> i64 {
        *self.inner.server_time_offset.read().await
    }

    /// Set the server clock offset in milliseconds
    pub async fn set_server_time_offset(&self, offset_millis: i64) {
        *self.inner.server_time_offset.write().await = offset_millis;
    }

    /// Internal: push id for the current server time
    pub(crate) async fn next_push_id(&self) -> String {
        let now = chrono::Utc::now().timestamp_millis() + self.server_time_offset().await;
        self.inner.push_ids.lock().await.next_id(now)
    }

    /// Internal: REST URL of `path` plus the parameters every request carries
    pub(crate) async fn rest_target(&self, path: &str) -> Result<(String, Vec<(&'static str, String)>), FirebaseError> {
        let mut params = Vec::new();
        let base = match self.inner.emulator_origin.read().await.as_ref() {
            Some(origin) => {
                params.push(("ns", self.inner.namespace.clone()));
                origin.clone()
            }
            None => self.inner.url.clone(),
        };
        if let Some(token) = self.inner.app.auth_token().await? {
            params.push(("auth", token));
        }
        let encoded: Vec<String> = path
            .split('/')
            .filter(|s| !s.is_empty())
            .map(|s| urlencoding::encode(s).into_owned())
            .collect();
        Ok((format!("{}/{}.json", base, encoded.join("/")), params))
    }

    pub(crate) fn http_client(&self) -> &reqwest::Client {
        self.inner.app.http_client()
    }
}

/// Normalized URL and namespace of a database URL
///
/// The namespace is the first host label unless an `ns` query parameter
/// names it.
pub(crate) fn parse_database_url(raw: &str) -> Result<(String, String), FirebaseError> {
    let parsed = url::Url::parse(raw)?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(FirebaseError::invalid_argument(format!(
            "database URL must use http or https, got '{}'",
            raw
        )));
    }
    let Some(host) = parsed.host_str() else {
        return Err(FirebaseError::invalid_argument(format!("database URL '{}' has no host", raw)));
    };

    let namespace = parsed
        .query_pairs()
        .find(|(k, _)| k == "ns")
        .map(|(_, v)| v.into_owned())
        .unwrap_or_else(|| host.split('.').next().unwrap_or(host).to_string());

    Ok((parsed.origin().ascii_serialization(), namespace))
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").field("url", &self.inner.url).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::AppOptions;

    #[test]
    fn test_parse_database_url() {
        assert_eq!(
            parse_database_url("https://p-default-rtdb.firebaseio.com/").unwrap(),
            ("https://p-default-rtdb.firebaseio.com".to_string(), "p-default-rtdb".to_string())
        );
        assert_eq!(
            parse_database_url("https://p-eu.europe-west1.firebasedatabase.app").unwrap().1,
            "p-eu"
        );
        assert_eq!(parse_database_url("http://localhost:9000?ns=demo").unwrap().1, "demo");
        assert!(parse_database_url("ftp://x.firebaseio.com").is_err());
        assert!(parse_database_url("not a url").is_err());
    }

    #[tokio::test]
    async fn test_no_database_url() {
        let app = App::create(AppOptions::new("k", "p").with_name("db-no-url")).await.unwrap();
        let result = Database::get_database(&app, None).await;
        assert!(matches!(result, Err(FirebaseError::Database(DatabaseError::NoDatabaseUrl))));
    }

    #[tokio::test]
    async fn test_instance_per_url() {
        let mut options = AppOptions::new("k", "p").with_name("db-per-url");
        options.database_url = Some("https://p-default-rtdb.firebaseio.com".to_string());
        let app = App::create(options).await.unwrap();

        let default = Database::get_database(&app, None).await.unwrap();
        let same = Database::get_database(&app, Some("https://p-default-rtdb.firebaseio.com/")).await.unwrap();
        let other = Database::get_database(&app, Some("https://other.firebaseio.com")).await.unwrap();
        assert!(Arc::ptr_eq(&default.inner, &same.inner));
        assert!(!Arc::ptr_eq(&default.inner, &other.inner));
    }

    #[tokio::test]
    async fn test_rest_target() {
        let mut options = AppOptions::new("k", "p").with_name("db-rest-target");
        options.database_url = Some("https://p-default-rtdb.firebaseio.com".to_string());
        let app = App::create(options).await.unwrap();
        let db = Database::get_database(&app, None).await.unwrap();

        let (url, params) = db.rest_target("users/a b").await.unwrap();
        assert_eq!(url, "https://p-default-rtdb.firebaseio.com/users/a%20b.json");
        assert!(params.is_empty());

        db.use_emulator("127.0.0.1", 9000).await.unwrap();
        let (url, params) = db.rest_target("").await.unwrap();
        assert_eq!(url, "http://127.0.0.1:9000/.json");
        assert_eq!(params, vec![("ns", "p-default-rtdb".to_string())]);
    }

    #[tokio::test]
    async fn test_reference_from_url() {
        let mut options = AppOptions::new("k", "p").with_name("db-ref-from-url");
        options.database_url = Some("https://p-default-rtdb.firebaseio.com".to_string());
        let app = App::create(options).await.unwrap();
        let db = Database::get_database(&app, None).await.unwrap();

        let reference = db
            .reference_from_url("https://p-default-rtdb.firebaseio.com/users/alice")
            .unwrap();
        assert_eq!(reference.path(), "users/alice");
        assert!(db.reference_from_url("https://elsewhere.firebaseio.com/x").is_err());
    }

    #[tokio::test]
    async fn test_push_ids_use_offset() {
        let mut options = AppOptions::new("k", "p").with_name("db-push-offset");
        options.database_url = Some("https://p-default-rtdb.firebaseio.com".to_string());
        let app = App::create(options).await.unwrap();
        let db = Database::get_database(&app, None).await.unwrap();

        let now = db.next_push_id().await;
        db.set_server_time_offset(365 * 24 * 3600 * 1000).await;
        let future = db.next_push_id().await;
        assert_eq!(db.server_time_offset().await, 365 * 24 * 3600 * 1000);
        assert!(future[..8] > now[..8]);
    }
}
