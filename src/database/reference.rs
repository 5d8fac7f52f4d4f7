//! Database locations and writes

use crate::database::database::Database;
use crate::database::query::{OrderBy, Query};
use crate::database::snapshot::DataSnapshot;
use crate::error::{DatabaseError, FirebaseError};
use crate::rest::api_failure;
use serde_json::{Map, Value};
use tracing::debug;

/// Attempts before a contended transaction gives up
pub const MAX_TRANSACTION_RETRIES: usize = 25;

/// Outcome of [`DatabaseReference::transaction`]
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionResult {
    /// Whether the update was written; `false` when it was aborted
    pub committed: bool,
    /// Data at the location after the transaction
    pub snapshot: DataSnapshot,
}

/// A location in the database
#[derive(Clone)]
pub struct DatabaseReference {
    database: Database,
    path: String,
}

/// Check a (possibly multi-segment) path
///
/// Paths must be non-empty and can't contain `.`, `#`, `$`, `[`, `]` or
/// ASCII control characters.
pub(crate) fn validate_path(path: &str) -> Result<(), DatabaseError> {
    let invalid = |c: char| matches!(c, '.' | '#' | '$' | '[' | ']') || c.is_ascii_control();
    if path.is_empty() || path.chars().any(invalid) {
        return Err(DatabaseError::InvalidPath(path.to_string()));
    }
    Ok(())
}

fn validate_priority(priority: &Value) -> Result<(), DatabaseError> {
    if !matches!(priority, Value::Null | Value::Number(_) | Value::String(_)) {
        return Err(DatabaseError::InvalidPath(
            "'priority' must be a number, string or null value".to_string(),
        ));
    }
    Ok(())
}

fn normalize(path: &str) -> String {
    path.split('/').filter(|s| !s.is_empty()).collect::<Vec<_>>().join("/")
}

impl DatabaseReference {
    pub(crate) fn new(database: Database, path: &str) -> Result<Self, FirebaseError> {
        let path = normalize(path);
        // `.info/*` locations are server internal and exempt from validation
        if !path.is_empty() && !path.starts_with(".info/") {
            validate_path(&path)?;
        }
        Ok(Self { database, path })
    }

    /// Database this reference belongs to
    pub fn database(&self) -> &Database {
        &self.database
    }

    /// Path from the root, without leading slash; empty at the root
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Last segment of the path, `None` at the root
    pub fn key(&self) -> Option<&str> {
        if self.path.is_empty() {
            None
        } else {
            self.path.rsplit('/').next()
        }
    }

    /// Parent location, `None` at the root
    pub fn parent(&self) -> Option<DatabaseReference> {
        if self.path.is_empty() {
            return None;
        }
        let parent = self.path.rsplit_once('/').map(|(p, _)| p).unwrap_or_default();
        Some(Self {
            database: self.database.clone(),
            path: parent.to_string(),
        })
    }

    /// The root location
    pub fn root(&self) -> DatabaseReference {
        Self {
            database: self.database.clone(),
            path: String::new(),
        }
    }

    /// Location at a relative `path` below this one
    pub fn child(&self, path: &str) -> Result<DatabaseReference, FirebaseError> {
        validate_path(path)?;
        let relative = normalize(path);
        let full = if self.path.is_empty() {
            relative
        } else {
            format!("{}/{}", self.path, relative)
        };
        Self::new(self.database.clone(), &full)
    }

    /// Query over this location
    pub fn query(&self) -> Query {
        Query::new(self.clone())
    }

    /// Shorthand for `query().order_by_child(path)`
    pub fn order_by_child(&self, path: &str) -> Result<Query, FirebaseError> {
        self.query().order_by_child(path)
    }

    /// Shorthand for `query().order_by_key()`
    pub fn order_by_key(&self) -> Result<Query, FirebaseError> {
        self.query().order_by_key()
    }

    /// Shorthand for `query().order_by_value()`
    pub fn order_by_value(&self) -> Result<Query, FirebaseError> {
        self.query().order_by_value()
    }

    /// Shorthand for `query().order_by_priority()`
    pub fn order_by_priority(&self) -> Result<Query, FirebaseError> {
        self.query().order_by_priority()
    }

    /// Shorthand for `query().limit_to_first(limit)`
    pub fn limit_to_first(&self, limit: u32) -> Result<Query, FirebaseError> {
        self.query().limit_to_first(limit)
    }

    /// Shorthand for `query().limit_to_last(limit)`
    pub fn limit_to_last(&self, limit: u32) -> Result<Query, FirebaseError> {
        self.query().limit_to_last(limit)
    }

    /// Read the data at this location once
    pub async fn get(&self) -> Result<DataSnapshot, FirebaseError> {
        self.query().get().await
    }

    /// Overwrite the data at this location
    pub async fn set(&self, value: Value) -> Result<(), FirebaseError> {
        self.write(reqwest::Method::PUT, &self.path, &value).await?;
        debug!(path = %self.path, "set value");
        Ok(())
    }

    /// Write several children at once
    ///
    /// Keys may be multi-segment paths relative to this location.
    pub async fn update(&self, values: Map<String, Value>) -> Result<(), FirebaseError> {
        // Error-first: every key is a path
        for key in values.keys() {
            validate_path(key).map_err(|_| {
                DatabaseError::InvalidPath(format!("update(): 'values' contains an invalid path '{}'", key))
            })?;
        }
        self.write(reqwest::Method::PATCH, &self.path, &Value::Object(values))
            .await?;
        debug!(path = %self.path, "updated children");
        Ok(())
    }

    /// Delete the data at this location
    pub async fn remove(&self) -> Result<(), FirebaseError> {
        let (url, params) = self.database.rest_target(&self.path).await?;
        let response = self.database.http_client().delete(&url).query(&params).send().await?;
        check(response).await?;
        debug!(path = %self.path, "removed value");
        Ok(())
    }

    /// Child at a newly generated push id, written with `value` when given
    ///
    /// # Example
    /// ```no_run
    /// # async fn example(db: firebase_client_sdk::Database) -> Result<(), Box<dyn std::error::Error>> {
    /// let message = db
    ///     .reference("messages")?
    ///     .push(Some(serde_json::json!({ "text": "hi" })))
    ///     .await?;
    /// println!("new message at {:?}", message.key());
    /// # Ok(())
    /// # }
    /// ```
    pub async fn push(&self, value: Option<Value>) -> Result<DatabaseReference, FirebaseError> {
        let id = self.database.next_push_id().await;
        let child = self.child(&id)?;
        if let Some(value) = value {
            child.set(value).await?;
        }
        Ok(child)
    }

    /// Set the priority of the data at this location
    pub async fn set_priority(&self, priority: Value) -> Result<(), FirebaseError> {
        validate_priority(&priority)?;
        let path = format!("{}/.priority", self.path);
        self.write(reqwest::Method::PUT, &path, &priority).await?;
        Ok(())
    }

    /// Overwrite the data and its priority together
    pub async fn set_with_priority(&self, value: Value, priority: Value) -> Result<(), FirebaseError> {
        validate_priority(&priority)?;
        let body = match value {
            Value::Object(mut map) => {
                map.insert(".priority".to_string(), priority);
                Value::Object(map)
            }
            other => serde_json::json!({ ".value": other, ".priority": priority }),
        };
        self.write(reqwest::Method::PUT, &self.path, &body).await
    }

    /// Atomically modify the data at this location
    ///
    /// `update` receives the current value (`Null` when empty) and returns
    /// the new one, or `None` to abort. The write is conditional on the
    /// value's ETag; on a conflict `update` runs again with the fresh value.
    ///
    /// # Example
    /// ```no_run
    /// # async fn example(db: firebase_client_sdk::Database) -> Result<(), Box<dyn std::error::Error>> {
    /// let likes = db.reference("posts/p1/likes")?;
    /// let result = likes
    ///     .transaction(|current| Some(serde_json::json!(current.as_i64().unwrap_or(0) + 1)))
    ///     .await?;
    /// println!("likes: {}", result.snapshot.val());
    /// # Ok(())
    /// # }
    /// ```
    pub async fn transaction<F>(&self, mut update: F) -> Result<TransactionResult, FirebaseError>
    where
        F: FnMut(&Value) -> Option<Value>,
    {
        let (url, params) = self.database.rest_target(&self.path).await?;
        let client = self.database.http_client();

        let response = client
            .get(&url)
            .query(&params)
            .header("X-Firebase-ETag", "true")
            .send()
            .await?;
        let (mut etag, mut current) = etag_and_value(check(response).await?).await?;

        for attempt in 1..=MAX_TRANSACTION_RETRIES {
            let Some(next) = update(&current) else {
                debug!(path = %self.path, "transaction aborted");
                return Ok(TransactionResult {
                    committed: false,
                    snapshot: self.snapshot(current),
                });
            };

            let response = client
                .put(&url)
                .query(&params)
                .header("if-match", &etag)
                .json(&next)
                .send()
                .await?;
            // Someone else wrote first; the reply carries their value
            if response.status() == reqwest::StatusCode::PRECONDITION_FAILED {
                debug!(path = %self.path, attempt, "transaction conflict");
                (etag, current) = etag_and_value(response).await?;
                continue;
            }

            let written: Value = check(response).await?.json().await?;
            debug!(path = %self.path, attempt, "transaction committed");
            return Ok(TransactionResult {
                committed: true,
                snapshot: self.snapshot(written),
            });
        }
        Err(DatabaseError::MaxRetries.into())
    }

    fn snapshot(&self, value: Value) -> DataSnapshot {
        DataSnapshot::new(self.key().map(str::to_string), value, OrderBy::default())
    }

    /// Internal: GET this location with query parameters
    pub(crate) async fn fetch(&self, query: &[(&'static str, String)]) -> Result<Value, FirebaseError> {
        let (url, mut params) = self.database.rest_target(&self.path).await?;
        params.extend(query.iter().cloned());
        let response = self.database.http_client().get(&url).query(&params).send().await?;
        let response = check(response).await?;
        Ok(response.json().await?)
    }

    async fn write(&self, method: reqwest::Method, path: &str, body: &Value) -> Result<(), FirebaseError> {
        let (url, mut params) = self.database.rest_target(path).await?;
        params.push(("print", "silent".to_string()));
        let response = self
            .database
            .http_client()
            .request(method, &url)
            .query(&params)
            .json(body)
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }
}

async fn etag_and_value(response: reqwest::Response) -> Result<(String, Value), FirebaseError> {
    let Some(etag) = response
        .headers()
        .get("ETag")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
    else {
        return Err(DatabaseError::Unknown("response has no ETag header".to_string()).into());
    };
    Ok((etag, response.json().await?))
}

async fn check(response: reqwest::Response) -> Result<reqwest::Response, FirebaseError> {
    if response.status().is_success() {
        return Ok(response);
    }
    let failure = api_failure(response).await;
    let error = match failure.status {
        401 | 403 => DatabaseError::PermissionDenied,
        400 if failure.message.contains("Index not defined") => DatabaseError::InvalidQuery(failure.message),
        _ => DatabaseError::Unknown(failure.to_string()),
    };
    Err(error.into())
}

impl PartialEq for DatabaseReference {
    fn eq(&self, other: &Self) -> bool {
        self.database.url() == other.database.url() && self.path == other.path
    }
}

impl std::fmt::Display for DatabaseReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.database.url(), self.path)
    }
}

impl std::fmt::Debug for DatabaseReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseReference").field("path", &self.path).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::{App, AppOptions};
    use httpmock::prelude::*;
    use serde_json::json;
    use tokio_test::{assert_err, assert_ok};

    async fn emulated_root(app_name: &str, server: &MockServer) -> DatabaseReference {
        let mut options = AppOptions::new("k", "p").with_name(app_name);
        options.database_url = Some("https://p-default-rtdb.firebaseio.com".to_string());
        let app = App::create(options).await.unwrap();
        let db = Database::get_database(&app, None).await.unwrap();
        db.use_emulator(&server.host(), server.port()).await.unwrap();
        db.reference("").unwrap()
    }

    #[test]
    fn test_validate_path() {
        assert_ok!(validate_path("users/alice"));
        assert_err!(validate_path(""));
        for bad in ["a.b", "a#b", "a$b", "a[b", "a]b", "a\u{7}b"] {
            assert!(validate_path(bad).is_err(), "{} should be rejected", bad);
        }
    }

    #[tokio::test]
    async fn test_navigation() {
        let server = MockServer::start();
        let root = emulated_root("db-ref-navigation", &server).await;
        assert_eq!(root.key(), None);
        assert!(root.parent().is_none());

        let alice = root.child("users/alice").unwrap();
        assert_eq!(alice.path(), "users/alice");
        assert_eq!(alice.key(), Some("alice"));
        assert_eq!(alice.parent().unwrap().path(), "users");
        assert_eq!(alice.parent().unwrap().parent().unwrap(), root);
        assert_eq!(alice.root(), root);
        assert_eq!(root.child("/users//alice/").unwrap(), alice);

        assert_err!(root.child("bad.key"));
        assert_ok!(root.database().reference(".info/connected"));
    }

    #[tokio::test]
    async fn test_set_and_get() {
        let server = MockServer::start();
        let root = emulated_root("db-ref-set-get", &server).await;

        let put = server.mock(|when, then| {
            when.method(PUT)
                .path("/users/alice.json")
                .query_param("ns", "p-default-rtdb")
                .json_body(json!({ "age": 30 }));
            then.status(204);
        });
        let get = server.mock(|when, then| {
            when.method(GET).path("/users/alice.json");
            then.status(200).json_body(json!({ "age": 30 }));
        });

        let alice = root.child("users/alice").unwrap();
        alice.set(json!({ "age": 30 })).await.unwrap();
        let snapshot = alice.get().await.unwrap();

        put.assert();
        get.assert();
        assert_eq!(snapshot.key(), Some("alice"));
        assert_eq!(snapshot.child("age").val(), &json!(30));
    }

    #[tokio::test]
    async fn test_query_get_sends_params() {
        let server = MockServer::start();
        let root = emulated_root("db-ref-query-get", &server).await;

        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/scores.json")
                .query_param("orderBy", "\"points\"")
                .query_param("limitToLast", "2");
            then.status(200).json_body(json!({ "a": { "points": 9 }, "b": { "points": 3 } }));
        });

        let snapshot = root
            .child("scores")
            .unwrap()
            .order_by_child("points")
            .unwrap()
            .limit_to_last(2)
            .unwrap()
            .get()
            .await
            .unwrap();

        mock.assert();
        let keys: Vec<_> = snapshot.children().iter().map(|c| c.key().unwrap().to_string()).collect();
        assert_eq!(keys, vec!["b", "a"]);
    }

    #[tokio::test]
    async fn test_update_validates_keys() {
        let server = MockServer::start();
        let root = emulated_root("db-ref-update", &server).await;

        let mock = server.mock(|when, then| {
            when.method(PATCH)
                .path("/users.json")
                .json_body(json!({ "alice/age": 31, "bob": { "age": 20 } }));
            then.status(204);
        });

        let users = root.child("users").unwrap();
        let mut values = Map::new();
        values.insert("alice/age".to_string(), json!(31));
        values.insert("bob".to_string(), json!({ "age": 20 }));
        users.update(values).await.unwrap();
        mock.assert();

        let mut bad = Map::new();
        bad.insert("a.b".to_string(), json!(1));
        assert!(matches!(
            users.update(bad).await,
            Err(FirebaseError::Database(DatabaseError::InvalidPath(_)))
        ));
    }

    #[tokio::test]
    async fn test_push_and_remove() {
        let server = MockServer::start();
        let root = emulated_root("db-ref-push", &server).await;

        let put = server.mock(|when, then| {
            when.method(PUT).path_includes("/messages/").json_body(json!({ "text": "hi" }));
            then.status(204);
        });
        let delete = server.mock(|when, then| {
            when.method(DELETE).path_includes("/messages/");
            then.status(200).body("null");
        });

        let messages = root.child("messages").unwrap();
        let first = messages.push(Some(json!({ "text": "hi" }))).await.unwrap();
        let second = messages.push(None).await.unwrap();
        assert_eq!(first.key().unwrap().len(), 20);
        assert!(second.key().unwrap() > first.key().unwrap());

        first.remove().await.unwrap();
        put.assert_calls(1);
        delete.assert();
    }

    #[tokio::test]
    async fn test_priority_writes() {
        let server = MockServer::start();
        let root = emulated_root("db-ref-priority", &server).await;

        let priority = server.mock(|when, then| {
            when.method(PUT).path("/users/alice/.priority.json").json_body(json!(5));
            then.status(204);
        });
        let object = server.mock(|when, then| {
            when.method(PUT)
                .path("/users/bob.json")
                .json_body(json!({ "age": 20, ".priority": "b" }));
            then.status(204);
        });
        let primitive = server.mock(|when, then| {
            when.method(PUT)
                .path("/users/carol.json")
                .json_body(json!({ ".value": 7, ".priority": 1 }));
            then.status(204);
        });

        let users = root.child("users").unwrap();
        users.child("alice").unwrap().set_priority(json!(5)).await.unwrap();
        users
            .child("bob")
            .unwrap()
            .set_with_priority(json!({ "age": 20 }), json!("b"))
            .await
            .unwrap();
        users
            .child("carol")
            .unwrap()
            .set_with_priority(json!(7), json!(1))
            .await
            .unwrap();
        assert!(users.set_priority(json!(true)).await.is_err());

        priority.assert();
        object.assert();
        primitive.assert();
    }

    #[tokio::test]
    async fn test_transaction_retries_on_conflict() {
        let server = MockServer::start();
        let root = emulated_root("db-ref-transaction", &server).await;

        let read = server.mock(|when, then| {
            when.method(GET).path("/counters/likes.json").header("X-Firebase-ETag", "true");
            then.status(200).header("ETag", "etag-1").json_body(json!(5));
        });
        let conflict = server.mock(|when, then| {
            when.method(PUT)
                .path("/counters/likes.json")
                .header("if-match", "etag-1")
                .json_body(json!(6));
            then.status(412).header("ETag", "etag-2").json_body(json!(7));
        });
        let commit = server.mock(|when, then| {
            when.method(PUT)
                .path("/counters/likes.json")
                .header("if-match", "etag-2")
                .json_body(json!(8));
            then.status(200).json_body(json!(8));
        });

        let mut seen = Vec::new();
        let result = root
            .child("counters/likes")
            .unwrap()
            .transaction(|current| {
                seen.push(current.clone());
                Some(json!(current.as_i64().unwrap_or(0) + 1))
            })
            .await
            .unwrap();

        read.assert();
        conflict.assert();
        commit.assert();
        assert_eq!(seen, vec![json!(5), json!(7)]);
        assert!(result.committed);
        assert_eq!(result.snapshot.key(), Some("likes"));
        assert_eq!(result.snapshot.val(), &json!(8));
    }

    #[tokio::test]
    async fn test_transaction_abort_and_give_up() {
        let server = MockServer::start();
        let root = emulated_root("db-ref-transaction-abort", &server).await;

        server.mock(|when, then| {
            when.method(GET).path("/locks/job.json");
            then.status(200).header("ETag", "etag-1").json_body(json!("taken"));
        });
        let writes = server.mock(|when, then| {
            when.method(PUT).path("/locks/job.json");
            then.status(412).header("ETag", "etag-1").json_body(json!(null));
        });
        let lock = root.child("locks/job").unwrap();

        let result = lock.transaction(|_| None).await.unwrap();
        assert!(!result.committed);
        assert_eq!(result.snapshot.val(), &json!("taken"));
        writes.assert_calls(0);

        let result = lock.transaction(|_| Some(json!("mine"))).await;
        assert!(matches!(result, Err(FirebaseError::Database(DatabaseError::MaxRetries))));
        writes.assert_calls(MAX_TRANSACTION_RETRIES);
    }

    #[tokio::test]
    async fn test_error_mapping() {
        let server = MockServer::start();
        let root = emulated_root("db-ref-errors", &server).await;

        server.mock(|when, then| {
            when.method(GET).path("/secret.json");
            then.status(401).json_body(json!({ "error": "Permission denied" }));
        });
        server.mock(|when, then| {
            when.method(GET).path("/scores.json");
            then.status(400).json_body(json!({ "error": "Index not defined, add \".indexOn\": \"points\"" }));
        });
        server.mock(|when, then| {
            when.method(PUT).path("/broken.json");
            then.status(500).body("boom");
        });

        assert!(matches!(
            root.child("secret").unwrap().get().await,
            Err(FirebaseError::Database(DatabaseError::PermissionDenied))
        ));
        assert!(matches!(
            root.child("scores").unwrap().order_by_child("points").unwrap().get().await,
            Err(FirebaseError::Database(DatabaseError::InvalidQuery(_)))
        ));
        assert!(matches!(
            root.child("broken").unwrap().set(json!(1)).await,
            Err(FirebaseError::Database(DatabaseError::Unknown(_)))
        ));
    }
}
