//! Cloud Storage for Firebase
//!
//! One instance per App and bucket. Objects are addressed with
//! [`StorageReference`]s and transferred over the Firebase Storage REST API.

use crate::app::App;
use crate::error::{FirebaseError, StorageError};
use crate::storage::reference::StorageReference;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::debug;

pub(crate) const STORAGE_BASE_URL: &str = "https://firebasestorage.googleapis.com/v0";

/// Default upload chunk size: 256 KiB
pub const DEFAULT_UPLOAD_CHUNK_SIZE: usize = 256 * 1024;

/// Transfer settings of a Storage instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageSettings {
    /// Time limit for each upload request
    pub max_upload_retry_time: Duration,
    /// Time limit for metadata, list and delete requests
    pub max_operation_retry_time: Duration,
    /// Time limit for download requests
    pub max_download_retry_time: Duration,
    /// Bytes sent per resumable upload request
    pub upload_chunk_size: usize,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            max_upload_retry_time: Duration::from_secs(600),
            max_operation_retry_time: Duration::from_secs(120),
            max_download_retry_time: Duration::from_secs(600),
            upload_chunk_size: DEFAULT_UPLOAD_CHUNK_SIZE,
        }
    }
}

/// Cloud Storage instance
#[derive(Clone)]
pub struct Storage {
    inner: Arc<StorageInner>,
}

struct StorageInner {
    app: App,
    bucket: String,
    emulator_origin: RwLock<Option<String>>,
    settings: RwLock<StorageSettings>,
}

impl Storage {
    /// Get or create the Storage instance for a bucket
    ///
    /// `bucket` may be a bare name or a `gs://` URL; when `None` the app's
    /// `storage_bucket` option is used.
    ///
    /// # Example
    /// ```no_run
    /// # use firebase_client_sdk::{App, AppOptions, Storage};
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let app = App::create(AppOptions::new("YOUR_API_KEY", "your-project")).await?;
    /// let storage = Storage::get_storage(&app, Some("gs://your-project.appspot.com")).await?;
    /// let url = storage.reference("images/cat.png").get_download_url().await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn get_storage(app: &App, bucket: Option<&str>) -> Result<Self, FirebaseError> {
        let bucket = match bucket.or(app.options().storage_bucket.as_deref()) {
            Some(b) => b.trim_start_matches("gs://").trim_end_matches('/').to_string(),
            None => return Err(StorageError::NoDefaultBucket.into()),
        };
        if bucket.is_empty() || bucket.contains('/') {
            return Err(StorageError::BucketNotFound(bucket).into());
        }

        let owner = app.clone();
        let key = format!("storage/{}", bucket);
        let inner = app
            .component(&key, move || {
                Ok(StorageInner {
                    app: owner,
                    bucket,
                    emulator_origin: RwLock::new(None),
                    settings: RwLock::new(StorageSettings::default()),
                })
            })
            .await?;

        Ok(Self { inner })
    }

    /// Bucket name
    pub fn bucket(&self) -> &str {
        &self.inner.bucket
    }

    /// Reference to `path` in this bucket; an empty path is the root
    pub fn reference(&self, path: &str) -> StorageReference {
        StorageReference::new(self.clone(), path)
    }

    /// Reference from a `gs://bucket/path` or `https://firebasestorage.googleapis.com/v0/b/bucket/o/path` URL
    pub async fn reference_from_url(&self, url: &str) -> Result<StorageReference, FirebaseError> {
        let (bucket, path) = parse_storage_url(url)?;
        if bucket == self.inner.bucket {
            return Ok(self.reference(&path));
        }
        let other = Storage::get_storage(&self.inner.app, Some(&bucket)).await?;
        Ok(other.reference(&path))
    }

    /// Route requests to the Storage emulator at `http://host:port`
    pub async fn use_emulator(&self, host: &str, port: u16) -> Result<(), FirebaseError> {
        // Error-first
        if host.is_empty() {
            return Err(StorageError::InvalidArgument("emulator host must not be empty".to_string()).into());
        }
        *self.inner.emulator_origin.write().await = Some(format!("http://{}:{}", host, port));
        debug!(host, port, bucket = %self.inner.bucket, "storage emulator enabled");
        Ok(())
    }

    /// Current settings
    pub async fn settings(&self) -> StorageSettings {
        *self.inner.settings.read().await
    }

    /// Time limit for each upload request
    pub async fn set_max_upload_retry_time(&self, time: Duration) {
        self.inner.settings.write().await.max_upload_retry_time = time;
    }

    /// Time limit for metadata, list and delete requests
    pub async fn set_max_operation_retry_time(&self, time: Duration) {
        self.inner.settings.write().await.max_operation_retry_time = time;
    }

    /// Time limit for download requests
    pub async fn set_max_download_retry_time(&self, time: Duration) {
        self.inner.settings.write().await.max_download_retry_time = time;
    }

    /// Bytes sent per resumable upload request
    pub async fn set_upload_chunk_size(&self, bytes: usize) -> Result<(), FirebaseError> {
        if bytes == 0 {
            return Err(StorageError::InvalidArgument("upload chunk size must be greater than 0".to_string()).into());
        }
        self.inner.settings.write().await.upload_chunk_size = bytes;
        Ok(())
    }

    /// Internal: `.../v0` root of the REST API
    pub(crate) async fn base_url(&self) -> String {
        match self.inner.emulator_origin.read().await.as_ref() {
            Some(origin) => format!("{}/v0", origin),
            None => STORAGE_BASE_URL.to_string(),
        }
    }

    /// Internal: request with the caller's Firebase credentials attached
    pub(crate) async fn request(
        &self,
        method: reqwest::Method,
        url: &str,
        timeout: Duration,
    ) -> Result<reqwest::RequestBuilder, FirebaseError> {
        let mut request = self.inner.app.http_client().request(method, url).timeout(timeout);
        if let Some(token) = self.inner.app.auth_token().await? {
            request = request.header("Authorization", format!("Firebase {}", token));
        }
        Ok(request)
    }
}

/// Split a storage URL into bucket and object path
pub(crate) fn parse_storage_url(url: &str) -> Result<(String, String), StorageError> {
    let invalid = || StorageError::InvalidArgument(format!("invalid storage URL '{}'", url));

    if let Some(rest) = url.strip_prefix("gs://") {
        let (bucket, path) = rest.split_once('/').unwrap_or((rest, ""));
        if bucket.is_empty() {
            return Err(invalid());
        }
        return Ok((bucket.to_string(), path.to_string()));
    }

    let parsed = url::Url::parse(url).map_err(|_| invalid())?;
    let mut segments = parsed.path_segments().ok_or_else(invalid)?;
    match (segments.next(), segments.next(), segments.next(), segments.next()) {
        (Some(_version), Some("b"), Some(bucket), Some("o")) if !bucket.is_empty() => {
            let encoded = segments.collect::<Vec<_>>().join("/");
            let path = urlencoding::decode(&encoded).map_err(|_| invalid())?;
            Ok((bucket.to_string(), path.into_owned()))
        }
        _ => Err(invalid()),
    }
}

impl std::fmt::Debug for Storage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Storage").field("bucket", &self.inner.bucket).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::AppOptions;

    #[tokio::test]
    async fn test_bucket_resolution() {
        let mut options = AppOptions::new("k", "p").with_name("storage-bucket");
        options.storage_bucket = Some("default-bucket".to_string());
        let app = App::create(options).await.unwrap();

        let default = Storage::get_storage(&app, None).await.unwrap();
        assert_eq!(default.bucket(), "default-bucket");

        let other = Storage::get_storage(&app, Some("gs://other-bucket/")).await.unwrap();
        assert_eq!(other.bucket(), "other-bucket");

        let again = Storage::get_storage(&app, Some("other-bucket")).await.unwrap();
        assert!(Arc::ptr_eq(&other.inner, &again.inner));
    }

    #[tokio::test]
    async fn test_no_default_bucket() {
        let app = App::create(AppOptions::new("k", "p").with_name("storage-no-bucket")).await.unwrap();
        let result = Storage::get_storage(&app, None).await;
        assert!(matches!(result, Err(FirebaseError::Storage(StorageError::NoDefaultBucket))));
    }

    #[tokio::test]
    async fn test_settings() {
        let app = App::create(AppOptions::new("k", "p").with_name("storage-settings")).await.unwrap();
        let storage = Storage::get_storage(&app, Some("b")).await.unwrap();
        assert_eq!(storage.settings().await, StorageSettings::default());

        storage.set_max_operation_retry_time(Duration::from_secs(5)).await;
        storage.set_max_upload_retry_time(Duration::from_secs(6)).await;
        storage.set_max_download_retry_time(Duration::from_secs(7)).await;
        let settings = storage.settings().await;
        assert_eq!(settings.max_operation_retry_time, Duration::from_secs(5));
        assert_eq!(settings.max_upload_retry_time, Duration::from_secs(6));
        assert_eq!(settings.max_download_retry_time, Duration::from_secs(7));

        assert!(storage.set_upload_chunk_size(0).await.is_err());
    }

    #[tokio::test]
    async fn test_emulator_base_url() {
        let app = App::create(AppOptions::new("k", "p").with_name("storage-emulator")).await.unwrap();
        let storage = Storage::get_storage(&app, Some("b")).await.unwrap();
        assert_eq!(storage.base_url().await, STORAGE_BASE_URL);
        storage.use_emulator("localhost", 9199).await.unwrap();
        assert_eq!(storage.base_url().await, "http://localhost:9199/v0");
    }

    #[test]
    fn test_parse_storage_url() {
        assert_eq!(
            parse_storage_url("gs://bucket/a/b.png").unwrap(),
            ("bucket".to_string(), "a/b.png".to_string())
        );
        assert_eq!(parse_storage_url("gs://bucket").unwrap(), ("bucket".to_string(), String::new()));
        assert_eq!(
            parse_storage_url("https://firebasestorage.googleapis.com/v0/b/bucket/o/a%2Fb.png?alt=media").unwrap(),
            ("bucket".to_string(), "a/b.png".to_string())
        );
        assert!(parse_storage_url("gs://").is_err());
        assert!(parse_storage_url("https://example.com/file").is_err());
    }
}
