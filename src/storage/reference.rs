//! References to objects in a bucket

use crate::error::{FirebaseError, StorageError};
use crate::rest::api_failure;
use crate::storage::metadata::{FullMetadata, ObjectResource, SettableMetadata};
use crate::storage::storage::Storage;
use crate::storage::string_format::{self, StringFormat};
use crate::storage::task::UploadTask;
use serde::Deserialize;
use std::path::Path;
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// Largest page `list` may request
pub const MAX_LIST_RESULTS: u32 = 1000;

/// A pointer to an object (or prefix) in a bucket
#[derive(Clone)]
pub struct StorageReference {
    storage: Storage,
    path: String,
}

/// Options for [`StorageReference::list`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListOptions {
    /// Page size, 1..=1000; the backend default when `None`
    pub max_results: Option<u32>,
    /// Token from a previous page
    pub page_token: Option<String>,
}

/// One page of a listing
#[derive(Debug, Clone)]
pub struct ListResult {
    /// Sub-directories
    pub prefixes: Vec<StorageReference>,
    /// Objects
    pub items: Vec<StorageReference>,
    /// Token for the next page, `None` on the last page
    pub next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListResponse {
    #[serde(default)]
    prefixes: Vec<String>,
    #[serde(default)]
    items: Vec<ListItem>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ListItem {
    name: String,
}

impl StorageReference {
    pub(crate) fn new(storage: Storage, path: &str) -> Self {
        Self {
            storage,
            path: normalize(path),
        }
    }

    /// Storage instance this reference belongs to
    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    /// Bucket name
    pub fn bucket(&self) -> &str {
        self.storage.bucket()
    }

    /// Path within the bucket, empty at the root
    pub fn full_path(&self) -> &str {
        &self.path
    }

    /// Last path segment, empty at the root
    pub fn name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or_default()
    }

    /// Parent reference, `None` at the root
    pub fn parent(&self) -> Option<StorageReference> {
        if self.path.is_empty() {
            return None;
        }
        let parent = self.path.rsplit_once('/').map(|(p, _)| p).unwrap_or("");
        Some(Self::new(self.storage.clone(), parent))
    }

    /// Root of the bucket
    pub fn root(&self) -> StorageReference {
        Self::new(self.storage.clone(), "")
    }

    /// Reference to `path` relative to this one
    pub fn child(&self, path: &str) -> StorageReference {
        Self::new(self.storage.clone(), &format!("{}/{}", self.path, path))
    }

    /// Delete the object
    pub async fn delete(&self) -> Result<(), FirebaseError> {
        self.ensure_not_root("delete")?;
        let timeout = self.storage.settings().await.max_operation_retry_time;
        let request = self
            .storage
            .request(reqwest::Method::DELETE, &self.object_url().await, timeout)
            .await?;
        self.check(request.send().await?).await?;
        debug!(path = %self.path, "deleted object");
        Ok(())
    }

    /// Object metadata
    pub async fn get_metadata(&self) -> Result<FullMetadata, FirebaseError> {
        self.ensure_not_root("get_metadata")?;
        let timeout = self.storage.settings().await.max_operation_retry_time;
        let request = self
            .storage
            .request(reqwest::Method::GET, &self.object_url().await, timeout)
            .await?;
        let response = self.check(request.send().await?).await?;
        let resource: ObjectResource = response.json().await?;
        Ok(resource.into())
    }

    /// Replace the settable metadata fields given in `metadata`
    pub async fn update_metadata(&self, metadata: SettableMetadata) -> Result<FullMetadata, FirebaseError> {
        self.ensure_not_root("update_metadata")?;
        let timeout = self.storage.settings().await.max_operation_retry_time;
        let request = self
            .storage
            .request(reqwest::Method::PATCH, &self.object_url().await, timeout)
            .await?
            .json(&metadata.to_wire());
        let response = self.check(request.send().await?).await?;
        let resource: ObjectResource = response.json().await?;
        Ok(resource.into())
    }

    /// Long-lived download URL built from the object's download token
    pub async fn get_download_url(&self) -> Result<String, FirebaseError> {
        let metadata = self.get_metadata().await?;
        let Some(token) = metadata.download_token() else {
            return Err(StorageError::NoDownloadUrl.into());
        };
        Ok(format!(
            "{}?alt=media&token={}",
            self.object_url().await,
            urlencoding::encode(token)
        ))
    }

    /// Download the object's content
    ///
    /// With `max_download_size`, only that many leading bytes are requested.
    pub async fn get_bytes(&self, max_download_size: Option<u64>) -> Result<Vec<u8>, FirebaseError> {
        let response = self.download("get_bytes", max_download_size).await?;
        let mut bytes = response.bytes().await?.to_vec();
        if let Some(max) = max_download_size {
            bytes.truncate(usize::try_from(max).unwrap_or(usize::MAX));
        }
        debug!(path = %self.path, bytes = bytes.len(), "downloaded object");
        Ok(bytes)
    }

    /// Stream the object's content into a local file; returns the bytes written
    pub async fn write_to_file(&self, path: impl AsRef<Path>) -> Result<u64, FirebaseError> {
        let path = path.as_ref();
        let mut response = self.download("write_to_file", None).await?;

        let mut file = tokio::fs::File::create(path).await?;
        let mut written = 0u64;
        while let Some(chunk) = response.chunk().await? {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        debug!(path = %self.path, file = %path.display(), bytes = written, "wrote object to file");
        Ok(written)
    }

    /// Upload the content of a local file
    pub async fn put_file(
        &self,
        path: impl AsRef<Path>,
        metadata: Option<SettableMetadata>,
    ) -> Result<UploadTask, FirebaseError> {
        self.ensure_not_root("put_file")?;
        let data = tokio::fs::read(path).await?;
        self.put(data, metadata)
    }

    /// One page of objects and prefixes directly below this reference
    pub async fn list(&self, options: ListOptions) -> Result<ListResult, FirebaseError> {
        // Error-first: page size bounds
        if let Some(max) = options.max_results {
            if !(1..=MAX_LIST_RESULTS).contains(&max) {
                return Err(StorageError::InvalidArgument(format!(
                    "'max_results' must be between 1 and {}, got {}",
                    MAX_LIST_RESULTS, max
                ))
                .into());
            }
        }

        let prefix = if self.path.is_empty() {
            String::new()
        } else {
            format!("{}/", self.path)
        };
        let mut query = vec![("prefix", prefix), ("delimiter", "/".to_string())];
        if let Some(max) = options.max_results {
            query.push(("maxResults", max.to_string()));
        }
        if let Some(token) = options.page_token {
            query.push(("pageToken", token));
        }

        let url = format!("{}/b/{}/o", self.storage.base_url().await, self.bucket());
        let timeout = self.storage.settings().await.max_operation_retry_time;
        let request = self
            .storage
            .request(reqwest::Method::GET, &url, timeout)
            .await?
            .query(&query);
        let response = self.check(request.send().await?).await?;
        let page: ListResponse = response.json().await?;

        Ok(ListResult {
            prefixes: page
                .prefixes
                .iter()
                .map(|p| Self::new(self.storage.clone(), p))
                .collect(),
            items: page
                .items
                .iter()
                .map(|i| Self::new(self.storage.clone(), &i.name))
                .collect(),
            next_page_token: page.next_page_token.filter(|t| !t.is_empty()),
        })
    }

    /// Every page of `list`, concatenated
    pub async fn list_all(&self) -> Result<ListResult, FirebaseError> {
        let mut all = ListResult {
            prefixes: Vec::new(),
            items: Vec::new(),
            next_page_token: None,
        };
        let mut page_token = None;

        loop {
            let page = self
                .list(ListOptions {
                    max_results: None,
                    page_token,
                })
                .await?;
            all.prefixes.extend(page.prefixes);
            all.items.extend(page.items);

            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => return Ok(all),
            }
        }
    }

    /// Upload bytes
    ///
    /// The upload runs in the background; await the returned task for the
    /// final snapshot.
    ///
    /// # Example
    /// ```no_run
    /// # async fn example(storage: firebase_client_sdk::Storage) -> Result<(), Box<dyn std::error::Error>> {
    /// let task = storage.reference("notes/hello.txt").put(b"hello".to_vec(), None)?;
    /// let snapshot = task.await?;
    /// println!("uploaded {} bytes", snapshot.bytes_transferred);
    /// # Ok(())
    /// # }
    /// ```
    pub fn put(&self, data: Vec<u8>, metadata: Option<SettableMetadata>) -> Result<UploadTask, FirebaseError> {
        self.ensure_not_root("put")?;
        Ok(UploadTask::start(self.clone(), data, metadata.unwrap_or_default()))
    }

    /// Upload a string in the given format
    ///
    /// A data URL's media type becomes the content type unless `metadata`
    /// sets one.
    pub fn put_string(
        &self,
        value: &str,
        format: StringFormat,
        metadata: Option<SettableMetadata>,
    ) -> Result<UploadTask, FirebaseError> {
        self.ensure_not_root("put_string")?;
        let decoded = string_format::decode(value, format)?;
        let mut metadata = metadata.unwrap_or_default();
        if metadata.content_type.is_none() {
            metadata.content_type = decoded.content_type;
        }
        Ok(UploadTask::start(self.clone(), decoded.bytes, metadata))
    }

    async fn download(&self, operation: &str, max_download_size: Option<u64>) -> Result<reqwest::Response, FirebaseError> {
        self.ensure_not_root(operation)?;
        let timeout = self.storage.settings().await.max_download_retry_time;
        let mut request = self
            .storage
            .request(reqwest::Method::GET, &self.object_url().await, timeout)
            .await?
            .query(&[("alt", "media")]);
        if let Some(max) = max_download_size.filter(|max| *max > 0) {
            request = request.header("Range", format!("bytes=0-{}", max - 1));
        }
        self.check(request.send().await?).await
    }

    pub(crate) async fn object_url(&self) -> String {
        format!(
            "{}/b/{}/o/{}",
            self.storage.base_url().await,
            self.bucket(),
            urlencoding::encode(&self.path)
        )
    }

    /// Map a failed response to a `storage/*` error
    pub(crate) async fn check(&self, response: reqwest::Response) -> Result<reqwest::Response, FirebaseError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let failure = api_failure(response).await;
        Err(StorageError::from_status(failure.status, &self.to_string(), failure.to_string()).into())
    }

    fn ensure_not_root(&self, operation: &str) -> Result<(), StorageError> {
        if self.path.is_empty() {
            return Err(StorageError::InvalidArgument(format!(
                "The operation '{}' cannot be performed on a root reference",
                operation
            )));
        }
        Ok(())
    }
}

/// Drop empty segments: `/a//b/` becomes `a/b`
fn normalize(path: &str) -> String {
    path.split('/').filter(|s| !s.is_empty()).collect::<Vec<_>>().join("/")
}

impl std::fmt::Display for StorageReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "gs://{}/{}", self.bucket(), self.path)
    }
}

impl std::fmt::Debug for StorageReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageReference")
            .field("bucket", &self.bucket())
            .field("path", &self.path)
            .finish()
    }
}

impl PartialEq for StorageReference {
    fn eq(&self, other: &Self) -> bool {
        self.bucket() == other.bucket() && self.path == other.path
    }
}
