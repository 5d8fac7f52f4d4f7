//! Resumable uploads
//!
//! An upload runs on a spawned tokio task: one `start` request opens the
//! session, then chunks are sent with `upload` and the last one with
//! `upload, finalize`. The caller pauses, resumes or cancels through the
//! [`UploadTask`] handle; state changes are published on a watch channel.

use crate::error::{FirebaseError, StorageError};
use crate::storage::metadata::{FullMetadata, ObjectResource, SettableMetadata};
use crate::storage::reference::StorageReference;
use async_stream::stream;
use futures::Stream;
use serde_json::Value;
use std::future::{Future, IntoFuture};
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Lifecycle of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// Transferring
    Running,
    /// Paused by the caller
    Paused,
    /// Completed
    Success,
    /// Cancelled by the caller
    Canceled,
    /// Failed
    Error,
}

impl TaskState {
    /// Whether no further transitions are possible
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskState::Success | TaskState::Canceled | TaskState::Error)
    }

    /// Wire name (`running`, `paused`, `success`, `cancelled`, `error`)
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskState::Running => "running",
            TaskState::Paused => "paused",
            TaskState::Success => "success",
            TaskState::Canceled => "cancelled",
            TaskState::Error => "error",
        }
    }
}

/// Progress of a task at one point in time
#[derive(Debug, Clone, PartialEq)]
pub struct TaskSnapshot {
    /// Bytes acknowledged by the backend
    pub bytes_transferred: u64,
    /// Size of the upload
    pub total_bytes: u64,
    /// Current state
    pub state: TaskState,
    /// Object metadata, set once the upload succeeds
    pub metadata: Option<FullMetadata>,
    /// Destination
    pub reference: StorageReference,
}

type Shared = Arc<watch::Sender<TaskSnapshot>>;

/// Handle to a running upload
///
/// Await it (or call [`UploadTask::wait`]) for the final snapshot.
pub struct UploadTask {
    state: Shared,
    handle: JoinHandle<Result<TaskSnapshot, FirebaseError>>,
}

impl UploadTask {
    pub(crate) fn start(reference: StorageReference, data: Vec<u8>, metadata: SettableMetadata) -> Self {
        let (tx, _) = watch::channel(TaskSnapshot {
            bytes_transferred: 0,
            total_bytes: data.len() as u64,
            state: TaskState::Running,
            metadata: None,
            reference: reference.clone(),
        });
        let state: Shared = Arc::new(tx);

        let handle = tokio::spawn(run_upload(reference, data, metadata, Arc::clone(&state)));
        Self { state, handle }
    }

    /// Current snapshot
    pub fn snapshot(&self) -> TaskSnapshot {
        self.state.borrow().clone()
    }

    /// Pause a running task; `false` if the task was not running
    pub fn pause(&self) -> bool {
        transition(&self.state, |s| s == TaskState::Running, TaskState::Paused)
    }

    /// Resume a paused task; `false` if the task was not paused
    pub fn resume(&self) -> bool {
        transition(&self.state, |s| s == TaskState::Paused, TaskState::Running)
    }

    /// Cancel a running or paused task; `false` if it already finished
    pub fn cancel(&self) -> bool {
        transition(
            &self.state,
            |s| matches!(s, TaskState::Running | TaskState::Paused),
            TaskState::Canceled,
        )
    }

    /// Snapshots as the task progresses, ending after the terminal state
    pub fn snapshots(&self) -> Pin<Box<dyn Stream<Item = TaskSnapshot> + Send>> {
        let mut rx = self.state.subscribe();

        Box::pin(stream! {
            loop {
                let snapshot = rx.borrow_and_update().clone();
                let done = snapshot.state.is_terminal();
                yield snapshot;
                if done || rx.changed().await.is_err() {
                    break;
                }
            }
        })
    }

    /// Wait for the upload to finish
    pub async fn wait(self) -> Result<TaskSnapshot, FirebaseError> {
        match self.handle.await {
            Err(e) => Err(FirebaseError::internal(format!("upload task panicked: {}", e))),
            Ok(result) => result,
        }
    }
}

impl IntoFuture for UploadTask {
    type Output = Result<TaskSnapshot, FirebaseError>;
    type IntoFuture = Pin<Box<dyn Future<Output = Self::Output> + Send>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(self.wait())
    }
}

fn transition(state: &Shared, allowed: impl Fn(TaskState) -> bool, to: TaskState) -> bool {
    state.send_if_modified(|snapshot| {
        if !allowed(snapshot.state) {
            return false;
        }
        snapshot.state = to;
        true
    })
}

/// Resolves once the task is cancelled
async fn canceled(rx: &mut watch::Receiver<TaskSnapshot>) {
    let _ = rx.wait_for(|s| s.state == TaskState::Canceled).await;
}

/// Block while paused; `Err(Canceled)` if cancelled meanwhile
async fn wait_until_running(rx: &mut watch::Receiver<TaskSnapshot>) -> Result<(), StorageError> {
    let state = match rx.wait_for(|s| s.state != TaskState::Paused).await {
        Err(_) => TaskState::Canceled,
        Ok(snapshot) => snapshot.state,
    };
    match state {
        TaskState::Canceled => Err(StorageError::Canceled),
        _ => Ok(()),
    }
}

/// Send `request` unless the task is cancelled first
async fn send_cancellable(
    request: reqwest::RequestBuilder,
    rx: &mut watch::Receiver<TaskSnapshot>,
) -> Result<reqwest::Response, FirebaseError> {
    tokio::select! {
        response = request.send() => Ok(response?),
        _ = canceled(rx) => Err(StorageError::Canceled.into()),
    }
}

async fn run_upload(
    reference: StorageReference,
    data: Vec<u8>,
    metadata: SettableMetadata,
    state: Shared,
) -> Result<TaskSnapshot, FirebaseError> {
    let result = upload(&reference, &data, &metadata, &state).await;

    match result {
        Ok(full_metadata) => {
            if let Err(e) = complete(&state, full_metadata).await {
                debug!(path = %reference, "upload cancelled before completion");
                return Err(e.into());
            }
            info!(path = %reference, bytes = data.len(), "upload complete");
            Ok(state.borrow().clone())
        }
        Err(FirebaseError::Storage(StorageError::Canceled)) => {
            debug!(path = %reference, "upload cancelled");
            Err(StorageError::Canceled.into())
        }
        Err(e) => {
            // A request can fail while the caller has the task paused
            transition(
                &state,
                |s| matches!(s, TaskState::Running | TaskState::Paused),
                TaskState::Error,
            );
            warn!(path = %reference, error = %e, "upload failed");
            Err(e)
        }
    }
}

/// Mark the task successful, holding a pending pause until it is resumed
async fn complete(state: &Shared, metadata: FullMetadata) -> Result<(), StorageError> {
    let mut rx = state.subscribe();
    loop {
        wait_until_running(&mut rx).await?;
        let succeeded = state.send_if_modified(|snapshot| {
            if snapshot.state != TaskState::Running {
                return false;
            }
            snapshot.state = TaskState::Success;
            snapshot.bytes_transferred = snapshot.total_bytes;
            snapshot.metadata = Some(metadata.clone());
            true
        });
        if succeeded {
            return Ok(());
        }
    }
}

async fn upload(
    reference: &StorageReference,
    data: &[u8],
    metadata: &SettableMetadata,
    state: &Shared,
) -> Result<FullMetadata, FirebaseError> {
    let storage = reference.storage();
    let settings = storage.settings().await;
    let mut rx = state.subscribe();
    let total = data.len();

    let content_type = metadata
        .content_type
        .clone()
        .unwrap_or_else(|| "application/octet-stream".to_string());
    let mut body = metadata.to_wire();
    body.insert("name".to_string(), Value::String(reference.full_path().to_string()));
    body.insert("contentType".to_string(), Value::String(content_type.clone()));

    // Start the session
    let url = format!("{}/b/{}/o", storage.base_url().await, reference.bucket());
    let request = storage
        .request(reqwest::Method::POST, &url, settings.max_upload_retry_time)
        .await?
        .query(&[("name", reference.full_path())])
        .header("X-Goog-Upload-Protocol", "resumable")
        .header("X-Goog-Upload-Command", "start")
        .header("X-Goog-Upload-Header-Content-Length", total.to_string())
        .header("X-Goog-Upload-Header-Content-Type", content_type)
        .json(&Value::Object(body));
    let response = reference.check(send_cancellable(request, &mut rx).await?).await?;

    let Some(upload_url) = response
        .headers()
        .get("X-Goog-Upload-URL")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
    else {
        return Err(StorageError::Unknown("upload session has no X-Goog-Upload-URL".to_string()).into());
    };
    debug!(path = %reference, total, "upload session started");

    let mut offset = 0;
    loop {
        wait_until_running(&mut rx).await?;

        let end = (offset + settings.upload_chunk_size).min(total);
        let last = end == total;
        let command = if last { "upload, finalize" } else { "upload" };

        let request = storage
            .request(reqwest::Method::POST, &upload_url, settings.max_upload_retry_time)
            .await?
            .header("X-Goog-Upload-Command", command)
            .header("X-Goog-Upload-Offset", offset.to_string())
            .body(data[offset..end].to_vec());
        let response = reference.check(send_cancellable(request, &mut rx).await?).await?;

        let status = response
            .headers()
            .get("X-Goog-Upload-Status")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        offset = end;
        state.send_modify(|snapshot| snapshot.bytes_transferred = offset as u64);

        if last || status.as_deref() == Some("final") {
            let resource: ObjectResource = response.json().await?;
            return Ok(resource.into());
        }
        if status.as_deref() == Some("cancelled") {
            return Err(StorageError::Unknown("upload session was cancelled by the server".to_string()).into());
        }
    }
}
