//! Cloud Functions for Firebase: callable functions over HTTPS
//!
//! One instance per App and region (or custom domain). Requests carry the
//! signed-in user's ID token when Auth is in use.

use crate::app::App;
use crate::error::FirebaseError;
use crate::functions::https_error::{HttpsError, HttpsErrorCode};
use crate::functions::serializer;
use futures::Stream;
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, RwLock};
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, warn};

/// Region used when none is given
pub const DEFAULT_REGION: &str = "us-central1";

/// Port used by `use_functions_emulator` when the origin has none
pub const DEFAULT_EMULATOR_PORT: u16 = 5001;

/// Default callable timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(70);

/// Cloud Functions instance
#[derive(Clone)]
pub struct Functions {
    inner: Arc<FunctionsInner>,
}

struct FunctionsInner {
    app: App,
    project_id: String,
    region: String,
    custom_domain: Option<String>,
    emulator_origin: RwLock<Option<String>>,
}

/// Options for a callable reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpsCallableOptions {
    /// Request timeout
    pub timeout: Duration,
}

impl Default for HttpsCallableOptions {
    fn default() -> Self {
        Self { timeout: DEFAULT_TIMEOUT }
    }
}

/// Result of a callable invocation
#[derive(Debug, Clone, PartialEq)]
pub struct HttpsCallableResult {
    /// Data returned by the function
    pub data: Value,
}

/// Message stream of a streaming call
pub type CallableMessages = Pin<Box<dyn Stream<Item = Result<Value, HttpsError>> + Send>>;

/// Final result of a streaming call
pub type CallableData = Pin<Box<dyn Future<Output = Result<HttpsCallableResult, HttpsError>> + Send>>;

/// A streaming call in progress
///
/// `stream` yields each message the function sends; `data` resolves with
/// the function's return value once the stream completes.
pub struct HttpsCallableStreamResult {
    /// Intermediate messages
    pub stream: CallableMessages,
    /// Final result
    pub data: CallableData,
}

enum Target {
    Name(String),
    Url(String),
}

/// Reference to a callable function
pub struct HttpsCallable {
    functions: Functions,
    target: Target,
    options: HttpsCallableOptions,
}

impl Functions {
    /// Get or create the Functions instance for an App
    ///
    /// `region_or_custom_domain` defaults to `us-central1`. A value starting
    /// with `http` is treated as a custom domain.
    ///
    /// # Example
    /// ```no_run
    /// # use firebase_client_sdk::{App, AppOptions, Functions};
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let app = App::create(AppOptions::new("YOUR_API_KEY", "your-project")).await?;
    /// let functions = Functions::get_functions(&app, Some("europe-west1")).await?;
    /// let add = functions.https_callable("addNumbers", Default::default());
    /// let result = add.call(serde_json::json!({ "a": 1, "b": 2 })).await?;
    /// println!("{}", result.data);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn get_functions(app: &App, region_or_custom_domain: Option<&str>) -> Result<Self, FirebaseError> {
        let value = region_or_custom_domain.unwrap_or(DEFAULT_REGION).to_string();
        let (region, custom_domain) = if value.starts_with("http") {
            (DEFAULT_REGION.to_string(), Some(value.trim_end_matches('/').to_string()))
        } else {
            (value.clone(), None)
        };

        let project_id = app.options().project_id.clone();
        let owner = app.clone();
        let inner = app
            .component(&format!("functions/{}", value), move || {
                Ok(FunctionsInner {
                    app: owner,
                    project_id,
                    region,
                    custom_domain,
                    emulator_origin: RwLock::new(None),
                })
            })
            .await?;

        Ok(Self { inner })
    }

    /// Region of this instance
    pub fn region(&self) -> &str {
        &self.inner.region
    }

    /// Custom domain of this instance, if any
    pub fn custom_domain(&self) -> Option<&str> {
        self.inner.custom_domain.as_deref()
    }

    /// Route calls to the Functions emulator at `http://host:port`
    pub async fn use_emulator(&self, host: &str, port: u16) -> Result<(), FirebaseError> {
        // Error-first
        if host.is_empty() {
            return Err(FirebaseError::invalid_argument("emulator host must not be empty"));
        }
        *self.inner.emulator_origin.write().await = Some(format!("http://{}:{}", host, port));
        debug!(host, port, "functions emulator enabled");
        Ok(())
    }

    /// Route calls to the emulator at `origin` (`http(s)://host[:port]`)
    ///
    /// The port defaults to 5001.
    pub async fn use_functions_emulator(&self, origin: &str) -> Result<(), FirebaseError> {
        let parsed = url::Url::parse(origin)
            .map_err(|_| FirebaseError::invalid_argument(format!("invalid emulator origin '{}'", origin)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(FirebaseError::invalid_argument(format!(
                "emulator origin must use http or https, got '{}'",
                origin
            )));
        }
        let Some(host) = parsed.host_str() else {
            return Err(FirebaseError::invalid_argument(format!("emulator origin '{}' has no host", origin)));
        };
        let port = parsed.port().unwrap_or(DEFAULT_EMULATOR_PORT);

        *self.inner.emulator_origin.write().await = Some(format!("{}://{}:{}", parsed.scheme(), host, port));
        Ok(())
    }

    /// Reference to the callable function `name`
    pub fn https_callable(&self, name: impl Into<String>, options: HttpsCallableOptions) -> HttpsCallable {
        HttpsCallable {
            functions: self.clone(),
            target: Target::Name(name.into()),
            options,
        }
    }

    /// Reference to a callable function at a full URL
    pub fn https_callable_from_url(&self, url: impl Into<String>, options: HttpsCallableOptions) -> HttpsCallable {
        HttpsCallable {
            functions: self.clone(),
            target: Target::Url(url.into()),
            options,
        }
    }

    async fn url_for(&self, name: &str) -> String {
        if let Some(origin) = self.inner.emulator_origin.read().await.as_ref() {
            return format!("{}/{}/{}/{}", origin, self.inner.project_id, self.inner.region, name);
        }
        if let Some(domain) = &self.inner.custom_domain {
            return format!("{}/{}", domain, name);
        }
        format!("https://{}-{}.cloudfunctions.net/{}", self.inner.region, self.inner.project_id, name)
    }
}

impl HttpsCallable {
    /// Invoke the function with `data`
    pub async fn call(&self, data: Value) -> Result<HttpsCallableResult, FirebaseError> {
        let response = self.send(&data, false).await?;
        let status = response.status().as_u16();
        let body: Option<Value> = response.json().await.ok();

        if let Some(error) = HttpsError::from_response(status, body.as_ref()) {
            return Err(error.into());
        }

        let result = body
            .and_then(|b| match b {
                Value::Object(mut map) => map.remove("data").or_else(|| map.remove("result")),
                _ => None,
            })
            .ok_or_else(|| HttpsError::new(HttpsErrorCode::Internal, "Response is missing data field.", None))?;

        Ok(HttpsCallableResult {
            data: serializer::decode(result),
        })
    }

    /// Invoke the function and receive its streamed messages
    ///
    /// # Example
    /// ```no_run
    /// # use futures::StreamExt;
    /// # async fn example(functions: firebase_client_sdk::Functions) -> Result<(), Box<dyn std::error::Error>> {
    /// let callable = functions.https_callable("generate", Default::default());
    /// let mut call = callable.stream(serde_json::json!({ "prompt": "hi" })).await?;
    /// while let Some(chunk) = call.stream.next().await {
    ///     println!("{}", chunk?);
    /// }
    /// println!("done: {}", call.data.await?.data);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn stream(&self, data: Value) -> Result<HttpsCallableStreamResult, FirebaseError> {
        let response = self.send(&data, true).await?;

        // Error-first: a non-streaming error body
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body: Option<Value> = response.json().await.ok();
            let error = HttpsError::from_response(status, body.as_ref())
                .unwrap_or_else(|| HttpsError::new(HttpsErrorCode::Internal, "internal", None));
            return Err(error.into());
        }

        let (message_tx, message_rx) = mpsc::unbounded_channel();
        let (result_tx, result_rx) = oneshot::channel();
        tokio::spawn(read_events(response, message_tx, result_tx));

        let data: CallableData = Box::pin(async move {
            result_rx
                .await
                .unwrap_or_else(|_| Err(HttpsError::new(HttpsErrorCode::Cancelled, "stream was dropped", None)))
        });

        Ok(HttpsCallableStreamResult {
            stream: Box::pin(UnboundedReceiverStream::new(message_rx)),
            data,
        })
    }

    async fn send(&self, data: &Value, streaming: bool) -> Result<reqwest::Response, FirebaseError> {
        let url = match &self.target {
            Target::Name(name) => self.functions.url_for(name).await,
            Target::Url(url) => url.clone(),
        };

        let app = &self.functions.inner.app;
        let mut request = app
            .http_client()
            .post(&url)
            .timeout(self.options.timeout)
            .json(&serde_json::json!({ "data": serializer::encode(data) }));
        if streaming {
            request = request.header("Accept", "text/event-stream");
        }
        if let Some(token) = app.auth_token().await? {
            request = request.bearer_auth(token);
        }

        debug!(url = %url, streaming, "calling function");
        match request.send().await {
            Err(e) if e.is_timeout() => {
                Err(HttpsError::new(HttpsErrorCode::DeadlineExceeded, "deadline-exceeded", None).into())
            }
            Err(e) => Err(HttpsError::new(HttpsErrorCode::Internal, e.to_string(), None).into()),
            Ok(resp) => Ok(resp),
        }
    }
}

/// Parse `data:` lines of a server-sent event stream
async fn read_events(
    mut response: reqwest::Response,
    messages: mpsc::UnboundedSender<Result<Value, HttpsError>>,
    result: oneshot::Sender<Result<HttpsCallableResult, HttpsError>>,
) {
    let mut buffer: Vec<u8> = Vec::new();

    loop {
        let chunk = match response.chunk().await {
            Err(e) => {
                let error = HttpsError::new(HttpsErrorCode::Internal, e.to_string(), None);
                let _ = messages.send(Err(error.clone()));
                let _ = result.send(Err(error));
                return;
            }
            Ok(None) => break,
            Ok(Some(chunk)) => chunk,
        };
        buffer.extend_from_slice(&chunk);

        while let Some(pos) = buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line);
            let Some(payload) = line.trim_end().strip_prefix("data:") else {
                continue;
            };
            let Ok(mut event) = serde_json::from_str::<Value>(payload.trim()) else {
                warn!("skipping malformed stream event");
                continue;
            };

            if let Some(message) = event.get_mut("message") {
                // A closed receiver only means nobody reads messages
                let _ = messages.send(Ok(serializer::decode(message.take())));
            } else if let Some(data) = event.get_mut("result") {
                let _ = result.send(Ok(HttpsCallableResult {
                    data: serializer::decode(data.take()),
                }));
                return;
            } else if let Some(error) = HttpsError::from_response(200, Some(&event)) {
                let _ = messages.send(Err(error.clone()));
                let _ = result.send(Err(error));
                return;
            }
        }
    }

    let _ = result.send(Err(HttpsError::new(
        HttpsErrorCode::Internal,
        "stream ended without a result",
        None,
    )));
}

impl std::fmt::Debug for Functions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Functions")
            .field("region", &self.inner.region)
            .field("custom_domain", &self.inner.custom_domain)
            .finish()
    }
}
