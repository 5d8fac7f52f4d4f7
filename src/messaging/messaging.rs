//! Firebase Cloud Messaging registration
//!
//! Binds a Web Push subscription to an FCM registration token through the
//! FCM registrations API. Delivery of pushes belongs to the platform.

use crate::app::App;
use crate::error::{FirebaseError, MessagingError};
use crate::installations::Installations;
use crate::messaging::types::PushSubscription;
use crate::rest::api_failure;
use async_stream::stream;
use futures::Stream;
use serde::Deserialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex, RwLock};
use tracing::{debug, info};

/// FCM registrations API
pub(crate) const REGISTRATIONS_BASE_URL: &str = "https://fcmregistrations.googleapis.com/v1";

/// Public VAPID key of FCM, used when the subscription names none
pub const DEFAULT_VAPID_KEY: &str =
    "BDOU99-h67HcA6JeFXHbSNMu7e2yNNu3RzoMj8TM4W88jITfq7ZmPvIM1Iv-4_l2LxQcYwhqby2xGpWwzjfAnG4";

/// Tokens older than this are refreshed on the next `get_token`
const TOKEN_REFRESH_MILLIS: i64 = 7 * 24 * 60 * 60 * 1000;

const COMPONENT: &str = "messaging";

/// Cloud Messaging instance, one per App
#[derive(Clone)]
pub struct Messaging {
    inner: Arc<MessagingInner>,
}

struct MessagingInner {
    api_key: String,
    project_id: String,
    http_client: reqwest::Client,
    installations: Installations,
    base_url: RwLock<String>,
    token: Mutex<Option<TokenDetails>>,
    auto_init_enabled: AtomicBool,
    token_tx: broadcast::Sender<String>,
}

#[derive(Debug, Clone)]
struct TokenDetails {
    token: String,
    subscription: PushSubscription,
    created_at_millis: i64,
}

#[derive(Debug, Deserialize)]
struct RegistrationResponse {
    token: String,
}

impl Messaging {
    /// Get or create the Messaging instance for the given App
    ///
    /// The App needs `app_id` and `messaging_sender_id`.
    pub async fn get_messaging(app: &App) -> Result<Self, FirebaseError> {
        let options = app.options();
        // Error-first
        if options.app_id.is_none() {
            return Err(MessagingError::MissingAppConfigValues("app_id").into());
        }
        if options.messaging_sender_id.is_none() {
            return Err(MessagingError::MissingAppConfigValues("messaging_sender_id").into());
        }

        let installations = Installations::get_installations(app).await?;
        let api_key = options.api_key.clone();
        let project_id = options.project_id.clone();
        let http_client = app.http_client().clone();

        let inner = app
            .component(COMPONENT, move || {
                let (token_tx, _) = broadcast::channel(16);
                Ok(MessagingInner {
                    api_key,
                    project_id,
                    http_client,
                    installations,
                    base_url: RwLock::new(REGISTRATIONS_BASE_URL.to_string()),
                    token: Mutex::new(None),
                    auto_init_enabled: AtomicBool::new(true),
                    token_tx,
                })
            })
            .await?;

        Ok(Self { inner })
    }

    /// FCM registration token for `subscription`
    ///
    /// The token is cached. A different subscription replaces the cached
    /// registration, and tokens older than a week are refreshed.
    ///
    /// # Example
    /// ```no_run
    /// # async fn example(messaging: firebase_client_sdk::Messaging) -> Result<(), Box<dyn std::error::Error>> {
    /// use firebase_client_sdk::messaging::PushSubscription;
    ///
    /// let token = messaging
    ///     .get_token(PushSubscription {
    ///         endpoint: "https://fcm.googleapis.com/fcm/send/abc".to_string(),
    ///         auth: "AUTH_SECRET".to_string(),
    ///         p256dh: "P256DH_KEY".to_string(),
    ///         vapid_key: None,
    ///     })
    ///     .await?;
    /// println!("FCM token: {}", token);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn get_token(&self, subscription: PushSubscription) -> Result<String, FirebaseError> {
        subscription.validate()?;

        let mut cached = self.inner.token.lock().await;
        let now = chrono::Utc::now().timestamp_millis();

        let token = match cached.take() {
            Some(details) if details.subscription == subscription => {
                if now - details.created_at_millis < TOKEN_REFRESH_MILLIS {
                    let token = details.token.clone();
                    *cached = Some(details);
                    return Ok(token);
                }
                self.update_registration(&details.token, &subscription).await?
            }
            Some(stale) => {
                if let Err(e) = self.delete_registration(&stale.token).await {
                    debug!(error = %e, "failed to delete replaced registration");
                }
                self.create_registration(&subscription).await?
            }
            None => self.create_registration(&subscription).await?,
        };

        *cached = Some(TokenDetails {
            token: token.clone(),
            subscription,
            created_at_millis: now,
        });
        let _ = self.inner.token_tx.send(token.clone());
        Ok(token)
    }

    /// Unregister the cached token; nothing happens when there is none
    pub async fn delete_token(&self) -> Result<(), FirebaseError> {
        let mut cached = self.inner.token.lock().await;
        let Some(details) = cached.as_ref() else {
            return Ok(());
        };
        self.delete_registration(&details.token).await?;
        info!("deleted FCM registration token");
        *cached = None;
        Ok(())
    }

    /// Whether a token should be fetched automatically at startup
    pub fn is_auto_init_enabled(&self) -> bool {
        self.inner.auto_init_enabled.load(Ordering::SeqCst)
    }

    /// Enable or disable automatic token fetching
    pub fn set_auto_init_enabled(&self, enabled: bool) {
        self.inner.auto_init_enabled.store(enabled, Ordering::SeqCst);
    }

    /// Tokens issued from now on, one item per new or refreshed token
    pub fn on_token_refresh(&self) -> std::pin::Pin<Box<dyn Stream<Item = String> + Send>> {
        let mut rx = self.inner.token_tx.subscribe();
        Box::pin(stream! {
            loop {
                let token = match rx.recv().await {
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(_) => break,
                    Ok(token) => token,
                };
                yield token;
            }
        })
    }

    pub(crate) async fn set_base_url(&self, base_url: impl Into<String>) {
        *self.inner.base_url.write().await = base_url.into();
    }

    async fn registrations_url(&self) -> String {
        format!("{}/projects/{}/registrations", self.inner.base_url.read().await, self.inner.project_id)
    }

    async fn authorized(&self, builder: reqwest::RequestBuilder) -> Result<reqwest::RequestBuilder, FirebaseError> {
        let fis = self.inner.installations.get_token(false).await?;
        Ok(builder
            .header("x-goog-api-key", &self.inner.api_key)
            .header("x-goog-firebase-installations-auth", format!("FIS {}", fis.token)))
    }

    async fn create_registration(&self, subscription: &PushSubscription) -> Result<String, FirebaseError> {
        let url = self.registrations_url().await;
        let request = self
            .authorized(self.inner.http_client.post(&url))
            .await?
            .json(&registration_body(subscription));

        let response = match request.send().await {
            Err(e) => return Err(MessagingError::TokenSubscribeFailed(e.to_string()).into()),
            Ok(resp) => resp,
        };
        if !response.status().is_success() {
            let failure = api_failure(response).await;
            return Err(MessagingError::TokenSubscribeFailed(failure.to_string()).into());
        }
        let registration: RegistrationResponse = response.json().await?;
        info!("registered FCM token");
        Ok(registration.token)
    }

    async fn update_registration(&self, token: &str, subscription: &PushSubscription) -> Result<String, FirebaseError> {
        let url = format!("{}/{}", self.registrations_url().await, token);
        let request = self
            .authorized(self.inner.http_client.patch(&url))
            .await?
            .json(&registration_body(subscription));

        let response = match request.send().await {
            Err(e) => return Err(MessagingError::TokenSubscribeFailed(e.to_string()).into()),
            Ok(resp) => resp,
        };
        if !response.status().is_success() {
            let failure = api_failure(response).await;
            return Err(MessagingError::TokenSubscribeFailed(failure.to_string()).into());
        }
        let registration: RegistrationResponse = response.json().await?;
        debug!("refreshed FCM token");
        Ok(registration.token)
    }

    async fn delete_registration(&self, token: &str) -> Result<(), FirebaseError> {
        let url = format!("{}/{}", self.registrations_url().await, token);
        let request = self.authorized(self.inner.http_client.delete(&url)).await?;

        let response = match request.send().await {
            Err(e) => return Err(MessagingError::TokenUnsubscribeFailed(e.to_string()).into()),
            Ok(resp) => resp,
        };
        if !response.status().is_success() {
            let failure = api_failure(response).await;
            return Err(MessagingError::TokenUnsubscribeFailed(failure.to_string()).into());
        }
        Ok(())
    }
}

fn registration_body(subscription: &PushSubscription) -> serde_json::Value {
    let mut web = serde_json::json!({
        "endpoint": subscription.endpoint,
        "auth": subscription.auth,
        "p256dh": subscription.p256dh,
    });
    if let Some(vapid) = subscription.vapid_key.as_deref().filter(|k| *k != DEFAULT_VAPID_KEY) {
        web["applicationPubKey"] = serde_json::Value::String(vapid.to_string());
    }
    serde_json::json!({ "web": web })
}

impl std::fmt::Debug for Messaging {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Messaging")
            .field("project_id", &self.inner.project_id)
            .field("api_key", &"<redacted>")
            .finish()
    }
}
