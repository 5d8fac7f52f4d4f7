//! Firebase Installations
//!
//! Each app installation is identified by a FID. Remote Config and Cloud
//! Messaging authenticate with the installation auth token.

use crate::app::App;
use crate::error::{FirebaseError, InstallationsError};
use crate::rest::api_failure;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::RngCore;
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

pub(crate) const INSTALLATIONS_BASE_URL: &str = "https://firebaseinstallations.googleapis.com/v1";
const COMPONENT: &str = "installations";
const SDK_VERSION: &str = concat!("rust:", env!("CARGO_PKG_VERSION"));

/// Tokens expiring within this window are refreshed
const TOKEN_EXPIRATION_BUFFER_MILLIS: i64 = 60 * 60 * 1000;

/// Firebase Installations instance, one per App
#[derive(Clone)]
pub struct Installations {
    inner: Arc<InstallationsInner>,
}

struct InstallationsInner {
    api_key: String,
    project_id: String,
    app_id: Option<String>,
    http_client: reqwest::Client,
    base_url: RwLock<String>,
    /// Serializes registration so concurrent callers share one FID
    entry: Mutex<Option<InstallationEntry>>,
}

#[derive(Debug, Clone)]
struct InstallationEntry {
    fid: String,
    refresh_token: String,
    auth_token: InstallationToken,
}

/// Installation auth token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallationToken {
    /// Bearer token value
    pub token: String,
    /// Expiry in milliseconds since the epoch
    pub expires_at_millis: i64,
}

impl InstallationToken {
    fn from_response(token: TokenResponse) -> Self {
        Self {
            expires_at_millis: chrono::Utc::now().timestamp_millis() + parse_duration_millis(&token.expires_in),
            token: token.token,
        }
    }

    fn is_fresh(&self) -> bool {
        self.expires_at_millis - chrono::Utc::now().timestamp_millis() > TOKEN_EXPIRATION_BUFFER_MILLIS
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateInstallationResponse {
    fid: Option<String>,
    refresh_token: String,
    auth_token: TokenResponse,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenResponse {
    token: String,
    expires_in: String,
}

impl Installations {
    /// Get or create the Installations instance for the given App
    pub async fn get_installations(app: &App) -> Result<Self, FirebaseError> {
        let options = app.options().clone();
        let http_client = app.http_client().clone();

        let inner = app
            .component(COMPONENT, move || {
                Ok(InstallationsInner {
                    api_key: options.api_key,
                    project_id: options.project_id,
                    app_id: options.app_id,
                    http_client,
                    base_url: RwLock::new(INSTALLATIONS_BASE_URL.to_string()),
                    entry: Mutex::new(None),
                })
            })
            .await?;

        Ok(Self { inner })
    }

    /// The installation's FID, registering the installation on first use
    pub async fn get_id(&self) -> Result<String, FirebaseError> {
        let mut entry = self.inner.entry.lock().await;
        let registered = self.ensure_registered(&mut entry).await?;
        Ok(registered.fid.clone())
    }

    /// Installation auth token
    ///
    /// Cached tokens valid for more than an hour are reused unless
    /// `force_refresh` is set.
    pub async fn get_token(&self, force_refresh: bool) -> Result<InstallationToken, FirebaseError> {
        let mut entry = self.inner.entry.lock().await;
        let registered = self.ensure_registered(&mut entry).await?;

        if !force_refresh && registered.auth_token.is_fresh() {
            return Ok(registered.auth_token.clone());
        }

        let url = format!(
            "{}/installations/{}/authTokens:generate",
            self.project_url().await,
            registered.fid
        );
        let response = self
            .inner
            .http_client
            .post(&url)
            .header("x-goog-api-key", &self.inner.api_key)
            .header("Authorization", format!("FIS_v2 {}", registered.refresh_token))
            .json(&serde_json::json!({
                "installation": {
                    "sdkVersion": SDK_VERSION,
                    "appId": self.inner.app_id
                }
            }))
            .send()
            .await?;

        // Error-first: the installation is gone server side
        if response.status() == reqwest::StatusCode::UNAUTHORIZED || response.status() == reqwest::StatusCode::NOT_FOUND {
            *entry = None;
            return Err(InstallationsError::NotRegistered.into());
        }
        if !response.status().is_success() {
            let failure = api_failure(response).await;
            return Err(InstallationsError::RequestFailed(failure.to_string()).into());
        }

        let token = InstallationToken::from_response(response.json::<TokenResponse>().await?);
        registered.auth_token = token.clone();
        debug!("refreshed installation auth token");
        Ok(token)
    }

    /// Delete the installation on the backend and forget the local FID
    pub async fn delete(&self) -> Result<(), FirebaseError> {
        let mut entry = self.inner.entry.lock().await;
        let Some(registered) = entry.as_ref() else {
            return Ok(());
        };

        let url = format!("{}/installations/{}", self.project_url().await, registered.fid);
        let response = self
            .inner
            .http_client
            .delete(&url)
            .header("x-goog-api-key", &self.inner.api_key)
            .header("Authorization", format!("FIS_v2 {}", registered.refresh_token))
            .send()
            .await?;

        if !response.status().is_success() && response.status() != reqwest::StatusCode::NOT_FOUND {
            let failure = api_failure(response).await;
            return Err(InstallationsError::RequestFailed(failure.to_string()).into());
        }

        info!(fid = %registered.fid, "deleted installation");
        *entry = None;
        Ok(())
    }

    /// Internal: route requests to another host
    pub(crate) async fn set_base_url(&self, base_url: impl Into<String>) {
        *self.inner.base_url.write().await = base_url.into();
    }

    async fn project_url(&self) -> String {
        format!("{}/projects/{}", self.inner.base_url.read().await, self.inner.project_id)
    }

    async fn ensure_registered<'a>(
        &self,
        entry: &'a mut Option<InstallationEntry>,
    ) -> Result<&'a mut InstallationEntry, FirebaseError> {
        if entry.is_none() {
            *entry = Some(self.register().await?);
        }
        entry
            .as_mut()
            .ok_or_else(|| FirebaseError::internal("installation entry missing after registration"))
    }

    async fn register(&self) -> Result<InstallationEntry, FirebaseError> {
        // Error-first: registration needs the app id
        let Some(app_id) = &self.inner.app_id else {
            return Err(InstallationsError::MissingAppConfigValues("app_id").into());
        };

        let fid = generate_fid();
        let url = format!("{}/installations", self.project_url().await);
        let response = self
            .inner
            .http_client
            .post(&url)
            .header("x-goog-api-key", &self.inner.api_key)
            .json(&serde_json::json!({
                "fid": fid,
                "authVersion": "FIS_v2",
                "appId": app_id,
                "sdkVersion": SDK_VERSION
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            let failure = api_failure(response).await;
            return Err(InstallationsError::RequestFailed(failure.to_string()).into());
        }

        let created: CreateInstallationResponse = response.json().await?;
        // The backend may assign a different FID
        let fid = created.fid.unwrap_or(fid);
        info!(fid = %fid, "registered installation");

        Ok(InstallationEntry {
            fid,
            refresh_token: created.refresh_token,
            auth_token: InstallationToken::from_response(created.auth_token),
        })
    }
}

/// Generate a FID: 17 random bytes, header nibble `0111`, base64url, 22 chars
pub(crate) fn generate_fid() -> String {
    let mut bytes = [0u8; 17];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes[0] = 0b0111_0000 | (bytes[0] & 0b0000_1111);

    let mut fid = URL_SAFE_NO_PAD.encode(bytes);
    fid.truncate(22);
    fid
}

/// `"604800s"` or `"3.5s"` to milliseconds
fn parse_duration_millis(raw: &str) -> i64 {
    let seconds: f64 = raw.trim_end_matches('s').parse().unwrap_or(0.0);
    (seconds * 1000.0) as i64
}

impl std::fmt::Debug for Installations {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Installations")
            .field("project_id", &self.inner.project_id)
            .field("api_key", &"<redacted>")
            .finish()
    }
}
