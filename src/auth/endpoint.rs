//! Identity Toolkit and Secure Token REST plumbing shared by Auth and User

use crate::error::AuthError;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

pub(crate) const IDENTITY_TOOLKIT_ORIGIN: &str = "https://identitytoolkit.googleapis.com";
pub(crate) const SECURE_TOKEN_ORIGIN: &str = "https://securetoken.googleapis.com";

/// Where Auth requests go
///
/// Production hosts by default; `emulated` prefixes both services with the
/// emulator origin the way the Auth emulator expects.
#[derive(Clone)]
pub(crate) struct AuthEndpoint {
    api_key: String,
    identity_toolkit: String,
    secure_token: String,
    locale: Option<String>,
    http_client: reqwest::Client,
}

impl std::fmt::Debug for AuthEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthEndpoint")
            .field("api_key", &"<redacted>")
            .field("identity_toolkit", &self.identity_toolkit)
            .finish()
    }
}

/// `securetoken.googleapis.com/v1/token` response
#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    pub id_token: String,
    pub refresh_token: String,
    pub expires_in: Option<String>,
}

impl AuthEndpoint {
    pub(crate) fn new(api_key: impl Into<String>, http_client: reqwest::Client) -> Self {
        Self {
            api_key: api_key.into(),
            identity_toolkit: IDENTITY_TOOLKIT_ORIGIN.to_string(),
            secure_token: SECURE_TOKEN_ORIGIN.to_string(),
            locale: None,
            http_client,
        }
    }

    /// Same credentials, requests routed through the emulator at `origin`
    pub(crate) fn emulated(&self, origin: &str) -> Self {
        let origin = origin.trim_end_matches('/');
        Self {
            api_key: self.api_key.clone(),
            identity_toolkit: format!("{}/identitytoolkit.googleapis.com", origin),
            secure_token: format!("{}/securetoken.googleapis.com", origin),
            locale: self.locale.clone(),
            http_client: self.http_client.clone(),
        }
    }

    /// Same endpoint, sending `X-Firebase-Locale` for localized emails
    pub(crate) fn with_locale(&self, locale: Option<String>) -> Self {
        Self {
            locale,
            ..self.clone()
        }
    }

    pub(crate) fn api_key(&self) -> &str {
        &self.api_key
    }

    /// POST to `v1/accounts:{method}`
    pub(crate) async fn accounts<T: DeserializeOwned>(
        &self,
        method: &str,
        body: &serde_json::Value,
    ) -> Result<T, AuthError> {
        let url = format!("{}/v1/accounts:{}?key={}", self.identity_toolkit, method, self.api_key);
        debug!(method, "identity toolkit request");

        let mut request = self.http_client.post(&url).json(body);
        if let Some(locale) = &self.locale {
            request = request.header("X-Firebase-Locale", locale);
        }

        let response = match request.send().await {
            Err(e) => return Err(AuthError::NetworkRequestFailed(e.to_string())),
            Ok(resp) => resp,
        };
        Self::parse(response).await
    }

    /// GET `v2/passwordPolicy`, scoped to `tenant_id` when given
    pub(crate) async fn password_policy<T: DeserializeOwned>(&self, tenant_id: Option<&str>) -> Result<T, AuthError> {
        let mut url = format!("{}/v2/passwordPolicy?key={}", self.identity_toolkit, self.api_key);
        if let Some(tenant_id) = tenant_id {
            url.push_str("&tenantId=");
            url.push_str(tenant_id);
        }
        debug!(tenant_id, "fetching password policy");

        let response = match self.http_client.get(&url).send().await {
            Err(e) => return Err(AuthError::NetworkRequestFailed(e.to_string())),
            Ok(resp) => resp,
        };
        Self::parse(response).await
    }

    /// Exchange a refresh token for a fresh ID token
    pub(crate) async fn refresh(&self, refresh_token: &str) -> Result<TokenResponse, AuthError> {
        let url = format!("{}/v1/token?key={}", self.secure_token, self.api_key);

        let response = match self
            .http_client
            .post(&url)
            .json(&serde_json::json!({
                "grant_type": "refresh_token",
                "refresh_token": refresh_token
            }))
            .send()
            .await
        {
            Err(e) => return Err(AuthError::NetworkRequestFailed(format!("Token refresh failed: {}", e))),
            Ok(resp) => resp,
        };
        Self::parse(response).await
    }

    #[cfg(test)]
    pub(crate) fn identity_toolkit(&self) -> &str {
        &self.identity_toolkit
    }

    async fn parse<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, AuthError> {
        // Handle error responses first
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let text = response.text().await.unwrap_or_default();
            let error_code = serde_json::from_str::<serde_json::Value>(&text)
                .ok()
                .and_then(|body| body["error"]["message"].as_str().map(str::to_string));
            return Err(match error_code {
                Some(code) => AuthError::from_error_code(&code),
                // Proxies and outages answer with plain text
                None => AuthError::from_http_status(status, text.trim()),
            });
        }

        match response.json::<T>().await {
            Err(e) => Err(AuthError::NetworkRequestFailed(format!("Failed to parse response: {}", e))),
            Ok(body) => Ok(body),
        }
    }
}
