//! Firebase Authentication
//!
//! One Auth instance per App. Sign-in flows are forwarded to the Identity
//! Toolkit REST API; the instance keeps the signed-in user, the tenant and
//! language settings, and a per-tenant password policy cache.

use crate::app::{App, AUTH_COMPONENT};
use crate::auth::endpoint::AuthEndpoint;
use crate::auth::password_policy::{
    PasswordPolicy, PasswordPolicyCache, PasswordPolicyResponse, PasswordValidationStatus,
};
use crate::auth::types::{expiration_from, AdditionalUserInfo, AuthResult, Credential, User, UserInfo, UserMetadata};
use crate::error::{AuthError, FirebaseError};
use async_stream::stream;
use futures::Stream;
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info, warn};

/// Firebase Authentication instance
///
/// Each App has at most one Auth instance (singleton pattern).
/// Use `Auth::get_auth(&app)` to obtain or create an instance.
#[derive(Clone)]
pub struct Auth {
    inner: Arc<AuthInner>,
}

pub(crate) struct AuthInner {
    app_name: String,
    endpoint: RwLock<AuthEndpoint>,
    emulator: RwLock<Option<String>>,
    tenant_id: RwLock<Option<String>>,
    language_code: RwLock<Option<String>>,
    current_user: RwLock<Option<Arc<User>>>,
    password_policies: RwLock<PasswordPolicyCache>,
    state_tx: broadcast::Sender<Option<Arc<User>>>,
    token_tx: broadcast::Sender<Option<Arc<User>>>,
}

impl Auth {
    /// Get or create the Auth instance for the given App
    ///
    /// Returns existing Auth if one exists for this App, otherwise creates new.
    ///
    /// # Example
    /// ```no_run
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// use firebase_client_sdk::{App, AppOptions, Auth};
    ///
    /// let app = App::create(AppOptions::new("YOUR_API_KEY", "your-project")).await?;
    /// let auth = Auth::get_auth(&app).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn get_auth(app: &App) -> Result<Self, FirebaseError> {
        let api_key = app.options().api_key.clone();
        let http_client = app.http_client().clone();
        let app_name = app.name().to_string();

        let inner = app
            .component(AUTH_COMPONENT, move || {
                // Create broadcast channel for auth state changes (capacity: 16)
                let (state_tx, _) = broadcast::channel(16);
                let (token_tx, _) = broadcast::channel(16);
                Ok(AuthInner {
                    app_name,
                    endpoint: RwLock::new(AuthEndpoint::new(api_key, http_client)),
                    emulator: RwLock::new(None),
                    tenant_id: RwLock::new(None),
                    language_code: RwLock::new(None),
                    current_user: RwLock::new(None),
                    password_policies: RwLock::new(PasswordPolicyCache::default()),
                    state_tx,
                    token_tx,
                })
            })
            .await?;

        Ok(Self { inner })
    }

    pub(crate) fn from_inner(inner: Arc<AuthInner>) -> Self {
        Self { inner }
    }

    /// Name of the App this instance belongs to
    pub fn app_name(&self) -> &str {
        &self.inner.app_name
    }

    /// Get the current signed-in user
    ///
    /// Returns None if no user is currently signed in.
    pub async fn current_user(&self) -> Option<Arc<User>> {
        self.inner.current_user.read().await.clone()
    }

    /// Sign out the current user
    ///
    /// Always succeeds and clears the current user.
    pub async fn sign_out(&self) -> Result<(), FirebaseError> {
        self.set_current_user(None).await;
        Ok(())
    }

    /// Route all requests of this instance to the Auth emulator
    ///
    /// `url` is the emulator origin, e.g. `http://127.0.0.1:9099`.
    pub async fn use_emulator(&self, url: impl AsRef<str>) -> Result<(), FirebaseError> {
        let url = url.as_ref();

        // Error-first: need a full origin
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(FirebaseError::invalid_argument(
                "use_emulator(url) expected a URL starting with http:// or https://",
            ));
        }
        let origin = url.trim_end_matches('/').to_string();

        let mut endpoint = self.inner.endpoint.write().await;
        *endpoint = endpoint.emulated(&origin);
        *self.inner.emulator.write().await = Some(origin.clone());
        info!(app = %self.inner.app_name, emulator = %origin, "auth using emulator");
        Ok(())
    }

    /// Emulator origin set by `use_emulator`, if any
    pub async fn emulator_config(&self) -> Option<String> {
        self.inner.emulator.read().await.clone()
    }

    /// Tenant used for sign-in and password policy lookups
    pub async fn tenant_id(&self) -> Option<String> {
        self.inner.tenant_id.read().await.clone()
    }

    /// Set the tenant, or `None` for project-level users
    pub async fn set_tenant_id(&self, tenant_id: Option<String>) -> Result<(), FirebaseError> {
        // Error-first: an empty string is not a tenant
        if tenant_id.as_deref() == Some("") {
            return Err(AuthError::InvalidTenantId.into());
        }
        *self.inner.tenant_id.write().await = tenant_id;
        Ok(())
    }

    /// Language used for emails and SMS sent by the backend
    pub async fn language_code(&self) -> Option<String> {
        self.inner.language_code.read().await.clone()
    }

    /// Set the language code, `None` restores the project default
    pub async fn set_language_code(&self, language_code: Option<String>) {
        let mut endpoint = self.inner.endpoint.write().await;
        *endpoint = endpoint.with_locale(language_code.clone());
        *self.inner.language_code.write().await = language_code;
    }

    /// Get the API key for this Auth instance
    pub async fn api_key(&self) -> String {
        self.inner.endpoint.read().await.api_key().to_string()
    }

    /// Internal: Set current user
    pub(crate) async fn set_current_user(&self, user: Option<Arc<User>>) {
        let mut current = self.inner.current_user.write().await;
        *current = user.clone();

        // Broadcast state change (ignore error if no listeners)
        let _ = self.inner.state_tx.send(user.clone());
        let _ = self.inner.token_tx.send(user);
    }

    /// Internal: ID token of the current user, refreshed and stored if stale
    pub(crate) async fn current_id_token(&self) -> Result<Option<String>, FirebaseError> {
        let Some(user) = self.current_user().await else {
            return Ok(None);
        };
        if !user.token_needs_refresh() {
            return Ok(user.id_token.clone());
        }

        let refreshed = Arc::new(user.refreshed().await?);
        let token = refreshed.id_token.clone();
        let mut current = self.inner.current_user.write().await;
        // Only replace if the same user is still signed in
        if current.as_ref().map(|u| u.uid == refreshed.uid).unwrap_or(false) {
            *current = Some(Arc::clone(&refreshed));
            let _ = self.inner.token_tx.send(Some(refreshed));
        }
        Ok(token)
    }

    /// Subscribe to authentication state changes
    ///
    /// Returns a stream that yields the current user whenever:
    /// - A user signs in
    /// - A user signs out
    /// - The current user changes
    ///
    /// The stream immediately yields the current user state upon subscription.
    ///
    /// # Example
    /// ```no_run
    /// # async fn example(auth: firebase_client_sdk::Auth) -> Result<(), Box<dyn std::error::Error>> {
    /// use futures::StreamExt;
    ///
    /// let mut stream = auth.auth_state_changes().await;
    ///
    /// while let Some(user) = stream.next().await {
    ///     match user {
    ///         Some(u) => println!("User signed in: {}", u.uid),
    ///         None => println!("User signed out"),
    ///     }
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub async fn auth_state_changes(&self) -> std::pin::Pin<Box<dyn Stream<Item = Option<Arc<User>>> + Send>> {
        // Get current user immediately
        let initial_user = self.current_user().await;

        // Subscribe to state changes
        let mut rx = self.inner.state_tx.subscribe();

        Box::pin(stream! {
            // Yield initial state first
            yield initial_user;

            // Then yield all future state changes
            loop {
                let user = match rx.recv().await {
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(_) => break, // Channel closed
                    Ok(u) => u,
                };
                yield user;
            }
        })
    }

    /// Subscribe to ID token changes
    ///
    /// Like [`auth_state_changes`](Self::auth_state_changes), and also
    /// yields the user again whenever their ID token is refreshed.
    pub async fn id_token_changes(&self) -> std::pin::Pin<Box<dyn Stream<Item = Option<Arc<User>>> + Send>> {
        let initial_user = self.current_user().await;
        let mut rx = self.inner.token_tx.subscribe();

        Box::pin(stream! {
            yield initial_user;
            loop {
                match rx.recv().await {
                    Ok(user) => yield user,
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(_) => break,
                }
            }
        })
    }

    /// Sign in with email and password
    ///
    /// # Example
    /// ```no_run
    /// # async fn example(auth: firebase_client_sdk::Auth) -> Result<(), Box<dyn std::error::Error>> {
    /// let result = auth.sign_in_with_email_and_password("user@example.com", "password").await?;
    /// println!("Signed in: {}", result.user.uid);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn sign_in_with_email_and_password(
        &self,
        email: impl AsRef<str>,
        password: impl AsRef<str>,
    ) -> Result<AuthResult, FirebaseError> {
        let email = email.as_ref();
        let password = password.as_ref();

        // Validate email (error case first)
        if email.is_empty() {
            return Err(AuthError::InvalidEmail.into());
        }

        // Validate password (error case first)
        if password.is_empty() {
            return Err(AuthError::InvalidPassword.into());
        }

        let body = self
            .request_body(serde_json::json!({
                "email": email,
                "password": password,
                "returnSecureToken": true
            }))
            .await;
        let response = self.password_request("signInWithPassword", &body).await?;

        self.finish_sign_in(response, "password", false).await
    }

    /// Create new user with email and password
    ///
    /// If the project enforces a password policy and the backend rejects the
    /// password, a cached policy is refreshed before the error is returned.
    ///
    /// # Example
    /// ```no_run
    /// # async fn example(auth: firebase_client_sdk::Auth) -> Result<(), Box<dyn std::error::Error>> {
    /// let result = auth.create_user_with_email_and_password("newuser@example.com", "password123").await?;
    /// println!("Created user: {}", result.user.uid);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn create_user_with_email_and_password(
        &self,
        email: impl AsRef<str>,
        password: impl AsRef<str>,
    ) -> Result<AuthResult, FirebaseError> {
        let email = email.as_ref();
        let password = password.as_ref();

        // Validate email (error case first)
        if email.is_empty() {
            return Err(AuthError::InvalidEmail.into());
        }

        // Validate password (error case first)
        if password.is_empty() {
            return Err(AuthError::InvalidPassword.into());
        }

        let body = self
            .request_body(serde_json::json!({
                "email": email,
                "password": password,
                "returnSecureToken": true
            }))
            .await;
        let response = self.password_request("signUp", &body).await?;

        self.finish_sign_in(response, "password", true).await
    }

    /// Sign in anonymously
    ///
    /// Creates an anonymous user account. Anonymous accounts are temporary and can be
    /// linked to permanent accounts later.
    pub async fn sign_in_anonymously(&self) -> Result<AuthResult, FirebaseError> {
        // signUp with no email/password creates anonymous user
        let body = self.request_body(serde_json::json!({ "returnSecureToken": true })).await;
        let endpoint = self.endpoint().await;
        let response: SignInResponse = endpoint.accounts("signUp", &body).await?;

        self.finish_sign_in(response, "anonymous", true).await
    }

    /// Sign in with a credential
    ///
    /// Email/password credentials go through `signInWithPassword`, OAuth
    /// provider credentials through `signInWithIdp`.
    ///
    /// # Example
    /// ```no_run
    /// # async fn example(auth: firebase_client_sdk::Auth) -> Result<(), Box<dyn std::error::Error>> {
    /// use firebase_client_sdk::auth::types::Credential;
    ///
    /// // Google Sign-In
    /// let credential = Credential::Google {
    ///     id_token: Some("google_id_token".to_string()),
    ///     access_token: Some("google_access_token".to_string()),
    /// };
    /// let result = auth.sign_in_with_credential(credential).await?;
    /// println!("Signed in: {}", result.user.uid);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn sign_in_with_credential(&self, credential: Credential) -> Result<AuthResult, FirebaseError> {
        let (provider_id, id_token, access_token, raw_nonce) = match credential {
            Credential::EmailPassword { email, password } => {
                return self.sign_in_with_email_and_password(email, password).await;
            }
            // Error-first: unsupported credential types
            Credential::Anonymous => {
                return Err(FirebaseError::Auth(AuthError::InvalidCredential(
                    "Use sign_in_anonymously() for anonymous auth".to_string(),
                )));
            }
            Credential::CustomToken { .. } => {
                return Err(FirebaseError::Auth(AuthError::InvalidCredential(
                    "Use sign_in_with_custom_token() for custom token auth".to_string(),
                )));
            }
            // OAuth providers
            Credential::Google { id_token, access_token } => {
                // Error-first: validate at least one token provided
                if id_token.is_none() && access_token.is_none() {
                    return Err(FirebaseError::Auth(AuthError::InvalidCredential(
                        "Google credential requires id_token or access_token".to_string(),
                    )));
                }
                ("google.com".to_string(), id_token, access_token, None)
            }
            Credential::Facebook { access_token } => ("facebook.com".to_string(), None, Some(access_token), None),
            Credential::GitHub { token } => ("github.com".to_string(), None, Some(token), None),
            Credential::OAuth {
                provider_id,
                id_token,
                access_token,
                raw_nonce,
            } => {
                // Error-first: validate at least one token provided
                if id_token.is_none() && access_token.is_none() {
                    return Err(FirebaseError::Auth(AuthError::InvalidCredential(
                        "OAuth credential requires id_token or access_token".to_string(),
                    )));
                }
                (provider_id, id_token, access_token, raw_nonce)
            }
        };

        let mut post_body = url::form_urlencoded::Serializer::new(String::new());
        post_body.append_pair("providerId", &provider_id);
        if let Some(id_token) = &id_token {
            post_body.append_pair("id_token", id_token);
        }
        if let Some(access_token) = &access_token {
            post_body.append_pair("access_token", access_token);
        }
        if let Some(nonce) = &raw_nonce {
            post_body.append_pair("nonce", nonce);
        }

        let body = self
            .request_body(serde_json::json!({
                "postBody": post_body.finish(),
                "requestUri": "http://localhost",
                "returnSecureToken": true,
                "returnIdpCredential": true
            }))
            .await;
        let endpoint = self.endpoint().await;
        let response: SignInResponse = endpoint.accounts("signInWithIdp", &body).await?;
        let is_new_user = response.is_new_user.unwrap_or(false);

        self.finish_sign_in(response, &provider_id, is_new_user).await
    }

    /// Sign in with custom token
    ///
    /// Signs in using a custom token generated by your own server. This is useful for
    /// integrating with existing authentication systems or for server-side authentication.
    pub async fn sign_in_with_custom_token(&self, token: &str) -> Result<AuthResult, FirebaseError> {
        // Error-first: validate token
        if token.is_empty() {
            return Err(AuthError::InvalidCredential("Custom token cannot be empty".to_string()).into());
        }

        let body = self
            .request_body(serde_json::json!({
                "token": token,
                "returnSecureToken": true
            }))
            .await;
        let endpoint = self.endpoint().await;
        let response: SignInResponse = endpoint.accounts("signInWithCustomToken", &body).await?;
        let is_new_user = response.is_new_user.unwrap_or(false);

        self.finish_sign_in(response, "custom", is_new_user).await
    }

    /// Send password reset email
    ///
    /// Sends a password reset email to the given email address. If the email is not
    /// registered, the operation still succeeds to prevent email enumeration.
    pub async fn send_password_reset_email(&self, email: impl AsRef<str>) -> Result<(), FirebaseError> {
        let email = email.as_ref();

        // Validate email (error case first)
        if email.is_empty() {
            return Err(AuthError::InvalidEmail.into());
        }

        let body = self
            .request_body(serde_json::json!({
                "requestType": "PASSWORD_RESET",
                "email": email
            }))
            .await;
        let endpoint = self.endpoint().await;
        endpoint.accounts::<serde_json::Value>("sendOobCode", &body).await?;
        Ok(())
    }

    /// Check a password reset code and return the account's email
    pub async fn verify_password_reset_code(&self, code: impl AsRef<str>) -> Result<String, FirebaseError> {
        let code = code.as_ref();

        // Error-first: validate code
        if code.is_empty() {
            return Err(AuthError::InvalidActionCode.into());
        }

        let body = self.request_body(serde_json::json!({ "oobCode": code })).await;
        let endpoint = self.endpoint().await;
        let response: serde_json::Value = endpoint.accounts("resetPassword", &body).await?;
        Ok(response["email"].as_str().unwrap_or_default().to_string())
    }

    /// Complete a password reset with the code from the reset email
    pub async fn confirm_password_reset(
        &self,
        code: impl AsRef<str>,
        new_password: impl AsRef<str>,
    ) -> Result<(), FirebaseError> {
        let code = code.as_ref();
        let new_password = new_password.as_ref();

        // Error-first: validate arguments
        if code.is_empty() {
            return Err(AuthError::InvalidActionCode.into());
        }
        if new_password.is_empty() {
            return Err(AuthError::InvalidPassword.into());
        }

        let body = self
            .request_body(serde_json::json!({
                "oobCode": code,
                "newPassword": new_password
            }))
            .await;
        self.password_request::<serde_json::Value>("resetPassword", &body).await?;
        Ok(())
    }

    /// Apply an email action code (e.g. email verification)
    pub async fn apply_action_code(&self, code: impl AsRef<str>) -> Result<(), FirebaseError> {
        let code = code.as_ref();

        // Error-first: validate code
        if code.is_empty() {
            return Err(AuthError::InvalidActionCode.into());
        }

        let body = self.request_body(serde_json::json!({ "oobCode": code })).await;
        let endpoint = self.endpoint().await;
        endpoint.accounts::<serde_json::Value>("update", &body).await?;
        Ok(())
    }

    /// Sign-in methods registered for an email address
    ///
    /// Returns an empty list when the project has email enumeration
    /// protection enabled.
    pub async fn fetch_sign_in_methods_for_email(&self, email: impl AsRef<str>) -> Result<Vec<String>, FirebaseError> {
        let email = email.as_ref();

        // Validate email (error case first)
        if email.is_empty() {
            return Err(AuthError::InvalidEmail.into());
        }

        let body = self
            .request_body(serde_json::json!({
                "identifier": email,
                "continueUri": "http://localhost"
            }))
            .await;
        let endpoint = self.endpoint().await;
        let response: CreateAuthUriResponse = endpoint.accounts("createAuthUri", &body).await?;
        Ok(response.signin_methods)
    }

    /// Cached password policy for the current tenant (project policy when no tenant)
    ///
    /// Has no side effects; `None` until a policy was fetched.
    pub async fn password_policy_internal(&self) -> Option<Arc<PasswordPolicy>> {
        let tenant_id = self.tenant_id().await;
        self.inner.password_policies.read().await.get(tenant_id.as_deref())
    }

    /// Fetch the password policy for the current tenant and overwrite its cache slot
    pub async fn update_password_policy(&self) -> Result<Arc<PasswordPolicy>, FirebaseError> {
        let tenant_id = self.tenant_id().await;
        let endpoint = self.endpoint().await;

        let response: PasswordPolicyResponse = endpoint.password_policy(tenant_id.as_deref()).await?;
        let policy = Arc::new(PasswordPolicy::from_response(response));
        debug!(tenant_id = ?tenant_id, schema_version = policy.schema_version, "cached password policy");

        self.inner
            .password_policies
            .write()
            .await
            .insert(tenant_id, Arc::clone(&policy));
        Ok(policy)
    }

    /// Refresh the current tenant's policy only if one is already cached
    pub async fn recache_password_policy(&self) -> Result<(), FirebaseError> {
        if self.password_policy_internal().await.is_some() {
            self.update_password_policy().await?;
        }
        Ok(())
    }

    /// Validate a password against the current tenant's password policy
    ///
    /// Fetches the policy on first use and serves later calls from the cache.
    /// Fails with `auth/unsupported-password-policy-schema-version` when the
    /// backend returns a schema this SDK cannot evaluate.
    ///
    /// # Example
    /// ```no_run
    /// # async fn example(auth: firebase_client_sdk::Auth) -> Result<(), Box<dyn std::error::Error>> {
    /// let status = auth.validate_password("password1").await?;
    /// if !status.is_valid {
    ///     println!("uppercase letter present: {:?}", status.contains_uppercase_letter);
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub async fn validate_password(&self, password: impl AsRef<str>) -> Result<PasswordValidationStatus, FirebaseError> {
        let policy = match self.password_policy_internal().await {
            Some(policy) => policy,
            None => self.update_password_policy().await?,
        };
        Ok(policy.validate_password(password.as_ref())?)
    }

    pub(crate) async fn endpoint(&self) -> AuthEndpoint {
        self.inner.endpoint.read().await.clone()
    }

    /// Add the tenant to a request body when one is set
    pub(crate) async fn request_body(&self, mut body: serde_json::Value) -> serde_json::Value {
        if let Some(tenant_id) = self.tenant_id().await {
            body["tenantId"] = serde_json::json!(tenant_id);
        }
        body
    }

    /// Request that can be rejected by the password policy
    async fn password_request<T: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        body: &serde_json::Value,
    ) -> Result<T, FirebaseError> {
        let endpoint = self.endpoint().await;
        match endpoint.accounts(method, body).await {
            Ok(response) => Ok(response),
            Err(err @ AuthError::PasswordDoesNotMeetRequirements(_)) => {
                // Cached policy is stale
                if let Err(recache_err) = self.recache_password_policy().await {
                    warn!(error = %recache_err, "failed to refresh password policy");
                }
                Err(err.into())
            }
            Err(err) => Err(err.into()),
        }
    }

    pub(crate) async fn finish_sign_in(
        &self,
        response: SignInResponse,
        provider_id: &str,
        is_new_user: bool,
    ) -> Result<AuthResult, FirebaseError> {
        let endpoint = self.endpoint().await;
        let tenant_id = self.tenant_id().await;
        let profile = response.raw_user_info.as_deref().and_then(|raw| serde_json::from_str(raw).ok());
        let user = Arc::new(response.into_user(endpoint, tenant_id, provider_id));

        info!(app = %self.inner.app_name, provider = provider_id, "user signed in");
        // Update current user
        self.set_current_user(Some(Arc::clone(&user))).await;

        Ok(AuthResult {
            user,
            additional_user_info: Some(AdditionalUserInfo {
                provider_id: provider_id.to_string(),
                is_new_user,
                profile,
            }),
        })
    }
}

/// Firebase Auth REST API sign-in response
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SignInResponse {
    local_id: String,
    email: Option<String>,
    display_name: Option<String>,
    photo_url: Option<String>,
    email_verified: Option<bool>,
    id_token: String,
    refresh_token: String,
    expires_in: Option<String>,
    pub(crate) is_new_user: Option<bool>,
    raw_user_info: Option<String>,
    federated_id: Option<String>,
}

impl SignInResponse {
    fn into_user(self, endpoint: AuthEndpoint, tenant_id: Option<String>, provider_id: &str) -> User {
        let now = chrono::Utc::now().timestamp_millis();
        let is_anonymous = provider_id == "anonymous";
        let provider_data = if is_anonymous {
            vec![]
        } else {
            vec![UserInfo {
                uid: self.federated_id.clone().unwrap_or_else(|| self.local_id.clone()),
                display_name: self.display_name.clone(),
                email: self.email.clone(),
                phone_number: None,
                photo_url: self.photo_url.clone(),
                provider_id: provider_id.to_string(),
            }]
        };

        User {
            uid: self.local_id,
            email: self.email,
            display_name: self.display_name,
            photo_url: self.photo_url,
            phone_number: None,
            email_verified: self.email_verified.unwrap_or(false),
            is_anonymous,
            tenant_id,
            metadata: UserMetadata {
                creation_timestamp: now,
                last_sign_in_timestamp: now,
            },
            provider_data,
            id_token: Some(self.id_token),
            refresh_token: Some(self.refresh_token),
            token_expiration: Some(expiration_from(self.expires_in.as_deref())),
            endpoint: Some(endpoint),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateAuthUriResponse {
    #[serde(default)]
    signin_methods: Vec<String>,
}

impl std::fmt::Debug for Auth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Auth")
            .field("app", &self.inner.app_name)
            .field("api_key", &"<redacted>")
            .finish()
    }
}
