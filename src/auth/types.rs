//! Authentication types

use crate::auth::endpoint::AuthEndpoint;
use crate::error::AuthError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Seconds before expiry at which an ID token is considered stale
const TOKEN_REFRESH_MARGIN_SECS: i64 = 300;

/// User metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserMetadata {
    /// Timestamp when user was created (Unix timestamp in milliseconds)
    pub creation_timestamp: i64,

    /// Timestamp of last sign-in (Unix timestamp in milliseconds)
    pub last_sign_in_timestamp: i64,
}

/// User information returned from identity provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserInfo {
    /// User ID from the provider
    pub uid: String,

    /// Display name
    pub display_name: Option<String>,

    /// Email address
    pub email: Option<String>,

    /// Phone number
    pub phone_number: Option<String>,

    /// Photo URL
    pub photo_url: Option<String>,

    /// Provider ID (e.g., "password", "google.com")
    pub provider_id: String,
}

/// Authentication credential
#[derive(Debug, Clone)]
pub enum Credential {
    /// Email and password credential
    EmailPassword {
        /// Email address
        email: String,
        /// Password
        password: String,
    },

    /// Google OAuth credential
    Google {
        /// Google Sign-In ID token
        id_token: Option<String>,
        /// Google Sign-In access token
        access_token: Option<String>,
    },

    /// Facebook OAuth credential
    Facebook {
        /// Facebook access token
        access_token: String,
    },

    /// GitHub OAuth credential
    GitHub {
        /// GitHub OAuth access token
        token: String,
    },

    /// Generic OAuth2 credential
    OAuth {
        /// Provider ID (e.g., "apple.com", "microsoft.com")
        provider_id: String,
        /// ID token (OIDC)
        id_token: Option<String>,
        /// Access token
        access_token: Option<String>,
        /// Raw nonce
        raw_nonce: Option<String>,
    },

    /// Anonymous credential
    Anonymous,

    /// Custom token credential
    CustomToken {
        /// Custom JWT token
        token: String,
    },
}

impl Credential {
    /// Get the provider ID for this credential
    pub fn provider_id(&self) -> &str {
        match self {
            Credential::EmailPassword { .. } => "password",
            Credential::Google { .. } => "google.com",
            Credential::Facebook { .. } => "facebook.com",
            Credential::GitHub { .. } => "github.com",
            Credential::OAuth { provider_id, .. } => provider_id,
            Credential::Anonymous => "anonymous",
            Credential::CustomToken { .. } => "custom",
        }
    }
}

/// Firebase user account
///
/// Represents a user account in Firebase Auth. Use `Arc<User>` for shared ownership.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Unique Firebase user ID
    pub uid: String,

    /// Email address (if available)
    pub email: Option<String>,

    /// Display name (if available)
    pub display_name: Option<String>,

    /// Photo URL (if available)
    pub photo_url: Option<String>,

    /// Phone number (if available)
    pub phone_number: Option<String>,

    /// Whether email is verified
    pub email_verified: bool,

    /// Whether user is anonymous
    pub is_anonymous: bool,

    /// Tenant the user belongs to, `None` for project users
    pub tenant_id: Option<String>,

    /// User metadata
    pub metadata: UserMetadata,

    /// Provider data for this user
    pub provider_data: Vec<UserInfo>,

    /// ID token (JWT) - internal use
    #[serde(skip)]
    pub(crate) id_token: Option<String>,

    /// Refresh token - internal use
    #[serde(skip)]
    pub(crate) refresh_token: Option<String>,

    /// Token expiration timestamp (seconds since epoch) - internal use
    #[serde(skip)]
    pub(crate) token_expiration: Option<i64>,

    /// Endpoint the user was signed in through - internal use
    #[serde(skip)]
    pub(crate) endpoint: Option<AuthEndpoint>,
}

impl User {
    /// Get the current ID token
    ///
    /// Refreshes through the secure token service when `force_refresh` is set
    /// or the token expires within five minutes. The refreshed token is
    /// returned but not stored; `Auth` stores it for its current user.
    pub async fn get_id_token(&self, force_refresh: bool) -> Result<String, AuthError> {
        // Check if we have a token (error case first)
        let Some(token) = &self.id_token else {
            return Err(AuthError::UserTokenExpired);
        };

        // If no refresh needed, return current token
        if !force_refresh && !self.token_needs_refresh() {
            return Ok(token.clone());
        }

        Ok(self.refreshed().await?.id_token.unwrap_or_default())
    }

    /// Internal: whether the ID token is missing or about to expire
    pub(crate) fn token_needs_refresh(&self) -> bool {
        if self.id_token.is_none() {
            return true;
        }
        match self.token_expiration {
            Some(expiration) => chrono::Utc::now().timestamp() >= expiration - TOKEN_REFRESH_MARGIN_SECS,
            // No expiration info, assume token is fresh
            None => false,
        }
    }

    /// Internal: copy of this user carrying freshly issued tokens
    pub(crate) async fn refreshed(&self) -> Result<User, AuthError> {
        // Need refresh token (error case first)
        let Some(refresh_token) = &self.refresh_token else {
            return Err(AuthError::UserTokenExpired);
        };
        let endpoint = self.endpoint()?;

        let tokens = endpoint.refresh(refresh_token).await?;
        let mut user = self.clone();
        user.token_expiration = Some(expiration_from(tokens.expires_in.as_deref()));
        user.id_token = Some(tokens.id_token);
        user.refresh_token = Some(tokens.refresh_token);
        Ok(user)
    }

    /// Delete the user account
    ///
    /// After successful deletion, the user should sign out. This method only
    /// deletes the account on the server. The caller should call Auth::sign_out() afterward.
    pub async fn delete(&self) -> Result<(), AuthError> {
        // Need ID token (error case first)
        let id_token = self.get_id_token(false).await?;
        let endpoint = self.endpoint()?;

        endpoint
            .accounts::<serde_json::Value>("delete", &serde_json::json!({ "idToken": id_token }))
            .await?;
        Ok(())
    }

    /// Reload user data from server
    ///
    /// Refreshes the user's profile data from the server. This updates the user's
    /// display name, email, photo URL, phone number and email verification status.
    pub async fn reload(&mut self) -> Result<(), AuthError> {
        // Error-first: validate ID token
        let Some(ref id_token) = self.id_token else {
            return Err(AuthError::NoSignedInUser);
        };
        let endpoint = self.endpoint()?;

        let response_data: serde_json::Value = endpoint
            .accounts("lookup", &serde_json::json!({ "idToken": id_token }))
            .await?;

        // Error-first: validate response structure
        let Some(users) = response_data["users"].as_array() else {
            return Err(AuthError::NetworkRequestFailed("Invalid response structure".to_string()));
        };

        let Some(user_data) = users.first() else {
            return Err(AuthError::UserNotFound);
        };

        // Update user fields from server response
        if let Some(display_name) = user_data["displayName"].as_str() {
            self.display_name = Some(display_name.to_string());
        }
        if let Some(photo_url) = user_data["photoUrl"].as_str() {
            self.photo_url = Some(photo_url.to_string());
        }
        if let Some(email) = user_data["email"].as_str() {
            self.email = Some(email.to_string());
        }
        if let Some(phone_number) = user_data["phoneNumber"].as_str() {
            self.phone_number = Some(phone_number.to_string());
        }
        if let Some(email_verified) = user_data["emailVerified"].as_bool() {
            self.email_verified = email_verified;
        }
        if let Some(providers) = user_data["providerUserInfo"].as_array() {
            self.provider_data = providers.iter().map(provider_info).collect();
        }
        if let Some(created) = user_data["createdAt"].as_str().and_then(|s| s.parse().ok()) {
            self.metadata.creation_timestamp = created;
        }
        if let Some(last_login) = user_data["lastLoginAt"].as_str().and_then(|s| s.parse().ok()) {
            self.metadata.last_sign_in_timestamp = last_login;
        }

        Ok(())
    }

    /// Send email verification
    ///
    /// Sends a verification email to the user's email address. The email contains
    /// a link that the user can click to verify their email address.
    pub async fn send_email_verification(&self) -> Result<(), AuthError> {
        // Error-first: validate ID token
        let Some(ref id_token) = self.id_token else {
            return Err(AuthError::NoSignedInUser);
        };
        let endpoint = self.endpoint()?;

        endpoint
            .accounts::<serde_json::Value>(
                "sendOobCode",
                &serde_json::json!({
                    "requestType": "VERIFY_EMAIL",
                    "idToken": id_token
                }),
            )
            .await?;
        Ok(())
    }

    /// Update email address
    pub async fn update_email(&self, new_email: impl AsRef<str>) -> Result<(), AuthError> {
        let new_email = new_email.as_ref();

        // Validate email (error case first)
        if new_email.is_empty() || !new_email.contains('@') {
            return Err(AuthError::InvalidEmail);
        }

        self.update_account(serde_json::json!({
            "email": new_email,
            "returnSecureToken": true
        }))
        .await
    }

    /// Update password
    pub async fn update_password(&self, new_password: impl AsRef<str>) -> Result<(), AuthError> {
        let new_password = new_password.as_ref();

        // Validate password (error case first)
        if new_password.is_empty() {
            return Err(AuthError::InvalidPassword);
        }

        self.update_account(serde_json::json!({
            "password": new_password,
            "returnSecureToken": false
        }))
        .await
    }

    /// Update user profile
    ///
    /// Updates the user's display name and/or photo URL.
    /// Pass None for fields you don't want to change.
    ///
    /// # Errors
    /// Returns `AuthError` if:
    /// - User has no ID token (not authenticated)
    /// - Network request fails
    ///
    /// # Example
    /// ```no_run
    /// # async fn example(user: firebase_client_sdk::User) -> Result<(), Box<dyn std::error::Error>> {
    /// use firebase_client_sdk::auth::types::UserProfile;
    ///
    /// let profile = UserProfile {
    ///     display_name: Some("Alice Smith".to_string()),
    ///     photo_url: Some("https://example.com/photo.jpg".to_string()),
    /// };
    /// user.update_profile(profile).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn update_profile(&self, profile: UserProfile) -> Result<(), AuthError> {
        // Build request body - only include fields that are provided
        let mut request_body = serde_json::json!({ "returnSecureToken": true });

        if let Some(display_name) = profile.display_name {
            request_body["displayName"] = serde_json::json!(display_name);
        }

        if let Some(photo_url) = profile.photo_url {
            request_body["photoUrl"] = serde_json::json!(photo_url);
        }

        self.update_account(request_body).await
    }

    async fn update_account(&self, mut body: serde_json::Value) -> Result<(), AuthError> {
        // Get fresh ID token (error case first)
        let id_token = self.get_id_token(false).await?;
        let endpoint = self.endpoint()?;

        body["idToken"] = serde_json::json!(id_token);
        endpoint.accounts::<serde_json::Value>("update", &body).await?;
        Ok(())
    }

    fn endpoint(&self) -> Result<&AuthEndpoint, AuthError> {
        self.endpoint.as_ref().ok_or(AuthError::NotAuthenticated)
    }
}

/// Absolute expiry (seconds since epoch) from a relative `expiresIn` string
pub(crate) fn expiration_from(expires_in: Option<&str>) -> i64 {
    // Default: 1 hour expiration
    let seconds = expires_in.and_then(|s| s.parse::<i64>().ok()).unwrap_or(3600);
    chrono::Utc::now().timestamp() + seconds
}

fn provider_info(raw: &serde_json::Value) -> UserInfo {
    let text = |key: &str| raw[key].as_str().map(str::to_string);
    UserInfo {
        uid: text("rawId").or_else(|| text("federatedId")).unwrap_or_default(),
        display_name: text("displayName"),
        email: text("email"),
        phone_number: text("phoneNumber"),
        photo_url: text("photoUrl"),
        provider_id: text("providerId").unwrap_or_default(),
    }
}

/// User profile update request
#[derive(Debug, Default, Clone)]
pub struct UserProfile {
    /// Display name to update (None = no change)
    pub display_name: Option<String>,

    /// Photo URL to update (None = no change)
    pub photo_url: Option<String>,
}

impl UserProfile {
    /// Create a new profile update with display name
    pub fn with_display_name(display_name: impl Into<String>) -> Self {
        Self {
            display_name: Some(display_name.into()),
            photo_url: None,
        }
    }

    /// Create a new profile update with photo URL
    pub fn with_photo_url(photo_url: impl Into<String>) -> Self {
        Self {
            display_name: None,
            photo_url: Some(photo_url.into()),
        }
    }

    /// Set display name
    pub fn display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// Set photo URL
    pub fn photo_url(mut self, url: impl Into<String>) -> Self {
        self.photo_url = Some(url.into());
        self
    }
}

/// Authentication result
///
/// Returned from sign-in operations.
#[derive(Debug, Clone)]
pub struct AuthResult {
    /// The signed-in user
    pub user: Arc<User>,

    /// Additional user info (if available)
    pub additional_user_info: Option<AdditionalUserInfo>,
}

/// Additional user information from sign-in
#[derive(Debug, Clone)]
pub struct AdditionalUserInfo {
    /// Provider ID
    pub provider_id: String,

    /// Whether this is a new user
    pub is_new_user: bool,

    /// Profile data from provider
    pub profile: Option<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn test_user(id_token: Option<&str>, endpoint: Option<AuthEndpoint>) -> User {
        User {
            uid: "test123".to_string(),
            email: Some("test@example.com".to_string()),
            display_name: None,
            photo_url: None,
            phone_number: None,
            email_verified: false,
            is_anonymous: false,
            tenant_id: None,
            metadata: UserMetadata {
                creation_timestamp: 1234567890,
                last_sign_in_timestamp: 1234567890,
            },
            provider_data: vec![],
            id_token: id_token.map(str::to_string),
            refresh_token: Some("refresh".to_string()),
            token_expiration: Some(chrono::Utc::now().timestamp() + 3600),
            endpoint,
        }
    }

    fn mock_endpoint(server: &MockServer) -> AuthEndpoint {
        AuthEndpoint::new("test-api-key", reqwest::Client::new()).emulated(&server.base_url())
    }

    #[test]
    fn test_credential_email_password() {
        let cred = Credential::EmailPassword {
            email: "test@example.com".to_string(),
            password: "password123".to_string(),
        };

        match &cred {
            Credential::EmailPassword { email, password } => {
                assert_eq!(email, "test@example.com");
                assert_eq!(password, "password123");
            }
            _ => panic!("Expected EmailPassword credential"),
        }

        assert_eq!(cred.provider_id(), "password");
    }

    #[test]
    fn test_credential_provider_ids() {
        let google = Credential::Google {
            id_token: Some("id_token".to_string()),
            access_token: None,
        };
        assert_eq!(google.provider_id(), "google.com");
        assert_eq!(Credential::GitHub { token: "t".to_string() }.provider_id(), "github.com");
        assert_eq!(Credential::Anonymous.provider_id(), "anonymous");
    }

    #[test]
    fn test_user_profile_builder() {
        let profile = UserProfile::with_display_name("John Doe").photo_url("https://example.com/photo.jpg");

        assert_eq!(profile.display_name.as_deref(), Some("John Doe"));
        assert_eq!(profile.photo_url.as_deref(), Some("https://example.com/photo.jpg"));
    }

    #[test]
    fn test_user_serialization() {
        let user = test_user(Some("token"), None);

        // Test that serialization works (tokens are skipped)
        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("refresh"));
        assert!(!json.contains("\"token\""));
        assert!(json.contains("test123"));
    }

    #[test]
    fn test_token_needs_refresh() {
        let mut user = test_user(Some("token"), None);
        assert!(!user.token_needs_refresh());

        user.token_expiration = Some(chrono::Utc::now().timestamp() + 60);
        assert!(user.token_needs_refresh());

        user.token_expiration = None;
        assert!(!user.token_needs_refresh());
    }

    #[tokio::test]
    async fn test_update_email_validates_empty() {
        let user = test_user(Some("token"), None);

        let result = user.update_email("").await;
        assert!(matches!(result.unwrap_err(), AuthError::InvalidEmail));
    }

    #[tokio::test]
    async fn test_update_email_validates_format() {
        let user = test_user(Some("token"), None);

        // Test invalid email format (no @)
        let result = user.update_email("notanemail").await;
        assert!(matches!(result.unwrap_err(), AuthError::InvalidEmail));
    }

    #[tokio::test]
    async fn test_update_password_validates_empty() {
        let user = test_user(Some("token"), None);
        assert!(matches!(user.update_password("").await.unwrap_err(), AuthError::InvalidPassword));
    }

    #[tokio::test]
    async fn test_update_without_endpoint() {
        let user = test_user(Some("token"), None);
        let result = user.update_profile(UserProfile::with_display_name("x")).await;
        assert!(matches!(result.unwrap_err(), AuthError::NotAuthenticated));
    }

    #[tokio::test]
    async fn test_reload_requires_id_token() {
        let mut user = test_user(None, None);

        // Test that reload fails without ID token (error-first)
        let result = user.reload().await;
        assert!(matches!(result.unwrap_err(), AuthError::NoSignedInUser));
    }

    #[tokio::test]
    async fn test_send_email_verification_requires_id_token() {
        let user = test_user(None, None);

        let result = user.send_email_verification().await;
        assert!(matches!(result.unwrap_err(), AuthError::NoSignedInUser));
    }

    #[tokio::test]
    async fn test_reload_updates_fields() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/identitytoolkit.googleapis.com/v1/accounts:lookup")
                .query_param("key", "test-api-key")
                .json_body(serde_json::json!({ "idToken": "token" }));
            then.status(200).json_body(serde_json::json!({
                "users": [{
                    "localId": "test123",
                    "displayName": "Reloaded",
                    "emailVerified": true,
                    "createdAt": "1000",
                    "lastLoginAt": "2000",
                    "providerUserInfo": [{ "providerId": "password", "rawId": "test@example.com" }]
                }]
            }));
        });

        let mut user = test_user(Some("token"), Some(mock_endpoint(&server)));
        user.reload().await.unwrap();

        mock.assert();
        assert_eq!(user.display_name.as_deref(), Some("Reloaded"));
        assert!(user.email_verified);
        assert_eq!(user.metadata.creation_timestamp, 1000);
        assert_eq!(user.provider_data[0].provider_id, "password");
    }

    #[tokio::test]
    async fn test_update_profile_sends_fields() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/identitytoolkit.googleapis.com/v1/accounts:update")
                .json_body(serde_json::json!({
                    "idToken": "token",
                    "displayName": "Alice Smith",
                    "returnSecureToken": true
                }));
            then.status(200).json_body(serde_json::json!({ "localId": "test123" }));
        });

        let user = test_user(Some("token"), Some(mock_endpoint(&server)));
        user.update_profile(UserProfile::with_display_name("Alice Smith")).await.unwrap();
        mock.assert();
    }

    #[tokio::test]
    async fn test_force_refresh_uses_secure_token() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/securetoken.googleapis.com/v1/token")
                .query_param("key", "test-api-key");
            then.status(200).json_body(serde_json::json!({
                "id_token": "fresh-token",
                "refresh_token": "fresh-refresh",
                "expires_in": "3600"
            }));
        });

        let user = test_user(Some("token"), Some(mock_endpoint(&server)));
        assert_eq!(user.get_id_token(false).await.unwrap(), "token");
        assert_eq!(user.get_id_token(true).await.unwrap(), "fresh-token");
        mock.assert();
    }

    #[tokio::test]
    async fn test_delete_maps_backend_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/identitytoolkit.googleapis.com/v1/accounts:delete");
            then.status(400)
                .json_body(serde_json::json!({ "error": { "code": 400, "message": "CREDENTIAL_TOO_OLD_LOGIN_AGAIN" } }));
        });

        let user = test_user(Some("token"), Some(mock_endpoint(&server)));
        assert_eq!(user.delete().await.unwrap_err(), AuthError::RequiresRecentLogin);
    }
}
