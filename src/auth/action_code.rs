//! Email action codes and passwordless email-link sign-in

use crate::auth::auth::{Auth, SignInResponse};
use crate::auth::types::AuthResult;
use crate::error::{AuthError, FirebaseError};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Where the user lands after following an emailed link
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionCodeSettings {
    /// Continue URL; for sign-in links, the page that completes sign-in
    #[serde(rename = "continueUrl")]
    pub url: String,

    /// Open the link in the app instead of the hosted handler page
    #[serde(rename = "canHandleCodeInApp")]
    pub handle_code_in_app: bool,

    /// iOS app to open the link in
    #[serde(rename = "iOSBundleId", skip_serializing_if = "Option::is_none")]
    pub ios_bundle_id: Option<String>,

    /// Android app to open the link in
    #[serde(skip_serializing_if = "Option::is_none")]
    pub android_package_name: Option<String>,

    /// Offer to install the Android app when it is missing
    #[serde(skip_serializing_if = "Option::is_none")]
    pub android_install_app: Option<bool>,

    /// Minimum Android app version that can handle the link
    #[serde(skip_serializing_if = "Option::is_none")]
    pub android_minimum_version: Option<String>,

    /// Custom dynamic link domain
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dynamic_link_domain: Option<String>,
}

impl ActionCodeSettings {
    /// Settings that continue to `url` in a browser
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Handle the link inside the app
    pub fn handle_code_in_app(mut self, handle: bool) -> Self {
        self.handle_code_in_app = handle;
        self
    }
}

/// What an action code does
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionCodeOperation {
    /// Password reset
    PasswordReset,
    /// Email address verification
    VerifyEmail,
    /// Revert an email address change
    RecoverEmail,
    /// Passwordless sign-in
    EmailSignIn,
    /// Verify a new email address before switching to it
    VerifyAndChangeEmail,
    /// Operation this SDK does not know
    Error,
}

impl ActionCodeOperation {
    fn from_request_type(request_type: &str) -> Self {
        match request_type {
            "PASSWORD_RESET" => Self::PasswordReset,
            "VERIFY_EMAIL" => Self::VerifyEmail,
            "RECOVER_EMAIL" => Self::RecoverEmail,
            "EMAIL_SIGNIN" => Self::EmailSignIn,
            "VERIFY_AND_CHANGE_EMAIL" => Self::VerifyAndChangeEmail,
            _ => Self::Error,
        }
    }
}

/// Result of [`Auth::check_action_code`]
#[derive(Debug, Clone, PartialEq)]
pub struct ActionCodeInfo {
    /// Operation the code performs
    pub operation: ActionCodeOperation,
    /// Account email; the new address for an email change
    pub email: Option<String>,
    /// Previous address for email recovery and email changes
    pub from_email: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CheckCodeResponse {
    request_type: Option<String>,
    email: Option<String>,
    new_email: Option<String>,
}

/// The action link inside `link`, unwrapping dynamic-link wrappers
fn deep_link(link: &str) -> Option<url::Url> {
    let outer = url::Url::parse(link).ok()?;
    let param = |url: &url::Url, name: &str| {
        url.query_pairs()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.into_owned())
    };

    let mut candidates = Vec::new();
    if let Some(ios) = param(&outer, "deep_link_id") {
        if let Some(nested) = url::Url::parse(&ios).ok().and_then(|url| param(&url, "link")) {
            candidates.push(nested);
        }
        candidates.push(ios);
    }
    if let Some(inner) = param(&outer, "link") {
        if let Some(nested) = url::Url::parse(&inner).ok().and_then(|url| param(&url, "link")) {
            candidates.push(nested);
        }
        candidates.push(inner);
    }

    candidates
        .iter()
        .find_map(|candidate| url::Url::parse(candidate).ok())
        .or(Some(outer))
}

/// `oobCode` of a sign-in link, `None` for any other link
fn sign_in_code(link: &str) -> Option<String> {
    let url = deep_link(link)?;
    let mut mode = None;
    let mut code = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "mode" => mode = Some(value.into_owned()),
            "oobCode" => code = Some(value.into_owned()),
            _ => {}
        }
    }
    match (mode.as_deref(), code) {
        (Some("signIn"), Some(code)) if !code.is_empty() => Some(code),
        _ => None,
    }
}

impl Auth {
    /// Check an action code without applying it
    pub async fn check_action_code(&self, code: impl AsRef<str>) -> Result<ActionCodeInfo, FirebaseError> {
        let code = code.as_ref();

        // Error-first: validate code
        if code.is_empty() {
            return Err(AuthError::InvalidActionCode.into());
        }

        let body = self.request_body(serde_json::json!({ "oobCode": code })).await;
        let endpoint = self.endpoint().await;
        let response: CheckCodeResponse = endpoint.accounts("resetPassword", &body).await?;

        let operation = response
            .request_type
            .as_deref()
            .map(ActionCodeOperation::from_request_type)
            .unwrap_or(ActionCodeOperation::Error);
        // Email changes report the new address under newEmail
        let (email, from_email) = match operation {
            ActionCodeOperation::VerifyAndChangeEmail => (response.new_email, response.email),
            _ => (response.email, response.new_email),
        };
        Ok(ActionCodeInfo {
            operation,
            email,
            from_email,
        })
    }

    /// Email a passwordless sign-in link
    ///
    /// `settings.handle_code_in_app` must be `true`; the link is completed by
    /// [`sign_in_with_email_link`](Self::sign_in_with_email_link).
    ///
    /// # Example
    /// ```no_run
    /// # async fn example(auth: firebase_client_sdk::Auth) -> Result<(), Box<dyn std::error::Error>> {
    /// use firebase_client_sdk::auth::ActionCodeSettings;
    ///
    /// let settings = ActionCodeSettings::new("https://example.com/finish").handle_code_in_app(true);
    /// auth.send_sign_in_link_to_email("user@example.com", &settings).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn send_sign_in_link_to_email(
        &self,
        email: impl AsRef<str>,
        settings: &ActionCodeSettings,
    ) -> Result<(), FirebaseError> {
        let email = email.as_ref();

        // Error-first: validate arguments
        if email.is_empty() {
            return Err(AuthError::InvalidEmail.into());
        }
        if !settings.handle_code_in_app {
            return Err(FirebaseError::invalid_argument(
                "send_sign_in_link_to_email requires handle_code_in_app to be true",
            ));
        }
        if settings.url.is_empty() {
            return Err(FirebaseError::invalid_argument("action code settings need a continue URL"));
        }

        let mut body = serde_json::to_value(settings)?;
        body["requestType"] = serde_json::json!("EMAIL_SIGNIN");
        body["email"] = serde_json::json!(email);
        let body = self.request_body(body).await;

        let endpoint = self.endpoint().await;
        endpoint.accounts::<serde_json::Value>("sendOobCode", &body).await?;
        debug!("sign-in link sent");
        Ok(())
    }

    /// Whether `link` is a sign-in link sent by
    /// [`send_sign_in_link_to_email`](Self::send_sign_in_link_to_email)
    pub fn is_sign_in_with_email_link(&self, link: impl AsRef<str>) -> bool {
        sign_in_code(link.as_ref()).is_some()
    }

    /// Complete a passwordless sign-in with the emailed link
    pub async fn sign_in_with_email_link(
        &self,
        email: impl AsRef<str>,
        link: impl AsRef<str>,
    ) -> Result<AuthResult, FirebaseError> {
        let email = email.as_ref();

        // Error-first: validate arguments
        if email.is_empty() {
            return Err(AuthError::InvalidEmail.into());
        }
        let Some(code) = sign_in_code(link.as_ref()) else {
            return Err(AuthError::InvalidActionCode.into());
        };

        let body = self
            .request_body(serde_json::json!({
                "email": email,
                "oobCode": code
            }))
            .await;
        let endpoint = self.endpoint().await;
        let response: SignInResponse = endpoint.accounts("signInWithEmailLink", &body).await?;
        let is_new_user = response.is_new_user.unwrap_or(false);

        self.finish_sign_in(response, "password", is_new_user).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::{App, AppOptions};
    use httpmock::prelude::*;
    use serde_json::json;

    async fn mocked_auth(app_name: &str, server: &MockServer) -> Auth {
        let app = App::create(AppOptions::new("test-api-key", "test-project").with_name(app_name))
            .await
            .unwrap();
        let auth = Auth::get_auth(&app).await.unwrap();
        auth.use_emulator(server.base_url()).await.unwrap();
        auth
    }

    const SIGN_IN_LINK: &str =
        "https://example.firebaseapp.com/__/auth/action?apiKey=key&mode=signIn&oobCode=code-1&continueUrl=https%3A%2F%2Fexample.com";

    #[test]
    fn test_sign_in_link_detection() {
        assert_eq!(sign_in_code(SIGN_IN_LINK).as_deref(), Some("code-1"));

        // Wrapped in a dynamic link
        let wrapped = format!("https://example.page.link/?link={}", urlencoding::encode(SIGN_IN_LINK));
        assert_eq!(sign_in_code(&wrapped).as_deref(), Some("code-1"));

        // Wrapped for iOS
        let ios = format!(
            "https://example.page.link/?deep_link_id={}",
            urlencoding::encode(&format!("https://example.page.link/?link={}", urlencoding::encode(SIGN_IN_LINK)))
        );
        assert_eq!(sign_in_code(&ios).as_deref(), Some("code-1"));

        assert!(sign_in_code("https://example.firebaseapp.com/__/auth/action?mode=resetPassword&oobCode=c").is_none());
        assert!(sign_in_code("https://example.firebaseapp.com/__/auth/action?mode=signIn").is_none());
        assert!(sign_in_code("not a link").is_none());
    }

    #[tokio::test]
    async fn test_send_sign_in_link() {
        let server = MockServer::start();
        let auth = mocked_auth("auth-email-link-send", &server).await;

        let send = server.mock(|when, then| {
            when.method(POST)
                .path("/identitytoolkit.googleapis.com/v1/accounts:sendOobCode")
                .json_body(json!({
                    "requestType": "EMAIL_SIGNIN",
                    "email": "user@example.com",
                    "continueUrl": "https://example.com/finish",
                    "canHandleCodeInApp": true,
                    "iOSBundleId": "com.example.ios"
                }));
            then.status(200).json_body(json!({ "email": "user@example.com" }));
        });

        let mut settings = ActionCodeSettings::new("https://example.com/finish");
        let result = auth.send_sign_in_link_to_email("user@example.com", &settings).await;
        assert!(matches!(result, Err(FirebaseError::InvalidArgument(_))));

        settings = settings.handle_code_in_app(true);
        settings.ios_bundle_id = Some("com.example.ios".to_string());
        auth.send_sign_in_link_to_email("user@example.com", &settings)
            .await
            .unwrap();
        send.assert();
    }

    #[tokio::test]
    async fn test_sign_in_with_email_link() {
        let server = MockServer::start();
        let auth = mocked_auth("auth-email-link-sign-in", &server).await;

        let sign_in = server.mock(|when, then| {
            when.method(POST)
                .path("/identitytoolkit.googleapis.com/v1/accounts:signInWithEmailLink")
                .json_body(json!({ "email": "user@example.com", "oobCode": "code-1" }));
            then.status(200).json_body(json!({
                "localId": "uid-link",
                "email": "user@example.com",
                "idToken": "id-token",
                "refreshToken": "refresh-token",
                "expiresIn": "3600",
                "isNewUser": true
            }));
        });

        assert!(auth.is_sign_in_with_email_link(SIGN_IN_LINK));
        let result = auth.sign_in_with_email_link("user@example.com", SIGN_IN_LINK).await.unwrap();
        sign_in.assert();
        assert_eq!(result.user.uid, "uid-link");
        assert!(result.additional_user_info.unwrap().is_new_user);
        assert_eq!(auth.current_user().await.unwrap().uid, "uid-link");

        let result = auth
            .sign_in_with_email_link("user@example.com", "https://example.com/?mode=verifyEmail&oobCode=x")
            .await;
        assert!(matches!(result, Err(FirebaseError::Auth(AuthError::InvalidActionCode))));
        sign_in.assert_calls(1);
    }

    #[tokio::test]
    async fn test_check_action_code() {
        let server = MockServer::start();
        let auth = mocked_auth("auth-check-code", &server).await;

        server.mock(|when, then| {
            when.method(POST)
                .path("/identitytoolkit.googleapis.com/v1/accounts:resetPassword")
                .json_body(json!({ "oobCode": "change" }));
            then.status(200).json_body(json!({
                "requestType": "VERIFY_AND_CHANGE_EMAIL",
                "email": "old@example.com",
                "newEmail": "new@example.com"
            }));
        });
        server.mock(|when, then| {
            when.method(POST)
                .path("/identitytoolkit.googleapis.com/v1/accounts:resetPassword")
                .json_body(json!({ "oobCode": "reset" }));
            then.status(200).json_body(json!({
                "requestType": "PASSWORD_RESET",
                "email": "user@example.com"
            }));
        });
        server.mock(|when, then| {
            when.method(POST)
                .path("/identitytoolkit.googleapis.com/v1/accounts:resetPassword")
                .json_body(json!({ "oobCode": "used" }));
            then.status(400).json_body(json!({ "error": { "code": 400, "message": "INVALID_OOB_CODE" } }));
        });

        let info = auth.check_action_code("change").await.unwrap();
        assert_eq!(info.operation, ActionCodeOperation::VerifyAndChangeEmail);
        assert_eq!(info.email.as_deref(), Some("new@example.com"));
        assert_eq!(info.from_email.as_deref(), Some("old@example.com"));

        let info = auth.check_action_code("reset").await.unwrap();
        assert_eq!(info.operation, ActionCodeOperation::PasswordReset);
        assert_eq!(info.email.as_deref(), Some("user@example.com"));
        assert!(info.from_email.is_none());

        let result = auth.check_action_code("used").await;
        assert!(matches!(result, Err(FirebaseError::Auth(AuthError::InvalidActionCode))));
        assert!(auth.check_action_code("").await.is_err());
    }
}
