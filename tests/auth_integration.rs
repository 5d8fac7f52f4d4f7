//! Integration tests for Firebase Authentication
//!
//! These tests interact with real Firebase services and require:
//! 1. A Firebase project with Email/Password and Anonymous sign-in enabled
//! 2. Environment variables set in .env file
//! 3. Run with: cargo test --features integration-tests -- --test-threads=1

#![cfg(feature = "integration-tests")]

use firebase_client_sdk::{App, AppOptions, Auth};
use std::env;

/// Test credentials loaded from .env
struct TestConfig {
    api_key: String,
    project_id: String,
    email: String,
    password: String,
}

fn get_test_config() -> TestConfig {
    dotenvy::dotenv().ok();

    TestConfig {
        api_key: env::var("FIREBASE_API_KEY").expect("FIREBASE_API_KEY must be set in .env file"),
        project_id: env::var("FIREBASE_PROJECT_ID").expect("FIREBASE_PROJECT_ID must be set in .env file"),
        email: env::var("TEST_USER_EMAIL").expect("TEST_USER_EMAIL must be set in .env file"),
        password: env::var("TEST_USER_PASSWORD").expect("TEST_USER_PASSWORD must be set in .env file"),
    }
}

/// Auth on a dedicated App so tests don't share signed-in state
async fn auth_for(test_name: &str, config: &TestConfig) -> Auth {
    let options = AppOptions::new(&config.api_key, &config.project_id).with_name(test_name);
    let app = App::create(options).await.expect("Failed to create app");
    Auth::get_auth(&app).await.expect("Failed to get Auth instance")
}

/// Test: Sign in with email and password
#[tokio::test]
async fn test_sign_in_with_email_password() {
    let config = get_test_config();
    let auth = auth_for("it-sign-in", &config).await;

    let result = auth
        .sign_in_with_email_and_password(&config.email, &config.password)
        .await
        .expect("Failed to sign in");

    assert!(!result.user.uid.is_empty());
    assert_eq!(result.user.email.as_deref(), Some(config.email.as_str()));
    assert!(result.user.id_token.is_some());

    auth.sign_out().await.expect("Failed to sign out");
    assert!(auth.current_user().await.is_none());
}

/// Test: Anonymous authentication
#[tokio::test]
async fn test_anonymous_auth() {
    let config = get_test_config();
    let auth = auth_for("it-anonymous", &config).await;

    let result = auth.sign_in_anonymously().await.expect("Failed to sign in anonymously");
    assert!(result.user.is_anonymous);
    assert!(!result.user.uid.is_empty());

    result.user.delete().await.expect("Failed to delete user");
    auth.sign_out().await.expect("Failed to sign out");
}

/// Test: Create user, sign in again, delete
#[tokio::test]
async fn test_create_and_delete_user() {
    let config = get_test_config();
    let auth = auth_for("it-create-delete", &config).await;

    let test_email = format!("test+{}@example.com", chrono::Utc::now().timestamp());
    let test_password = "TempPassword123!";

    let result = auth
        .create_user_with_email_and_password(&test_email, test_password)
        .await
        .expect("Failed to create user");
    let uid = result.user.uid.clone();
    auth.sign_out().await.expect("Failed to sign out");

    let again = auth
        .sign_in_with_email_and_password(&test_email, test_password)
        .await
        .expect("Failed to sign in with new user");
    assert_eq!(again.user.uid, uid);

    again.user.delete().await.expect("Failed to delete user");
    auth.sign_out().await.expect("Failed to sign out");
}

/// Test: Forced token refresh
#[tokio::test]
async fn test_token_refresh() {
    let config = get_test_config();
    let auth = auth_for("it-token-refresh", &config).await;

    let result = auth
        .sign_in_with_email_and_password(&config.email, &config.password)
        .await
        .expect("Failed to sign in");

    let new_token = result.user.get_id_token(true).await.expect("Failed to refresh token");
    assert!(!new_token.is_empty());

    auth.sign_out().await.expect("Failed to sign out");
}

/// Test: Password policy fetched from the project
#[tokio::test]
async fn test_validate_password_against_project_policy() {
    let config = get_test_config();
    let auth = auth_for("it-password-policy", &config).await;

    let status = auth.validate_password("a").await.expect("Failed to validate password");
    assert!(!status.is_valid);
    assert_eq!(status.meets_min_password_length, Some(false));

    let status = auth
        .validate_password(&config.password)
        .await
        .expect("Failed to validate password");
    assert!(status.is_valid);
}

/// Test: User reload keeps the account data
#[tokio::test]
async fn test_user_reload() {
    let config = get_test_config();
    let auth = auth_for("it-reload", &config).await;

    let result = auth
        .sign_in_with_email_and_password(&config.email, &config.password)
        .await
        .expect("Failed to sign in");

    let mut user = result.user;
    let old_email = user.email.clone();
    user.reload().await.expect("Failed to reload user");
    assert_eq!(user.email, old_email);

    auth.sign_out().await.expect("Failed to sign out");
}

/// Test: Send password reset email
#[tokio::test]
async fn test_password_reset() {
    let config = get_test_config();
    let auth = auth_for("it-password-reset", &config).await;

    auth.send_password_reset_email(&config.email)
        .await
        .expect("Failed to send password reset email");
}
