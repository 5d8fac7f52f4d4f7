//! Password policy
//!
//! A project (or tenant) can enforce password requirements. The policy is
//! fetched from `GET /v2/passwordPolicy` and cached on the Auth instance,
//! one slot per tenant, with `None` standing for the project itself.

use crate::error::AuthError;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;

/// Minimum length applied when the backend omits `minPasswordLength`
pub const DEFAULT_MIN_PASSWORD_LENGTH: usize = 6;

/// The only policy schema this SDK knows how to evaluate
pub const SUPPORTED_SCHEMA_VERSION: u32 = 1;

/// How the backend applies the policy at sign-up and sign-in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnforcementState {
    /// Non-compliant passwords are rejected
    Enforce,
    /// Policy is not enforced
    Off,
}

impl EnforcementState {
    fn parse(raw: Option<&str>) -> Self {
        match raw {
            Some("ENFORCE") => Self::Enforce,
            // ENFORCEMENT_STATE_UNSPECIFIED, OFF and missing all mean off
            _ => Self::Off,
        }
    }
}

/// Raw `passwordPolicy` response
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PasswordPolicyResponse {
    #[serde(default)]
    pub custom_strength_options: CustomStrengthOptions,
    #[serde(default)]
    pub allowed_non_alphanumeric_characters: Vec<String>,
    pub enforcement_state: Option<String>,
    #[serde(default)]
    pub force_upgrade_on_signin: bool,
    pub schema_version: u32,
}

/// Character and length requirements of a policy
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomStrengthOptions {
    /// Minimum number of characters
    pub min_password_length: Option<usize>,
    /// Maximum number of characters
    pub max_password_length: Option<usize>,
    /// Requires a lowercase ASCII letter
    pub contains_lowercase_character: Option<bool>,
    /// Requires an uppercase ASCII letter
    pub contains_uppercase_character: Option<bool>,
    /// Requires an ASCII digit
    pub contains_numeric_character: Option<bool>,
    /// Requires one of `allowed_non_alphanumeric_characters`
    pub contains_non_alphanumeric_character: Option<bool>,
}

/// Password policy of a project or tenant
///
/// Immutable after construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordPolicy {
    /// Length and character class requirements
    pub custom_strength_options: CustomStrengthOptions,
    /// Characters that count as non-alphanumeric, concatenated
    pub allowed_non_alphanumeric_characters: String,
    /// Enforcement state
    pub enforcement_state: EnforcementState,
    /// Whether existing users must upgrade a non-compliant password at sign-in
    pub force_upgrade_on_signin: bool,
    /// Schema version of the response, must be 1 to validate passwords
    pub schema_version: u32,
}

/// Result of checking a password against a [`PasswordPolicy`]
///
/// Each per-rule field is `None` when the policy does not have that rule.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PasswordValidationStatus {
    /// All present rules pass
    pub is_valid: bool,
    /// Length is at least the minimum
    pub meets_min_password_length: Option<bool>,
    /// Length is at most the maximum
    pub meets_max_password_length: Option<bool>,
    /// Has a lowercase letter
    pub contains_lowercase_letter: Option<bool>,
    /// Has an uppercase letter
    pub contains_uppercase_letter: Option<bool>,
    /// Has a digit
    pub contains_numeric_character: Option<bool>,
    /// Has an allowed non-alphanumeric character
    pub contains_non_alphanumeric_character: Option<bool>,
}

impl PasswordPolicy {
    /// Build a policy from the backend response
    pub(crate) fn from_response(response: PasswordPolicyResponse) -> Self {
        let mut options = response.custom_strength_options;
        if options.min_password_length.is_none() {
            options.min_password_length = Some(DEFAULT_MIN_PASSWORD_LENGTH);
        }

        Self {
            custom_strength_options: options,
            allowed_non_alphanumeric_characters: response.allowed_non_alphanumeric_characters.concat(),
            enforcement_state: EnforcementState::parse(response.enforcement_state.as_deref()),
            force_upgrade_on_signin: response.force_upgrade_on_signin,
            schema_version: response.schema_version,
        }
    }

    /// Check the schema version, then evaluate the password
    pub fn validate_password(&self, password: &str) -> Result<PasswordValidationStatus, AuthError> {
        // Error-first: unknown schema can't be evaluated
        if self.schema_version != SUPPORTED_SCHEMA_VERSION {
            return Err(AuthError::UnsupportedPasswordPolicySchemaVersion);
        }
        Ok(self.evaluate(password))
    }

    /// Evaluate the password against every rule the policy has
    pub fn evaluate(&self, password: &str) -> PasswordValidationStatus {
        let options = &self.custom_strength_options;
        let mut status = PasswordValidationStatus::default();

        let length = password.chars().count();
        if let Some(min) = options.min_password_length {
            status.meets_min_password_length = Some(length >= min);
        }
        if let Some(max) = options.max_password_length {
            status.meets_max_password_length = Some(length <= max);
        }

        let mut lower = false;
        let mut upper = false;
        let mut numeric = false;
        let mut special = false;
        for c in password.chars() {
            lower |= c.is_ascii_lowercase();
            upper |= c.is_ascii_uppercase();
            numeric |= c.is_ascii_digit();
            special |= self.allowed_non_alphanumeric_characters.contains(c);
        }

        if options.contains_lowercase_character == Some(true) {
            status.contains_lowercase_letter = Some(lower);
        }
        if options.contains_uppercase_character == Some(true) {
            status.contains_uppercase_letter = Some(upper);
        }
        if options.contains_numeric_character == Some(true) {
            status.contains_numeric_character = Some(numeric);
        }
        if options.contains_non_alphanumeric_character == Some(true) {
            status.contains_non_alphanumeric_character = Some(special);
        }

        status.is_valid = [
            status.meets_min_password_length,
            status.meets_max_password_length,
            status.contains_lowercase_letter,
            status.contains_uppercase_letter,
            status.contains_numeric_character,
            status.contains_non_alphanumeric_character,
        ]
        .into_iter()
        .flatten()
        .all(|passed| passed);

        status
    }
}

/// Cached policies keyed by tenant id, `None` is the project slot
#[derive(Debug, Default)]
pub(crate) struct PasswordPolicyCache {
    slots: HashMap<Option<String>, Arc<PasswordPolicy>>,
}

impl PasswordPolicyCache {
    pub(crate) fn get(&self, tenant_id: Option<&str>) -> Option<Arc<PasswordPolicy>> {
        self.slots.get(&tenant_id.map(str::to_string)).cloned()
    }

    pub(crate) fn insert(&mut self, tenant_id: Option<String>, policy: Arc<PasswordPolicy>) {
        self.slots.insert(tenant_id, policy);
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strict_response() -> PasswordPolicyResponse {
        serde_json::from_value(serde_json::json!({
            "schemaVersion": 1,
            "customStrengthOptions": {
                "minPasswordLength": 8,
                "maxPasswordLength": 100,
                "containsLowercaseCharacter": true,
                "containsUppercaseCharacter": true,
                "containsNumericCharacter": true,
                "containsNonAlphanumericCharacter": true
            },
            "allowedNonAlphanumericCharacters": ["!", "@", "#", "$", "%"],
            "enforcementState": "ENFORCE"
        }))
        .unwrap()
    }

    #[test]
    fn test_from_response() {
        let policy = PasswordPolicy::from_response(strict_response());
        assert_eq!(policy.custom_strength_options.min_password_length, Some(8));
        assert_eq!(policy.allowed_non_alphanumeric_characters, "!@#$%");
        assert_eq!(policy.enforcement_state, EnforcementState::Enforce);
        assert!(!policy.force_upgrade_on_signin);
    }

    #[test]
    fn test_defaults_when_options_missing() {
        let response: PasswordPolicyResponse = serde_json::from_value(serde_json::json!({
            "schemaVersion": 1,
            "enforcementState": "ENFORCEMENT_STATE_UNSPECIFIED"
        }))
        .unwrap();
        let policy = PasswordPolicy::from_response(response);

        assert_eq!(policy.custom_strength_options.min_password_length, Some(DEFAULT_MIN_PASSWORD_LENGTH));
        assert_eq!(policy.enforcement_state, EnforcementState::Off);

        let status = policy.evaluate("abcde");
        assert_eq!(status.meets_min_password_length, Some(false));
        assert_eq!(status.meets_max_password_length, None);
        assert_eq!(status.contains_uppercase_letter, None);
        assert!(!status.is_valid);
        assert!(policy.evaluate("abcdef").is_valid);
    }

    #[test]
    fn test_strong_password_is_valid() {
        let policy = PasswordPolicy::from_response(strict_response());
        let status = policy.validate_password("Password123$").unwrap();
        assert!(status.is_valid);
        assert_eq!(status.contains_non_alphanumeric_character, Some(true));
    }

    #[test]
    fn test_weak_password() {
        let policy = PasswordPolicy::from_response(strict_response());
        let status = policy.evaluate("weak");
        assert!(!status.is_valid);
        assert_eq!(status.meets_min_password_length, Some(false));
        assert_eq!(status.contains_lowercase_letter, Some(true));
        assert_eq!(status.contains_uppercase_letter, Some(false));
    }

    #[test]
    fn test_min_length_and_uppercase_example() {
        let response: PasswordPolicyResponse = serde_json::from_value(serde_json::json!({
            "schemaVersion": 1,
            "customStrengthOptions": {
                "minPasswordLength": 8,
                "containsUppercaseCharacter": true
            }
        }))
        .unwrap();
        let policy = PasswordPolicy::from_response(response);

        let status = policy.validate_password("password1").unwrap();
        assert!(!status.is_valid);
        assert_eq!(status.contains_uppercase_letter, Some(false));
        assert_eq!(status.meets_min_password_length, Some(true));
        assert_eq!(status.contains_numeric_character, None);
    }

    #[test]
    fn test_short_passwords_never_meet_min_length() {
        let policy = PasswordPolicy::from_response(strict_response());
        for len in 0..8 {
            let password: String = "Ab1!".chars().cycle().take(len).collect();
            assert_eq!(policy.evaluate(&password).meets_min_password_length, Some(false), "len {}", len);
        }
    }

    #[test]
    fn test_length_counts_characters() {
        let policy = PasswordPolicy::from_response(strict_response());
        // 8 characters, more than 8 bytes
        let status = policy.evaluate("Äbcdef1!");
        assert_eq!(status.meets_min_password_length, Some(true));
    }

    #[test]
    fn test_disallowed_symbol_does_not_count() {
        let policy = PasswordPolicy::from_response(strict_response());
        let status = policy.evaluate("Password123^");
        assert_eq!(status.contains_non_alphanumeric_character, Some(false));
        assert!(!status.is_valid);
    }

    #[test]
    fn test_unsupported_schema_version() {
        let mut response = strict_response();
        response.schema_version = 2;
        let policy = PasswordPolicy::from_response(response);

        let err = policy.validate_password("Password123$").unwrap_err();
        assert_eq!(err, AuthError::UnsupportedPasswordPolicySchemaVersion);
        assert!(err.to_string().contains("unsupported-password-policy-schema-version"));
    }

    #[test]
    fn test_cache_slots() {
        let policy = Arc::new(PasswordPolicy::from_response(strict_response()));
        let mut cache = PasswordPolicyCache::default();
        assert!(cache.get(None).is_none());

        cache.insert(None, Arc::clone(&policy));
        cache.insert(Some("tenant-1".to_string()), Arc::clone(&policy));
        assert!(cache.get(None).is_some());
        assert!(cache.get(Some("tenant-1")).is_some());
        assert!(cache.get(Some("tenant-2")).is_none());
        assert_eq!(cache.len(), 2);
    }
}
