//! Cloud Messaging data types

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Web Push subscription the FCM token is bound to
///
/// `auth` and `p256dh` are the base64url keys of the subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushSubscription {
    /// Push service endpoint
    pub endpoint: String,
    /// Authentication secret
    pub auth: String,
    /// Public key of the subscription
    pub p256dh: String,
    /// VAPID public key used to subscribe, if not the default one
    pub vapid_key: Option<String>,
}

impl PushSubscription {
    pub(crate) fn validate(&self) -> Result<(), crate::error::MessagingError> {
        for (field, value) in [("endpoint", &self.endpoint), ("auth", &self.auth), ("p256dh", &self.p256dh)] {
            if value.is_empty() {
                return Err(crate::error::MessagingError::InvalidArgument(format!(
                    "push subscription '{}' must not be empty",
                    field
                )));
            }
        }
        Ok(())
    }
}

/// A message delivered by FCM
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteMessage {
    /// Collapse key for grouping messages
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collapse_key: Option<String>,
    /// Unique message id
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    /// Message type
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_type: Option<String>,
    /// Sender id or topic
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    /// Recipient
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    /// Time to live in seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl: Option<u64>,
    /// Send time in milliseconds since the epoch
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sent_time: Option<i64>,
    /// Data payload
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub data: HashMap<String, serde_json::Value>,
    /// Notification payload
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification: Option<NotificationPayload>,
    /// iOS content-available flag
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_available: Option<bool>,
    /// iOS mutable-content flag
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mutable_content: Option<bool>,
    /// iOS notification category
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// iOS thread id
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
    /// FCM options
    #[serde(default)]
    pub fcm_options: FcmOptions,
}

/// Visible notification content
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPayload {
    /// Title
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Body text
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    /// Image URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

/// Options attached by the sender
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FcmOptions {
    /// Link opened on click
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    /// Analytics label
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analytics_label: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_remote_message_from_json() {
        let message: RemoteMessage = serde_json::from_value(json!({
            "messageId": "m-1",
            "from": "/topics/news",
            "sentTime": 1_700_000_000_000i64,
            "data": { "article": "42" },
            "notification": { "title": "Hello", "imageUrl": "https://x/y.png" },
            "fcmOptions": { "analyticsLabel": "campaign" }
        }))
        .unwrap();

        assert_eq!(message.message_id.as_deref(), Some("m-1"));
        assert_eq!(message.data["article"], json!("42"));
        let notification = message.notification.unwrap();
        assert_eq!(notification.title.as_deref(), Some("Hello"));
        assert_eq!(notification.image_url.as_deref(), Some("https://x/y.png"));
        assert_eq!(message.fcm_options.analytics_label.as_deref(), Some("campaign"));
    }

    #[test]
    fn test_minimal_message() {
        let message: RemoteMessage = serde_json::from_value(json!({})).unwrap();
        assert_eq!(message, RemoteMessage::default());
    }

    #[test]
    fn test_subscription_validation() {
        let mut subscription = PushSubscription {
            endpoint: "https://push.example/abc".to_string(),
            auth: "auth".to_string(),
            p256dh: "key".to_string(),
            vapid_key: None,
        };
        assert!(subscription.validate().is_ok());
        subscription.auth.clear();
        assert!(subscription.validate().is_err());
    }
}
