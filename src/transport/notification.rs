//! Broker notification wrapper
//!
//! Messages published to a topic reach subscribed queues wrapped in a JSON
//! notification; the published text sits in its `Message` field.

use crate::error::{MessagingError, MessagingResult};
use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Topic notification delivered as a queue message body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Notification {
    #[serde(rename = "Type", default)]
    pub kind: String,

    #[serde(default)]
    pub message_id: String,

    #[serde(default)]
    pub topic_arn: String,

    /// Published message text
    pub message: String,

    /// Raw text as sent by the broker, never parsed
    #[serde(default)]
    pub timestamp: Option<String>,
}

impl Notification {
    pub fn new(message_id: String, topic_arn: String, message: String) -> Self {
        Self {
            kind: "Notification".to_string(),
            message_id,
            topic_arn,
            message,
            timestamp: Some(Utc::now().to_rfc3339()),
        }
    }

    /// Extract the published message text from a queue message body
    pub fn extract_message(body: &str) -> MessagingResult<String> {
        let notification: Notification = serde_json::from_str(body).map_err(|e| {
            MessagingError::Decode(format!("body is not a topic notification: {}", e))
        })?;
        Ok(notification.message)
    }
}
