//! Envelope metadata

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Message metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    /// Message ID
    pub id: String,

    /// Fully-qualified payload type name
    pub message_type: String,

    /// Correlation ID, empty when not supplied
    pub correlation_id: String,

    /// Time the envelope was created
    pub timestamp: DateTime<Utc>,
}

impl Metadata {
    /// Fresh metadata for a payload of the given type
    pub fn new(message_type: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            message_type: message_type.into(),
            correlation_id: String::new(),
            timestamp: Utc::now(),
        }
    }
}

/// Caller-supplied metadata values applied on top of the generated ones
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataOverrides {
    id: Option<String>,
    correlation_id: Option<String>,
    timestamp: Option<DateTime<Utc>>,
}

impl MetadataOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a specific message ID; empty IDs are ignored
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Set the correlation ID
    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    /// Use a specific timestamp
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub(crate) fn apply(self, metadata: &mut Metadata) {
        if let Some(id) = self.id.filter(|id| !id.is_empty()) {
            metadata.id = id;
        }
        if let Some(correlation_id) = self.correlation_id {
            metadata.correlation_id = correlation_id;
        }
        if let Some(timestamp) = self.timestamp {
            metadata.timestamp = timestamp;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_metadata_is_populated() {
        let metadata = Metadata::new("orders.v1.OrderPlaced");

        assert!(uuid::Uuid::parse_str(&metadata.id).is_ok());
        assert_eq!(metadata.message_type, "orders.v1.OrderPlaced");
        assert!(metadata.correlation_id.is_empty());
    }

    #[test]
    fn test_overrides_apply() {
        let timestamp = DateTime::from_timestamp(1_700_000_000, 5).unwrap();
        let mut metadata = Metadata::new("orders.v1.OrderPlaced");

        MetadataOverrides::new()
            .with_id("msg-1")
            .with_correlation_id("corr-123")
            .with_timestamp(timestamp)
            .apply(&mut metadata);

        assert_eq!(metadata.id, "msg-1");
        assert_eq!(metadata.correlation_id, "corr-123");
        assert_eq!(metadata.timestamp, timestamp);
    }

    #[test]
    fn test_empty_id_override_is_ignored() {
        let mut metadata = Metadata::new("orders.v1.OrderPlaced");
        let generated = metadata.id.clone();

        MetadataOverrides::new().with_id("").apply(&mut metadata);

        assert_eq!(metadata.id, generated);
    }
}
