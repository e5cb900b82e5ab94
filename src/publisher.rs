//! Message publisher

use crate::envelope::{seal, MetadataOverrides, Payload};
use crate::error::{MessagingError, MessagingResult};
use crate::metrics::MESSAGING_METRICS;
use crate::registry::TopicResolver;
use crate::transport::TopicClient;
use base64ct::{Base64, Encoding};
use std::sync::Arc;
use tracing::info;

/// Publishes payloads to the topic resolved for their type
#[derive(Clone)]
pub struct Publisher {
    client: Arc<dyn TopicClient>,
    topic_resolver: Option<Arc<dyn TopicResolver>>,
}

impl Publisher {
    /// Create a publisher without a topic resolver
    pub fn new(client: Arc<dyn TopicClient>) -> Self {
        Self {
            client,
            topic_resolver: None,
        }
    }

    /// Resolve topics with the given resolver, usually a [`crate::Registry`]
    pub fn with_topic_resolver(mut self, resolver: Arc<dyn TopicResolver>) -> Self {
        self.topic_resolver = Some(resolver);
        self
    }

    /// Publish a payload and return the broker message ID
    pub async fn publish<M: Payload>(
        &self,
        payload: &M,
        overrides: MetadataOverrides,
    ) -> MessagingResult<String> {
        let message_type = M::full_name();

        let result = self.publish_inner(payload, overrides, &message_type).await;
        if let Err(ref e) = result {
            MESSAGING_METRICS
                .publish_failures
                .with_label_values(&[message_type.as_str(), e.kind()])
                .inc();
        }
        result
    }

    async fn publish_inner<M: Payload>(
        &self,
        payload: &M,
        overrides: MetadataOverrides,
        message_type: &str,
    ) -> MessagingResult<String> {
        let (bytes, metadata) = seal(payload, overrides)?;

        let resolver = self.topic_resolver.as_ref().ok_or_else(|| {
            MessagingError::Resolution(format!("no topic resolver configured for {}", message_type))
        })?;
        let topic_arn = resolver.topic_arn(message_type).await?;

        let message_id = self
            .client
            .publish(&topic_arn, &Base64::encode_string(&bytes))
            .await?;

        MESSAGING_METRICS
            .messages_published
            .with_label_values(&[message_type])
            .inc();
        info!(
            message_id = %message_id,
            envelope_id = %metadata.id,
            topic_arn = %topic_arn,
            "Published message"
        );

        Ok(message_id)
    }
}
