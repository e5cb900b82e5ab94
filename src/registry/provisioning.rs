//! Broker resource provisioning

use super::policy::{queue_access_policy, redrive_policy, topic_access_policy};
use crate::error::{MessagingError, MessagingResult};
use crate::metrics::MESSAGING_METRICS;
use crate::transport::{
    QueueClient, TopicClient, ATTRIBUTE_POLICY, ATTRIBUTE_QUEUE_ARN, ATTRIBUTE_REDRIVE_POLICY,
};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

/// Ensure topic request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnsureTopicRequest {
    pub topic_name: String,
}

/// Ensure topic response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnsureTopicResponse {
    pub topic_arn: String,
}

/// Ensure subscription request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnsureSubscriptionRequest {
    pub topic_arn: String,
    pub queue_name: String,
    pub error_queue_name: String,
    pub max_receive_count: u32,
}

/// Ensure subscription response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnsureSubscriptionResponse {
    pub queue_url: String,
}

/// Creates topics, queues and subscriptions with create-if-absent calls
#[derive(Clone)]
pub struct ProvisioningService {
    topics: Arc<dyn TopicClient>,
    queues: Arc<dyn QueueClient>,
}

impl ProvisioningService {
    pub fn new(topics: Arc<dyn TopicClient>, queues: Arc<dyn QueueClient>) -> Self {
        Self { topics, queues }
    }

    /// Ensure that the topic exists and carries the owner-only access policy
    pub async fn ensure_topic(&self, request: EnsureTopicRequest) -> MessagingResult<EnsureTopicResponse> {
        let topic_arn = self.topics.create_topic(&request.topic_name).await?;

        let policy = topic_access_policy(&topic_arn)?;
        self.topics
            .set_topic_attributes(&topic_arn, ATTRIBUTE_POLICY, &policy)
            .await?;

        MESSAGING_METRICS
            .resources_provisioned
            .with_label_values(&["topic"])
            .inc();
        info!(topic_arn = %topic_arn, "Created topic");

        Ok(EnsureTopicResponse { topic_arn })
    }

    /// Ensure that the error queue, queue and topic subscription exist
    pub async fn ensure_subscription(
        &self,
        request: EnsureSubscriptionRequest,
    ) -> MessagingResult<EnsureSubscriptionResponse> {
        let (_, error_queue_arn) = self.create_queue(&request.error_queue_name).await?;
        let (queue_url, queue_arn) = self.create_queue(&request.queue_name).await?;

        let mut attributes = HashMap::new();
        attributes.insert(
            ATTRIBUTE_POLICY.to_string(),
            queue_access_policy(&request.topic_arn, &queue_arn),
        );
        attributes.insert(
            ATTRIBUTE_REDRIVE_POLICY.to_string(),
            redrive_policy(&error_queue_arn, request.max_receive_count),
        );
        self.queues.set_queue_attributes(&queue_url, attributes).await?;

        let subscription_arn = self
            .topics
            .subscribe(&request.topic_arn, "sqs", &queue_arn)
            .await?;

        MESSAGING_METRICS
            .resources_provisioned
            .with_label_values(&["subscription"])
            .inc();
        info!(
            subscription_arn = %subscription_arn,
            topic_arn = %request.topic_arn,
            queue_url = %queue_url,
            "Created subscription"
        );

        Ok(EnsureSubscriptionResponse { queue_url })
    }

    /// Create a queue and read back its ARN
    async fn create_queue(&self, queue_name: &str) -> MessagingResult<(String, String)> {
        let queue_url = self.queues.create_queue(queue_name).await?;

        let mut attributes = self
            .queues
            .get_queue_attributes(&queue_url, &[ATTRIBUTE_QUEUE_ARN])
            .await?;
        let queue_arn = attributes.remove(ATTRIBUTE_QUEUE_ARN).ok_or_else(|| {
            MessagingError::Resolution(format!("queue {} has no {} attribute", queue_url, ATTRIBUTE_QUEUE_ARN))
        })?;

        MESSAGING_METRICS
            .resources_provisioned
            .with_label_values(&["queue"])
            .inc();
        info!(queue_url = %queue_url, "Created queue");

        Ok((queue_url, queue_arn))
    }
}
