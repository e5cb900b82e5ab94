//! Broker and queue transport abstractions
//!
//! The core only depends on these operation signatures. A production
//! deployment plugs in clients for a hosted topic broker and queue service;
//! [`InMemoryBroker`] implements both sides in process for development and
//! tests.

mod memory;
mod notification;

pub use memory::{BrokerIdentity, InMemoryBroker};
pub use notification::Notification;

use crate::error::MessagingResult;
use async_trait::async_trait;
use std::collections::HashMap;

/// Queue attribute holding the queue ARN
pub const ATTRIBUTE_QUEUE_ARN: &str = "QueueArn";
/// Topic or queue attribute holding the access policy
pub const ATTRIBUTE_POLICY: &str = "Policy";
/// Queue attribute holding the redrive policy
pub const ATTRIBUTE_REDRIVE_POLICY: &str = "RedrivePolicy";

/// Topic broker client
#[async_trait]
pub trait TopicClient: Send + Sync {
    /// Create a topic if it does not exist and return its ARN
    async fn create_topic(&self, name: &str) -> MessagingResult<String>;

    /// Set a single topic attribute
    async fn set_topic_attributes(
        &self,
        topic_arn: &str,
        attribute_name: &str,
        attribute_value: &str,
    ) -> MessagingResult<()>;

    /// Subscribe an endpoint to a topic and return the subscription ARN
    async fn subscribe(&self, topic_arn: &str, protocol: &str, endpoint: &str)
        -> MessagingResult<String>;

    /// Publish a text message to a topic and return the broker message ID
    async fn publish(&self, topic_arn: &str, message: &str) -> MessagingResult<String>;
}

/// Queue service client
#[async_trait]
pub trait QueueClient: Send + Sync {
    /// Create a queue if it does not exist and return its URL
    async fn create_queue(&self, name: &str) -> MessagingResult<String>;

    /// Read the named queue attributes
    async fn get_queue_attributes(
        &self,
        queue_url: &str,
        attribute_names: &[&str],
    ) -> MessagingResult<HashMap<String, String>>;

    /// Set queue attributes
    async fn set_queue_attributes(
        &self,
        queue_url: &str,
        attributes: HashMap<String, String>,
    ) -> MessagingResult<()>;

    /// Receive a batch of messages
    async fn receive_message(&self, request: ReceiveMessageRequest)
        -> MessagingResult<Vec<QueueMessage>>;

    /// Delete (acknowledge) a received message
    async fn delete_message(&self, queue_url: &str, receipt_handle: &str) -> MessagingResult<()>;
}

/// Parameters of a receive call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiveMessageRequest {
    pub queue_url: String,
    pub max_number_of_messages: u32,
    pub wait_time_seconds: u32,
    pub visibility_timeout_seconds: u32,
}

/// A message received from a queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueMessage {
    /// Queue-assigned message ID
    pub message_id: String,

    /// Raw message body
    pub body: String,

    /// Handle used to delete this receipt of the message
    pub receipt_handle: String,
}
