//! In-process topic broker and queue service

use super::{
    Notification, QueueClient, QueueMessage, ReceiveMessageRequest, TopicClient,
    ATTRIBUTE_POLICY, ATTRIBUTE_QUEUE_ARN, ATTRIBUTE_REDRIVE_POLICY,
};
use crate::error::{MessagingError, MessagingResult};
use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};
use uuid::Uuid;

const RECEIVE_POLL_INTERVAL: Duration = Duration::from_millis(10);
const MAX_RESOURCE_NAME_LEN: usize = 80;

/// Region and account the broker reports in ARNs and URLs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerIdentity {
    pub region: String,
    pub account_id: String,
}

impl Default for BrokerIdentity {
    fn default() -> Self {
        Self {
            region: "eu-west-1".to_string(),
            account_id: "111122223333".to_string(),
        }
    }
}

/// In-memory broker implementing both [`TopicClient`] and [`QueueClient`]
///
/// Publishing fans out a [`Notification`] to every queue subscribed to the
/// topic. Receives honour visibility timeouts, long polling and redrive
/// policies, so dead-lettering behaves like the hosted service.
#[derive(Clone, Default)]
pub struct InMemoryBroker {
    inner: Arc<BrokerInner>,
}

#[derive(Default)]
struct BrokerInner {
    identity: BrokerIdentity,
    topics: DashMap<String, TopicState>,
    queues: Mutex<QueueSet>,
}

struct TopicState {
    attributes: HashMap<String, String>,
    subscriptions: Vec<Subscription>,
}

struct Subscription {
    arn: String,
    endpoint: String,
}

#[derive(Default)]
struct QueueSet {
    by_url: HashMap<String, QueueState>,
    url_by_arn: HashMap<String, String>,
}

struct QueueState {
    attributes: HashMap<String, String>,
    messages: VecDeque<StoredMessage>,
}

struct StoredMessage {
    message_id: String,
    body: String,
    receive_count: u32,
    receipt_handle: Option<String>,
    visible_at: Instant,
}

impl StoredMessage {
    fn new(body: String) -> Self {
        Self {
            message_id: Uuid::new_v4().to_string(),
            body,
            receive_count: 0,
            receipt_handle: None,
            visible_at: Instant::now(),
        }
    }
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Broker reporting the given region and account
    pub fn with_identity(identity: BrokerIdentity) -> Self {
        Self {
            inner: Arc::new(BrokerInner {
                identity,
                ..Default::default()
            }),
        }
    }

    /// Region and account embedded in ARNs and URLs
    pub fn identity(&self) -> &BrokerIdentity {
        &self.inner.identity
    }

    /// ARN of an existing topic
    pub fn topic_arn(&self, name: &str) -> Option<String> {
        let arn = self.topic_arn_for(name);
        self.inner.topics.contains_key(&arn).then_some(arn)
    }

    /// Endpoints subscribed to a topic
    pub fn subscriptions(&self, topic_arn: &str) -> Vec<String> {
        self.inner
            .topics
            .get(topic_arn)
            .map(|topic| topic.subscriptions.iter().map(|s| s.endpoint.clone()).collect())
            .unwrap_or_default()
    }

    /// Attributes of a topic
    pub fn topic_attributes(&self, topic_arn: &str) -> Option<HashMap<String, String>> {
        self.inner.topics.get(topic_arn).map(|topic| topic.attributes.clone())
    }

    /// URL of an existing queue
    pub fn queue_url(&self, name: &str) -> Option<String> {
        let url = self.queue_url_for(name);
        self.inner.queues.lock().by_url.contains_key(&url).then_some(url)
    }

    /// Number of messages held by a queue, in flight or not
    pub fn queue_depth(&self, queue_url: &str) -> usize {
        self.inner
            .queues
            .lock()
            .by_url
            .get(queue_url)
            .map(|queue| queue.messages.len())
            .unwrap_or(0)
    }

    /// Attributes of a queue
    pub fn queue_attributes(&self, queue_url: &str) -> Option<HashMap<String, String>> {
        self.inner
            .queues
            .lock()
            .by_url
            .get(queue_url)
            .map(|queue| queue.attributes.clone())
    }

    /// Place a raw body directly on a queue
    pub fn enqueue(&self, queue_url: &str, body: impl Into<String>) -> MessagingResult<String> {
        let mut queues = self.inner.queues.lock();
        let queue = queues
            .by_url
            .get_mut(queue_url)
            .ok_or_else(|| non_existent_queue("SendMessage", queue_url))?;

        let message = StoredMessage::new(body.into());
        let message_id = message.message_id.clone();
        queue.messages.push_back(message);
        Ok(message_id)
    }

    fn topic_arn_for(&self, name: &str) -> String {
        let identity = &self.inner.identity;
        format!("arn:aws:sns:{}:{}:{}", identity.region, identity.account_id, name)
    }

    fn queue_url_for(&self, name: &str) -> String {
        let identity = &self.inner.identity;
        format!(
            "https://sqs.{}.amazonaws.com/{}/{}",
            identity.region, identity.account_id, name
        )
    }

    fn queue_arn_for(&self, name: &str) -> String {
        let identity = &self.inner.identity;
        format!("arn:aws:sqs:{}:{}:{}", identity.region, identity.account_id, name)
    }

    fn take_visible(
        &self,
        queue_url: &str,
        max_messages: usize,
        visibility_timeout: Duration,
    ) -> MessagingResult<Vec<QueueMessage>> {
        let mut queues = self.inner.queues.lock();

        let redrive = {
            let queue = queues
                .by_url
                .get(queue_url)
                .ok_or_else(|| non_existent_queue("ReceiveMessage", queue_url))?;
            queue
                .attributes
                .get(ATTRIBUTE_REDRIVE_POLICY)
                .and_then(|policy| parse_redrive_policy(policy))
                .and_then(|(target_arn, max_receive_count)| {
                    queues
                        .url_by_arn
                        .get(&target_arn)
                        .map(|target_url| (target_url.clone(), max_receive_count))
                })
        };

        let now = Instant::now();
        let mut received = Vec::new();
        let mut dead_letters = Vec::new();

        let queue = queues
            .by_url
            .get_mut(queue_url)
            .ok_or_else(|| non_existent_queue("ReceiveMessage", queue_url))?;

        let mut index = 0;
        while index < queue.messages.len() && received.len() < max_messages {
            let message = &mut queue.messages[index];
            if message.visible_at > now {
                index += 1;
                continue;
            }

            if let Some((_, max_receive_count)) = &redrive {
                if message.receive_count >= *max_receive_count {
                    if let Some(message) = queue.messages.remove(index) {
                        dead_letters.push(message);
                    }
                    continue;
                }
            }

            let receipt_handle = Uuid::new_v4().to_string();
            message.receive_count += 1;
            message.receipt_handle = Some(receipt_handle.clone());
            message.visible_at = now + visibility_timeout;

            received.push(QueueMessage {
                message_id: message.message_id.clone(),
                body: message.body.clone(),
                receipt_handle,
            });
            index += 1;
        }

        if let Some((target_url, _)) = redrive {
            if let Some(target) = queues.by_url.get_mut(&target_url) {
                for mut message in dead_letters {
                    debug!(message_id = %message.message_id, queue_url = %target_url, "Moved message to dead-letter queue");
                    message.receive_count = 0;
                    message.receipt_handle = None;
                    message.visible_at = now;
                    target.messages.push_back(message);
                }
            }
        }

        Ok(received)
    }
}

#[async_trait]
impl TopicClient for InMemoryBroker {
    async fn create_topic(&self, name: &str) -> MessagingResult<String> {
        validate_name("CreateTopic", name)?;

        let arn = self.topic_arn_for(name);
        self.inner.topics.entry(arn.clone()).or_insert_with(|| TopicState {
            attributes: HashMap::new(),
            subscriptions: Vec::new(),
        });

        Ok(arn)
    }

    async fn set_topic_attributes(
        &self,
        topic_arn: &str,
        attribute_name: &str,
        attribute_value: &str,
    ) -> MessagingResult<()> {
        let mut topic = self
            .inner
            .topics
            .get_mut(topic_arn)
            .ok_or_else(|| topic_not_found("SetTopicAttributes", topic_arn))?;

        topic
            .attributes
            .insert(attribute_name.to_string(), attribute_value.to_string());
        Ok(())
    }

    async fn subscribe(
        &self,
        topic_arn: &str,
        protocol: &str,
        endpoint: &str,
    ) -> MessagingResult<String> {
        if protocol != "sqs" {
            return Err(MessagingError::transport(
                "Subscribe",
                format!("unsupported protocol: {}", protocol),
            ));
        }

        let mut topic = self
            .inner
            .topics
            .get_mut(topic_arn)
            .ok_or_else(|| topic_not_found("Subscribe", topic_arn))?;

        if let Some(existing) = topic.subscriptions.iter().find(|s| s.endpoint == endpoint) {
            return Ok(existing.arn.clone());
        }

        let arn = format!("{}:{}", topic_arn, Uuid::new_v4());
        topic.subscriptions.push(Subscription {
            arn: arn.clone(),
            endpoint: endpoint.to_string(),
        });

        Ok(arn)
    }

    async fn publish(&self, topic_arn: &str, message: &str) -> MessagingResult<String> {
        let endpoints = self.subscriptions(topic_arn);
        if !self.inner.topics.contains_key(topic_arn) {
            return Err(topic_not_found("Publish", topic_arn));
        }

        let message_id = Uuid::new_v4().to_string();
        let notification = Notification::new(
            message_id.clone(),
            topic_arn.to_string(),
            message.to_string(),
        );
        let body = serde_json::to_string(&notification)
            .map_err(|e| MessagingError::transport("Publish", e.to_string()))?;

        let mut queues = self.inner.queues.lock();
        for endpoint in endpoints {
            let Some(queue_url) = queues.url_by_arn.get(&endpoint).cloned() else {
                warn!(topic_arn = %topic_arn, endpoint = %endpoint, "Subscription endpoint has no queue");
                continue;
            };
            if let Some(queue) = queues.by_url.get_mut(&queue_url) {
                queue.messages.push_back(StoredMessage::new(body.clone()));
            }
        }

        Ok(message_id)
    }
}

#[async_trait]
impl QueueClient for InMemoryBroker {
    async fn create_queue(&self, name: &str) -> MessagingResult<String> {
        validate_name("CreateQueue", name)?;

        let url = self.queue_url_for(name);
        let arn = self.queue_arn_for(name);

        let mut queues = self.inner.queues.lock();
        if !queues.by_url.contains_key(&url) {
            let mut attributes = HashMap::new();
            attributes.insert(ATTRIBUTE_QUEUE_ARN.to_string(), arn.clone());

            queues.by_url.insert(
                url.clone(),
                QueueState {
                    attributes,
                    messages: VecDeque::new(),
                },
            );
            queues.url_by_arn.insert(arn, url.clone());
        }

        Ok(url)
    }

    async fn get_queue_attributes(
        &self,
        queue_url: &str,
        attribute_names: &[&str],
    ) -> MessagingResult<HashMap<String, String>> {
        let queues = self.inner.queues.lock();
        let queue = queues
            .by_url
            .get(queue_url)
            .ok_or_else(|| non_existent_queue("GetQueueAttributes", queue_url))?;

        Ok(queue
            .attributes
            .iter()
            .filter(|(name, _)| attribute_names.contains(&name.as_str()))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect())
    }

    async fn set_queue_attributes(
        &self,
        queue_url: &str,
        attributes: HashMap<String, String>,
    ) -> MessagingResult<()> {
        if let Some(policy) = attributes.get(ATTRIBUTE_REDRIVE_POLICY) {
            if parse_redrive_policy(policy).is_none() {
                return Err(MessagingError::transport(
                    "SetQueueAttributes",
                    format!("invalid redrive policy: {}", policy),
                ));
            }
        }
        if let Some(policy) = attributes.get(ATTRIBUTE_POLICY) {
            if serde_json::from_str::<serde_json::Value>(policy).is_err() {
                return Err(MessagingError::transport(
                    "SetQueueAttributes",
                    "access policy is not valid JSON",
                ));
            }
        }

        let mut queues = self.inner.queues.lock();
        let queue = queues
            .by_url
            .get_mut(queue_url)
            .ok_or_else(|| non_existent_queue("SetQueueAttributes", queue_url))?;

        queue.attributes.extend(attributes);
        Ok(())
    }

    async fn receive_message(
        &self,
        request: ReceiveMessageRequest,
    ) -> MessagingResult<Vec<QueueMessage>> {
        let max_messages = request.max_number_of_messages.max(1) as usize;
        let visibility_timeout = Duration::from_secs(u64::from(request.visibility_timeout_seconds));
        let deadline = Instant::now() + Duration::from_secs(u64::from(request.wait_time_seconds));

        loop {
            let received = self.take_visible(&request.queue_url, max_messages, visibility_timeout)?;
            if !received.is_empty() || Instant::now() >= deadline {
                return Ok(received);
            }
            tokio::time::sleep(RECEIVE_POLL_INTERVAL).await;
        }
    }

    async fn delete_message(&self, queue_url: &str, receipt_handle: &str) -> MessagingResult<()> {
        let mut queues = self.inner.queues.lock();
        let queue = queues
            .by_url
            .get_mut(queue_url)
            .ok_or_else(|| non_existent_queue("DeleteMessage", queue_url))?;

        let position = queue
            .messages
            .iter()
            .position(|m| m.receipt_handle.as_deref() == Some(receipt_handle))
            .ok_or_else(|| {
                MessagingError::transport(
                    "DeleteMessage",
                    format!("receipt handle is invalid: {}", receipt_handle),
                )
            })?;

        queue.messages.remove(position);
        Ok(())
    }
}

fn validate_name(operation: &str, name: &str) -> MessagingResult<()> {
    let valid = !name.is_empty()
        && name.len() <= MAX_RESOURCE_NAME_LEN
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');

    if valid {
        Ok(())
    } else {
        Err(MessagingError::transport(
            operation,
            format!("invalid resource name: {:?}", name),
        ))
    }
}

// maxReceiveCount may be encoded as a string or a number
fn parse_redrive_policy(policy: &str) -> Option<(String, u32)> {
    let value: serde_json::Value = serde_json::from_str(policy).ok()?;
    let target = value.get("deadLetterTargetArn")?.as_str()?.to_string();
    let max_receive_count = match value.get("maxReceiveCount")? {
        serde_json::Value::String(s) => s.parse().ok()?,
        serde_json::Value::Number(n) => u32::try_from(n.as_u64()?).ok()?,
        _ => return None,
    };
    Some((target, max_receive_count))
}

fn topic_not_found(operation: &str, topic_arn: &str) -> MessagingError {
    MessagingError::transport(operation, format!("topic does not exist: {}", topic_arn))
}

fn non_existent_queue(operation: &str, queue_url: &str) -> MessagingError {
    MessagingError::transport(operation, format!("queue does not exist: {}", queue_url))
}
