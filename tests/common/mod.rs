//! Common test utilities for messaging tests
//!
//! Provides a broker that records every call made through the client traits
//! and can be told to fail specific operations, plus payload types shared by
//! the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use topic_queue_bus::transport::ReceiveMessageRequest;
use topic_queue_bus::{
    InMemoryBroker, MessagingError, MessagingResult, QueueClient, QueueMessage, SubscriberConfig,
    TopicClient,
};

/// A broker call: operation name plus its primary argument
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub operation: &'static str,
    pub argument: String,
}

/// [`InMemoryBroker`] wrapper recording calls and injecting failures
#[derive(Clone, Default)]
pub struct RecordingBroker {
    inner: InMemoryBroker,
    calls: Arc<Mutex<Vec<Call>>>,
    // operation -> remaining failures (None fails forever)
    failures: Arc<Mutex<HashMap<&'static str, Option<usize>>>>,
    latency: Arc<Mutex<Option<Duration>>>,
    receipts: Arc<Mutex<Vec<String>>>,
}

impl RecordingBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// The wrapped broker; calls made on it directly are not recorded
    pub fn broker(&self) -> &InMemoryBroker {
        &self.inner
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    /// Recorded operation names in call order, polling calls excluded
    pub fn operations(&self) -> Vec<&'static str> {
        self.calls
            .lock()
            .iter()
            .map(|call| call.operation)
            .filter(|operation| *operation != "ReceiveMessage")
            .collect()
    }

    pub fn count(&self, operation: &str) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|call| call.operation == operation)
            .count()
    }

    /// Receipt handles of every message handed out by a receive call
    pub fn receipts(&self) -> Vec<String> {
        self.receipts.lock().clone()
    }

    /// Arguments of the recorded calls to `operation`
    pub fn arguments(&self, operation: &str) -> Vec<String> {
        self.calls
            .lock()
            .iter()
            .filter(|call| call.operation == operation)
            .map(|call| call.argument.clone())
            .collect()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    /// Fail every call to `operation`
    pub fn fail(&self, operation: &'static str) {
        self.failures.lock().insert(operation, None);
    }

    /// Fail the next `times` calls to `operation`
    pub fn fail_times(&self, operation: &'static str, times: usize) {
        self.failures.lock().insert(operation, Some(times));
    }

    pub fn recover(&self, operation: &'static str) {
        self.failures.lock().remove(operation);
    }

    /// Delay every call by `latency`
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock() = Some(latency);
    }

    async fn record(&self, operation: &'static str, argument: &str) -> MessagingResult<()> {
        self.calls.lock().push(Call {
            operation,
            argument: argument.to_string(),
        });

        let latency = *self.latency.lock();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        let mut failures = self.failures.lock();
        match failures.get_mut(operation) {
            Some(None) => Err(injected(operation)),
            Some(Some(remaining)) if *remaining > 0 => {
                *remaining -= 1;
                Err(injected(operation))
            }
            _ => Ok(()),
        }
    }
}

fn injected(operation: &str) -> MessagingError {
    MessagingError::transport(operation, "injected failure")
}

#[async_trait]
impl TopicClient for RecordingBroker {
    async fn create_topic(&self, name: &str) -> MessagingResult<String> {
        self.record("CreateTopic", name).await?;
        self.inner.create_topic(name).await
    }

    async fn set_topic_attributes(
        &self,
        topic_arn: &str,
        attribute_name: &str,
        attribute_value: &str,
    ) -> MessagingResult<()> {
        self.record("SetTopicAttributes", topic_arn).await?;
        self.inner
            .set_topic_attributes(topic_arn, attribute_name, attribute_value)
            .await
    }

    async fn subscribe(
        &self,
        topic_arn: &str,
        protocol: &str,
        endpoint: &str,
    ) -> MessagingResult<String> {
        self.record("Subscribe", endpoint).await?;
        self.inner.subscribe(topic_arn, protocol, endpoint).await
    }

    async fn publish(&self, topic_arn: &str, message: &str) -> MessagingResult<String> {
        self.record("Publish", topic_arn).await?;
        self.inner.publish(topic_arn, message).await
    }
}

#[async_trait]
impl QueueClient for RecordingBroker {
    async fn create_queue(&self, name: &str) -> MessagingResult<String> {
        self.record("CreateQueue", name).await?;
        self.inner.create_queue(name).await
    }

    async fn get_queue_attributes(
        &self,
        queue_url: &str,
        attribute_names: &[&str],
    ) -> MessagingResult<HashMap<String, String>> {
        self.record("GetQueueAttributes", queue_url).await?;
        self.inner.get_queue_attributes(queue_url, attribute_names).await
    }

    async fn set_queue_attributes(
        &self,
        queue_url: &str,
        attributes: HashMap<String, String>,
    ) -> MessagingResult<()> {
        self.record("SetQueueAttributes", queue_url).await?;
        self.inner.set_queue_attributes(queue_url, attributes).await
    }

    async fn receive_message(
        &self,
        request: ReceiveMessageRequest,
    ) -> MessagingResult<Vec<QueueMessage>> {
        self.record("ReceiveMessage", &request.queue_url).await?;
        let messages = self.inner.receive_message(request).await?;
        self.receipts
            .lock()
            .extend(messages.iter().map(|message| message.receipt_handle.clone()));
        Ok(messages)
    }

    async fn delete_message(&self, queue_url: &str, receipt_handle: &str) -> MessagingResult<()> {
        self.record("DeleteMessage", receipt_handle).await?;
        self.inner.delete_message(queue_url, receipt_handle).await
    }
}

/// Payload published by the order service
#[derive(Clone, PartialEq, prost::Message)]
pub struct OrderPlaced {
    #[prost(string, tag = "1")]
    pub order_id: String,
    #[prost(uint32, tag = "2")]
    pub quantity: u32,
}

impl prost::Name for OrderPlaced {
    const NAME: &'static str = "OrderPlaced";
    const PACKAGE: &'static str = "test.orders";
}

/// Second payload type, used where two topics must not interfere
#[derive(Clone, PartialEq, prost::Message)]
pub struct ShipmentBooked {
    #[prost(string, tag = "1")]
    pub shipment_id: String,
}

impl prost::Name for ShipmentBooked {
    const NAME: &'static str = "ShipmentBooked";
    const PACKAGE: &'static str = "test.shipping";
}

pub fn order(order_id: &str) -> OrderPlaced {
    OrderPlaced {
        order_id: order_id.to_string(),
        quantity: 1,
    }
}

/// Subscriber settings that poll quickly without long-polling
pub fn fast_subscriber_config() -> SubscriberConfig {
    SubscriberConfig {
        receive_interval_ms: 5,
        wait_time_seconds: 0,
        ..Default::default()
    }
}

/// Collects errors delivered to a subscriber's error sink
#[derive(Clone, Default)]
pub struct ErrorLog {
    errors: Arc<Mutex<Vec<MessagingError>>>,
}

impl ErrorLog {
    pub fn sink(&self) -> impl Fn(MessagingError) + Send + Sync + 'static {
        let errors = self.errors.clone();
        move |e| errors.lock().push(e)
    }

    pub fn errors(&self) -> Vec<MessagingError> {
        self.errors.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.errors.lock().len()
    }
}

/// Poll `condition` every few milliseconds until it holds or `timeout` passes
pub async fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}
