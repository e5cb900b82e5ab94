//! Infrastructure registry
//!
//! Resolves payload types to live broker resources. Resource names come from a
//! [`NamingConvention`]; topics, queues, error queues and subscriptions are
//! provisioned on first use and their addresses memoized in a
//! [`ResourceStore`], so each resource is provisioned at most once per process.
//!
//! ```text
//! resolve_queue(type)
//!   ├─ resolve_topic(type) ── store["topic:<name>"] ── miss ─▶ ensure_topic
//!   └─ store["queue:<name>"] ── miss ─▶ ensure_subscription
//!        ├─ create error queue, read arn
//!        ├─ create queue, read arn
//!        ├─ set access + redrive policy
//!        └─ subscribe queue to topic
//! ```

mod naming;
pub mod policy;
mod provisioning;

pub use naming::{DefaultNaming, NamingConvention, PrefixNaming, ResourceNames};
pub use provisioning::{
    EnsureSubscriptionRequest, EnsureSubscriptionResponse, EnsureTopicRequest,
    EnsureTopicResponse, ProvisioningService,
};

use crate::config::{MessagingConfig, RegistryConfig};
use crate::envelope::{type_name, Payload};
use crate::error::{MessagingError, MessagingResult};
use crate::store::{InMemoryStore, ResourceKey, ResourceStore};
use crate::transport::{QueueClient, TopicClient};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// Resolves the topic ARN for a payload type
#[async_trait]
pub trait TopicResolver: Send + Sync {
    async fn topic_arn(&self, type_name: &str) -> MessagingResult<String>;
}

/// Resolves the queue URL for a payload type
#[async_trait]
pub trait QueueResolver: Send + Sync {
    async fn queue_url(&self, type_name: &str) -> MessagingResult<String>;
}

/// Registry options
#[derive(Clone)]
pub struct RegistryOptions {
    /// Naming convention
    pub naming: Arc<dyn NamingConvention>,

    /// Resource address store
    pub store: Arc<dyn ResourceStore>,

    /// Registry configuration
    pub config: RegistryConfig,
}

impl Default for RegistryOptions {
    fn default() -> Self {
        Self {
            naming: Arc::new(DefaultNaming),
            store: Arc::new(InMemoryStore::new()),
            config: RegistryConfig::default(),
        }
    }
}

impl RegistryOptions {
    pub fn with_naming(mut self, naming: impl NamingConvention + 'static) -> Self {
        self.naming = Arc::new(naming);
        self
    }

    /// Use prefix naming for stage and service scoped resources
    pub fn with_prefix_naming(self, stage: impl Into<String>, service: impl Into<String>) -> Self {
        self.with_naming(PrefixNaming::new(stage, service))
    }

    pub fn with_store(mut self, store: Arc<dyn ResourceStore>) -> Self {
        self.store = store;
        self
    }

    pub fn with_max_receive_count(mut self, max_receive_count: u32) -> Self {
        self.config.max_receive_count = max_receive_count;
        self
    }
}

/// Infrastructure registry
pub struct Registry {
    service: ProvisioningService,
    naming: Arc<dyn NamingConvention>,
    store: Arc<dyn ResourceStore>,
    config: RegistryConfig,
}

impl Registry {
    /// Create a registry, validating its configuration
    pub fn new(
        topics: Arc<dyn TopicClient>,
        queues: Arc<dyn QueueClient>,
        options: RegistryOptions,
    ) -> MessagingResult<Self> {
        options.config.validate()?;

        Ok(Self {
            service: ProvisioningService::new(topics, queues),
            naming: options.naming,
            store: options.store,
            config: options.config,
        })
    }

    /// Create a registry from loaded messaging configuration
    pub fn from_config(
        topics: Arc<dyn TopicClient>,
        queues: Arc<dyn QueueClient>,
        config: &MessagingConfig,
    ) -> MessagingResult<Self> {
        config.naming.validate()?;

        let options = RegistryOptions {
            naming: config.naming.build(),
            config: config.registry.clone(),
            ..Default::default()
        };
        Self::new(topics, queues, options)
    }

    /// Resource names for a payload type
    pub fn resource_names(&self, type_name: &str) -> ResourceNames {
        self.naming.resource_names(type_name)
    }

    /// Return the topic ARN for a payload type, provisioning the topic if needed
    pub async fn resolve_topic(&self, type_name: &str) -> MessagingResult<String> {
        let topic_name = self.naming.topic_name(type_name);
        debug!(type_name = %type_name, topic_name = %topic_name, "Resolving topic");

        let key = ResourceKey::Topic(topic_name.clone());
        let init = Box::pin(async {
            self.service
                .ensure_topic(EnsureTopicRequest {
                    topic_name: topic_name.clone(),
                })
                .await
                .map(|response| response.topic_arn)
        });

        self.store
            .get_or_set(key, init)
            .await
            .map_err(|e| resolution_error("topic", &topic_name, e))
    }

    /// Return the queue URL for a payload type, provisioning the topic,
    /// queues and subscription if needed
    pub async fn resolve_queue(&self, type_name: &str) -> MessagingResult<String> {
        let topic_arn = self.resolve_topic(type_name).await?;

        let names = self.naming.resource_names(type_name);
        debug!(type_name = %type_name, queue_name = %names.queue, "Resolving queue");

        let key = ResourceKey::Queue(names.queue.clone());
        let init = Box::pin(async {
            self.service
                .ensure_subscription(EnsureSubscriptionRequest {
                    topic_arn,
                    queue_name: names.queue.clone(),
                    error_queue_name: names.error_queue.clone(),
                    max_receive_count: self.config.max_receive_count,
                })
                .await
                .map(|response| response.queue_url)
        });

        self.store
            .get_or_set(key, init)
            .await
            .map_err(|e| resolution_error("queue", &names.queue, e))
    }

    /// Topic ARN for a payload type known at compile time
    pub async fn topic_arn_of<M: Payload>(&self) -> MessagingResult<String> {
        self.resolve_topic(&type_name::<M>()).await
    }

    /// Queue URL for a payload type known at compile time
    pub async fn queue_url_of<M: Payload>(&self) -> MessagingResult<String> {
        self.resolve_queue(&type_name::<M>()).await
    }
}

#[async_trait]
impl TopicResolver for Registry {
    async fn topic_arn(&self, type_name: &str) -> MessagingResult<String> {
        self.resolve_topic(type_name).await
    }
}

#[async_trait]
impl QueueResolver for Registry {
    async fn queue_url(&self, type_name: &str) -> MessagingResult<String> {
        self.resolve_queue(type_name).await
    }
}

fn resolution_error(kind: &str, name: &str, err: MessagingError) -> MessagingError {
    match err {
        MessagingError::Resolution(_) => err,
        other => MessagingError::Resolution(format!("{} {}: {}", kind, name, other)),
    }
}
