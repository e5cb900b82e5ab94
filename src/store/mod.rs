//! Resource address store
//!
//! Memoizes the addresses of provisioned topics and queues for the lifetime of
//! the process. Implementations must collapse concurrent first-time lookups
//! for the same key into a single initialization.

mod memory;

pub use memory::InMemoryStore;

use crate::error::MessagingResult;
use async_trait::async_trait;
use futures::future::BoxFuture;
use std::fmt;

/// Future that provisions a resource and yields its address
pub type ResourceInit<'a> = BoxFuture<'a, MessagingResult<String>>;

/// Key of a cached resource address
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResourceKey {
    /// Topic ARN by topic name
    Topic(String),
    /// Queue URL by queue name
    Queue(String),
}

impl ResourceKey {
    /// Resource kind, `topic` or `queue`
    pub fn kind(&self) -> &'static str {
        match self {
            ResourceKey::Topic(_) => "topic",
            ResourceKey::Queue(_) => "queue",
        }
    }

    /// Broker-side resource name
    pub fn name(&self) -> &str {
        match self {
            ResourceKey::Topic(name) | ResourceKey::Queue(name) => name,
        }
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind(), self.name())
    }
}

/// Idempotent key-value store for resource addresses
#[async_trait]
pub trait ResourceStore: Send + Sync {
    /// Get a cached address
    async fn get(&self, key: &ResourceKey) -> Option<String>;

    /// Return the cached address, or run `init` and cache its result
    ///
    /// Failed initializations are not cached.
    async fn get_or_set<'a>(
        &'a self,
        key: ResourceKey,
        init: ResourceInit<'a>,
    ) -> MessagingResult<String>;
}
