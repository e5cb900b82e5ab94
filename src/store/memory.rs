use super::{ResourceInit, ResourceKey, ResourceStore};
use crate::error::{MessagingError, MessagingResult};
use async_trait::async_trait;
use moka::future::Cache;

/// In-memory resource store backed by Moka
///
/// Entries never expire. Concurrent lookups for a missing key wait on the
/// first caller's initialization instead of provisioning again.
#[derive(Clone)]
pub struct InMemoryStore {
    cache: Cache<String, String>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            cache: Cache::builder().build(),
        }
    }

    /// Number of cached resources
    pub async fn entry_count(&self) -> u64 {
        self.cache.run_pending_tasks().await;
        self.cache.entry_count()
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ResourceStore for InMemoryStore {
    async fn get(&self, key: &ResourceKey) -> Option<String> {
        self.cache.get(&key.to_string()).await
    }

    async fn get_or_set<'a>(
        &'a self,
        key: ResourceKey,
        init: ResourceInit<'a>,
    ) -> MessagingResult<String> {
        self.cache
            .try_get_with(key.to_string(), init)
            .await
            .map_err(|err: std::sync::Arc<MessagingError>| (*err).clone())
    }
}
