//! Message handler capability

use crate::envelope::{Metadata, Payload};
use crate::error::MessagingError;
use async_trait::async_trait;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Receives errors raised while a subscription is running
pub type ErrorSink = Arc<dyn Fn(MessagingError) + Send + Sync>;

/// Handles decoded payloads of one type
///
/// Returning `Ok` acknowledges the message. Returning an error leaves it on
/// the queue for redelivery and, eventually, the error queue. Delivery is
/// at-least-once, so handlers must tolerate duplicates.
///
/// `shutdown` is cancelled when the subscription stops. Running handlers are
/// still awaited, so long operations should watch it and return early.
#[async_trait]
pub trait Handler: Send + Sync + 'static {
    type Payload: Payload;

    /// Instance the envelope body is decoded into
    fn empty_instance(&self) -> Self::Payload {
        Self::Payload::default()
    }

    async fn handle(
        &self,
        shutdown: CancellationToken,
        payload: Self::Payload,
        metadata: Metadata,
    ) -> anyhow::Result<()>;
}

/// Handler backed by an async closure
pub struct FnHandler<M, F, Fut> {
    f: F,
    _marker: PhantomData<fn(M) -> Fut>,
}

/// Build a [`Handler`] from an async closure
pub fn handler_fn<M, F, Fut>(f: F) -> FnHandler<M, F, Fut>
where
    M: Payload,
    F: Fn(CancellationToken, M, Metadata) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    FnHandler {
        f,
        _marker: PhantomData,
    }
}

#[async_trait]
impl<M, F, Fut> Handler for FnHandler<M, F, Fut>
where
    M: Payload,
    F: Fn(CancellationToken, M, Metadata) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    type Payload = M;

    async fn handle(
        &self,
        shutdown: CancellationToken,
        payload: M,
        metadata: Metadata,
    ) -> anyhow::Result<()> {
        (self.f)(shutdown, payload, metadata).await
    }
}
