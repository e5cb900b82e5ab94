//! Queue subscriber
//!
//! Polls the queue resolved for a handler's payload type on a fixed interval
//! and hands each message to the handler on its own task. A message is
//! deleted only after the handler succeeds; anything else leaves it to the
//! queue's visibility timeout and redrive policy.
//!
//! ```text
//! tick ─▶ receive ─▶ spawn per message (bounded by max_in_flight)
//!                      extract notification
//!                      base64 decode
//!                      envelope decode
//!                      handler.handle
//!                      delete
//! ```

mod handler;

pub use handler::{handler_fn, ErrorSink, FnHandler, Handler};

use crate::config::SubscriberConfig;
use crate::envelope::decode_into;
use crate::error::{MessagingError, MessagingResult};
use crate::metrics::MESSAGING_METRICS;
use crate::registry::QueueResolver;
use crate::transport::{Notification, QueueClient, QueueMessage, ReceiveMessageRequest};
use base64ct::{Base64, Encoding};
use futures::FutureExt;
use prost::Name;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

/// Consumes messages of one payload type per subscription
#[derive(Clone)]
pub struct Subscriber {
    client: Arc<dyn QueueClient>,
    queue_resolver: Option<Arc<dyn QueueResolver>>,
    error_sink: ErrorSink,
    config: SubscriberConfig,
}

impl Subscriber {
    /// Create a subscriber, validating its configuration
    pub fn new(client: Arc<dyn QueueClient>, config: SubscriberConfig) -> MessagingResult<Self> {
        config.validate()?;

        Ok(Self {
            client,
            queue_resolver: None,
            error_sink: Arc::new(|_| {}),
            config,
        })
    }

    /// Resolve queues with the given resolver, usually a [`crate::Registry`]
    pub fn with_queue_resolver(mut self, resolver: Arc<dyn QueueResolver>) -> Self {
        self.queue_resolver = Some(resolver);
        self
    }

    /// Report runtime errors to the given callback
    pub fn with_error_sink<F>(mut self, sink: F) -> Self
    where
        F: Fn(MessagingError) + Send + Sync + 'static,
    {
        self.error_sink = Arc::new(sink);
        self
    }

    /// Validated polling configuration
    pub fn config(&self) -> &SubscriberConfig {
        &self.config
    }

    /// Run the handler until `shutdown` is cancelled
    ///
    /// Only queue resolution fails the call. Errors raised after that go to
    /// the error sink and polling continues. On shutdown no new receives are
    /// started, handlers see a cancelled token, and the call returns once
    /// in-flight handlers have finished.
    pub async fn subscribe<H: Handler>(
        &self,
        handler: H,
        shutdown: CancellationToken,
    ) -> MessagingResult<()> {
        let message_type = H::Payload::full_name();

        let resolver = self.queue_resolver.as_ref().ok_or_else(|| {
            MessagingError::Resolution(format!("no queue resolver configured for {}", message_type))
        })?;
        let queue_url = resolver.queue_url(&message_type).await?;

        info!(
            message_type = %message_type,
            queue_url = %queue_url,
            "Subscriber started"
        );

        let handler = Arc::new(handler);
        let message_type: Arc<str> = Arc::from(message_type);
        let queue_url: Arc<str> = Arc::from(queue_url);
        let permits = Arc::new(Semaphore::new(self.config.max_in_flight));
        let tracker = TaskTracker::new();
        let handler_shutdown = shutdown.child_token();

        let mut ticker = interval(self.config.receive_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        'poll: loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let available = u32::try_from(permits.available_permits()).unwrap_or(u32::MAX);
            let batch = self.config.max_number_of_messages.min(available);
            if batch == 0 {
                debug!(message_type = %message_type, "All handler slots busy, skipping receive");
                continue;
            }

            let request = ReceiveMessageRequest {
                queue_url: queue_url.to_string(),
                max_number_of_messages: batch,
                wait_time_seconds: self.config.wait_time_seconds,
                visibility_timeout_seconds: self.config.visibility_timeout_seconds,
            };

            let received = tokio::select! {
                _ = shutdown.cancelled() => break,
                received = self.client.receive_message(request) => received,
            };

            let messages = match received {
                Ok(messages) => messages,
                Err(e) => {
                    self.report(&message_type, "receive", e);
                    continue;
                }
            };

            for message in messages {
                // Messages beyond the free permits stay invisible until their
                // visibility timeout expires if shutdown interrupts the wait
                let permit = tokio::select! {
                    _ = shutdown.cancelled() => break 'poll,
                    permit = permits.clone().acquire_owned() => match permit {
                        Ok(permit) => permit,
                        Err(_) => break 'poll,
                    },
                };

                let subscriber = self.clone();
                let handler = handler.clone();
                let queue_url = queue_url.clone();
                let message_type = message_type.clone();
                let handler_shutdown = handler_shutdown.clone();

                tracker.spawn(async move {
                    let _permit = permit;
                    let result = process_message(
                        subscriber.client.as_ref(),
                        &queue_url,
                        message,
                        handler.as_ref(),
                        handler_shutdown,
                        &message_type,
                    )
                    .await;
                    if let Err(e) = result {
                        let stage = failure_stage(&e);
                        subscriber.report(&message_type, stage, e);
                    }
                });
            }
        }

        info!(
            message_type = %message_type,
            in_flight = tracker.len(),
            "Subscriber stopping, draining in-flight handlers"
        );
        tracker.close();
        tracker.wait().await;
        info!(message_type = %message_type, "Subscriber stopped");

        Ok(())
    }

    fn report(&self, message_type: &str, stage: &str, err: MessagingError) {
        warn!(
            message_type = %message_type,
            stage = %stage,
            error = %err,
            "Failed to consume message"
        );
        MESSAGING_METRICS
            .consume_failures
            .with_label_values(&[message_type, stage])
            .inc();
        (self.error_sink)(err);
    }
}

async fn process_message<H: Handler>(
    client: &dyn QueueClient,
    queue_url: &str,
    message: QueueMessage,
    handler: &H,
    shutdown: CancellationToken,
    message_type: &str,
) -> MessagingResult<()> {
    debug!(
        message_id = %message.message_id,
        queue_url = %queue_url,
        "Received message"
    );

    let text = Notification::extract_message(&message.body)?;
    let bytes = Base64::decode_vec(&text)?;
    let envelope = decode_into(&bytes, handler.empty_instance())?;
    let envelope_id = envelope.metadata.id.clone();

    let start = Instant::now();
    let outcome = AssertUnwindSafe(handler.handle(shutdown, envelope.payload, envelope.metadata))
        .catch_unwind()
        .await;
    MESSAGING_METRICS
        .handle_latency
        .with_label_values(&[message_type])
        .observe(start.elapsed().as_secs_f64());

    match outcome {
        Ok(Ok(())) => {}
        Ok(Err(e)) => return Err(MessagingError::Handler(format!("{:#}", e))),
        Err(_) => return Err(MessagingError::Handler("handler panicked".to_string())),
    }

    client.delete_message(queue_url, &message.receipt_handle).await?;

    MESSAGING_METRICS
        .messages_consumed
        .with_label_values(&[message_type])
        .inc();
    debug!(
        message_id = %message.message_id,
        envelope_id = %envelope_id,
        "Acknowledged message"
    );

    Ok(())
}

fn failure_stage(err: &MessagingError) -> &'static str {
    match err {
        MessagingError::Decode(_) => "decode",
        MessagingError::Handler(_) => "handle",
        _ => "delete",
    }
}
