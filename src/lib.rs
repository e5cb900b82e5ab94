//! Convention-based publish/subscribe over a topic broker and queue service
//!
//! Each payload type gets one topic, and each consuming service gets its own
//! queue (plus an error queue) subscribed to that topic. Names are derived
//! from the payload's fully-qualified type name, and all resources are
//! provisioned lazily the first time they are needed.
//!
//! ```no_run
//! use std::sync::Arc;
//! use topic_queue_bus::{
//!     handler_fn, InMemoryBroker, MetadataOverrides, Publisher, Registry, RegistryOptions,
//!     Subscriber, SubscriberConfig,
//! };
//! use tokio_util::sync::CancellationToken;
//!
//! #[derive(Clone, PartialEq, prost::Message)]
//! struct OrderPlaced {
//!     #[prost(string, tag = "1")]
//!     order_id: String,
//! }
//!
//! impl prost::Name for OrderPlaced {
//!     const NAME: &'static str = "OrderPlaced";
//!     const PACKAGE: &'static str = "orders.v1";
//! }
//!
//! # async fn run() -> anyhow::Result<()> {
//! let broker = Arc::new(InMemoryBroker::new());
//! let registry = Arc::new(Registry::new(
//!     broker.clone(),
//!     broker.clone(),
//!     RegistryOptions::default().with_prefix_naming("dev", "billing"),
//! )?);
//!
//! let publisher = Publisher::new(broker.clone()).with_topic_resolver(registry.clone());
//! publisher
//!     .publish(&OrderPlaced { order_id: "o-1".into() }, MetadataOverrides::new())
//!     .await?;
//!
//! let subscriber = Subscriber::new(broker, SubscriberConfig::default())?
//!     .with_queue_resolver(registry)
//!     .with_error_sink(|e| eprintln!("consume failed: {}", e));
//! let shutdown = CancellationToken::new();
//! subscriber
//!     .subscribe(
//!         handler_fn(|_, order: OrderPlaced, _| async move {
//!             println!("order {}", order.order_id);
//!             Ok(())
//!         }),
//!         shutdown,
//!     )
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod envelope;
pub mod error;
pub mod metrics;
pub mod publisher;
pub mod registry;
pub mod store;
pub mod subscriber;
pub mod transport;

pub use config::{MessagingConfig, NamingConfig, RegistryConfig, SubscriberConfig};
pub use envelope::{decode, decode_into, encode, Envelope, Metadata, MetadataOverrides, Payload};
pub use error::{MessagingError, MessagingResult};
pub use publisher::Publisher;
pub use registry::{
    DefaultNaming, NamingConvention, PrefixNaming, QueueResolver, Registry, RegistryOptions,
    ResourceNames, TopicResolver,
};
pub use store::{InMemoryStore, ResourceKey, ResourceStore};
pub use subscriber::{handler_fn, ErrorSink, Handler, Subscriber};
pub use transport::{InMemoryBroker, Notification, QueueClient, QueueMessage, TopicClient};
