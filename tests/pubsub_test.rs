mod common;

use async_trait::async_trait;
use common::{fast_subscriber_config, order, wait_until, ErrorLog, OrderPlaced, ShipmentBooked};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio_test::assert_ok;
use tokio_util::sync::CancellationToken;
use topic_queue_bus::{
    handler_fn, Handler, InMemoryBroker, MessagingConfig, Metadata, MetadataOverrides,
    NamingConfig, Publisher, Registry, RegistryOptions, Subscriber, SubscriberConfig,
};

const WAIT: Duration = Duration::from_secs(5);

/// Records the order IDs it handles
struct OrderLedger {
    service: &'static str,
    seen: Arc<Mutex<Vec<(String, String)>>>,
}

#[async_trait]
impl Handler for OrderLedger {
    type Payload = OrderPlaced;

    async fn handle(
        &self,
        _shutdown: CancellationToken,
        payload: OrderPlaced,
        _metadata: Metadata,
    ) -> anyhow::Result<()> {
        self.seen
            .lock()
            .push((self.service.to_string(), payload.order_id));
        Ok(())
    }
}

fn service_registry(broker: &InMemoryBroker, service: &str) -> Arc<Registry> {
    Arc::new(
        Registry::new(
            Arc::new(broker.clone()),
            Arc::new(broker.clone()),
            RegistryOptions::default().with_prefix_naming("test", service),
        )
        .unwrap(),
    )
}

/// Every subscribed service receives its own copy of each message
#[tokio::test]
async fn test_fan_out_to_services() {
    let broker = InMemoryBroker::new();
    let shutdown = CancellationToken::new();
    let seen = Arc::new(Mutex::new(Vec::new()));

    let mut tasks = Vec::new();
    for service in ["billing", "shipping"] {
        let registry = service_registry(&broker, service);
        registry.queue_url_of::<OrderPlaced>().await.unwrap();

        let subscriber = Subscriber::new(Arc::new(broker.clone()), fast_subscriber_config())
            .unwrap()
            .with_queue_resolver(registry);
        let handler = OrderLedger {
            service,
            seen: seen.clone(),
        };
        let shutdown = shutdown.clone();
        tasks.push(tokio::spawn(async move {
            subscriber.subscribe(handler, shutdown).await
        }));
    }

    let publisher = Publisher::new(Arc::new(broker.clone()))
        .with_topic_resolver(service_registry(&broker, "checkout"));
    publisher
        .publish(&order("o-1"), MetadataOverrides::new())
        .await
        .unwrap();
    publisher
        .publish(&order("o-2"), MetadataOverrides::new())
        .await
        .unwrap();

    assert!(wait_until(WAIT, || seen.lock().len() == 4).await);
    shutdown.cancel();
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let mut seen = seen.lock().clone();
    seen.sort();
    assert_eq!(
        seen,
        vec![
            ("billing".to_string(), "o-1".to_string()),
            ("billing".to_string(), "o-2".to_string()),
            ("shipping".to_string(), "o-1".to_string()),
            ("shipping".to_string(), "o-2".to_string()),
        ]
    );
}

/// Messages of another type never reach an unrelated subscriber
#[tokio::test]
async fn test_topics_are_isolated_by_type() {
    let broker = InMemoryBroker::new();
    let registry = service_registry(&broker, "billing");
    let order_queue = registry.queue_url_of::<OrderPlaced>().await.unwrap();
    let shipment_queue = registry.queue_url_of::<ShipmentBooked>().await.unwrap();

    let publisher = Publisher::new(Arc::new(broker.clone())).with_topic_resolver(registry);
    publisher
        .publish(
            &ShipmentBooked {
                shipment_id: "s-1".to_string(),
            },
            MetadataOverrides::new(),
        )
        .await
        .unwrap();

    assert_eq!(broker.queue_depth(&order_queue), 0);
    assert_eq!(broker.queue_depth(&shipment_queue), 1);
}

/// A message that keeps failing moves to the error queue after max_receive_count receives
#[tokio::test]
async fn test_failing_message_is_dead_lettered() {
    let broker = InMemoryBroker::new();
    let registry = service_registry(&broker, "billing");
    let queue_url = registry.queue_url_of::<OrderPlaced>().await.unwrap();
    let error_queue_url = broker
        .queue_url("test-billing-test-orders-OrderPlaced_error")
        .unwrap();

    let errors = ErrorLog::default();
    let config = SubscriberConfig {
        visibility_timeout_seconds: 0,
        ..fast_subscriber_config()
    };
    let subscriber = Subscriber::new(Arc::new(broker.clone()), config)
        .unwrap()
        .with_queue_resolver(registry.clone())
        .with_error_sink(errors.sink());

    let shutdown = CancellationToken::new();
    let task = {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            subscriber
                .subscribe(
                    handler_fn(|_, _: OrderPlaced, _| async {
                        Err(anyhow::anyhow!("always fails"))
                    }),
                    shutdown,
                )
                .await
        })
    };

    Publisher::new(Arc::new(broker.clone()))
        .with_topic_resolver(registry)
        .publish(&order("o-1"), MetadataOverrides::new())
        .await
        .unwrap();

    assert!(wait_until(WAIT, || broker.queue_depth(&error_queue_url) == 1).await);
    shutdown.cancel();
    task.await.unwrap().unwrap();

    assert_eq!(broker.queue_depth(&queue_url), 0);
    assert_eq!(errors.len(), 5);
}

/// A registry built from loaded configuration uses the configured names
#[tokio::test]
async fn test_registry_from_config() {
    let broker = InMemoryBroker::new();
    let config = MessagingConfig {
        naming: NamingConfig::Prefix {
            stage: "prod".to_string(),
            service: "ledger".to_string(),
        },
        ..Default::default()
    };

    let registry = assert_ok!(Registry::from_config(
        Arc::new(broker.clone()),
        Arc::new(broker.clone()),
        &config
    ));
    let queue_url = assert_ok!(registry.queue_url_of::<OrderPlaced>().await);

    assert!(queue_url.ends_with("/prod-ledger-test-orders-OrderPlaced"));
    assert!(broker.topic_arn("prod-test-orders-OrderPlaced").is_some());
}
