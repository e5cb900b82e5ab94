use clap::Parser;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use topic_queue_bus::{
    handler_fn, InMemoryBroker, MessagingConfig, Metadata, MetadataOverrides, NamingConfig,
    Publisher, Registry, Subscriber,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Publish greetings through an in-process broker and consume them again
#[derive(Debug, Parser)]
#[command(name = "bus-demo", version, about)]
struct Args {
    /// Deployment stage used as resource name prefix
    #[arg(long, env = "BUS_STAGE", default_value = "dev")]
    stage: String,

    /// Consuming service name
    #[arg(long, env = "BUS_SERVICE", default_value = "demo")]
    service: String,

    /// Number of messages to publish
    #[arg(long, default_value_t = 5, value_parser = clap::value_parser!(u64).range(1..))]
    count: u64,

    /// Delay between publishes (milliseconds)
    #[arg(long, default_value_t = 500)]
    interval_ms: u64,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,
}

#[derive(Clone, PartialEq, prost::Message)]
struct Greeting {
    #[prost(uint64, tag = "1")]
    sequence: u64,
    #[prost(string, tag = "2")]
    text: String,
}

impl prost::Name for Greeting {
    const NAME: &'static str = "Greeting";
    const PACKAGE: &'static str = "demo.v1";
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize tracing
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "topic_queue_bus=info,bus_demo=info".into());
    if args.json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    // Load configuration
    let mut config = MessagingConfig::load().unwrap_or_else(|e| {
        tracing::warn!("Failed to load configuration: {}", e);
        tracing::warn!("Using default configuration");
        MessagingConfig::default()
    });
    config.naming = NamingConfig::Prefix {
        stage: args.stage.clone(),
        service: args.service.clone(),
    };
    config.validate()?;

    topic_queue_bus::metrics::init_messaging_metrics();

    let broker = Arc::new(InMemoryBroker::new());
    let registry = Arc::new(Registry::from_config(broker.clone(), broker.clone(), &config)?);
    let publisher = Publisher::new(broker.clone()).with_topic_resolver(registry.clone());
    let subscriber = Subscriber::new(broker.clone(), config.subscriber.clone())?
        .with_queue_resolver(registry.clone())
        .with_error_sink(|e| tracing::error!("Consume failed: {}", e));

    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Received Ctrl-C, shutting down");
                shutdown.cancel();
            }
        });
    }

    // Provision the subscription before publishing so no greeting is missed
    let queue_url = registry.queue_url_of::<Greeting>().await?;
    tracing::info!("Consuming from {}", queue_url);

    let received = Arc::new(AtomicU64::new(0));
    let handler = {
        let received = received.clone();
        let shutdown = shutdown.clone();
        let expected = args.count;
        handler_fn(move |_, greeting: Greeting, metadata: Metadata| {
            let received = received.clone();
            let shutdown = shutdown.clone();
            async move {
                tracing::info!(
                    sequence = greeting.sequence,
                    envelope_id = %metadata.id,
                    correlation_id = %metadata.correlation_id,
                    "{}",
                    greeting.text
                );
                if received.fetch_add(1, Ordering::SeqCst) + 1 >= expected {
                    shutdown.cancel();
                }
                Ok(())
            }
        })
    };

    let consumer = {
        let shutdown = shutdown.clone();
        tokio::spawn(async move { subscriber.subscribe(handler, shutdown).await })
    };

    let correlation_id = uuid::Uuid::new_v4().to_string();
    for sequence in 1..=args.count {
        if shutdown.is_cancelled() {
            break;
        }

        let greeting = Greeting {
            sequence,
            text: format!("hello from {}", args.service),
        };
        publisher
            .publish(
                &greeting,
                MetadataOverrides::new().with_correlation_id(correlation_id.clone()),
            )
            .await?;

        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = tokio::time::sleep(Duration::from_millis(args.interval_ms)) => {}
        }
    }

    consumer.await??;

    tracing::info!(
        "Received {} of {} greetings",
        received.load(Ordering::SeqCst),
        args.count
    );
    if std::env::var("BUS_PRINT_METRICS").is_ok() {
        println!("{}", topic_queue_bus::metrics::gather_text());
    }

    Ok(())
}
