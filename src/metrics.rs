//! Prometheus metrics for messaging

use lazy_static::lazy_static;
use prometheus::{register_counter_vec, register_histogram_vec, CounterVec, HistogramVec};

/// Messaging metrics
pub struct MessagingMetrics {
    /// Messages published counter
    pub messages_published: CounterVec,

    /// Message publish failures
    pub publish_failures: CounterVec,

    /// Messages handled and acknowledged
    pub messages_consumed: CounterVec,

    /// Consume failures by stage (receive, decode, handle, delete)
    pub consume_failures: CounterVec,

    /// Handler latency
    pub handle_latency: HistogramVec,

    /// Topics, queues and subscriptions created
    pub resources_provisioned: CounterVec,
}

lazy_static! {
    pub static ref MESSAGING_METRICS: MessagingMetrics = MessagingMetrics {
        messages_published: register_counter_vec!(
            "bus_messages_published_total",
            "Total number of messages published",
            &["message_type"]
        )
        .unwrap(),

        publish_failures: register_counter_vec!(
            "bus_publish_failures_total",
            "Total number of publish failures",
            &["message_type", "error"]
        )
        .unwrap(),

        messages_consumed: register_counter_vec!(
            "bus_messages_consumed_total",
            "Total number of messages handled and acknowledged",
            &["message_type"]
        )
        .unwrap(),

        consume_failures: register_counter_vec!(
            "bus_consume_failures_total",
            "Total number of consume failures",
            &["message_type", "stage"]
        )
        .unwrap(),

        handle_latency: register_histogram_vec!(
            "bus_handle_latency_seconds",
            "Message handler latency in seconds",
            &["message_type"]
        )
        .unwrap(),

        resources_provisioned: register_counter_vec!(
            "bus_resources_provisioned_total",
            "Total number of broker resources provisioned",
            &["kind"]
        )
        .unwrap(),
    };
}

/// Initialize messaging metrics
pub fn init_messaging_metrics() {
    lazy_static::initialize(&MESSAGING_METRICS);
}

/// Render all registered metrics in the Prometheus text format
pub fn gather_text() -> String {
    use prometheus::Encoder;

    let encoder = prometheus::TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&prometheus::gather(), &mut buffer) {
        tracing::warn!(error = %e, "Failed to encode metrics");
    }
    String::from_utf8_lossy(&buffer).into_owned()
}
