//! Resource naming conventions

use crate::envelope::message_name;

/// Topic, queue and error queue names for one payload type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceNames {
    pub topic: String,
    pub queue: String,
    pub error_queue: String,
}

/// Derives broker resource names from a fully-qualified payload type name
pub trait NamingConvention: Send + Sync {
    fn topic_name(&self, type_name: &str) -> String;

    fn queue_name(&self, type_name: &str) -> String;

    fn error_queue_name(&self, type_name: &str) -> String;

    fn resource_names(&self, type_name: &str) -> ResourceNames {
        ResourceNames {
            topic: self.topic_name(type_name),
            queue: self.queue_name(type_name),
            error_queue: self.error_queue_name(type_name),
        }
    }
}

/// Names resources after the message name alone
///
/// `orders.v1.OrderPlaced` yields topic and queue `orders-v1-OrderPlaced` and
/// error queue `orders-v1-OrderPlaced_error`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultNaming;

impl NamingConvention for DefaultNaming {
    fn topic_name(&self, type_name: &str) -> String {
        message_name(type_name)
    }

    fn queue_name(&self, type_name: &str) -> String {
        message_name(type_name)
    }

    fn error_queue_name(&self, type_name: &str) -> String {
        format!("{}_error", message_name(type_name))
    }
}

/// Scopes topics by stage and queues by stage and service
///
/// Every consuming service gets its own queue on the shared topic:
///
/// ```text
/// topic: stage-orders-v1-OrderPlaced
/// queue: stage-service-orders-v1-OrderPlaced
/// error: stage-service-orders-v1-OrderPlaced_error
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefixNaming {
    stage: String,
    service: String,
}

impl PrefixNaming {
    pub fn new(stage: impl Into<String>, service: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            service: service.into(),
        }
    }
}

impl NamingConvention for PrefixNaming {
    fn topic_name(&self, type_name: &str) -> String {
        format!("{}-{}", self.stage, message_name(type_name))
    }

    fn queue_name(&self, type_name: &str) -> String {
        format!("{}-{}-{}", self.stage, self.service, message_name(type_name))
    }

    fn error_queue_name(&self, type_name: &str) -> String {
        format!("{}_error", self.queue_name(type_name))
    }
}
