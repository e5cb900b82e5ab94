//! Messaging configuration

use crate::error::{MessagingError, MessagingResult};
use crate::registry::{DefaultNaming, NamingConvention, PrefixNaming};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Upper bound the queue service places on a single receive call
pub const MAX_MESSAGES_PER_RECEIVE: u32 = 10;

/// Main messaging configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessagingConfig {
    /// Resource naming convention
    #[serde(default)]
    pub naming: NamingConfig,

    /// Registry configuration
    #[serde(default)]
    pub registry: RegistryConfig,

    /// Subscriber configuration
    #[serde(default)]
    pub subscriber: SubscriberConfig,
}

impl MessagingConfig {
    /// Load configuration from the embedded defaults, an optional file and the environment
    pub fn load() -> MessagingResult<Self> {
        let config_path =
            std::env::var("BUS_CONFIG_PATH").unwrap_or_else(|_| "config/bus.toml".to_string());

        Self::load_from(Path::new(&config_path))
    }

    /// Load configuration using the given file as the override layer
    pub fn load_from(path: &Path) -> MessagingResult<Self> {
        let config: MessagingConfig = config::Config::builder()
            // Start with default values
            .add_source(config::File::from_str(
                include_str!("../config/default.toml"),
                config::FileFormat::Toml,
            ))
            // Override with config file if it exists
            .add_source(config::File::from(path).required(false))
            // Override with environment variables (prefix: BUS__)
            .add_source(
                config::Environment::with_prefix("BUS")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// Validate every section
    pub fn validate(&self) -> MessagingResult<()> {
        self.naming.validate()?;
        self.registry.validate()?;
        self.subscriber.validate()
    }
}

/// Naming convention selection
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "convention", rename_all = "snake_case")]
pub enum NamingConfig {
    /// Resource names derived from the message name alone
    #[default]
    Default,

    /// Resource names scoped by stage, with queues further scoped by service
    Prefix { stage: String, service: String },
}

impl NamingConfig {
    /// Validate the naming configuration
    pub fn validate(&self) -> MessagingResult<()> {
        if let NamingConfig::Prefix { stage, service } = self {
            if stage.is_empty() {
                return Err(MessagingError::Configuration(
                    "prefix naming requires a stage".to_string(),
                ));
            }
            if service.is_empty() {
                return Err(MessagingError::Configuration(
                    "prefix naming requires a service".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Build the configured naming convention
    pub fn build(&self) -> Arc<dyn NamingConvention> {
        match self {
            NamingConfig::Default => Arc::new(DefaultNaming),
            NamingConfig::Prefix { stage, service } => {
                Arc::new(PrefixNaming::new(stage.clone(), service.clone()))
            }
        }
    }
}

/// Registry configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Failed receives before a message is moved to the error queue
    #[serde(default = "default_max_receive_count")]
    pub max_receive_count: u32,
}

impl RegistryConfig {
    /// Validate the registry configuration
    pub fn validate(&self) -> MessagingResult<()> {
        if !(1..=1000).contains(&self.max_receive_count) {
            return Err(MessagingError::Configuration(format!(
                "max_receive_count must be between 1 and 1000, got {}",
                self.max_receive_count
            )));
        }
        Ok(())
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            max_receive_count: default_max_receive_count(),
        }
    }
}

/// Subscriber polling configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriberConfig {
    /// Maximum messages requested per receive call
    #[serde(default = "default_max_number_of_messages")]
    pub max_number_of_messages: u32,

    /// Delay between receive calls (milliseconds)
    #[serde(default = "default_receive_interval_ms")]
    pub receive_interval_ms: u64,

    /// Long-poll wait time for each receive call
    #[serde(default = "default_wait_time_seconds")]
    pub wait_time_seconds: u32,

    /// Visibility timeout applied to received messages
    #[serde(default = "default_visibility_timeout_seconds")]
    pub visibility_timeout_seconds: u32,

    /// Maximum number of messages being handled concurrently
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,
}

impl SubscriberConfig {
    /// Receive interval as a duration
    pub fn receive_interval(&self) -> Duration {
        Duration::from_millis(self.receive_interval_ms)
    }

    /// Validate the subscriber configuration
    pub fn validate(&self) -> MessagingResult<()> {
        if !(1..=MAX_MESSAGES_PER_RECEIVE).contains(&self.max_number_of_messages) {
            return Err(MessagingError::Configuration(format!(
                "max_number_of_messages must be between 1 and {}, got {}",
                MAX_MESSAGES_PER_RECEIVE, self.max_number_of_messages
            )));
        }

        if self.receive_interval_ms == 0 {
            return Err(MessagingError::Configuration(
                "receive_interval_ms must be greater than 0".to_string(),
            ));
        }

        if self.wait_time_seconds > 20 {
            return Err(MessagingError::Configuration(format!(
                "wait_time_seconds must be at most 20, got {}",
                self.wait_time_seconds
            )));
        }

        if self.visibility_timeout_seconds > 43_200 {
            return Err(MessagingError::Configuration(format!(
                "visibility_timeout_seconds must be at most 43200, got {}",
                self.visibility_timeout_seconds
            )));
        }

        if self.max_in_flight == 0 {
            return Err(MessagingError::Configuration(
                "max_in_flight must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for SubscriberConfig {
    fn default() -> Self {
        Self {
            max_number_of_messages: default_max_number_of_messages(),
            receive_interval_ms: default_receive_interval_ms(),
            wait_time_seconds: default_wait_time_seconds(),
            visibility_timeout_seconds: default_visibility_timeout_seconds(),
            max_in_flight: default_max_in_flight(),
        }
    }
}

fn default_max_receive_count() -> u32 {
    5
}

fn default_max_number_of_messages() -> u32 {
    10
}

fn default_receive_interval_ms() -> u64 {
    1000
}

fn default_wait_time_seconds() -> u32 {
    20
}

fn default_visibility_timeout_seconds() -> u32 {
    15
}

fn default_max_in_flight() -> usize {
    100
}
