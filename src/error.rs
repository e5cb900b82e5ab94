//! Error types for messaging operations

/// Result type for messaging operations
pub type MessagingResult<T> = std::result::Result<T, MessagingError>;

/// Errors that can occur during messaging operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MessagingError {
    /// Payload could not be boxed into an envelope
    #[error("Encode error: {0}")]
    Encode(String),

    /// Envelope bytes were malformed or carried an unexpected payload type
    #[error("Decode error: {0}")]
    Decode(String),

    /// Topic or queue could not be determined or provisioned
    #[error("Resolution failed: {0}")]
    Resolution(String),

    /// A broker or queue call failed
    #[error("Transport error ({operation}): {message}")]
    Transport { operation: String, message: String },

    /// Message handler returned an error
    #[error("Handler error: {0}")]
    Handler(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl MessagingError {
    /// Build a transport error for the named broker operation
    pub fn transport(operation: impl Into<String>, message: impl Into<String>) -> Self {
        MessagingError::Transport {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Short label used for metrics and log fields
    pub fn kind(&self) -> &'static str {
        match self {
            MessagingError::Encode(_) => "encode",
            MessagingError::Decode(_) => "decode",
            MessagingError::Resolution(_) => "resolution",
            MessagingError::Transport { .. } => "transport",
            MessagingError::Handler(_) => "handler",
            MessagingError::Configuration(_) => "configuration",
        }
    }
}

impl From<prost::EncodeError> for MessagingError {
    fn from(err: prost::EncodeError) -> Self {
        MessagingError::Encode(err.to_string())
    }
}

impl From<prost::DecodeError> for MessagingError {
    fn from(err: prost::DecodeError) -> Self {
        MessagingError::Decode(err.to_string())
    }
}

impl From<base64ct::Error> for MessagingError {
    fn from(err: base64ct::Error) -> Self {
        MessagingError::Decode(format!("invalid base64 body: {}", err))
    }
}

impl From<serde_json::Error> for MessagingError {
    fn from(err: serde_json::Error) -> Self {
        MessagingError::Decode(err.to_string())
    }
}

impl From<config::ConfigError> for MessagingError {
    fn from(err: config::ConfigError) -> Self {
        MessagingError::Configuration(err.to_string())
    }
}
