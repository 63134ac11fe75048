use super::Provider;

#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    /// The event sequence contradicts the channel state (delta for a slot
    /// that never started, duplicate start, content after the finish reason)
    #[error("Protocol violation from {provider}: {message}")]
    ProtocolViolation { provider: Provider, message: String },
    /// A native event or content kind this crate does not translate yet
    #[error("Unsupported {provider} stream feature: {feature}")]
    Unsupported { provider: Provider, feature: String },
    /// The provider reported an error inside the stream
    #[error("Provider error from {provider}: {message}")]
    Upstream { provider: Provider, message: String },
    /// A native payload could not be deserialized
    #[error("Failed to parse event: {0}")]
    Parse(String),
    /// The chunk sequence handed to the accumulator is malformed
    #[error("Malformed chunk sequence: {0}")]
    Accumulate(String),
    /// I/O error
    #[error("I/O error: {0}")]
    IOError(String),
    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl StreamError {
    pub fn violation(provider: Provider, message: impl Into<String>) -> Self {
        Self::ProtocolViolation {
            provider,
            message: message.into(),
        }
    }

    pub fn unsupported(provider: Provider, feature: impl Into<String>) -> Self {
        Self::Unsupported {
            provider,
            feature: feature.into(),
        }
    }

    pub fn upstream(provider: Provider, message: impl Into<String>) -> Self {
        Self::Upstream {
            provider,
            message: message.into(),
        }
    }

    pub const fn is_protocol_violation(&self) -> bool {
        matches!(self, Self::ProtocolViolation { .. })
    }

    pub const fn is_unsupported(&self) -> bool {
        matches!(self, Self::Unsupported { .. })
    }
}

impl From<std::io::Error> for StreamError {
    fn from(err: std::io::Error) -> Self {
        Self::IOError(err.to_string())
    }
}

impl From<serde_json::Error> for StreamError {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse(err.to_string())
    }
}

impl From<config::ConfigError> for StreamError {
    fn from(err: config::ConfigError) -> Self {
        Self::ConfigError(err.to_string())
    }
}

pub type Result<T, E = StreamError> = std::result::Result<T, E>;
