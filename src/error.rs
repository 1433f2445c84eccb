//! Error types for the search gateway.

use thiserror::Error;

/// Result type alias for gateway operations.
pub type Result<T> = std::result::Result<T, GatewayError>;

/// Maximum number of characters of an upstream body kept in an error.
pub const BODY_EXCERPT_LIMIT: usize = 500;

/// Errors that can occur while serving a search.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// Malformed tool arguments. Raised before any network call.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Upstream answered with a non-retryable status, or retries ran out.
    #[error("Upstream returned HTTP {status}: {body}")]
    Upstream {
        /// HTTP status of the last response.
        status: u16,
        /// Truncated response body.
        body: String,
    },

    /// No HTTP response was received after all attempts.
    #[error("Network error: {0}")]
    Network(String),

    /// Missing or malformed process configuration.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl GatewayError {
    /// Builds an upstream error, truncating the body excerpt.
    pub fn upstream(status: u16, body: &str) -> Self {
        Self::Upstream {
            status,
            body: excerpt(body),
        }
    }

    /// Stable machine-readable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "input_validation",
            Self::Upstream { .. } => "upstream",
            Self::Network(_) => "network",
            Self::Config(_) => "config",
        }
    }

    /// Human-readable detail without the kind prefix.
    pub fn detail(&self) -> String {
        match self {
            Self::InvalidInput(msg) | Self::Network(msg) | Self::Config(msg) => msg.clone(),
            Self::Upstream { status, body } => format!("HTTP {}: {}", status, body),
        }
    }
}

fn excerpt(body: &str) -> String {
    body.chars().take(BODY_EXCERPT_LIMIT).collect()
}
