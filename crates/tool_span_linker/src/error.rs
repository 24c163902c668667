//! Error types for building a span processor.

use thiserror::Error;

/// Errors raised while resolving configuration or constructing the
/// collector transport. All of them are fatal at construction time.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// No API key in the configuration or `FREEPLAY_API_KEY`.
    #[error(
        "missing Freeplay API key: set it in the processor configuration or the FREEPLAY_API_KEY environment variable"
    )]
    MissingApiKey,

    /// No project id in the configuration or `FREEPLAY_PROJECT_ID`.
    #[error(
        "missing Freeplay project id: set it in the processor configuration or the FREEPLAY_PROJECT_ID environment variable"
    )]
    MissingProjectId,

    /// The collector endpoint is not a usable http(s) URL.
    #[error("invalid collector endpoint {endpoint}: {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    /// A credential cannot be sent as an HTTP header value.
    #[error("invalid value for header {name}: {reason}")]
    InvalidHeader { name: &'static str, reason: String },

    /// The HTTP client could not be built.
    #[error("failed to initialize HTTP exporter with endpoint {endpoint}: {reason}")]
    Client { endpoint: String, reason: String },
}

impl ConfigError {
    /// Returns `true` if the error comes from a missing required value rather
    /// than an unusable one.
    pub fn is_missing_value(&self) -> bool {
        matches!(self, Self::MissingApiKey | Self::MissingProjectId)
    }
}
