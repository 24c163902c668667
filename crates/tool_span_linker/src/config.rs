//! Configuration for the span processor.

use crate::attributes::MetadataConvention;
use crate::buffer::BufferConfig;
use crate::error::ConfigError;
use std::time::Duration;

/// Environment variable holding the API key.
pub const API_KEY_ENV: &str = "FREEPLAY_API_KEY";
/// Environment variable holding the project id.
pub const PROJECT_ID_ENV: &str = "FREEPLAY_PROJECT_ID";
/// Environment variable overriding the collector endpoint.
pub const ENDPOINT_ENV: &str = "FREEPLAY_OTEL_ENDPOINT";
/// Collector endpoint used when neither the configuration nor the
/// environment names one.
pub const DEFAULT_COLLECTOR_URL: &str = "https://api.freeplay.ai/api/v0/otel/v1/traces";

/// Construction parameters for a [`SpanProcessor`](crate::SpanProcessor).
///
/// Unset credentials and endpoint fall back to the environment when the
/// configuration is resolved.
#[derive(Debug, Clone)]
pub struct ProcessorConfig {
    /// API key sent as a bearer token.
    ///
    /// Default: `FREEPLAY_API_KEY`
    pub api_key: Option<String>,

    /// Project the spans belong to.
    ///
    /// Default: `FREEPLAY_PROJECT_ID`
    pub project_id: Option<String>,

    /// Collector endpoint.
    ///
    /// Default: `FREEPLAY_OTEL_ENDPOINT`, then [`DEFAULT_COLLECTOR_URL`]
    pub endpoint: Option<String>,

    /// Metadata attribute convention.
    ///
    /// Default: [`MetadataConvention::SessionId`]
    pub metadata_convention: MetadataConvention,

    /// Tool span buffer bounds.
    ///
    /// Default: unbounded
    pub buffer: BufferConfig,

    /// Timeout for one HTTP export request.
    ///
    /// Default: 10s
    pub request_timeout: Duration,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            project_id: None,
            endpoint: None,
            metadata_convention: MetadataConvention::default(),
            buffer: BufferConfig::default(),
            request_timeout: Duration::from_secs(10),
        }
    }
}

/// A configuration with every required value present.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub api_key: String,
    pub project_id: String,
    pub endpoint: String,
    pub metadata_convention: MetadataConvention,
    pub buffer: BufferConfig,
    pub request_timeout: Duration,
}

impl ProcessorConfig {
    /// Sets the API key.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Sets the project id.
    pub fn with_project_id(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = Some(project_id.into());
        self
    }

    /// Sets the collector endpoint.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Sets the metadata convention.
    pub fn with_metadata_convention(mut self, convention: MetadataConvention) -> Self {
        self.metadata_convention = convention;
        self
    }

    /// Sets the tool span buffer bounds.
    pub fn with_buffer(mut self, buffer: BufferConfig) -> Self {
        self.buffer = buffer;
        self
    }

    /// Sets the HTTP request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Resolves against the process environment.
    pub fn resolve(self) -> Result<ResolvedConfig, ConfigError> {
        self.resolve_with(|name| std::env::var(name).ok())
    }

    /// Resolves using `lookup` for environment fallbacks.
    ///
    /// An explicitly configured value always wins over the environment, even
    /// when it is empty; an empty credential is reported as missing.
    pub fn resolve_with<F>(self, lookup: F) -> Result<ResolvedConfig, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = self
            .api_key
            .or_else(|| lookup(API_KEY_ENV))
            .filter(|v| !v.is_empty())
            .ok_or(ConfigError::MissingApiKey)?;

        let project_id = self
            .project_id
            .or_else(|| lookup(PROJECT_ID_ENV))
            .filter(|v| !v.is_empty())
            .ok_or(ConfigError::MissingProjectId)?;

        let endpoint = self
            .endpoint
            .or_else(|| lookup(ENDPOINT_ENV))
            .unwrap_or_else(|| DEFAULT_COLLECTOR_URL.to_string());

        Ok(ResolvedConfig {
            api_key,
            project_id,
            endpoint,
            metadata_convention: self.metadata_convention,
            buffer: self.buffer,
            request_timeout: self.request_timeout,
        })
    }
}
