//! HTTP exporter that ships span batches to the trace collector.
//!
//! Each batch is POSTed as an OTLP/HTTP protobuf `ExportTraceServiceRequest`
//! with a bearer token and the project header. The exporter neither retries
//! nor buffers; failures are returned to the caller as they happen.

use crate::config::ResolvedConfig;
use crate::error::ConfigError;
use crate::exporter::{ExportError, SpanExporter};
use crate::otlp::to_export_request;
use crate::span::SpanBatch;
use prost::Message;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use url::Url;

/// Header carrying the project the spans belong to.
pub const PROJECT_ID_HEADER: &str = "x-freeplay-project-id";
/// Content type of an OTLP/HTTP protobuf body.
pub const PROTOBUF_CONTENT_TYPE: &str = "application/x-protobuf";

/// Delegate sink posting batches to the collector endpoint.
#[derive(Debug)]
pub struct HttpExporter {
    client: reqwest::Client,
    endpoint: Url,
    is_shutdown: AtomicBool,
}

impl HttpExporter {
    /// Builds an exporter for `endpoint` authenticated with `api_key` and
    /// scoped to `project_id`.
    pub fn new(
        endpoint: &str,
        api_key: &str,
        project_id: &str,
        timeout: Duration,
    ) -> Result<Self, ConfigError> {
        let endpoint_url = Url::parse(endpoint).map_err(|e| ConfigError::InvalidEndpoint {
            endpoint: endpoint.to_string(),
            reason: e.to_string(),
        })?;
        if !matches!(endpoint_url.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidEndpoint {
                endpoint: endpoint.to_string(),
                reason: format!("unsupported scheme {}", endpoint_url.scheme()),
            });
        }

        let mut headers = HeaderMap::new();
        let mut bearer = HeaderValue::from_str(&format!("Bearer {api_key}")).map_err(|e| {
            ConfigError::InvalidHeader {
                name: "authorization",
                reason: e.to_string(),
            }
        })?;
        bearer.set_sensitive(true);
        headers.insert(AUTHORIZATION, bearer);
        headers.insert(
            PROJECT_ID_HEADER,
            HeaderValue::from_str(project_id).map_err(|e| ConfigError::InvalidHeader {
                name: PROJECT_ID_HEADER,
                reason: e.to_string(),
            })?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(PROTOBUF_CONTENT_TYPE));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| ConfigError::Client {
                endpoint: endpoint.to_string(),
                reason: e.to_string(),
            })?;

        tracing::debug!(endpoint = %endpoint_url, "initialized collector HTTP exporter");

        Ok(Self {
            client,
            endpoint: endpoint_url,
            is_shutdown: AtomicBool::new(false),
        })
    }

    /// Builds an exporter from a resolved configuration.
    pub fn from_config(config: &ResolvedConfig) -> Result<Self, ConfigError> {
        Self::new(
            &config.endpoint,
            &config.api_key,
            &config.project_id,
            config.request_timeout,
        )
    }

    /// The collector endpoint.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

fn transport_error(error: &reqwest::Error) -> ExportError {
    if error.is_timeout() {
        ExportError::Timeout
    } else {
        ExportError::Transport(error.to_string())
    }
}

impl SpanExporter for HttpExporter {
    async fn export(&self, batch: SpanBatch) -> Result<(), ExportError> {
        if self.is_shutdown.load(Ordering::Acquire) {
            return Err(ExportError::Shutdown);
        }

        let body = to_export_request(&batch.spans).encode_to_vec();

        let response = self
            .client
            .post(self.endpoint.clone())
            .body(body)
            .send()
            .await
            .map_err(|e| transport_error(&e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ExportError::Transport(format!(
                "collector at {} responded with {status}",
                self.endpoint
            )));
        }

        tracing::trace!(spans = batch.spans.len(), %status, "exported batch to collector");
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), ExportError> {
        self.is_shutdown.store(true, Ordering::Release);
        Ok(())
    }

    fn name(&self) -> &str {
        "http"
    }
}
