use opentelemetry_proto::tonic::collector::trace::v1::ExportTraceServiceRequest;
use opentelemetry_proto::tonic::common::v1::any_value;
use opentelemetry_proto::tonic::trace::v1::Span as OtlpSpan;
use prost::Message;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tool_span_linker::attributes::{
    FUNCTION_ID, OPENINFERENCE_SPAN_KIND, PARENT_SPAN_ID, RESPONSE_TOOL_CALLS, RUNTIME_SESSION_ID,
    SESSION_ID, TOOL_CALL_ID,
};
use tool_span_linker::{
    BufferConfig, ConfigError, ExportError, HttpExporter, MetadataConvention, ProcessorConfig,
    Span, SpanBatch, SpanExporter, SpanKind, SpanProcessor,
};

/// Records every exported batch.
#[derive(Default)]
struct TestExporter {
    batches: Mutex<Vec<Vec<Span>>>,
}

impl TestExporter {
    fn batches(&self) -> Vec<Vec<Span>> {
        self.batches.lock().unwrap().clone()
    }
}

impl SpanExporter for TestExporter {
    async fn export(&self, batch: SpanBatch) -> Result<(), ExportError> {
        self.batches.lock().unwrap().push(batch.spans);
        Ok(())
    }

    fn name(&self) -> &str {
        "test"
    }
}

/// A request as seen by the fake collector.
#[derive(Debug)]
struct CapturedRequest {
    request_line: String,
    headers: HashMap<String, String>,
    body: Vec<u8>,
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn string_attribute<'a>(span: &'a OtlpSpan, key: &str) -> Option<&'a str> {
    span.attributes
        .iter()
        .find(|kv| kv.key == key)
        .and_then(|kv| match kv.value.as_ref()?.value.as_ref()? {
            any_value::Value::StringValue(s) => Some(s.as_str()),
            _ => None,
        })
}

/// Minimal HTTP/1.1 collector: answers every request with `status` and
/// forwards what it received.
async fn spawn_collector(status: &'static str) -> (String, mpsc::UnboundedReceiver<CapturedRequest>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        loop {
            let Ok((mut stream, _)) = listener.accept().await else {
                return;
            };

            let mut data = Vec::new();
            let mut chunk = [0u8; 4096];
            let header_end = loop {
                let n = stream.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break None;
                }
                data.extend_from_slice(&chunk[..n]);
                if let Some(pos) = data.windows(4).position(|w| w == b"\r\n\r\n") {
                    break Some(pos + 4);
                }
            };
            let Some(header_end) = header_end else {
                continue;
            };

            let head = String::from_utf8_lossy(&data[..header_end]).to_string();
            let mut lines = head.split("\r\n");
            let request_line = lines.next().unwrap_or_default().to_string();
            let headers: HashMap<String, String> = lines
                .filter_map(|line| line.split_once(':'))
                .map(|(k, v)| (k.trim().to_ascii_lowercase(), v.trim().to_string()))
                .collect();

            let content_length: usize = headers
                .get("content-length")
                .and_then(|v| v.parse().ok())
                .unwrap_or(0);
            while data.len() < header_end + content_length {
                let n = stream.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break;
                }
                data.extend_from_slice(&chunk[..n]);
            }

            let body = data[header_end..].to_vec();
            let response =
                format!("HTTP/1.1 {status}\r\ncontent-length: 0\r\nconnection: close\r\n\r\n");
            stream.write_all(response.as_bytes()).await.unwrap();
            stream.shutdown().await.ok();

            let _ = tx.send(CapturedRequest {
                request_line,
                headers,
                body,
            });
        }
    });

    (format!("http://{addr}/api/v0/otel/v1/traces"), rx)
}

fn tool_span(span_id: u64, call_id: &str) -> Span {
    Span::new(7, span_id, 1, "ai.toolCall".into(), SpanKind::Internal)
        .with_attribute(OPENINFERENCE_SPAN_KIND, "TOOL")
        .with_attribute(TOOL_CALL_ID, call_id)
        .with_attribute(FUNCTION_ID, "travel-agent")
}

fn llm_span(span_id: u64, call_ids: &[&str], session_id: &str) -> Span {
    let calls: Vec<Value> = call_ids
        .iter()
        .map(|id| serde_json::json!({ "toolCallId": id }))
        .collect();
    Span::new(7, span_id, 1, "ai.generateText.doGenerate".into(), SpanKind::Client)
        .with_attribute(OPENINFERENCE_SPAN_KIND, "LLM")
        .with_attribute(RESPONSE_TOOL_CALLS, Value::Array(calls).to_string())
        .with_attribute(RUNTIME_SESSION_ID, session_id)
        .with_attribute(FUNCTION_ID, "travel-agent")
}

fn http_processor(endpoint: &str) -> SpanProcessor<HttpExporter> {
    SpanProcessor::from_config(
        ProcessorConfig::default()
            .with_api_key("test-key")
            .with_project_id("project-123")
            .with_endpoint(endpoint)
            .with_request_timeout(Duration::from_secs(5)),
    )
    .unwrap()
}

#[tokio::test]
async fn test_round_trip_across_batches() {
    let exporter = std::sync::Arc::new(TestExporter::default());
    let processor = SpanProcessor::new(
        std::sync::Arc::clone(&exporter),
        MetadataConvention::SessionId,
        BufferConfig::default(),
    );

    processor
        .export(SpanBatch::with_spans(vec![tool_span(0x11, "t1")]))
        .await
        .unwrap();
    assert!(exporter.batches().is_empty());

    processor
        .export(SpanBatch::with_spans(vec![llm_span(0x22, &["t1"], "session-a")]))
        .await
        .unwrap();

    let batches = exporter.batches();
    assert_eq!(batches.len(), 1);
    let spans = &batches[0];
    assert_eq!(spans.len(), 2);
    assert_eq!(spans[0].span_id, 0x22);
    assert_eq!(spans[0].name, "travel-agent");
    assert_eq!(spans[1].span_id, 0x11);
    assert_eq!(spans[1].string_attribute(PARENT_SPAN_ID), Some("0000000000000022"));
    assert_eq!(spans[1].string_attribute(SESSION_ID), Some("session-a"));
}

#[tokio::test]
async fn test_spans_shipped_to_collector_with_credentials() {
    let (endpoint, mut requests) = spawn_collector("200 OK").await;
    let processor = http_processor(&endpoint);

    processor.on_end(tool_span(0x11, "t1")).await.unwrap();
    processor.on_end(tool_span(0x12, "t2")).await.unwrap();
    assert_eq!(processor.buffered_tool_spans(), 2);

    processor
        .on_end(llm_span(0x22, &["t1", "t2"], "session-b"))
        .await
        .unwrap();

    let request = tokio::time::timeout(Duration::from_secs(5), requests.recv())
        .await
        .unwrap()
        .unwrap();

    assert!(request.request_line.starts_with("POST /api/v0/otel/v1/traces"));
    assert_eq!(request.headers["authorization"], "Bearer test-key");
    assert_eq!(request.headers["x-freeplay-project-id"], "project-123");
    assert_eq!(request.headers["content-type"], "application/x-protobuf");

    let decoded = ExportTraceServiceRequest::decode(request.body.as_slice()).unwrap();
    assert_eq!(decoded.resource_spans.len(), 1);
    let spans = &decoded.resource_spans[0].scope_spans[0].spans;
    assert_eq!(spans.len(), 3);

    let llm = &spans[0];
    assert_eq!(llm.name, "travel-agent");
    assert_eq!(hex(&llm.trace_id), format!("{:032x}", 7));
    assert_eq!(hex(&llm.span_id), "0000000000000022");

    for tool in &spans[1..] {
        assert_eq!(tool.trace_id, llm.trace_id);
        assert_eq!(string_attribute(tool, PARENT_SPAN_ID), Some(hex(&llm.span_id).as_str()));
        assert_eq!(string_attribute(tool, SESSION_ID), Some("session-b"));
    }

    processor.shutdown().await.unwrap();
    assert!(requests.try_recv().is_err());
}

#[tokio::test]
async fn test_collector_rejection_is_reported() {
    let (endpoint, _requests) = spawn_collector("503 Service Unavailable").await;
    let processor = http_processor(&endpoint);

    let result = processor
        .on_end(Span::new(7, 3, 1, "http.request".into(), SpanKind::Server))
        .await;

    match result {
        Err(ExportError::Transport(message)) => assert!(message.contains("503")),
        other => panic!("expected transport error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_buffered_tool_span_never_reaches_collector() {
    let (endpoint, mut requests) = spawn_collector("200 OK").await;
    let processor = http_processor(&endpoint);

    processor.on_end(tool_span(0x11, "t1")).await.unwrap();
    processor.force_flush().await.unwrap();
    processor.shutdown().await.unwrap();

    assert_eq!(processor.buffered_tool_spans(), 1);
    assert!(
        tokio::time::timeout(Duration::from_millis(200), requests.recv())
            .await
            .is_err()
    );
}

#[test]
fn test_construction_fails_fast() {
    let err = SpanProcessor::from_config(
        ProcessorConfig::default()
            .with_api_key("")
            .with_project_id("project-123"),
    )
    .err()
    .unwrap();
    assert_eq!(err, ConfigError::MissingApiKey);

    let err = SpanProcessor::from_config(
        ProcessorConfig::default()
            .with_api_key("test-key")
            .with_project_id("")
            .with_endpoint("http://localhost:4318/v1/traces"),
    )
    .err()
    .unwrap();
    assert_eq!(err, ConfigError::MissingProjectId);

    let err = SpanProcessor::from_config(
        ProcessorConfig::default()
            .with_api_key("test-key")
            .with_project_id("project-123")
            .with_endpoint("::not a url::"),
    )
    .err()
    .unwrap();
    assert!(matches!(err, ConfigError::InvalidEndpoint { .. }));
}
