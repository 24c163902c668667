//! # Tool Span Linking Demo
//!
//! Simulates an instrumented chat application whose LLM turns call tools.
//! As in the real runtime, each TOOL span finishes (and reaches the
//! processor) before the LLM span that requested it, and every span is
//! handed to the processor on its own.
//!
//! The processor holds the TOOL spans back, then releases them linked to
//! their LLM span. Exported spans are printed to stdout; with `--http` they
//! are shipped to the collector instead (credentials from
//! `FREEPLAY_API_KEY` / `FREEPLAY_PROJECT_ID`, endpoint from
//! `FREEPLAY_OTEL_ENDPOINT`).
//!
//! ## Running
//!
//! ```bash
//! cargo run -p tool-span-linker --bin demo
//!
//! # Aggregate metadata convention, quieter output
//! cargo run -p tool-span-linker --bin demo -- --aggregate --quiet
//!
//! # Ship to the collector, with debug logs
//! RUST_LOG=tool_span_linker=debug cargo run -p tool-span-linker --bin demo -- --http
//! ```

use rand::Rng;
use std::time::Duration;
use tool_span_linker::attributes::{
    OPENINFERENCE_SPAN_KIND, RESPONSE_TOOL_CALLS, TOOL_CALL_ID,
};
use tool_span_linker::{
    BufferConfig, HttpExporter, MetadataConvention, ProcessorConfig, PromptInfo, Span,
    SpanExporterBoxed, SpanKind, SpanProcessor, SpanStatus, StdoutExporter, TelemetryOptions,
    TelemetrySettings,
};
use tracing_subscriber::EnvFilter;

const TOOLS: &[&str] = &["get_weather", "search_flights", "lookup_order"];

struct DemoArgs {
    http: bool,
    quiet: bool,
    convention: MetadataConvention,
    turns: usize,
}

impl DemoArgs {
    fn parse() -> Self {
        let args: Vec<String> = std::env::args().collect();
        Self {
            http: args.iter().any(|a| a == "--http"),
            quiet: args.iter().any(|a| a == "--quiet"),
            convention: if args.iter().any(|a| a == "--aggregate") {
                MetadataConvention::Aggregate
            } else {
                MetadataConvention::SessionId
            },
            turns: if args.iter().any(|a| a == "--quick") { 2 } else { 4 },
        }
    }
}

/// One simulated LLM turn: the TOOL spans it caused, then the LLM span.
fn simulate_turn(
    rng: &mut impl Rng,
    trace_id: u128,
    root_span_id: u64,
    settings: &TelemetrySettings,
) -> Vec<Span> {
    let llm_span_id = rng.gen_range(1..u64::MAX);
    let tool_count = rng.gen_range(1..=TOOLS.len());

    let mut spans = Vec::with_capacity(tool_count + 1);
    let mut calls = Vec::with_capacity(tool_count);

    for tool in TOOLS.iter().take(tool_count) {
        let call_id = format!("call_{:08x}", rng.gen_range(0..u32::MAX));
        let mut span = Span::new(
            trace_id,
            rng.gen_range(1..u64::MAX),
            root_span_id,
            format!("ai.toolCall {tool}"),
            SpanKind::Internal,
        )
        .with_attribute(OPENINFERENCE_SPAN_KIND, "TOOL")
        .with_attribute(TOOL_CALL_ID, call_id.as_str())
        .with_attribute("ai.toolCall.name", *tool);
        settings.apply_to(&mut span);
        span.finish(SpanStatus::Ok);

        calls.push(serde_json::json!({
            "toolCallType": "function",
            "toolCallId": call_id,
            "toolName": tool,
        }));
        spans.push(span);
    }

    let mut llm = Span::new(
        trace_id,
        llm_span_id,
        root_span_id,
        "ai.streamText.doStream".into(),
        SpanKind::Client,
    )
    .with_attribute(OPENINFERENCE_SPAN_KIND, "LLM")
    .with_attribute(RESPONSE_TOOL_CALLS, serde_json::Value::Array(calls).to_string())
    .with_attribute("ai.model.id", "gpt-4o-mini")
    .with_attribute("ai.response.text", "");
    settings.apply_to(&mut llm);
    llm.finish(SpanStatus::Ok);
    spans.push(llm);

    spans
}

fn build_delegate(args: &DemoArgs) -> Result<Box<dyn SpanExporterBoxed>, Box<dyn std::error::Error>> {
    if args.http {
        let resolved = ProcessorConfig::default()
            .with_metadata_convention(args.convention)
            .resolve()?;
        println!("Shipping spans to {}", resolved.endpoint);
        Ok(Box::new(HttpExporter::from_config(&resolved)?))
    } else {
        Ok(Box::new(StdoutExporter::new(!args.quiet)))
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = DemoArgs::parse();
    println!("=== Tool Span Linking Demo ===\n");
    println!("Convention: {:?}, turns: {}\n", args.convention, args.turns);

    let delegate = build_delegate(&args)?;
    let processor = SpanProcessor::new(
        delegate,
        args.convention,
        BufferConfig::default()
            .with_max_entries(1_000)
            .with_max_age(Duration::from_secs(300)),
    );

    let prompt = PromptInfo {
        prompt_template_id: "travel-assistant".into(),
        prompt_template_version_id: "v7".into(),
    };
    let settings = TelemetrySettings::for_prompt(
        &prompt,
        TelemetryOptions {
            function_id: "chat-endpoint".into(),
            session_id: format!("conv-{}", rand::thread_rng().gen_range(1000..9999)),
            ..Default::default()
        },
    );

    let mut rng = rand::thread_rng();
    let trace_id: u128 = u128::from(rng.gen_range(1..u64::MAX)) << 64;
    let root_span_id = rng.gen_range(1..u64::MAX);

    let mut spans_submitted = 0usize;
    for turn in 0..args.turns {
        let spans = simulate_turn(&mut rng, trace_id, root_span_id, &settings);
        let tools = spans.len() - 1;

        for span in spans {
            spans_submitted += 1;
            processor.on_end(span).await?;
        }

        println!(
            "Turn {}: {} tool span(s) linked, {} waiting",
            turn + 1,
            tools,
            processor.buffered_tool_spans()
        );
    }

    // An orphan TOOL span whose LLM span never arrives stays buffered.
    let orphan = Span::new(trace_id, 1, root_span_id, "ai.toolCall".into(), SpanKind::Internal)
        .with_attribute(OPENINFERENCE_SPAN_KIND, "TOOL")
        .with_attribute(TOOL_CALL_ID, "call_orphan");
    spans_submitted += 1;
    processor.on_end(orphan).await?;

    processor.force_flush().await?;
    processor.shutdown().await?;

    let metrics = processor.buffer_metrics();
    println!("\n=== Summary ===");
    println!("Spans submitted:      {spans_submitted}");
    println!("Tool spans buffered:  {}", metrics.spans_buffered);
    println!("Tool spans linked:    {}", metrics.spans_flushed);
    println!("Tool spans stranded:  {}", processor.buffered_tool_spans());

    Ok(())
}
