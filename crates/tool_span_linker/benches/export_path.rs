//! Benchmark of the per-span export path.
//!
//! Measures the attribute hook plus the correlating exporter with a sink that
//! discards everything, so the numbers cover mapping, sanitizing, buffering
//! and linking only.
//!
//! Run with: cargo bench -p tool-span-linker --bench export_path

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use tool_span_linker::attributes::{
    FUNCTION_ID, OPENINFERENCE_SPAN_KIND, RESPONSE_TOOL_CALLS, RUNTIME_SESSION_ID, TOOL_CALL_ID,
};
use tool_span_linker::{
    BufferConfig, MetadataConvention, NullExporter, Span, SpanBatch, SpanKind, SpanProcessor,
};

fn llm_turn(turn: u64, tools: u64) -> Vec<Span> {
    let mut spans = Vec::with_capacity(tools as usize + 1);
    let mut calls = Vec::with_capacity(tools as usize);

    for i in 0..tools {
        let call_id = format!("call-{turn}-{i}");
        spans.push(
            Span::new(1, turn * 100 + i + 1, 0, "ai.toolCall".into(), SpanKind::Internal)
                .with_attribute(OPENINFERENCE_SPAN_KIND, "TOOL")
                .with_attribute(TOOL_CALL_ID, call_id.as_str())
                .with_attribute(FUNCTION_ID, "bench"),
        );
        calls.push(serde_json::json!({ "toolCallId": call_id }));
    }

    spans.push(
        Span::new(1, turn * 100 + 99, 0, "ai.streamText.doStream".into(), SpanKind::Client)
            .with_attribute(OPENINFERENCE_SPAN_KIND, "LLM")
            .with_attribute(RESPONSE_TOOL_CALLS, serde_json::Value::Array(calls).to_string())
            .with_attribute(RUNTIME_SESSION_ID, "bench-session")
            .with_attribute(FUNCTION_ID, "bench"),
    );
    spans
}

/// Every span handed over on its own, as a simple span processor does.
fn bench_on_end(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let mut group = c.benchmark_group("on_end");

    for tools in [1u64, 4, 16] {
        group.throughput(Throughput::Elements(tools + 1));
        group.bench_with_input(BenchmarkId::from_parameter(tools), &tools, |b, &tools| {
            let processor = SpanProcessor::new(
                NullExporter,
                MetadataConvention::SessionId,
                BufferConfig::default(),
            );
            let mut n = 0u64;
            b.to_async(&runtime).iter(|| {
                n += 1;
                let spans = llm_turn(n, tools);
                let processor = &processor;
                async move {
                    for span in spans {
                        processor.on_end(black_box(span)).await.unwrap();
                    }
                }
            });
        });
    }

    group.finish();
}

/// One batch per turn, under both metadata conventions.
fn bench_batch(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let mut group = c.benchmark_group("batch");

    for convention in [MetadataConvention::SessionId, MetadataConvention::Aggregate] {
        group.throughput(Throughput::Elements(9));
        group.bench_function(format!("{convention:?}"), |b| {
            let processor = SpanProcessor::new(NullExporter, convention, BufferConfig::default());
            let mut n = 0u64;
            b.to_async(&runtime).iter(|| {
                n += 1;
                let batch = SpanBatch::with_spans(llm_turn(n, 8));
                let processor = &processor;
                async move { processor.export(black_box(batch)).await.unwrap() }
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_on_end, bench_batch);
criterion_main!(benches);
