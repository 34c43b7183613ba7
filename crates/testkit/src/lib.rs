use chrono::{DateTime, Duration, SecondsFormat, TimeZone, Utc};
use serde_json::{Value, json};

pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap()
}

fn at(ms: i64) -> String {
    (base_time() + Duration::milliseconds(ms)).to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// An agent run: a workflow root, an LLM call, a tool call and a nested
/// retrieval under the tool. Canonical field names.
pub fn sample_trace(trace_id: &str) -> Vec<Value> {
    vec![
        json!({
            "trace_id": trace_id,
            "span_id": "a1b2c3d4e5f60001",
            "parent_span_id": null,
            "span_name": "agent.run",
            "start_time": at(0),
            "timestamp": at(1800),
            "latency": 1.8,
            "metadata": {"customer": "acme"}
        }),
        json!({
            "trace_id": trace_id,
            "span_id": "a1b2c3d4e5f60002",
            "parent_span_id": "a1b2c3d4e5f60001",
            "span_name": "openai.chat",
            "model": "gpt-4o-mini",
            "start_time": at(120),
            "timestamp": at(900),
            "prompt_tokens": 312,
            "completion_tokens": 48,
            "cost": 0.000076
        }),
        json!({
            "trace_id": trace_id,
            "span_id": "a1b2c3d4e5f60003",
            "parent_span_id": "a1b2c3d4e5f60001",
            "span_name": "tool.search",
            "start_time": at(950),
            "timestamp": at(1700),
            "input": "{\"query\": \"weather in paris\"}"
        }),
        json!({
            "trace_id": trace_id,
            "span_id": "a1b2c3d4e5f60004",
            "parent_span_id": "a1b2c3d4e5f60003",
            "span_name": "retriever.fetch",
            "start_time": at(1000),
            "timestamp": at(1650)
        }),
    ]
}

/// The same run in the trace ingest payload layout.
pub fn sample_ingest_trace(trace_id: &str) -> Vec<Value> {
    sample_trace(trace_id)
        .into_iter()
        .map(|span| {
            let Value::Object(map) = span else {
                unreachable!("sample spans are objects")
            };
            let renamed = map
                .into_iter()
                .map(|(key, value)| {
                    let key = match key.as_str() {
                        "trace_id" => "trace_unique_id".to_string(),
                        "span_id" => "span_unique_id".to_string(),
                        "parent_span_id" => "span_parent_id".to_string(),
                        _ => key,
                    };
                    (key, value)
                })
                .collect();
            Value::Object(renamed)
        })
        .collect()
}

/// Spans with identifiers only, as some exports drop timing entirely.
pub fn untimed_trace(trace_id: &str) -> Vec<Value> {
    vec![
        json!({"trace_id": trace_id, "span_id": "0001", "span_name": "root"}),
        json!({"trace_id": trace_id, "span_id": "0002", "parent_span_id": "0001", "span_name": "child"}),
    ]
}
