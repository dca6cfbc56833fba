use chrono::{Duration, TimeZone, Utc};
use spantail_core::model::span::{SpanKind, SpanRecord, StatusCode};

/// Minimal span for tree-shape tests: only identity and linkage matter.
pub fn span(span_id: &str, parent_id: Option<&str>) -> SpanRecord {
    let base = Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap();
    SpanRecord {
        trace_id: "trace-1".to_string(),
        span_id: span_id.to_string(),
        parent_id: parent_id.map(str::to_string),
        name: format!("span {span_id}"),
        kind: SpanKind::Chain,
        status_code: StatusCode::Ok,
        start_time: base,
        latency_ms: Some(10),
        token_count_prompt: None,
        token_count_completion: None,
        token_count_total: None,
        input: None,
        output: None,
        attrs_json: "{}".to_string(),
        evals: Default::default(),
    }
}

/// A realistic RAG-shaped trace: a root chain with a retriever branch
/// (one embedding child) and an LLM leaf, start times in causal order.
pub fn sample_batch(trace_id: &str) -> Vec<SpanRecord> {
    let base = Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap();
    let mk = |span_id: &str,
              parent_id: Option<&str>,
              name: &str,
              kind: SpanKind,
              offset_ms: i64,
              latency_ms: i64| SpanRecord {
        trace_id: trace_id.to_string(),
        span_id: span_id.to_string(),
        parent_id: parent_id.map(str::to_string),
        name: name.to_string(),
        kind,
        status_code: StatusCode::Ok,
        start_time: base + Duration::milliseconds(offset_ms),
        latency_ms: Some(latency_ms),
        token_count_prompt: None,
        token_count_completion: None,
        token_count_total: None,
        input: None,
        output: None,
        attrs_json: "{}".to_string(),
        evals: Default::default(),
    };

    let mut llm = mk("llm-1", Some("root-1"), "ChatCompletion", SpanKind::Llm, 430, 1250);
    llm.token_count_prompt = Some(812);
    llm.token_count_completion = Some(96);
    llm.token_count_total = Some(908);
    llm.attrs_json = r#"{"model":"gpt-4o"}"#.to_string();

    vec![
        mk("root-1", None, "RetrievalQA", SpanKind::Chain, 0, 1800),
        mk("retriever-1", Some("root-1"), "VectorStoreRetriever", SpanKind::Retriever, 20, 380),
        mk("embed-1", Some("retriever-1"), "embed_query", SpanKind::Embedding, 25, 120),
        llm,
    ]
}
