use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SpantailError};

/// Unrecognized kinds deserialize as `Unknown` instead of failing the
/// batch.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum SpanKind {
    Chain,
    Retriever,
    Reranker,
    Llm,
    Embedding,
    Tool,
    Agent,
    #[serde(other)]
    #[default]
    Unknown,
}

impl SpanKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Chain => "CHAIN",
            Self::Retriever => "RETRIEVER",
            Self::Reranker => "RERANKER",
            Self::Llm => "LLM",
            Self::Embedding => "EMBEDDING",
            Self::Tool => "TOOL",
            Self::Agent => "AGENT",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl FromStr for SpanKind {
    type Err = SpantailError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "CHAIN" => Ok(Self::Chain),
            "RETRIEVER" => Ok(Self::Retriever),
            "RERANKER" => Ok(Self::Reranker),
            "LLM" => Ok(Self::Llm),
            "EMBEDDING" => Ok(Self::Embedding),
            "TOOL" => Ok(Self::Tool),
            "AGENT" => Ok(Self::Agent),
            _ => Err(SpantailError::Parse(format!("unknown span kind: {s}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum StatusCode {
    Ok,
    Error,
    #[default]
    Unset,
}

impl StatusCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::Error => "ERROR",
            Self::Unset => "UNSET",
        }
    }
}

impl FromStr for StatusCode {
    type Err = SpantailError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "OK" => Ok(Self::Ok),
            "ERROR" => Ok(Self::Error),
            "UNSET" => Ok(Self::Unset),
            _ => Err(SpantailError::Parse(format!("unknown status code: {s}"))),
        }
    }
}

/// `parent_id` may reference a span outside the current batch; the tree
/// builder treats such records as roots.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SpanRecord {
    pub trace_id: String,
    pub span_id: String,
    #[serde(default)]
    pub parent_id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub kind: SpanKind,
    #[serde(default)]
    pub status_code: StatusCode,
    pub start_time: DateTime<Utc>,
    #[serde(default)]
    pub latency_ms: Option<i64>,
    #[serde(default)]
    pub token_count_prompt: Option<i64>,
    #[serde(default)]
    pub token_count_completion: Option<i64>,
    #[serde(default)]
    pub token_count_total: Option<i64>,
    #[serde(default)]
    pub input: Option<String>,
    #[serde(default)]
    pub output: Option<String>,
    #[serde(default = "default_attrs_json")]
    pub attrs_json: String,
    #[serde(default)]
    pub evals: BTreeMap<String, serde_json::Value>,
}

fn default_attrs_json() -> String {
    "{}".to_string()
}

impl SpanRecord {
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    /// A record without a span id cannot be keyed and is dropped at the
    /// boundary.
    pub fn is_well_formed(&self) -> bool {
        !self.span_id.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_parse() {
        assert_eq!(SpanKind::from_str("llm").unwrap(), SpanKind::Llm);
        assert!(SpanKind::from_str("widget").is_err());
    }

    #[test]
    fn unknown_kind_deserializes() {
        let record: SpanRecord = serde_json::from_str(
            r#"{"trace_id":"t1","span_id":"s1","name":"guardrail check",
                "kind":"GUARDRAIL","start_time":"2026-02-01T00:00:00Z"}"#,
        )
        .unwrap();
        assert_eq!(record.kind, SpanKind::Unknown);
        assert_eq!(record.status_code, StatusCode::Unset);
        assert_eq!(record.attrs_json, "{}");
    }

    #[test]
    fn well_formed_requires_span_id() {
        let mut record: SpanRecord = serde_json::from_str(
            r#"{"trace_id":"t1","span_id":"s1","name":"n",
                "start_time":"2026-02-01T00:00:00Z"}"#,
        )
        .unwrap();
        assert!(record.is_well_formed());
        record.span_id.clear();
        assert!(!record.is_well_formed());
    }
}
