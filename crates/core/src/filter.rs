use std::collections::HashMap;
use std::str::FromStr;

use glob::Pattern;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SpantailError};
use crate::model::span::{SpanKind, SpanRecord, StatusCode};

/// Columns the source accepts as a sort key; anything else is a no-op.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SortColumn {
    StartTime,
    LatencyMs,
    TokenCountTotal,
}

impl SortColumn {
    pub fn parse(input: &str) -> Option<Self> {
        match input {
            "start_time" => Some(Self::StartTime),
            "latency_ms" => Some(Self::LatencyMs),
            "token_count_total" => Some(Self::TokenCountTotal),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StartTime => "start_time",
            Self::LatencyMs => "latency_ms",
            Self::TokenCountTotal => "token_count_total",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl SortDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct SortSpec {
    pub column: SortColumn,
    pub direction: SortDirection,
}

impl Default for SortSpec {
    fn default() -> Self {
        Self {
            column: SortColumn::StartTime,
            direction: SortDirection::Desc,
        }
    }
}

/// Pages fetched under different signatures are never mixed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct TableQuery {
    pub sort: SortSpec,
    pub filter: String,
}

impl TableQuery {
    pub fn signature(&self) -> RequestSignature {
        RequestSignature(format!(
            "{}:{}|{}",
            self.sort.column.as_str(),
            self.sort.direction.as_str(),
            self.filter
        ))
    }

    /// Returns true if the sort changed; non-sortable columns are a no-op.
    pub fn set_sort(&mut self, column: &str, direction: SortDirection) -> bool {
        let Some(column) = SortColumn::parse(column) else {
            return false;
        };
        let next = SortSpec { column, direction };
        if next == self.sort {
            return false;
        }
        self.sort = next;
        true
    }

    pub fn set_filter(&mut self, filter: &str) -> bool {
        if filter == self.filter {
            return false;
        }
        self.filter = filter.to_string();
        true
    }
}

/// Late fetch results whose signature no longer matches are discarded.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestSignature(String);

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AttrFilter {
    pub key: String,
    pub value_glob: String,
}

impl AttrFilter {
    pub fn parse(input: &str) -> Result<Self> {
        let (key, value_glob) = input
            .split_once('=')
            .ok_or_else(|| SpantailError::Parse(format!("invalid attr filter: {input}")))?;

        if key.trim().is_empty() || value_glob.trim().is_empty() {
            return Err(SpantailError::Parse(format!("invalid attr filter: {input}")));
        }

        Ok(Self {
            key: key.trim().to_string(),
            value_glob: value_glob.trim().to_string(),
        })
    }

    pub fn matches(&self, value: &str) -> bool {
        Pattern::new(&self.value_glob)
            .map(|p| p.matches(value))
            .unwrap_or(false)
    }
}

/// Whitespace-separated clauses: `kind=LLM` and `status=ERROR` match
/// the typed fields, `attrs.<key>=<glob>` matches a value inside
/// `attrs_json`, any bare term is a case-insensitive name substring.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterPredicate {
    name_terms: Vec<String>,
    kind: Option<SpanKind>,
    status: Option<StatusCode>,
    attr_filters: Vec<AttrFilter>,
}

impl FilterPredicate {
    pub fn parse(input: &str) -> Result<Self> {
        let mut predicate = Self::default();
        for clause in input.split_whitespace() {
            if let Some(value) = clause.strip_prefix("kind=") {
                predicate.kind = Some(SpanKind::from_str(value)?);
            } else if let Some(value) = clause.strip_prefix("status=") {
                predicate.status = Some(StatusCode::from_str(value)?);
            } else if let Some(rest) = clause.strip_prefix("attrs.") {
                predicate.attr_filters.push(AttrFilter::parse(rest)?);
            } else {
                predicate.name_terms.push(clause.to_ascii_lowercase());
            }
        }
        Ok(predicate)
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn matches(&self, record: &SpanRecord) -> bool {
        if let Some(kind) = self.kind {
            if record.kind != kind {
                return false;
            }
        }
        if let Some(status) = self.status {
            if record.status_code != status {
                return false;
            }
        }
        if !self.name_terms.is_empty() {
            let name = record.name.to_ascii_lowercase();
            if !self.name_terms.iter().all(|term| name.contains(term)) {
                return false;
            }
        }
        if self.attr_filters.is_empty() {
            return true;
        }

        let attrs: HashMap<String, serde_json::Value> =
            serde_json::from_str(&record.attrs_json).unwrap_or_default();
        self.attr_filters.iter().all(|filter| {
            attrs
                .get(&filter.key)
                .map(|value| match value {
                    serde_json::Value::String(s) => filter.matches(s),
                    other => filter.matches(&other.to_string()),
                })
                .unwrap_or(false)
        })
    }
}
