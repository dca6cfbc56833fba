use std::collections::{HashMap, HashSet};

use spantail_core::model::span::SpanRecord;
use tracing::warn;

#[derive(Debug, Clone, PartialEq)]
pub struct SpanNode {
    pub record: SpanRecord,
    pub children: Vec<SpanNode>,
}

impl SpanNode {
    pub fn span_id(&self) -> &str {
        &self.record.span_id
    }
}

/// A record whose parent id is missing from the batch becomes a root.
/// Cycle members are unreachable from any root and drop out.
pub fn build_forest(records: &[SpanRecord]) -> Vec<SpanNode> {
    let ids: HashSet<&str> = records
        .iter()
        .filter(|r| r.is_well_formed())
        .map(|r| r.span_id.as_str())
        .collect();

    let mut children: HashMap<&str, Vec<&SpanRecord>> = HashMap::new();
    let mut roots: Vec<&SpanRecord> = Vec::new();
    for record in records {
        if !record.is_well_formed() {
            warn!(trace_id = %record.trace_id, name = %record.name, "dropping span without span_id");
            continue;
        }
        match record.parent_id.as_deref() {
            Some(parent) if ids.contains(parent) => {
                children.entry(parent).or_default().push(record);
            }
            _ => roots.push(record),
        }
    }

    roots
        .into_iter()
        .map(|record| materialize(record, &children))
        .collect()
}

fn materialize(record: &SpanRecord, children: &HashMap<&str, Vec<&SpanRecord>>) -> SpanNode {
    let kids = children
        .get(record.span_id.as_str())
        .map(|kids| kids.iter().map(|kid| materialize(kid, children)).collect())
        .unwrap_or_default();
    SpanNode {
        record: record.clone(),
        children: kids,
    }
}
