use serde::Serialize;
use spantail_core::model::span::SpanRecord;

/// Flat-table rows always have depth 0 and no child markers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Row {
    #[serde(flatten)]
    pub record: SpanRecord,
    pub depth: usize,
    pub has_children: bool,
    pub expanded: bool,
}

/// One row per well-formed record, in batch order.
pub fn flat_rows(records: &[SpanRecord]) -> Vec<Row> {
    records
        .iter()
        .filter(|record| record.is_well_formed())
        .map(|record| Row {
            record: record.clone(),
            depth: 0,
            has_children: false,
            expanded: false,
        })
        .collect()
}
