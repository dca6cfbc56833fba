use serde::{Deserialize, Serialize};

use crate::filter::SortSpec;
use crate::model::span::SpanRecord;

/// `cursor = None` asks for the first page.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PageRequest {
    pub sort: SortSpec,
    pub filter: String,
    pub cursor: Option<String>,
    pub page_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct SpanPage {
    pub records: Vec<SpanRecord>,
    pub next_cursor: Option<String>,
    pub has_next: bool,
}
