use std::path::PathBuf;
use std::sync::Arc;

use spantail_core::model::span::SpanRecord;
use spantail_core::query::{PageRequest, SpanPage};
use spantail_core::{Result, SpantailError};
use spantail_table::{SpanSource, paginate};
use tracing::warn;

/// NDJSON-file span source, one span per line. The file is re-read on
/// every fetch so a live tail sees appended spans.
#[derive(Debug, Clone)]
pub struct FileSpanSource {
    path: Arc<PathBuf>,
}

impl FileSpanSource {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path: Arc::new(path),
        }
    }

    async fn read_records(&self) -> Result<Vec<SpanRecord>> {
        let raw = tokio::fs::read_to_string(self.path.as_ref())
            .await
            .map_err(|e| {
                SpantailError::Io(format!("failed reading {}: {e}", self.path.display()))
            })?;

        let mut records = Vec::new();
        for (lineno, line) in raw.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<SpanRecord>(line) {
                Ok(record) => records.push(record),
                Err(e) => warn!(line = lineno + 1, error = %e, "skipping unparseable span line"),
            }
        }
        Ok(records)
    }

    /// Drains every page for a one-shot render.
    pub async fn fetch_all(&self, request: &PageRequest) -> Result<Vec<SpanRecord>> {
        let mut all = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let page = self
                .fetch_page(PageRequest {
                    cursor: cursor.take(),
                    ..request.clone()
                })
                .await?;
            all.extend(page.records);
            if !page.has_next || page.next_cursor.is_none() {
                break;
            }
            cursor = page.next_cursor;
        }
        Ok(all)
    }
}

impl SpanSource for FileSpanSource {
    async fn fetch_page(&self, request: PageRequest) -> Result<SpanPage> {
        let records = self.read_records().await?;
        paginate(&records, &request)
    }
}
