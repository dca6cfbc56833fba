use spantail_core::model::span::SpanRecord;
use spantail_core::query::SpanPage;

#[derive(Debug, Clone, Default)]
pub struct PageAccumulator {
    records: Vec<SpanRecord>,
    page_lens: Vec<usize>,
    cursor: Option<String>,
    has_next: bool,
}

impl PageAccumulator {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn append(&mut self, page: SpanPage) {
        self.page_lens.push(page.records.len());
        self.records.extend(page.records);
        self.cursor = page.next_cursor;
        self.has_next = page.has_next;
    }

    /// Tree building runs over the full accumulated set, not just the
    /// newest page.
    pub fn records(&self) -> &[SpanRecord] {
        &self.records
    }

    pub fn first_page(&self) -> Option<&[SpanRecord]> {
        self.page_lens.first().map(|&len| &self.records[..len])
    }

    pub fn cursor(&self) -> Option<&str> {
        self.cursor.as_deref()
    }

    pub fn has_next(&self) -> bool {
        self.has_next
    }

    pub fn is_empty(&self) -> bool {
        self.page_lens.is_empty()
    }

    pub fn page_count(&self) -> usize {
        self.page_lens.len()
    }
}

#[cfg(test)]
mod tests {
    use testkit::span;

    use super::*;

    fn page(ids: &[&str], next_cursor: Option<&str>, has_next: bool) -> SpanPage {
        SpanPage {
            records: ids.iter().map(|id| span(id, None)).collect(),
            next_cursor: next_cursor.map(str::to_string),
            has_next,
        }
    }

    #[test]
    fn appends_in_page_order() {
        let mut pages = PageAccumulator::default();
        pages.append(page(&["a", "b"], Some("2"), true));
        pages.append(page(&["c"], None, false));

        let ids: Vec<&str> = pages.records().iter().map(|r| r.span_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert_eq!(pages.page_count(), 2);
        assert_eq!(pages.first_page().unwrap().len(), 2);
        assert!(!pages.has_next());
        assert_eq!(pages.cursor(), None);
    }

    #[test]
    fn reset_clears_everything() {
        let mut pages = PageAccumulator::default();
        pages.append(page(&["a"], Some("1"), true));
        pages.reset();

        assert!(pages.is_empty());
        assert!(pages.records().is_empty());
        assert!(!pages.has_next());
        assert_eq!(pages.cursor(), None);
    }
}
