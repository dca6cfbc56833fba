use spantail_core::Result;
use spantail_core::config::Config;
use spantail_core::filter::{RequestSignature, SortDirection, TableQuery};
use spantail_core::query::{PageRequest, SpanPage};
use spantail_tree::{ExpansionState, Row, build_forest, flat_rows, flatten};
use tracing::{debug, warn};

use crate::pages::PageAccumulator;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewMode {
    Flat,
    Tree,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchKind {
    Reset,
    LoadMore,
    Recheck,
}

/// A fetch tagged with the signature current when it was issued.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingFetch {
    pub signature: RequestSignature,
    pub kind: FetchKind,
    pub request: PageRequest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Applied,
    Unchanged,
    Stale,
    Failed,
}

#[derive(Debug, Clone)]
pub struct TableState {
    query: TableQuery,
    pages: PageAccumulator,
    expansion: ExpansionState,
    view: ViewMode,
    page_size: usize,
    load_more_threshold_px: f32,
    in_flight: Option<RequestSignature>,
    ever_loaded: bool,
    last_error: Option<String>,
}

impl TableState {
    pub fn new(cfg: &Config, view: ViewMode) -> Self {
        Self {
            query: TableQuery::default(),
            pages: PageAccumulator::default(),
            expansion: ExpansionState::new(cfg.start_expanded),
            view,
            page_size: cfg.page_size,
            load_more_threshold_px: cfg.load_more_threshold_px,
            in_flight: None,
            ever_loaded: false,
            last_error: None,
        }
    }

    pub fn query(&self) -> &TableQuery {
        &self.query
    }

    pub fn signature(&self) -> RequestSignature {
        self.query.signature()
    }

    pub fn view(&self) -> ViewMode {
        self.view
    }

    pub fn set_view(&mut self, view: ViewMode) {
        self.view = view;
    }

    pub fn has_next(&self) -> bool {
        self.pages.has_next()
    }

    pub fn page_count(&self) -> usize {
        self.pages.page_count()
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Errors only surface before the first successful load.
    pub fn visible_error(&self) -> Option<&str> {
        if self.ever_loaded {
            None
        } else {
            self.last_error.as_deref()
        }
    }

    /// Expansion state is kept across resets; it is keyed by span id.
    pub fn begin_reset(&mut self) -> PendingFetch {
        self.pages.reset();
        let signature = self.signature();
        self.in_flight = Some(signature.clone());
        PendingFetch {
            signature,
            kind: FetchKind::Reset,
            request: self.page_request(None),
        }
    }

    pub fn set_filter(&mut self, filter: &str) -> Option<PendingFetch> {
        if !self.query.set_filter(filter) {
            return None;
        }
        Some(self.begin_reset())
    }

    pub fn set_sort(&mut self, column: &str, direction: SortDirection) -> Option<PendingFetch> {
        if !self.query.set_sort(column, direction) {
            return None;
        }
        Some(self.begin_reset())
    }

    /// Trigger policy minus the in-flight gate; a scroll that arrives
    /// while a fetch is outstanding can be kept and retried.
    pub fn wants_load_more(&self, distance_px: f32) -> bool {
        distance_px <= self.load_more_threshold_px
            && self.pages.has_next()
            && !self.pages.is_empty()
    }

    pub fn should_load_more(&self, distance_px: f32) -> bool {
        self.in_flight.is_none() && self.wants_load_more(distance_px)
    }

    pub fn request_load_more(&mut self, distance_px: f32) -> Option<PendingFetch> {
        if !self.should_load_more(distance_px) {
            return None;
        }
        let signature = self.signature();
        self.in_flight = Some(signature.clone());
        Some(PendingFetch {
            signature,
            kind: FetchKind::LoadMore,
            request: self.page_request(self.pages.cursor().map(str::to_string)),
        })
    }

    /// Only issued when idle; page fetches stay serialized per table.
    pub fn begin_recheck(&mut self) -> Option<PendingFetch> {
        if self.in_flight.is_some() {
            return None;
        }
        let signature = self.signature();
        self.in_flight = Some(signature.clone());
        Some(PendingFetch {
            signature,
            kind: FetchKind::Recheck,
            request: self.page_request(None),
        })
    }

    /// Stale responses leave all state untouched, including the
    /// in-flight marker: it belongs to the fetch that replaced this one.
    pub fn complete(
        &mut self,
        signature: &RequestSignature,
        kind: FetchKind,
        result: Result<SpanPage>,
    ) -> Outcome {
        if *signature != self.signature() {
            debug!("discarding page response for superseded signature");
            return Outcome::Stale;
        }
        self.in_flight = None;

        let page = match result {
            Ok(page) => page,
            Err(e) => {
                warn!(error = %e, "page fetch failed; keeping displayed rows");
                self.last_error = Some(e.to_string());
                return Outcome::Failed;
            }
        };
        self.last_error = None;

        match kind {
            FetchKind::Reset | FetchKind::LoadMore => {
                self.pages.append(page);
                self.ever_loaded = true;
                Outcome::Applied
            }
            FetchKind::Recheck => {
                if self.pages.first_page() == Some(page.records.as_slice()) {
                    Outcome::Unchanged
                } else {
                    // The probe result doubles as the refetched page 1.
                    self.pages.reset();
                    self.pages.append(page);
                    self.ever_loaded = true;
                    Outcome::Applied
                }
            }
        }
    }

    pub fn rows(&self) -> Vec<Row> {
        match self.view {
            ViewMode::Flat => flat_rows(self.pages.records()),
            ViewMode::Tree => flatten(&build_forest(self.pages.records()), &self.expansion),
        }
    }

    pub fn toggle_expanded(&mut self, span_id: &str) {
        self.expansion.toggle(span_id);
    }

    fn page_request(&self, cursor: Option<String>) -> PageRequest {
        PageRequest {
            sort: self.query.sort,
            filter: self.query.filter.clone(),
            cursor,
            page_size: self.page_size,
        }
    }
}
