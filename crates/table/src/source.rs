use std::cmp::Ordering;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use spantail_core::filter::{FilterPredicate, SortColumn, SortDirection, SortSpec};
use spantail_core::model::span::SpanRecord;
use spantail_core::query::{PageRequest, SpanPage};
use spantail_core::{Result, SpantailError};

/// Implementations must be idempotent for identical requests and
/// evaluate the filter server-side.
pub trait SpanSource: Clone + Send + Sync + 'static {
    fn fetch_page(&self, request: PageRequest) -> impl Future<Output = Result<SpanPage>> + Send;
}

pub fn paginate(records: &[SpanRecord], request: &PageRequest) -> Result<SpanPage> {
    let predicate = FilterPredicate::parse(&request.filter)?;
    let mut matched: Vec<SpanRecord> = records
        .iter()
        .filter(|record| predicate.matches(record))
        .cloned()
        .collect();
    sort_records(&mut matched, request.sort);

    let offset = match &request.cursor {
        None => 0,
        Some(cursor) => cursor
            .parse::<usize>()
            .map_err(|_| SpantailError::InvalidArgument(format!("bad cursor: {cursor}")))?,
    };
    let end = offset.saturating_add(request.page_size).min(matched.len());
    let page = matched.get(offset..end).map(<[SpanRecord]>::to_vec).unwrap_or_default();
    let has_next = end < matched.len();

    Ok(SpanPage {
        records: page,
        next_cursor: has_next.then(|| end.to_string()),
        has_next,
    })
}

pub fn sort_records(records: &mut [SpanRecord], sort: SortSpec) {
    match sort.column {
        SortColumn::StartTime => {
            records.sort_by(|a, b| directed(sort.direction, a.start_time.cmp(&b.start_time)));
        }
        SortColumn::LatencyMs => {
            records.sort_by(|a, b| optional(sort.direction, a.latency_ms, b.latency_ms));
        }
        SortColumn::TokenCountTotal => {
            records.sort_by(|a, b| {
                optional(sort.direction, a.token_count_total, b.token_count_total)
            });
        }
    }
}

fn directed(direction: SortDirection, ord: Ordering) -> Ordering {
    match direction {
        SortDirection::Asc => ord,
        SortDirection::Desc => ord.reverse(),
    }
}

fn optional(direction: SortDirection, a: Option<i64>, b: Option<i64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => directed(direction, a.cmp(&b)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// In-memory span source for tests and demos; can inject a delay or a
/// one-shot failure.
#[derive(Clone, Default)]
pub struct MemorySource {
    inner: Arc<Mutex<MemoryInner>>,
}

#[derive(Default)]
struct MemoryInner {
    records: Vec<SpanRecord>,
    delay: Option<Duration>,
    fail_next: bool,
    requests: Vec<PageRequest>,
}

impl MemorySource {
    pub fn new(records: Vec<SpanRecord>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(MemoryInner {
                records,
                ..MemoryInner::default()
            })),
        }
    }

    pub fn set_records(&self, records: Vec<SpanRecord>) {
        self.lock().records = records;
    }

    pub fn push(&self, record: SpanRecord) {
        self.lock().records.push(record);
    }

    pub fn set_delay(&self, delay: Option<Duration>) {
        self.lock().delay = delay;
    }

    pub fn fail_next(&self) {
        self.lock().fail_next = true;
    }

    pub fn requests(&self) -> Vec<PageRequest> {
        self.lock().requests.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl SpanSource for MemorySource {
    async fn fetch_page(&self, request: PageRequest) -> Result<SpanPage> {
        let (snapshot, delay, fail) = {
            let mut inner = self.lock();
            inner.requests.push(request.clone());
            let fail = std::mem::take(&mut inner.fail_next);
            (inner.records.clone(), inner.delay, fail)
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if fail {
            return Err(SpantailError::Source("injected fetch failure".to_string()));
        }
        paginate(&snapshot, &request)
    }
}
