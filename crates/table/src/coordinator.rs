use std::future::Future;
use std::pin::Pin;

use spantail_core::config::Config;
use spantail_core::filter::{RequestSignature, SortDirection};
use spantail_core::query::SpanPage;
use spantail_core::{Result, SpantailError};
use spantail_tree::Row;
use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::debug;

use crate::source::SpanSource;
use crate::state::{FetchKind, Outcome, PendingFetch, TableState, ViewMode};

/// Filter edits are debounced; everything else takes effect on receipt.
#[derive(Debug, Clone)]
pub enum Command {
    SetFilter(String),
    SetSort {
        column: String,
        direction: SortDirection,
    },
    SetView(ViewMode),
    ToggleExpanded(String),
    ScrolledNearBottom {
        distance_px: f32,
    },
    ToggleLive,
    Refresh,
}

/// Published only when the visible state actually changed.
#[derive(Debug, Clone, Default)]
pub struct TableSnapshot {
    pub rows: Vec<Row>,
    pub has_next: bool,
    pub page_count: usize,
    pub live: bool,
    pub error: Option<String>,
}

pub struct TableHandle {
    commands: mpsc::Sender<Command>,
    snapshots: watch::Receiver<TableSnapshot>,
}

impl TableHandle {
    pub async fn send(&self, command: Command) -> Result<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| SpantailError::Internal("table task has stopped".to_string()))
    }

    pub fn snapshots(&self) -> watch::Receiver<TableSnapshot> {
        self.snapshots.clone()
    }
}

pub fn spawn_table<S: SpanSource>(source: S, cfg: &Config, view: ViewMode) -> TableHandle {
    let (commands_tx, commands_rx) = mpsc::channel(64);
    let (snapshots_tx, snapshots_rx) = watch::channel(TableSnapshot::default());
    let state = TableState::new(cfg, view);

    tokio::spawn(run_table(source, cfg.clone(), state, commands_rx, snapshots_tx));

    TableHandle {
        commands: commands_tx,
        snapshots: snapshots_rx,
    }
}

struct InFlight {
    signature: RequestSignature,
    kind: FetchKind,
    fut: Pin<Box<dyn Future<Output = Result<SpanPage>> + Send>>,
}

/// Replacing the previous `InFlight` drops its future; that is the
/// cancellation path for fetches superseded by a signature change.
fn dispatch<S: SpanSource>(source: &S, fetch: PendingFetch) -> InFlight {
    let source = source.clone();
    let PendingFetch {
        signature,
        kind,
        request,
    } = fetch;
    InFlight {
        signature,
        kind,
        fut: Box::pin(async move { source.fetch_page(request).await }),
    }
}

async fn run_table<S: SpanSource>(
    source: S,
    cfg: Config,
    mut state: TableState,
    mut commands: mpsc::Receiver<Command>,
    snapshots: watch::Sender<TableSnapshot>,
) {
    let mut ticker =
        tokio::time::interval_at(Instant::now() + cfg.poll_interval, cfg.poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut live = true;
    let mut pending_filter: Option<(String, Instant)> = None;
    let mut in_flight = Some(dispatch(&source, state.begin_reset()));
    // Triggers that arrived while a fetch was outstanding; replayed when
    // it completes so they are deferred, not lost.
    let mut queued_scroll: Option<f32> = None;
    let mut queued_recheck = false;

    publish(&snapshots, &state, live);

    loop {
        tokio::select! {
            command = commands.recv() => {
                let Some(command) = command else { break };
                match command {
                    Command::SetFilter(filter) => {
                        pending_filter = Some((filter, Instant::now() + cfg.filter_debounce));
                    }
                    Command::SetSort { column, direction } => {
                        if let Some(fetch) = state.set_sort(&column, direction) {
                            queued_scroll = None;
                            queued_recheck = false;
                            in_flight = Some(dispatch(&source, fetch));
                            publish(&snapshots, &state, live);
                        }
                    }
                    Command::SetView(view) => {
                        state.set_view(view);
                        publish(&snapshots, &state, live);
                    }
                    Command::ToggleExpanded(span_id) => {
                        state.toggle_expanded(&span_id);
                        publish(&snapshots, &state, live);
                    }
                    Command::ScrolledNearBottom { distance_px } => {
                        if let Some(fetch) = state.request_load_more(distance_px) {
                            in_flight = Some(dispatch(&source, fetch));
                        } else if state.is_loading() && state.wants_load_more(distance_px) {
                            queued_scroll = Some(distance_px);
                        }
                    }
                    Command::ToggleLive => {
                        live = !live;
                        if live {
                            ticker.reset();
                            if let Some(fetch) = state.begin_recheck() {
                                in_flight = Some(dispatch(&source, fetch));
                            } else {
                                queued_recheck = true;
                            }
                        } else {
                            queued_recheck = false;
                        }
                        publish(&snapshots, &state, live);
                    }
                    Command::Refresh => {
                        queued_scroll = None;
                        queued_recheck = false;
                        in_flight = Some(dispatch(&source, state.begin_reset()));
                        publish(&snapshots, &state, live);
                    }
                }
            }
            result = async { in_flight.as_mut().expect("guarded by precondition").fut.as_mut().await },
                if in_flight.is_some() =>
            {
                let fetch = in_flight.take().expect("guarded by precondition");
                match state.complete(&fetch.signature, fetch.kind, result) {
                    Outcome::Applied | Outcome::Failed => publish(&snapshots, &state, live),
                    Outcome::Unchanged | Outcome::Stale => {}
                }
                // One deferred trigger per completion; a queued scroll
                // behind a queued recheck drains on the next pass.
                if std::mem::take(&mut queued_recheck) {
                    if let Some(fetch) = state.begin_recheck() {
                        in_flight = Some(dispatch(&source, fetch));
                    }
                } else if let Some(distance_px) = queued_scroll.take() {
                    if let Some(fetch) = state.request_load_more(distance_px) {
                        in_flight = Some(dispatch(&source, fetch));
                    }
                }
            }
            _ = ticker.tick(), if live && in_flight.is_none() && pending_filter.is_none() => {
                if let Some(fetch) = state.begin_recheck() {
                    in_flight = Some(dispatch(&source, fetch));
                }
            }
            _ = async { tokio::time::sleep_until(pending_filter.as_ref().expect("guarded by precondition").1).await },
                if pending_filter.is_some() =>
            {
                let (filter, _) = pending_filter.take().expect("guarded by precondition");
                if let Some(fetch) = state.set_filter(&filter) {
                    queued_scroll = None;
                    queued_recheck = false;
                    in_flight = Some(dispatch(&source, fetch));
                    publish(&snapshots, &state, live);
                }
            }
        }
    }

    debug!("table coordinator stopped");
}

fn publish(snapshots: &watch::Sender<TableSnapshot>, state: &TableState, live: bool) {
    let _ = snapshots.send(TableSnapshot {
        rows: state.rows(),
        has_next: state.has_next(),
        page_count: state.page_count(),
        live,
        error: state.visible_error().map(str::to_string),
    });
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use spantail_core::model::span::SpanKind;
    use testkit::{sample_batch, span};

    use crate::source::MemorySource;

    use super::*;

    fn test_config() -> Config {
        Config {
            page_size: 10,
            poll_interval: Duration::from_millis(40),
            filter_debounce: Duration::from_millis(20),
            ..Config::default()
        }
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(30)).await;
    }

    #[tokio::test]
    async fn initial_load_publishes_tree_rows() {
        let source = MemorySource::new(sample_batch("t1"));
        let handle = spawn_table(source, &test_config(), ViewMode::Tree);
        settle().await;

        let snapshot = handle.snapshots().borrow().clone();
        assert_eq!(snapshot.rows.len(), 4);
        assert_eq!(snapshot.rows[0].depth, 0);
        assert!(snapshot.live);
        assert!(!snapshot.has_next);
    }

    #[tokio::test]
    async fn poll_tick_picks_up_new_spans() {
        let source = MemorySource::new(sample_batch("t1"));
        let handle = spawn_table(source.clone(), &test_config(), ViewMode::Flat);
        settle().await;
        assert_eq!(handle.snapshots().borrow().rows.len(), 4);

        source.push(span("late-root", None));
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(handle.snapshots().borrow().rows.len(), 5);
    }

    #[tokio::test]
    async fn idle_ticks_publish_nothing() {
        let source = MemorySource::new(sample_batch("t1"));
        let handle = spawn_table(source, &test_config(), ViewMode::Tree);
        settle().await;

        let mut snapshots = handle.snapshots();
        snapshots.borrow_and_update();
        tokio::time::sleep(Duration::from_millis(150)).await;

        assert!(!snapshots.has_changed().unwrap());
    }

    #[tokio::test]
    async fn pause_stops_polling_and_resume_refreshes() {
        let source = MemorySource::new(sample_batch("t1"));
        let handle = spawn_table(source.clone(), &test_config(), ViewMode::Flat);
        settle().await;

        handle.send(Command::ToggleLive).await.unwrap();
        settle().await;
        source.push(span("while-paused", None));
        tokio::time::sleep(Duration::from_millis(100)).await;

        let paused = handle.snapshots().borrow().clone();
        assert!(!paused.live);
        assert_eq!(paused.rows.len(), 4);

        handle.send(Command::ToggleLive).await.unwrap();
        settle().await;

        let resumed = handle.snapshots().borrow().clone();
        assert!(resumed.live);
        assert_eq!(resumed.rows.len(), 5);
    }

    #[tokio::test]
    async fn rapid_filter_edits_coalesce_into_one_fetch() {
        let cfg = Config {
            poll_interval: Duration::from_secs(60),
            filter_debounce: Duration::from_millis(20),
            ..Config::default()
        };
        let source = MemorySource::new(sample_batch("t1"));
        let handle = spawn_table(source.clone(), &cfg, ViewMode::Flat);
        settle().await;

        handle.send(Command::SetFilter("k".to_string())).await.unwrap();
        handle.send(Command::SetFilter("kind=".to_string())).await.unwrap();
        handle
            .send(Command::SetFilter("kind=LLM".to_string()))
            .await
            .unwrap();
        settle().await;

        let filtered: Vec<String> = source
            .requests()
            .into_iter()
            .filter(|req| !req.filter.is_empty())
            .map(|req| req.filter)
            .collect();
        assert_eq!(filtered, vec!["kind=LLM".to_string()]);

        let snapshot = handle.snapshots().borrow().clone();
        assert_eq!(snapshot.rows.len(), 1);
        assert_eq!(snapshot.rows[0].record.kind, SpanKind::Llm);
    }

    #[tokio::test]
    async fn stale_load_more_never_lands_after_filter_change() {
        let cfg = Config {
            page_size: 2,
            poll_interval: Duration::from_secs(60),
            filter_debounce: Duration::from_millis(10),
            ..Config::default()
        };
        let source = MemorySource::new(sample_batch("t1"));
        let handle = spawn_table(source.clone(), &cfg, ViewMode::Flat);
        settle().await;
        assert_eq!(handle.snapshots().borrow().page_count, 1);
        assert!(handle.snapshots().borrow().has_next);

        // Make the load-more slow, then change the filter before it can
        // resolve.
        source.set_delay(Some(Duration::from_millis(120)));
        handle
            .send(Command::ScrolledNearBottom { distance_px: 0.0 })
            .await
            .unwrap();
        handle
            .send(Command::SetFilter("kind=LLM".to_string()))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(300)).await;

        let snapshot = handle.snapshots().borrow().clone();
        assert_eq!(snapshot.page_count, 1);
        assert_eq!(snapshot.rows.len(), 1);
        assert!(
            snapshot
                .rows
                .iter()
                .all(|row| row.record.kind == SpanKind::Llm)
        );
    }

    #[tokio::test]
    async fn scroll_during_recheck_still_pages() {
        let cfg = Config {
            page_size: 2,
            poll_interval: Duration::from_millis(40),
            ..Config::default()
        };
        let source = MemorySource::new(sample_batch("t1"));
        let handle = spawn_table(source.clone(), &cfg, ViewMode::Flat);
        settle().await;
        assert!(handle.snapshots().borrow().has_next);
        assert_eq!(handle.snapshots().borrow().page_count, 1);

        // Slow the source so the next poll recheck is still in flight
        // when the scroll arrives.
        source.set_delay(Some(Duration::from_millis(80)));
        tokio::time::sleep(Duration::from_millis(60)).await;
        handle
            .send(Command::ScrolledNearBottom { distance_px: 0.0 })
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(300)).await;

        // The scroll was deferred behind the recheck, not dropped.
        let snapshot = handle.snapshots().borrow().clone();
        assert_eq!(snapshot.page_count, 2);
        assert_eq!(snapshot.rows.len(), 4);
        assert!(!snapshot.has_next);
    }

    #[tokio::test]
    async fn resume_during_inflight_fetch_still_rechecks() {
        let cfg = Config {
            page_size: 2,
            poll_interval: Duration::from_secs(60),
            ..Config::default()
        };
        let source = MemorySource::new(sample_batch("t1"));
        let handle = spawn_table(source.clone(), &cfg, ViewMode::Flat);
        settle().await;

        handle.send(Command::ToggleLive).await.unwrap();
        settle().await;

        // Resume lands while a slow load-more is outstanding.
        source.set_delay(Some(Duration::from_millis(50)));
        handle
            .send(Command::ScrolledNearBottom { distance_px: 0.0 })
            .await
            .unwrap();
        handle.send(Command::ToggleLive).await.unwrap();
        tokio::time::sleep(Duration::from_millis(250)).await;

        // Load-more first, then the deferred resume recheck.
        let requests = source.requests();
        assert_eq!(requests.len(), 3);
        assert!(requests[1].cursor.is_some());
        assert_eq!(requests[2].cursor, None);
        let snapshot = handle.snapshots().borrow().clone();
        assert!(snapshot.live);
        assert_eq!(snapshot.page_count, 2);
    }

    #[tokio::test]
    async fn distant_scroll_does_not_page() {
        let cfg = Config {
            page_size: 2,
            poll_interval: Duration::from_secs(60),
            ..Config::default()
        };
        let source = MemorySource::new(sample_batch("t1"));
        let handle = spawn_table(source.clone(), &cfg, ViewMode::Flat);
        settle().await;

        handle
            .send(Command::ScrolledNearBottom { distance_px: 5_000.0 })
            .await
            .unwrap();
        settle().await;

        assert_eq!(handle.snapshots().borrow().page_count, 1);
        assert_eq!(source.requests().len(), 1);
    }

    #[tokio::test]
    async fn view_switch_and_manual_refresh() {
        let cfg = Config {
            poll_interval: Duration::from_secs(60),
            ..Config::default()
        };
        let source = MemorySource::new(sample_batch("t1"));
        let handle = spawn_table(source.clone(), &cfg, ViewMode::Tree);
        settle().await;
        assert!(
            handle
                .snapshots()
                .borrow()
                .rows
                .iter()
                .any(|row| row.depth > 0)
        );

        handle.send(Command::SetView(ViewMode::Flat)).await.unwrap();
        settle().await;
        assert!(
            handle
                .snapshots()
                .borrow()
                .rows
                .iter()
                .all(|row| row.depth == 0)
        );

        source.push(span("fresh-root", None));
        handle.send(Command::Refresh).await.unwrap();
        settle().await;
        assert_eq!(handle.snapshots().borrow().rows.len(), 5);
    }

    #[tokio::test]
    async fn toggle_collapses_subtree() {
        let source = MemorySource::new(sample_batch("t1"));
        let cfg = Config {
            poll_interval: Duration::from_secs(60),
            ..Config::default()
        };
        let handle = spawn_table(source, &cfg, ViewMode::Tree);
        settle().await;
        assert_eq!(handle.snapshots().borrow().rows.len(), 4);

        handle
            .send(Command::ToggleExpanded("retriever-1".to_string()))
            .await
            .unwrap();
        settle().await;

        let rows = handle.snapshots().borrow().rows.clone();
        let ids: Vec<&str> = rows.iter().map(|row| row.record.span_id.as_str()).collect();
        assert!(!ids.contains(&"embed-1"));
        assert_eq!(rows.len(), 3);
    }
}
