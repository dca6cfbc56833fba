mod ndjson;
mod output;
mod telemetry;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use spantail_core::config::Config;
use spantail_core::filter::{SortDirection, TableQuery};
use spantail_core::query::PageRequest;
use spantail_core::time::parse_duration_str;
use spantail_table::{Command as TableCommand, ViewMode, spawn_table};
use spantail_tree::{ExpansionState, build_forest, flat_rows, flatten};
use tracing::warn;

use crate::ndjson::FileSpanSource;
use crate::output::print_rows_human;
use crate::telemetry::init_cli_tracing;

#[derive(Parser, Debug)]
#[command(name = "spantail")]
#[command(about = "Trace table viewer for NDJSON span files")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(about = "Render a span file once")]
    View {
        file: PathBuf,
        #[arg(long, default_value = "", help = "Filter, e.g. 'kind=LLM attrs.model=gpt-*'")]
        filter: String,
        #[arg(long, default_value = "start_time")]
        sort: String,
        #[arg(long)]
        desc: bool,
        #[arg(long, help = "Flat list instead of the trace tree")]
        flat: bool,
        #[arg(long, help = "Start with every subtree collapsed")]
        collapsed: bool,
        #[arg(long, default_value_t = 50)]
        page_size: usize,
    },
    #[command(about = "Follow a span file live")]
    Tail {
        file: PathBuf,
        #[arg(long, default_value = "")]
        filter: String,
        #[arg(long, default_value = "start_time")]
        sort: String,
        #[arg(long)]
        desc: bool,
        #[arg(long)]
        flat: bool,
        #[arg(long, help = "Poll interval, e.g. 2s")]
        interval: Option<String>,
        #[arg(long)]
        page_size: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_cli_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::View {
            file,
            filter,
            sort,
            desc,
            flat,
            collapsed,
            page_size,
        } => run_view(file, filter, sort, desc, flat, collapsed, page_size, cli.json).await,
        Commands::Tail {
            file,
            filter,
            sort,
            desc,
            flat,
            interval,
            page_size,
        } => run_tail(file, filter, sort, desc, flat, interval, page_size, cli.json).await,
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_view(
    file: PathBuf,
    filter: String,
    sort: String,
    desc: bool,
    flat: bool,
    collapsed: bool,
    page_size: usize,
    json: bool,
) -> anyhow::Result<()> {
    let mut query = TableQuery::default();
    let direction = if desc {
        SortDirection::Desc
    } else {
        SortDirection::Asc
    };
    if !query.set_sort(&sort, direction) && query.sort.column.as_str() != sort {
        warn!(column = %sort, "column is not sortable; keeping start_time");
    }
    query.set_filter(&filter);

    let source = FileSpanSource::new(file);
    let request = PageRequest {
        sort: query.sort,
        filter: query.filter.clone(),
        cursor: None,
        page_size,
    };
    let records = source.fetch_all(&request).await.context("fetch spans")?;

    let rows = if flat {
        flat_rows(&records)
    } else {
        flatten(&build_forest(&records), &ExpansionState::new(!collapsed))
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
    } else {
        print_rows_human(&rows);
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn run_tail(
    file: PathBuf,
    filter: String,
    sort: String,
    desc: bool,
    flat: bool,
    interval: Option<String>,
    page_size: Option<usize>,
    json: bool,
) -> anyhow::Result<()> {
    let mut cfg = Config::load()?;
    if let Some(interval) = interval {
        cfg.poll_interval = parse_duration_str(&interval)?;
    }
    if let Some(page_size) = page_size {
        cfg.page_size = page_size;
    }

    let view = if flat { ViewMode::Flat } else { ViewMode::Tree };
    let handle = spawn_table(FileSpanSource::new(file), &cfg, view);

    let direction = if desc {
        SortDirection::Desc
    } else {
        SortDirection::Asc
    };
    handle
        .send(TableCommand::SetSort {
            column: sort,
            direction,
        })
        .await?;
    if !filter.is_empty() {
        handle.send(TableCommand::SetFilter(filter)).await?;
    }

    let mut snapshots = handle.snapshots();
    loop {
        tokio::select! {
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = snapshots.borrow_and_update().clone();
                if json {
                    println!("{}", serde_json::to_string(&snapshot.rows)?);
                } else {
                    println!("--- {} page(s), live={}", snapshot.page_count, snapshot.live);
                    print_rows_human(&snapshot.rows);
                    if let Some(error) = &snapshot.error {
                        println!("error: {error}");
                    }
                }
                if snapshot.has_next {
                    handle
                        .send(TableCommand::ScrolledNearBottom { distance_px: 0.0 })
                        .await?;
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }
    Ok(())
}
