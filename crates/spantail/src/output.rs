use std::io::IsTerminal;

use owo_colors::OwoColorize;
use spantail_core::model::span::StatusCode;
use spantail_core::time::format_latency;
use spantail_tree::Row;

pub fn render_rows(rows: &[Row], color: bool) -> String {
    let mut out = String::new();
    for row in rows {
        let indent = "  ".repeat(row.depth);
        let marker = if row.has_children {
            if row.expanded { "▾ " } else { "▸ " }
        } else {
            "  "
        };
        out.push_str(&format!(
            "{indent}{marker}{} [{}] ({}) {}\n",
            row.record.name,
            row.record.kind.as_str(),
            format_latency(row.record.latency_ms),
            status_label(row.record.status_code, color),
        ));
    }
    out
}

pub fn print_rows_human(rows: &[Row]) {
    let color = std::io::stdout().is_terminal();
    print!("{}", render_rows(rows, color));
    println!("-- {} rows --", rows.len());
}

fn status_label(status: StatusCode, color: bool) -> String {
    if !color {
        return status.as_str().to_string();
    }
    match status {
        StatusCode::Ok => status.as_str().green().to_string(),
        StatusCode::Error => status.as_str().red().to_string(),
        StatusCode::Unset => status.as_str().dimmed().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use spantail_tree::{ExpansionState, build_forest, flatten};
    use testkit::span;

    use super::*;

    #[test]
    fn renders_indented_tree() {
        let forest = build_forest(&[
            span("r", None),
            span("a", Some("r")),
            span("c", Some("a")),
        ]);
        let mut expansion = ExpansionState::new(true);
        expansion.toggle("a");
        let rows = flatten(&forest, &expansion);

        let rendered = render_rows(&rows, false);
        assert_eq!(
            rendered,
            "▾ span r [CHAIN] (10ms) OK\n  ▸ span a [CHAIN] (10ms) OK\n"
        );
    }
}
