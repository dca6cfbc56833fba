use std::time::Duration;

use crate::error::{Result, SpantailError};

pub fn parse_duration_str(input: &str) -> Result<Duration> {
    humantime::parse_duration(input)
        .map_err(|e| SpantailError::Parse(format!("invalid duration {input}: {e}")))
}

/// Missing latencies (span still open, or never recorded) render as a
/// dash.
pub fn format_latency(latency_ms: Option<i64>) -> String {
    match latency_ms {
        None => "--".to_string(),
        Some(ms) if ms < 1000 => format!("{ms}ms"),
        Some(ms) => format!("{:.2}s", ms as f64 / 1000.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_duration() {
        assert_eq!(parse_duration_str("200ms").unwrap(), Duration::from_millis(200));
        assert!(parse_duration_str("nope").is_err());
    }

    #[test]
    fn formats_latency() {
        assert_eq!(format_latency(None), "--");
        assert_eq!(format_latency(Some(120)), "120ms");
        assert_eq!(format_latency(Some(1804)), "1.80s");
    }
}
