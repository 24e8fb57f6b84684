//! Assembly and parsing of the runner's final summary block
//!
//! The compiled script's `handleSummary` pretty-prints k6's summary object
//! to stdout, so the block starts with a line that is exactly `{` and ends
//! with a line that is exactly `}`. Lines in between are consumed here and
//! never forwarded as logs.

use loadrig_core::{LatencySummary, OutputStream, ResultSummary};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::IpcError;
use crate::protocol::{peak_rate, OutputLine};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum CaptureState {
    #[default]
    Idle,
    Capturing,
    Done,
}

/// Collects the summary block and the peak progress rate across a run
#[derive(Debug, Default)]
pub struct SummaryCollector {
    state: CaptureState,
    buffer: Vec<String>,
    peak_rate: Option<f64>,
}

impl SummaryCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Offer a line; returns `true` when the line belongs to the summary block
    pub fn feed(&mut self, line: &OutputLine) -> bool {
        let text = line.text.trim_end();
        match self.state {
            CaptureState::Idle | CaptureState::Done
                if line.stream == OutputStream::Stdout && text == "{" =>
            {
                if matches!(self.state, CaptureState::Done) {
                    debug!("Second summary block seen, replacing the first");
                }
                self.buffer.clear();
                self.buffer.push(text.to_string());
                self.state = CaptureState::Capturing;
                true
            }
            CaptureState::Capturing if line.stream == OutputStream::Stdout => {
                self.buffer.push(text.to_string());
                if text == "}" {
                    self.state = CaptureState::Done;
                }
                true
            }
            _ => {
                if let Some(rate) = peak_rate(text) {
                    self.peak_rate = Some(self.peak_rate.map_or(rate, |p| p.max(rate)));
                }
                false
            }
        }
    }

    /// Whether a complete block has been captured
    pub fn is_complete(&self) -> bool {
        matches!(self.state, CaptureState::Done)
    }

    /// Highest `N/s` figure seen in non-summary lines
    pub fn peak_rate(&self) -> Option<f64> {
        self.peak_rate
    }

    /// Parse what was captured
    ///
    /// Returns `None` when no complete block arrived or it did not parse;
    /// both count as a degraded, summary-less outcome.
    pub fn finish(self) -> Option<ResultSummary> {
        if !self.is_complete() {
            if matches!(self.state, CaptureState::Capturing) {
                warn!(
                    "Runner output ended inside the summary block ({} lines)",
                    self.buffer.len()
                );
            }
            return None;
        }
        match parse_k6_summary(&self.buffer.join("\n")) {
            Ok(mut summary) => {
                if let Some(rate) = self.peak_rate {
                    summary.raise_rps_max(rate);
                }
                Some(summary)
            }
            Err(e) => {
                warn!("Discarding unparseable summary block: {}", e);
                None
            }
        }
    }
}

/// Read a metric figure, accepting both the `values` layout and the older flat layout
fn metric(metrics: &Value, name: &str, key: &str) -> Option<f64> {
    let entry = metrics.get(name)?;
    entry
        .get("values")
        .and_then(|v| v.get(key))
        .or_else(|| entry.get(key))
        .and_then(Value::as_f64)
}

/// Parse a runner summary document into a [`ResultSummary`]
///
/// Understands k6's `handleSummary` data (`metrics.<name>.values.<stat>`)
/// and, failing that, an already flattened summary object.
pub fn parse_k6_summary(text: &str) -> Result<ResultSummary, IpcError> {
    let doc: Value = serde_json::from_str(text)?;

    if let Some(metrics) = doc.get("metrics") {
        let get = |name: &str, key: &str| metric(metrics, name, key).unwrap_or(0.0);
        let rps = get("http_reqs", "rate");
        let vus_max = metric(metrics, "vus_max", "max")
            .or_else(|| metric(metrics, "vus_max", "value"))
            .unwrap_or(0.0);

        return Ok(ResultSummary {
            http_reqs: get("http_reqs", "count") as u64,
            failed_rate: get("http_req_failed", "rate"),
            duration_ms: doc
                .get("state")
                .and_then(|s| s.get("testRunDurationMs"))
                .and_then(Value::as_f64)
                .unwrap_or(0.0),
            rps,
            rps_max: rps,
            iterations: get("iterations", "count") as u64,
            vus_max: vus_max as u64,
            latency: LatencySummary {
                avg: get("http_req_duration", "avg"),
                min: get("http_req_duration", "min"),
                max: get("http_req_duration", "max"),
                p90: get("http_req_duration", "p(90)"),
                p95: get("http_req_duration", "p(95)"),
            },
        });
    }

    if doc.get("http_reqs").is_some() {
        return Ok(serde_json::from_value(doc)?);
    }

    Err(IpcError::IncompleteSummary(
        "both 'metrics' and 'http_reqs'".to_string(),
    ))
}
