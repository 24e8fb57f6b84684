//! Runner output lines and their classification

use loadrig_core::{OutputStream, Severity};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Prefix the compiled script prints before aborting on a failed response
pub const STOP_ON_FAILURE_MARKER: &str = "[STOP_ON_FAILURE]";

const REQUEST_ERROR_MARKER: &str = "[Request Error]";

static STOP_MARKER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\[STOP_ON_FAILURE\] check=(.+?) status=(\d+)").expect("marker pattern is valid")
});

static THRESHOLDS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"thresholds on metrics '([^']+)' (?:have been|were) crossed")
        .expect("thresholds pattern is valid")
});

static PROGRESS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^running \(|\[\s*\d+(?:\.\d+)?%\s*\]").expect("progress pattern is valid")
});

static RATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s(\d+\.?\d*)/s").expect("rate pattern is valid"));

/// One line of runner output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputLine {
    pub stream: OutputStream,
    pub text: String,
}

impl OutputLine {
    pub fn new(stream: OutputStream, text: impl Into<String>) -> Self {
        Self {
            stream,
            text: text.into(),
        }
    }

    pub fn stdout(text: impl Into<String>) -> Self {
        Self::new(OutputStream::Stdout, text)
    }

    pub fn stderr(text: impl Into<String>) -> Self {
        Self::new(OutputStream::Stderr, text)
    }
}

/// What a runner line means to the state machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineKind {
    /// Live progress (`running (0m05.0s), 10/10 VUs ...`)
    Progress,
    /// A response failed the script's status check
    RequestError,
    /// The script reported a failed check with stop-on-failure active
    PolicyViolation { check: String, status: Option<u16> },
    /// The runner reported threshold breaches
    ThresholdsCrossed { metrics: String },
    Warning,
    Error,
    /// Anything unrecognized
    Plain,
}

impl LineKind {
    /// Severity for the forwarded `log` event
    pub fn severity(&self) -> Option<Severity> {
        match self {
            LineKind::RequestError
            | LineKind::PolicyViolation { .. }
            | LineKind::ThresholdsCrossed { .. }
            | LineKind::Error => Some(Severity::Error),
            LineKind::Warning => Some(Severity::Warning),
            LineKind::Progress | LineKind::Plain => None,
        }
    }

    /// Name of the violated check when this line should trigger a stop-on-failure abort
    pub fn violated_check(&self) -> Option<String> {
        match self {
            LineKind::PolicyViolation { check, .. } => Some(check.clone()),
            LineKind::ThresholdsCrossed { metrics } => Some(format!("thresholds: {metrics}")),
            _ => None,
        }
    }
}

/// Classify a single runner line
pub fn classify(line: &OutputLine) -> LineKind {
    let text = line.text.as_str();

    if let Some(caps) = STOP_MARKER_RE.captures(text) {
        return LineKind::PolicyViolation {
            check: caps[1].trim().to_string(),
            status: caps[2].parse().ok(),
        };
    }
    if text.contains(STOP_ON_FAILURE_MARKER) {
        return LineKind::PolicyViolation {
            check: "unknown".to_string(),
            status: None,
        };
    }
    if let Some(caps) = THRESHOLDS_RE.captures(text) {
        return LineKind::ThresholdsCrossed {
            metrics: caps[1].to_string(),
        };
    }
    if text.contains("some thresholds have failed") {
        return LineKind::ThresholdsCrossed {
            metrics: "*".to_string(),
        };
    }
    if text.contains(REQUEST_ERROR_MARKER) {
        return LineKind::RequestError;
    }
    if PROGRESS_RE.is_match(text.trim_start()) {
        return LineKind::Progress;
    }
    if text.contains("level=error") || text.starts_with("ERRO[") {
        return LineKind::Error;
    }
    if text.contains("level=warning") || text.starts_with("WARN[") {
        return LineKind::Warning;
    }
    LineKind::Plain
}

/// Highest `N/s` rate figure in a line, if any
pub fn peak_rate(text: &str) -> Option<f64> {
    RATE_RE
        .captures_iter(text)
        .filter_map(|c| c[1].parse::<f64>().ok())
        .fold(None, |acc, v| match acc {
            Some(max) if max >= v => Some(max),
            _ => Some(v),
        })
}
