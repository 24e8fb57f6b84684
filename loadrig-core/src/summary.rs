//! Runner-reported result aggregates

use serde::{Deserialize, Serialize};

/// Request latency figures in milliseconds
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LatencySummary {
    pub avg: f64,
    pub min: f64,
    pub max: f64,
    pub p90: f64,
    pub p95: f64,
}

/// Aggregate counters copied from the runner's final summary block
///
/// Nothing here is recomputed; the runner owns the math.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResultSummary {
    /// Total requests issued
    pub http_reqs: u64,
    /// Fraction of failed requests, 0.0 to 1.0
    pub failed_rate: f64,
    /// Test run duration in milliseconds
    pub duration_ms: f64,
    /// Achieved request rate
    pub rps: f64,
    /// Peak request rate
    pub rps_max: f64,
    pub iterations: u64,
    pub vus_max: u64,
    pub latency: LatencySummary,
}

impl ResultSummary {
    /// Raise `rps_max` to `observed` when the live progress showed a higher peak
    pub fn raise_rps_max(&mut self, observed: f64) {
        if observed > self.rps_max {
            self.rps_max = observed;
        }
    }
}
