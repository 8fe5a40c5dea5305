//! Suite-level gates: declarative post-run threshold checks.

use serde::{Deserialize, Serialize};

/// Gate thresholds over the run summary. Every field is optional; absent
/// fields are simply not checked.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct GateConfig {
    /// Minimum pass rate in `[0, 1]`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pass_rate: Option<f64>,
    /// Maximum total cost in dollars.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_cost: Option<f64>,
    /// Maximum p95 latency in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub p95_latency_ms: Option<u64>,
}

impl GateConfig {
    /// Create an empty gate config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Require a minimum pass rate.
    pub fn pass_rate(mut self, threshold: f64) -> Self {
        self.pass_rate = Some(threshold);
        self
    }

    /// Cap the total cost.
    pub fn max_cost(mut self, threshold: f64) -> Self {
        self.max_cost = Some(threshold);
        self
    }

    /// Cap the p95 latency.
    pub fn p95_latency_ms(mut self, threshold: u64) -> Self {
        self.p95_latency_ms = Some(threshold);
        self
    }
}

/// Outcome of one gate check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct GateCheck {
    /// Gate name (`passRate`, `maxCost`, `p95LatencyMs`).
    pub name: String,
    /// Whether the check passed.
    pub pass: bool,
    /// Observed value.
    pub actual: f64,
    /// Configured threshold.
    pub threshold: f64,
    /// Human reason.
    pub reason: String,
}

/// Outcome of evaluating all configured gates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct GateResult {
    /// Conjunction of all checks.
    pub pass: bool,
    /// Per-gate checks in evaluation order.
    pub checks: Vec<GateCheck>,
}

impl Default for GateResult {
    fn default() -> Self {
        Self {
            pass: true,
            checks: Vec::new(),
        }
    }
}

/// Evaluate the configured gates against summary figures.
///
/// Comparisons are inclusive at the boundary. A missing config passes with
/// no checks.
pub fn evaluate_gates(
    config: Option<&GateConfig>,
    pass_rate: f64,
    total_cost: f64,
    p95_latency_ms: u64,
) -> GateResult {
    let Some(config) = config else {
        return GateResult::default();
    };

    let mut checks = Vec::new();

    if let Some(threshold) = config.pass_rate {
        let pass = pass_rate >= threshold;
        checks.push(GateCheck {
            name: "passRate".to_string(),
            pass,
            actual: pass_rate,
            threshold,
            reason: format!(
                "pass rate {:.1}% {} threshold {:.1}%",
                pass_rate * 100.0,
                if pass { "meets" } else { "below" },
                threshold * 100.0
            ),
        });
    }

    if let Some(threshold) = config.max_cost {
        let pass = total_cost <= threshold;
        checks.push(GateCheck {
            name: "maxCost".to_string(),
            pass,
            actual: total_cost,
            threshold,
            reason: format!(
                "total cost ${total_cost} {} limit ${threshold}",
                if pass { "within" } else { "exceeds" }
            ),
        });
    }

    if let Some(threshold) = config.p95_latency_ms {
        let pass = p95_latency_ms <= threshold;
        checks.push(GateCheck {
            name: "p95LatencyMs".to_string(),
            pass,
            actual: p95_latency_ms as f64,
            threshold: threshold as f64,
            reason: format!(
                "p95 latency {p95_latency_ms}ms {} limit {threshold}ms",
                if pass { "within" } else { "exceeds" }
            ),
        });
    }

    GateResult {
        pass: checks.iter().all(|c| c.pass),
        checks,
    }
}
