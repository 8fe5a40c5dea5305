//! The persisted Run artifact: trials, summary and metadata.
//!
//! Runs are written and read with strict validation so that two artifacts
//! produced at different times remain byte-comparable and safely
//! re-gradeable.

use crate::error::{EvalError, EvalResult};
use crate::gates::{evaluate_gates, GateConfig, GateResult};
use crate::types::{Category, GradeResult, RunMode, TargetOutput};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::Path;

/// Schema version written into every Run.
pub const SCHEMA_VERSION: &str = "1.0.0";

/// Crate version written into every Run.
pub const FRAMEWORK_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Outcome of one case execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrialStatus {
    /// Case passed scoring.
    Pass,
    /// Case failed scoring.
    Fail,
    /// Target threw or timed out.
    Error,
}

impl fmt::Display for TrialStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pass => "pass",
            Self::Fail => "fail",
            Self::Error => "error",
        };
        f.write_str(s)
    }
}

/// Record of one case's execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Trial {
    /// Id of the executed case.
    pub case_id: String,
    /// Outcome.
    pub status: TrialStatus,
    /// Target output (synthesized on error).
    pub output: TargetOutput,
    /// Grader results in invocation order.
    pub grades: Vec<GradeResult>,
    /// Aggregate case score.
    pub score: f64,
    /// Wall-clock duration of the case in milliseconds.
    pub duration_ms: u64,
    /// Index of the trial when a case runs more than once.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trial_index: Option<u32>,
}

/// Per-category aggregate counts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CategoryStats {
    /// Cases in this category.
    pub total: usize,
    /// Passed cases.
    pub passed: usize,
    /// Failed cases.
    pub failed: usize,
    /// Errored cases.
    pub errors: usize,
    /// Pass rate within the category.
    pub pass_rate: f64,
}

/// Aggregate statistics over one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RunSummary {
    /// Total cases executed.
    pub total_cases: usize,
    /// Passed cases.
    pub passed: usize,
    /// Failed cases.
    pub failed: usize,
    /// Errored cases.
    pub errors: usize,
    /// `passed / total_cases`, 0 when there are no cases.
    pub pass_rate: f64,
    /// Sum of reported per-case costs.
    pub total_cost: f64,
    /// Wall-clock duration of the whole run in milliseconds.
    pub total_duration_ms: u64,
    /// 95th-percentile case latency in milliseconds.
    pub p95_latency_ms: u64,
    /// Per-category statistics, present when any case carries a category.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub by_category: Option<BTreeMap<Category, CategoryStats>>,
    /// Gate evaluation outcome.
    pub gate_result: GateResult,
}

/// p95 over case latencies: value at sorted index `ceil(0.95 * n) - 1`,
/// clamped to the valid range.
pub(crate) fn p95_latency(latencies: &[u64]) -> u64 {
    if latencies.is_empty() {
        return 0;
    }
    let mut sorted = latencies.to_vec();
    sorted.sort_unstable();
    let n = sorted.len();
    let index = ((0.95 * n as f64).ceil() as usize).saturating_sub(1).min(n - 1);
    sorted[index]
}

impl RunSummary {
    /// Compute the summary for a trial list.
    ///
    /// `categories` maps case id to category for the cases that declare
    /// one; `by_category` is emitted only when that map is non-empty.
    pub fn compute(
        trials: &[Trial],
        categories: &HashMap<String, Category>,
        total_duration_ms: u64,
        gates: Option<&GateConfig>,
    ) -> Self {
        let total_cases = trials.len();
        let passed = trials.iter().filter(|t| t.status == TrialStatus::Pass).count();
        let failed = trials.iter().filter(|t| t.status == TrialStatus::Fail).count();
        let errors = trials.iter().filter(|t| t.status == TrialStatus::Error).count();
        let pass_rate = if total_cases > 0 {
            passed as f64 / total_cases as f64
        } else {
            0.0
        };

        let total_cost: f64 = trials.iter().filter_map(|t| t.output.cost).sum();
        let latencies: Vec<u64> = trials.iter().map(|t| t.output.latency_ms).collect();
        let p95_latency_ms = p95_latency(&latencies);

        let by_category = if categories.is_empty() {
            None
        } else {
            let mut stats: BTreeMap<Category, CategoryStats> = BTreeMap::new();
            for trial in trials {
                let Some(&category) = categories.get(&trial.case_id) else {
                    continue;
                };
                let entry = stats.entry(category).or_insert(CategoryStats {
                    total: 0,
                    passed: 0,
                    failed: 0,
                    errors: 0,
                    pass_rate: 0.0,
                });
                entry.total += 1;
                match trial.status {
                    TrialStatus::Pass => entry.passed += 1,
                    TrialStatus::Fail => entry.failed += 1,
                    TrialStatus::Error => entry.errors += 1,
                }
            }
            for entry in stats.values_mut() {
                entry.pass_rate = if entry.total > 0 {
                    entry.passed as f64 / entry.total as f64
                } else {
                    0.0
                };
            }
            Some(stats)
        };

        let gate_result = evaluate_gates(gates, pass_rate, total_cost, p95_latency_ms);

        Self {
            total_cases,
            passed,
            failed,
            errors,
            pass_rate,
            total_cost,
            total_duration_ms,
            p95_latency_ms,
            by_category,
            gate_result,
        }
    }
}

/// Stable 16-hex-char digest over the suite structure.
///
/// Covers the suite name, case count, case ids in order and the gate
/// config; deliberately not the target identity, so the hash survives
/// target changes. Hash scope is expected to grow in later schema
/// versions.
pub fn config_hash(name: &str, case_ids: &[String], gates: Option<&GateConfig>) -> String {
    let payload = json!({
        "name": name,
        "caseCount": case_ids.len(),
        "caseIds": case_ids,
        "gates": gates,
    });
    let serialized = serde_json::to_string(&payload).unwrap_or_default();
    let digest = Sha256::digest(serialized.as_bytes());
    let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
    hex[..16].to_string()
}

/// Persisted record of one suite execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Run {
    /// Artifact schema version.
    pub schema_version: String,
    /// Unique run id (UUID).
    pub id: String,
    /// Suite that produced this run.
    pub suite_id: String,
    /// How the run was produced.
    pub mode: RunMode,
    /// Trials in case-declaration order.
    pub trials: Vec<Trial>,
    /// Aggregate statistics.
    pub summary: RunSummary,
    /// When the run started (UTC, ISO-8601).
    pub timestamp: DateTime<Utc>,
    /// Digest of the suite structure.
    pub config_hash: String,
    /// Version of the framework that wrote the artifact.
    pub framework_version: String,
}

impl Run {
    /// Validate artifact invariants beyond what serde enforces.
    pub fn validate(&self) -> EvalResult<()> {
        if self.schema_version != SCHEMA_VERSION {
            return Err(EvalError::artifact(format!(
                "unsupported schema version '{}', expected '{SCHEMA_VERSION}'",
                self.schema_version
            )));
        }
        let counted = self.summary.passed + self.summary.failed + self.summary.errors;
        if self.summary.total_cases != counted {
            return Err(EvalError::artifact(format!(
                "summary counts are inconsistent: totalCases={} but passed+failed+errors={counted}",
                self.summary.total_cases
            )));
        }
        if self.summary.total_cases != self.trials.len() {
            return Err(EvalError::artifact(format!(
                "summary.totalCases={} does not match {} trials",
                self.summary.total_cases,
                self.trials.len()
            )));
        }
        if !(0.0..=1.0).contains(&self.summary.pass_rate) {
            return Err(EvalError::artifact(format!(
                "passRate {} out of [0, 1]",
                self.summary.pass_rate
            )));
        }
        for trial in &self.trials {
            for grade in &trial.grades {
                if !(0.0..=1.0).contains(&grade.score) {
                    return Err(EvalError::artifact(format!(
                        "grade score {} out of [0, 1] in case '{}'",
                        grade.score, trial.case_id
                    )));
                }
            }
            trial
                .output
                .validate()
                .map_err(|e| EvalError::artifact(format!("case '{}': {e}", trial.case_id)))?;
        }
        Ok(())
    }

    /// Serialize to pretty JSON after validating.
    pub fn to_json(&self) -> EvalResult<String> {
        self.validate()?;
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse and validate from JSON.
    pub fn from_json(json: &str) -> EvalResult<Self> {
        let run: Self = serde_json::from_str(json)?;
        run.validate()?;
        Ok(run)
    }

    /// Write the artifact to a file.
    pub fn save(&self, path: impl AsRef<Path>) -> EvalResult<()> {
        std::fs::write(path.as_ref(), self.to_json()?)?;
        Ok(())
    }

    /// Read and validate an artifact from a file.
    pub fn load(path: impl AsRef<Path>) -> EvalResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&content)
    }

    /// Process exit code a CLI frontend should map this run to:
    /// 0 when all gates passed, 1 otherwise.
    pub fn exit_code(&self) -> i32 {
        if self.summary.gate_result.pass {
            0
        } else {
            1
        }
    }
}
