//! Run-to-run comparison: turns two archived Runs into a regression signal.

use crate::run::{Run, Trial, TrialStatus};
use crate::types::Category;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// Default score delta below which a case counts as unchanged.
pub const DEFAULT_SCORE_THRESHOLD: f64 = 0.05;

/// Options for comparing two runs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompareOptions {
    /// Absolute score delta treated as noise.
    pub score_threshold: f64,
}

impl Default for CompareOptions {
    fn default() -> Self {
        Self {
            score_threshold: DEFAULT_SCORE_THRESHOLD,
        }
    }
}

/// Direction of a case or grader change between runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Case exists only in the compare run.
    Added,
    /// Case exists only in the base run.
    Removed,
    /// Outcome got worse.
    Regression,
    /// Outcome got better.
    Improvement,
    /// Outcome is the same within the threshold.
    Unchanged,
}

/// Score movement of one grader between paired trials.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct GraderDiff {
    /// Grader name matched across the two runs.
    pub grader_name: String,
    /// Score in the base run.
    pub base_score: f64,
    /// Score in the compare run.
    pub compare_score: f64,
    /// `compare - base`.
    pub score_delta: f64,
    /// Thresholded classification.
    pub direction: Direction,
}

/// Change of one case between runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CaseDiff {
    /// Case id.
    pub case_id: String,
    /// Classification of the change.
    pub direction: Direction,
    /// Status in the base run, when present there.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_status: Option<TrialStatus>,
    /// Status in the compare run, when present there.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compare_status: Option<TrialStatus>,
    /// `compare.score - base.score`, for cases present in both.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score_delta: Option<f64>,
    /// Per-grader movements for cases present in both runs.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub grader_diffs: Vec<GraderDiff>,
}

/// Pass-rate movement of one category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CategoryDelta {
    /// Category.
    pub category: Category,
    /// Pass rate in the base run (0 when the category is absent there).
    pub base_pass_rate: f64,
    /// Pass rate in the compare run (0 when absent there).
    pub compare_pass_rate: f64,
    /// `compare - base`.
    pub delta: f64,
}

/// Aggregate comparison counts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ComparisonSummary {
    /// Size of the case-id union across both runs.
    pub total_cases: usize,
    /// Cases that regressed.
    pub regressions: usize,
    /// Cases that improved.
    pub improvements: usize,
    /// Cases unchanged within the threshold.
    pub unchanged: usize,
    /// Cases only in the compare run.
    pub added: usize,
    /// Cases only in the base run.
    pub removed: usize,
    /// `compare.totalCost - base.totalCost`.
    pub cost_delta: f64,
    /// `compare.totalDurationMs - base.totalDurationMs`.
    pub duration_delta_ms: i64,
    /// Gate verdict of the base run.
    pub base_gate_pass: bool,
    /// Gate verdict of the compare run.
    pub compare_gate_pass: bool,
}

/// Full diff between two runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RunComparison {
    /// Id of the base run.
    pub base_run_id: String,
    /// Id of the compare run.
    pub compare_run_id: String,
    /// Per-case diffs: base-run order first, then compare-only cases.
    pub cases: Vec<CaseDiff>,
    /// Per-category pass-rate movements.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub by_category: Vec<CategoryDelta>,
    /// Aggregate counts and deltas.
    pub summary: ComparisonSummary,
}

fn classify_delta(delta: f64, threshold: f64) -> Direction {
    if delta < -threshold {
        Direction::Regression
    } else if delta > threshold {
        Direction::Improvement
    } else {
        Direction::Unchanged
    }
}

fn classify_pair(base: &Trial, compare: &Trial, threshold: f64) -> Direction {
    let base_passed = base.status == TrialStatus::Pass;
    let compare_passed = compare.status == TrialStatus::Pass;
    match (base_passed, compare_passed) {
        (true, false) => Direction::Regression,
        (false, true) => Direction::Improvement,
        _ => classify_delta(compare.score - base.score, threshold),
    }
}

fn grader_diffs(base: &Trial, compare: &Trial, threshold: f64) -> Vec<GraderDiff> {
    let compare_by_name: HashMap<&str, &crate::types::GradeResult> = compare
        .grades
        .iter()
        .map(|g| (g.grader_name.as_str(), g))
        .collect();

    base.grades
        .iter()
        .filter_map(|base_grade| {
            let compare_grade = compare_by_name.get(base_grade.grader_name.as_str())?;
            let delta = compare_grade.score - base_grade.score;
            Some(GraderDiff {
                grader_name: base_grade.grader_name.clone(),
                base_score: base_grade.score,
                compare_score: compare_grade.score,
                score_delta: delta,
                direction: classify_delta(delta, threshold),
            })
        })
        .collect()
}

fn category_deltas(base: &Run, compare: &Run) -> Vec<CategoryDelta> {
    let empty = Default::default();
    let base_stats = base.summary.by_category.as_ref().unwrap_or(&empty);
    let compare_stats = compare.summary.by_category.as_ref().unwrap_or(&empty);

    let categories: BTreeSet<Category> = base_stats
        .keys()
        .chain(compare_stats.keys())
        .copied()
        .collect();

    categories
        .into_iter()
        .map(|category| {
            let base_rate = base_stats.get(&category).map_or(0.0, |s| s.pass_rate);
            let compare_rate = compare_stats.get(&category).map_or(0.0, |s| s.pass_rate);
            CategoryDelta {
                category,
                base_pass_rate: base_rate,
                compare_pass_rate: compare_rate,
                delta: compare_rate - base_rate,
            }
        })
        .collect()
}

/// Diff two runs.
///
/// Cases are matched by id over the union of both trial lists. A status
/// flip to or from `pass` dominates; otherwise the thresholded score delta
/// decides. Order is deterministic: base-run order, then compare-only
/// cases in compare-run order.
pub fn compare_runs(base: &Run, compare: &Run, options: &CompareOptions) -> RunComparison {
    let threshold = options.score_threshold;
    let base_by_id: HashMap<&str, &Trial> =
        base.trials.iter().map(|t| (t.case_id.as_str(), t)).collect();
    let compare_by_id: HashMap<&str, &Trial> = compare
        .trials
        .iter()
        .map(|t| (t.case_id.as_str(), t))
        .collect();

    let mut cases = Vec::new();
    for base_trial in &base.trials {
        let diff = match compare_by_id.get(base_trial.case_id.as_str()) {
            None => CaseDiff {
                case_id: base_trial.case_id.clone(),
                direction: Direction::Removed,
                base_status: Some(base_trial.status),
                compare_status: None,
                score_delta: None,
                grader_diffs: Vec::new(),
            },
            Some(compare_trial) => CaseDiff {
                case_id: base_trial.case_id.clone(),
                direction: classify_pair(base_trial, compare_trial, threshold),
                base_status: Some(base_trial.status),
                compare_status: Some(compare_trial.status),
                score_delta: Some(compare_trial.score - base_trial.score),
                grader_diffs: grader_diffs(base_trial, compare_trial, threshold),
            },
        };
        cases.push(diff);
    }
    for compare_trial in &compare.trials {
        if !base_by_id.contains_key(compare_trial.case_id.as_str()) {
            cases.push(CaseDiff {
                case_id: compare_trial.case_id.clone(),
                direction: Direction::Added,
                base_status: None,
                compare_status: Some(compare_trial.status),
                score_delta: None,
                grader_diffs: Vec::new(),
            });
        }
    }

    let count = |direction: Direction| cases.iter().filter(|c| c.direction == direction).count();
    let summary = ComparisonSummary {
        total_cases: cases.len(),
        regressions: count(Direction::Regression),
        improvements: count(Direction::Improvement),
        unchanged: count(Direction::Unchanged),
        added: count(Direction::Added),
        removed: count(Direction::Removed),
        cost_delta: compare.summary.total_cost - base.summary.total_cost,
        duration_delta_ms: compare.summary.total_duration_ms as i64
            - base.summary.total_duration_ms as i64,
        base_gate_pass: base.summary.gate_result.pass,
        compare_gate_pass: compare.summary.gate_result.pass,
    };

    RunComparison {
        base_run_id: base.id.clone(),
        compare_run_id: compare.id.clone(),
        cases,
        by_category: category_deltas(base, compare),
        summary,
    }
}
