//! Run executor.
//!
//! Drives a suite's cases through the target and the grading pipeline,
//! sequentially and in declaration order. Each target invocation runs
//! under a timeout; a throw or a timeout becomes an `error` trial and the
//! run continues. Configuration errors surface before any case executes.

use crate::error::EvalResult;
use crate::grader::GraderContext;
use crate::judge::Judge;
use crate::pipeline::run_pipeline;
use crate::run::{config_hash, Run, RunSummary, Trial, TrialStatus, FRAMEWORK_VERSION, SCHEMA_VERSION};
use crate::suite::Suite;
use crate::target::Target;
use crate::types::{Category, RunMode, TargetOutput};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Options for one run.
#[derive(Clone, Default)]
pub struct RunOptions {
    /// Per-case target timeout. `None` disables the timeout.
    pub timeout: Option<Duration>,
    /// Mode recorded in the Run artifact.
    pub mode: RunMode,
    /// Judge handle injected into the grading pipeline.
    pub judge: Option<Arc<dyn Judge>>,
}

impl RunOptions {
    /// Create options with the default 30s timeout.
    pub fn new() -> Self {
        Self {
            timeout: Some(Duration::from_secs(30)),
            mode: RunMode::Live,
            judge: None,
        }
    }

    /// Set the per-case timeout in milliseconds.
    pub fn timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout = Some(Duration::from_millis(timeout_ms));
        self
    }

    /// Disable the per-case timeout.
    pub fn no_timeout(mut self) -> Self {
        self.timeout = None;
        self
    }

    /// Set the run mode.
    pub fn mode(mut self, mode: RunMode) -> Self {
        self.mode = mode;
        self
    }

    /// Attach a judge handle.
    pub fn judge(mut self, judge: Arc<dyn Judge>) -> Self {
        self.judge = Some(judge);
        self
    }
}

impl std::fmt::Debug for RunOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunOptions")
            .field("timeout", &self.timeout)
            .field("mode", &self.mode)
            .field("judge", &self.judge.is_some())
            .finish()
    }
}

fn category_map(suite: &Suite) -> HashMap<String, Category> {
    suite
        .cases
        .iter()
        .filter_map(|c| c.category.map(|cat| (c.id.clone(), cat)))
        .collect()
}

fn error_trial(case_id: &str, message: String, duration_ms: u64) -> Trial {
    Trial {
        case_id: case_id.to_string(),
        status: TrialStatus::Error,
        output: TargetOutput::text(message).with_latency_ms(duration_ms),
        grades: Vec::new(),
        score: 0.0,
        duration_ms,
        trial_index: None,
    }
}

fn assemble_run(suite: &Suite, trials: Vec<Trial>, mode: RunMode, started_ms: u64) -> Run {
    let summary = RunSummary::compute(
        &trials,
        &category_map(suite),
        started_ms,
        suite.gates.as_ref(),
    );
    Run {
        schema_version: SCHEMA_VERSION.to_string(),
        id: Uuid::new_v4().to_string(),
        suite_id: suite.id.clone(),
        mode,
        trials,
        summary,
        timestamp: Utc::now(),
        config_hash: config_hash(&suite.id, &suite.case_ids(), suite.gates.as_ref()),
        framework_version: FRAMEWORK_VERSION.to_string(),
    }
}

/// Execute a suite against a target.
///
/// Cases run sequentially in declaration order; this is a contract, not an
/// implementation detail. The returned Run carries one trial per case in
/// that same order.
pub async fn run_suite(
    suite: &Suite,
    target: &dyn Target,
    options: &RunOptions,
) -> EvalResult<Run> {
    suite.validate()?;

    let run_start = Instant::now();
    info!(suite = %suite.id, cases = suite.len(), mode = %options.mode, "starting run");

    let mut trials = Vec::with_capacity(suite.len());
    for case in &suite.cases {
        let case_start = Instant::now();

        let invocation = target.invoke(&case.input);
        let outcome = match options.timeout {
            Some(limit) => timeout(limit, invocation).await,
            None => Ok(invocation.await),
        };
        let duration_ms = case_start.elapsed().as_millis() as u64;

        let trial = match outcome {
            Err(_) => {
                let limit_ms = options.timeout.map(|t| t.as_millis()).unwrap_or_default();
                warn!(case = %case.id, "target timed out after {limit_ms}ms");
                error_trial(&case.id, format!("Timeout after {limit_ms}ms"), duration_ms)
            }
            Ok(Err(e)) => {
                warn!(case = %case.id, error = %e, "target error");
                error_trial(&case.id, format!("Target error: {e}"), duration_ms)
            }
            Ok(Ok(output)) => match output.validate() {
                Err(e) => {
                    warn!(case = %case.id, error = %e, "target produced invalid output");
                    error_trial(&case.id, format!("Target error: {e}"), duration_ms)
                }
                Ok(()) => {
                    let mut ctx = GraderContext::new(&case.id, &suite.id, options.mode);
                    ctx.judge = options.judge.clone();
                    let result = run_pipeline(
                        &output,
                        case.expected.as_ref(),
                        None,
                        &suite.default_graders,
                        &ctx,
                    )
                    .await;

                    let status = if result.case_score.pass {
                        TrialStatus::Pass
                    } else {
                        TrialStatus::Fail
                    };
                    Trial {
                        case_id: case.id.clone(),
                        status,
                        output,
                        grades: result.grades,
                        score: result.case_score.score,
                        duration_ms,
                        trial_index: None,
                    }
                }
            },
        };

        debug!(case = %case.id, status = %trial.status, score = trial.score, "case finished");
        trials.push(trial);
    }

    let total_duration_ms = run_start.elapsed().as_millis() as u64;
    let run = assemble_run(suite, trials, options.mode, total_duration_ms);
    info!(
        run = %run.id,
        passed = run.summary.passed,
        failed = run.summary.failed,
        errors = run.summary.errors,
        gates = run.summary.gate_result.pass,
        "run finished"
    );
    Ok(run)
}

/// Re-grade a stored run with the current suite config, without invoking
/// the target.
///
/// Each new trial preserves the stored `output`, `duration_ms` and
/// `trial_index`; grades, score and status are recomputed with the current
/// default graders. Expected references are looked up by case id in the
/// current suite, so rubric iteration picks up edits to expectations too.
pub async fn run_judge_only(
    previous: &Run,
    suite: &Suite,
    options: &RunOptions,
) -> EvalResult<Run> {
    suite.validate()?;
    previous.validate()?;

    let run_start = Instant::now();
    info!(
        suite = %suite.id,
        previous_run = %previous.id,
        trials = previous.trials.len(),
        "starting judge-only re-grade"
    );

    let mut trials = Vec::with_capacity(previous.trials.len());
    for stored in &previous.trials {
        let expected = suite
            .case_by_id(&stored.case_id)
            .and_then(|c| c.expected.as_ref());

        let mut ctx = GraderContext::new(&stored.case_id, &suite.id, RunMode::JudgeOnly);
        ctx.judge = options.judge.clone();
        let result = run_pipeline(
            &stored.output,
            expected,
            None,
            &suite.default_graders,
            &ctx,
        )
        .await;

        let status = if result.case_score.pass {
            TrialStatus::Pass
        } else {
            TrialStatus::Fail
        };
        trials.push(Trial {
            case_id: stored.case_id.clone(),
            status,
            output: stored.output.clone(),
            grades: result.grades,
            score: result.case_score.score,
            duration_ms: stored.duration_ms,
            trial_index: stored.trial_index,
        });
    }

    let total_duration_ms = run_start.elapsed().as_millis() as u64;
    Ok(assemble_run(suite, trials, RunMode::JudgeOnly, total_duration_ms))
}
