//! Per-case grading pipeline.
//!
//! Runs the effective grader list for one case against one target output,
//! in declared order, then folds the results through scoring. Grader
//! results are appended in invocation order; ordering is deterministic.

use crate::grader::{GraderConfig, GraderContext};
use crate::scoring::{score_case, CaseScore};
use crate::types::{CaseExpected, GradeResult, TargetOutput};
use tracing::debug;

/// Outcome of grading one case.
#[derive(Debug, Clone)]
pub struct PipelineResult {
    /// Grader results in invocation order.
    pub grades: Vec<GradeResult>,
    /// Folded case verdict.
    pub case_score: CaseScore,
}

/// Pick the effective grader list: a non-empty case-level list replaces
/// the suite defaults entirely; otherwise the defaults apply.
fn effective_graders<'a>(
    case_graders: Option<&'a [GraderConfig]>,
    default_graders: &'a [GraderConfig],
) -> &'a [GraderConfig] {
    match case_graders {
        Some(graders) if !graders.is_empty() => graders,
        _ => default_graders,
    }
}

/// Grade one output through the effective grader list.
pub async fn run_pipeline(
    output: &TargetOutput,
    expected: Option<&CaseExpected>,
    case_graders: Option<&[GraderConfig]>,
    default_graders: &[GraderConfig],
    ctx: &GraderContext,
) -> PipelineResult {
    let configs = effective_graders(case_graders, default_graders);

    let mut grades = Vec::with_capacity(configs.len());
    for config in configs {
        let grade = config.grader.grade(output, expected, ctx).await;
        debug!(
            case = %ctx.case_id,
            grader = %grade.grader_name,
            pass = grade.pass,
            score = grade.score,
            "graded"
        );
        grades.push(grade);
    }

    let case_score = score_case(&grades, configs);
    PipelineResult { grades, case_score }
}
