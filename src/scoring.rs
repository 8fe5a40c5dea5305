//! Per-case scoring: folds grader results into one verdict.

use crate::grader::GraderConfig;
use crate::types::GradeResult;

/// Default per-case pass threshold when no grader sets one.
pub const DEFAULT_CASE_THRESHOLD: f64 = 0.5;

/// Verdict for one case.
#[derive(Debug, Clone, PartialEq)]
pub struct CaseScore {
    /// Whether the case passes.
    pub pass: bool,
    /// Aggregate score in `[0, 1]`.
    pub score: f64,
    /// Why the case failed, when it did.
    pub reason: Option<String>,
    /// Names of every grader that failed.
    pub failed_graders: Vec<String>,
}

/// Aggregate ordered grader results into a case verdict.
///
/// A failing required grader vetoes the case with score 0. Otherwise the
/// score is the weighted mean of grader scores, and the case passes when
/// the score reaches the minimum configured threshold (default 0.5).
/// Comparisons are inclusive: a score exactly at the threshold passes.
pub fn score_case(grades: &[GradeResult], configs: &[GraderConfig]) -> CaseScore {
    debug_assert_eq!(grades.len(), configs.len());

    let failed_graders: Vec<String> = grades
        .iter()
        .filter(|g| !g.pass)
        .map(|g| g.grader_name.clone())
        .collect();

    let failed_required: Vec<&GradeResult> = grades
        .iter()
        .zip(configs)
        .filter(|(grade, config)| config.required && !grade.pass)
        .map(|(grade, _)| grade)
        .collect();

    if let Some(first) = failed_required.first() {
        return CaseScore {
            pass: false,
            score: 0.0,
            reason: Some(format!(
                "required grader '{}' failed: {}",
                first.grader_name, first.reason
            )),
            failed_graders,
        };
    }

    let total_weight: f64 = configs.iter().map(|c| c.weight).sum();
    let score = if grades.is_empty() || total_weight == 0.0 {
        1.0
    } else {
        let weighted_sum: f64 = grades
            .iter()
            .zip(configs)
            .map(|(grade, config)| grade.score * config.weight)
            .sum();
        weighted_sum / total_weight
    };

    let threshold = configs
        .iter()
        .filter_map(|c| c.threshold)
        .fold(f64::INFINITY, f64::min);
    let threshold = if threshold.is_finite() {
        threshold
    } else {
        DEFAULT_CASE_THRESHOLD
    };

    let pass = score >= threshold;
    let reason = if pass {
        None
    } else {
        Some(format!(
            "score {score:.3} below threshold {threshold:.3}; failed: {}",
            if failed_graders.is_empty() {
                "none".to_string()
            } else {
                failed_graders.join(", ")
            }
        ))
    };

    CaseScore {
        pass,
        score,
        reason,
        failed_graders,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graders::testing::AlwaysPass;

    fn grade(name: &str, pass: bool, score: f64) -> GradeResult {
        GradeResult::scored(name, pass, score, "test")
    }

    fn config() -> GraderConfig {
        GraderConfig::new(AlwaysPass)
    }

    #[test]
    fn test_empty_passes_with_full_score() {
        let result = score_case(&[], &[]);
        assert!(result.pass);
        assert_eq!(result.score, 1.0);
        assert!(result.failed_graders.is_empty());
    }

    #[test]
    fn test_required_failure_vetoes() {
        let grades = vec![grade("a", false, 0.9), grade("b", true, 1.0)];
        let configs = vec![config().required(), config().weight(100.0)];
        let result = score_case(&grades, &configs);
        assert!(!result.pass);
        assert_eq!(result.score, 0.0);
        assert!(result.reason.unwrap().contains("required grader 'a'"));
        assert_eq!(result.failed_graders, vec!["a"]);
    }

    #[test]
    fn test_required_failure_reason_names_first() {
        let grades = vec![
            grade("first_required", false, 0.0),
            grade("second_required", false, 0.0),
        ];
        let configs = vec![config().required(), config().required()];
        let result = score_case(&grades, &configs);
        assert!(result.reason.unwrap().contains("first_required"));
        assert_eq!(
            result.failed_graders,
            vec!["first_required", "second_required"]
        );
    }

    #[test]
    fn test_weighted_mean() {
        let grades = vec![grade("a", true, 1.0), grade("b", true, 0.0)];
        let configs = vec![config().weight(3.0), config().weight(1.0)];
        let result = score_case(&grades, &configs);
        assert!((result.score - 0.75).abs() < 1e-9);
        assert!(result.pass);
    }

    #[test]
    fn test_default_weight_is_one() {
        let grades = vec![grade("a", true, 1.0), grade("b", true, 0.5)];
        let configs = vec![config(), config()];
        let result = score_case(&grades, &configs);
        assert!((result.score - 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_threshold_is_minimum_of_configured() {
        let grades = vec![grade("a", true, 0.6), grade("b", true, 0.6)];
        let configs = vec![config().threshold(0.9), config().threshold(0.55)];
        let result = score_case(&grades, &configs);
        // min(0.9, 0.55) = 0.55 <= 0.6
        assert!(result.pass);
    }

    #[test]
    fn test_default_threshold_half() {
        let grades = vec![grade("a", true, 0.5)];
        let configs = vec![config()];
        let result = score_case(&grades, &configs);
        // Exactly at the default threshold: inclusive, passes.
        assert!(result.pass);

        let grades = vec![grade("a", true, 0.49)];
        let result = score_case(&grades, &configs);
        assert!(!result.pass);
    }

    #[test]
    fn test_threshold_tie_passes() {
        let grades = vec![grade("a", true, 0.8)];
        let configs = vec![config().threshold(0.8)];
        let result = score_case(&grades, &configs);
        assert!(result.pass);
    }

    #[test]
    fn test_failed_graders_includes_non_required() {
        let grades = vec![grade("a", false, 1.0), grade("b", true, 1.0)];
        let configs = vec![config(), config()];
        let result = score_case(&grades, &configs);
        // Weighted score 1.0 still passes, but the failure is recorded.
        assert!(result.pass);
        assert_eq!(result.failed_graders, vec!["a"]);
    }

    #[test]
    fn test_fail_reason_lists_failing_graders() {
        let grades = vec![grade("a", false, 0.0), grade("b", false, 0.2)];
        let configs = vec![config(), config()];
        let result = score_case(&grades, &configs);
        assert!(!result.pass);
        let reason = result.reason.unwrap();
        assert!(reason.contains("a"));
        assert!(reason.contains("b"));
    }
}
