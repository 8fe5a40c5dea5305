//! Boolean composition of graders.
//!
//! Combinators lift N graders into one with a precise score contract:
//! `all` takes the minimum sub-score, `any` the maximum, `not` inverts.
//! Sub-graders always all run; there is no short-circuit, so every child
//! result stays observable.

use crate::grader::{Grader, GraderContext, SharedGrader};
use crate::types::{CaseExpected, GradeResult, TargetOutput};
use async_trait::async_trait;
use std::sync::Arc;

fn joined_names(graders: &[SharedGrader]) -> String {
    graders
        .iter()
        .map(|g| g.name().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn child_metadata(children: &[GradeResult]) -> serde_json::Value {
    serde_json::json!({
        "children": children,
    })
}

/// Pass when every sub-grader passes. Score is the minimum sub-score.
///
/// An empty list is vacuously true with score 1.
pub fn all(graders: impl IntoIterator<Item = SharedGrader>) -> AllGrader {
    let graders: Vec<SharedGrader> = graders.into_iter().collect();
    AllGrader {
        name: format!("all({})", joined_names(&graders)),
        graders,
    }
}

/// Grader produced by [`all`].
#[derive(Clone)]
pub struct AllGrader {
    name: String,
    graders: Vec<SharedGrader>,
}

#[async_trait]
impl Grader for AllGrader {
    fn name(&self) -> &str {
        &self.name
    }

    async fn grade(
        &self,
        output: &TargetOutput,
        expected: Option<&CaseExpected>,
        ctx: &GraderContext,
    ) -> GradeResult {
        if self.graders.is_empty() {
            return GradeResult::pass(&self.name, "no sub-graders (vacuously true)");
        }

        let mut children = Vec::with_capacity(self.graders.len());
        for grader in &self.graders {
            children.push(grader.grade(output, expected, ctx).await);
        }

        let pass = children.iter().all(|c| c.pass);
        let score = children
            .iter()
            .map(|c| c.score)
            .fold(f64::INFINITY, f64::min);
        let passed = children.iter().filter(|c| c.pass).count();
        let reason = if pass {
            format!("all {} sub-graders passed", children.len())
        } else {
            let failed: Vec<&str> = children
                .iter()
                .filter(|c| !c.pass)
                .map(|c| c.grader_name.as_str())
                .collect();
            format!(
                "{}/{} sub-graders passed; failed: {}",
                passed,
                children.len(),
                failed.join(", ")
            )
        };

        GradeResult::scored(&self.name, pass, score, reason)
            .with_metadata(child_metadata(&children))
    }
}

/// Pass when at least one sub-grader passes. Score is the maximum sub-score.
///
/// An empty list fails with score 0.
pub fn any(graders: impl IntoIterator<Item = SharedGrader>) -> AnyGrader {
    let graders: Vec<SharedGrader> = graders.into_iter().collect();
    AnyGrader {
        name: format!("any({})", joined_names(&graders)),
        graders,
    }
}

/// Grader produced by [`any`].
#[derive(Clone)]
pub struct AnyGrader {
    name: String,
    graders: Vec<SharedGrader>,
}

#[async_trait]
impl Grader for AnyGrader {
    fn name(&self) -> &str {
        &self.name
    }

    async fn grade(
        &self,
        output: &TargetOutput,
        expected: Option<&CaseExpected>,
        ctx: &GraderContext,
    ) -> GradeResult {
        if self.graders.is_empty() {
            return GradeResult::fail(&self.name, "no sub-graders");
        }

        let mut children = Vec::with_capacity(self.graders.len());
        for grader in &self.graders {
            children.push(grader.grade(output, expected, ctx).await);
        }

        let pass = children.iter().any(|c| c.pass);
        let score = children.iter().map(|c| c.score).fold(0.0, f64::max);
        let reason = if pass {
            let passed: Vec<&str> = children
                .iter()
                .filter(|c| c.pass)
                .map(|c| c.grader_name.as_str())
                .collect();
            format!("passed via: {}", passed.join(", "))
        } else {
            format!("none of {} sub-graders passed", children.len())
        };

        GradeResult::scored(&self.name, pass, score, reason)
            .with_metadata(child_metadata(&children))
    }
}

/// Invert a grader: pass becomes fail and the score becomes `1 - score`.
pub fn not(grader: impl Grader + 'static) -> NotGrader {
    let grader: SharedGrader = Arc::new(grader);
    NotGrader {
        name: format!("not({})", grader.name()),
        grader,
    }
}

/// Grader produced by [`not`].
#[derive(Clone)]
pub struct NotGrader {
    name: String,
    grader: SharedGrader,
}

#[async_trait]
impl Grader for NotGrader {
    fn name(&self) -> &str {
        &self.name
    }

    async fn grade(
        &self,
        output: &TargetOutput,
        expected: Option<&CaseExpected>,
        ctx: &GraderContext,
    ) -> GradeResult {
        let inner = self.grader.grade(output, expected, ctx).await;
        GradeResult::scored(
            &self.name,
            !inner.pass,
            1.0 - inner.score,
            format!("negated '{}': {}", inner.grader_name, inner.reason),
        )
        .with_metadata(child_metadata(std::slice::from_ref(&inner)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graders::testing::{AlwaysFail, AlwaysPass, FnGrader};
    use crate::graders::text::contains;

    fn ctx() -> GraderContext {
        GraderContext::default()
    }

    fn shared(grader: impl Grader + 'static) -> SharedGrader {
        Arc::new(grader)
    }

    fn scored_grader(name: &'static str, pass: bool, score: f64) -> SharedGrader {
        Arc::new(FnGrader::new(name, move |_, _| {
            GradeResult::scored(name, pass, score, "fixed")
        }))
    }

    #[tokio::test]
    async fn test_all_empty_vacuously_passes() {
        let grader = all(Vec::new());
        let result = grader.grade(&TargetOutput::default(), None, &ctx()).await;
        assert!(result.pass);
        assert_eq!(result.score, 1.0);
    }

    #[tokio::test]
    async fn test_any_empty_fails() {
        let grader = any(Vec::new());
        let result = grader.grade(&TargetOutput::default(), None, &ctx()).await;
        assert!(!result.pass);
        assert_eq!(result.score, 0.0);
    }

    #[tokio::test]
    async fn test_all_score_is_minimum() {
        let grader = all([
            scored_grader("a", true, 0.9),
            scored_grader("b", true, 0.4),
            scored_grader("c", true, 0.7),
        ]);
        let result = grader.grade(&TargetOutput::default(), None, &ctx()).await;
        assert!(result.pass);
        assert!((result.score - 0.4).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_any_score_is_maximum() {
        let grader = any([
            scored_grader("a", false, 0.2),
            scored_grader("b", true, 0.8),
        ]);
        let result = grader.grade(&TargetOutput::default(), None, &ctx()).await;
        assert!(result.pass);
        assert!((result.score - 0.8).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_all_runs_every_grader_no_short_circuit() {
        let grader = all([
            shared(AlwaysFail::new("first fails")),
            shared(AlwaysPass),
        ]);
        let result = grader.grade(&TargetOutput::default(), None, &ctx()).await;
        assert!(!result.pass);
        // Both children are present in the metadata.
        let children = &result.metadata.unwrap()["children"];
        assert_eq!(children.as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_not_inverts() {
        let grader = not(AlwaysPass);
        let result = grader.grade(&TargetOutput::default(), None, &ctx()).await;
        assert!(!result.pass);
        assert_eq!(result.score, 0.0);
    }

    #[tokio::test]
    async fn test_double_negation_restores() {
        let base = scored_grader("base", true, 0.75);
        let doubled = not(not(FnGrader::new("base", |_, _| {
            GradeResult::scored("base", true, 0.75, "fixed")
        })));
        let original = base.grade(&TargetOutput::default(), None, &ctx()).await;
        let restored = doubled.grade(&TargetOutput::default(), None, &ctx()).await;
        assert_eq!(original.pass, restored.pass);
        assert!((original.score - restored.score).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_composed_names() {
        let grader = all([
            shared(contains("a")),
            shared(contains("b")),
        ]);
        assert_eq!(grader.name(), "all(contains(a), contains(b))");

        let negated = not(contains("a"));
        assert_eq!(negated.name(), "not(contains(a))");
    }

    #[tokio::test]
    async fn test_pass_and_score_are_independent() {
        // A sub-grader may pass with a partial score; `all` keeps both.
        let grader = all([scored_grader("partial", true, 0.75)]);
        let result = grader.grade(&TargetOutput::default(), None, &ctx()).await;
        assert!(result.pass);
        assert!((result.score - 0.75).abs() < 1e-9);
    }
}
