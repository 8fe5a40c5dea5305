//! Resource-budget graders: latency, cost and token ceilings.
//!
//! Comparisons are inclusive at the boundary. Cost and token graders treat
//! a missing field as "not reported" and pass.

use crate::grader::{Grader, GraderContext};
use crate::types::{CaseExpected, GradeResult, TargetOutput};
use async_trait::async_trait;

/// Check that the output latency is at most `max_ms`.
pub fn latency(max_ms: u64) -> LatencyGrader {
    LatencyGrader {
        name: format!("latency({max_ms})"),
        max_ms,
    }
}

/// Grader produced by [`latency`].
#[derive(Debug, Clone)]
pub struct LatencyGrader {
    name: String,
    max_ms: u64,
}

#[async_trait]
impl Grader for LatencyGrader {
    fn name(&self) -> &str {
        &self.name
    }

    async fn grade(
        &self,
        output: &TargetOutput,
        _expected: Option<&CaseExpected>,
        _ctx: &GraderContext,
    ) -> GradeResult {
        if output.latency_ms <= self.max_ms {
            GradeResult::pass(
                &self.name,
                format!("{}ms within limit of {}ms", output.latency_ms, self.max_ms),
            )
        } else {
            GradeResult::fail(
                &self.name,
                format!("{}ms exceeds limit of {}ms", output.latency_ms, self.max_ms),
            )
        }
    }
}

/// Check that the reported cost is at most `max_dollars`.
pub fn cost(max_dollars: f64) -> CostGrader {
    CostGrader {
        name: format!("cost({max_dollars})"),
        max_dollars,
    }
}

/// Grader produced by [`cost`].
#[derive(Debug, Clone)]
pub struct CostGrader {
    name: String,
    max_dollars: f64,
}

#[async_trait]
impl Grader for CostGrader {
    fn name(&self) -> &str {
        &self.name
    }

    async fn grade(
        &self,
        output: &TargetOutput,
        _expected: Option<&CaseExpected>,
        _ctx: &GraderContext,
    ) -> GradeResult {
        match output.cost {
            None => GradeResult::pass(&self.name, "cost not reported, skipping"),
            Some(cost) if cost <= self.max_dollars => GradeResult::pass(
                &self.name,
                format!("${cost} within limit of ${}", self.max_dollars),
            ),
            Some(cost) => GradeResult::fail(
                &self.name,
                format!("${cost} exceeds limit of ${}", self.max_dollars),
            ),
        }
    }
}

/// Check that total token usage (input + output) is at most `max`.
pub fn token_count(max: u64) -> TokenCountGrader {
    TokenCountGrader {
        name: format!("token_count({max})"),
        max,
    }
}

/// Grader produced by [`token_count`].
#[derive(Debug, Clone)]
pub struct TokenCountGrader {
    name: String,
    max: u64,
}

#[async_trait]
impl Grader for TokenCountGrader {
    fn name(&self) -> &str {
        &self.name
    }

    async fn grade(
        &self,
        output: &TargetOutput,
        _expected: Option<&CaseExpected>,
        _ctx: &GraderContext,
    ) -> GradeResult {
        match output.token_usage {
            None => GradeResult::pass(&self.name, "token usage not reported, skipping"),
            Some(usage) => {
                let total = usage.total();
                if total <= self.max {
                    GradeResult::pass(
                        &self.name,
                        format!("{total} tokens within limit of {}", self.max),
                    )
                } else {
                    GradeResult::fail(
                        &self.name,
                        format!("{total} tokens exceeds limit of {}", self.max),
                    )
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TokenUsage;

    fn ctx() -> GraderContext {
        GraderContext::default()
    }

    #[tokio::test]
    async fn test_latency_boundary_inclusive() {
        let grader = latency(100);
        let at = TargetOutput::text("x").with_latency_ms(100);
        assert!(grader.grade(&at, None, &ctx()).await.pass);

        let over = TargetOutput::text("x").with_latency_ms(101);
        assert!(!grader.grade(&over, None, &ctx()).await.pass);
    }

    #[tokio::test]
    async fn test_cost_missing_passes() {
        let grader = cost(0.01);
        let result = grader.grade(&TargetOutput::text("x"), None, &ctx()).await;
        assert!(result.pass);
        assert!(result.reason.contains("not reported"));
    }

    #[tokio::test]
    async fn test_cost_boundary_inclusive() {
        let grader = cost(0.01);
        let at = TargetOutput::text("x").with_cost(0.01);
        assert!(grader.grade(&at, None, &ctx()).await.pass);

        let over = TargetOutput::text("x").with_cost(0.011);
        assert!(!grader.grade(&over, None, &ctx()).await.pass);
    }

    #[tokio::test]
    async fn test_token_count() {
        let grader = token_count(150);
        let at = TargetOutput::text("x").with_token_usage(TokenUsage::new(100, 50));
        assert!(grader.grade(&at, None, &ctx()).await.pass);

        let over = TargetOutput::text("x").with_token_usage(TokenUsage::new(100, 51));
        assert!(!grader.grade(&over, None, &ctx()).await.pass);

        let missing = TargetOutput::text("x");
        assert!(grader.grade(&missing, None, &ctx()).await.pass);
    }
}
