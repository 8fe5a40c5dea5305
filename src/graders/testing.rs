//! Trivial graders for wiring tests and suite scaffolding.

use crate::grader::{Grader, GraderContext};
use crate::types::{CaseExpected, GradeResult, TargetOutput};
use async_trait::async_trait;

/// Grader that always passes.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysPass;

#[async_trait]
impl Grader for AlwaysPass {
    fn name(&self) -> &str {
        "always_pass"
    }

    async fn grade(
        &self,
        _output: &TargetOutput,
        _expected: Option<&CaseExpected>,
        _ctx: &GraderContext,
    ) -> GradeResult {
        GradeResult::pass("always_pass", "always passes")
    }
}

/// Grader that always fails.
#[derive(Debug, Clone)]
pub struct AlwaysFail {
    reason: String,
}

impl AlwaysFail {
    /// Create with a failure reason.
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl Default for AlwaysFail {
    fn default() -> Self {
        Self::new("always fails")
    }
}

#[async_trait]
impl Grader for AlwaysFail {
    fn name(&self) -> &str {
        "always_fail"
    }

    async fn grade(
        &self,
        _output: &TargetOutput,
        _expected: Option<&CaseExpected>,
        _ctx: &GraderContext,
    ) -> GradeResult {
        GradeResult::fail("always_fail", &self.reason)
    }
}

/// Function-based grader for custom synchronous checks.
pub struct FnGrader<F> {
    name: String,
    func: F,
}

impl<F> FnGrader<F>
where
    F: Fn(&TargetOutput, Option<&CaseExpected>) -> GradeResult + Send + Sync,
{
    /// Create a named grader from a closure.
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

#[async_trait]
impl<F> Grader for FnGrader<F>
where
    F: Fn(&TargetOutput, Option<&CaseExpected>) -> GradeResult + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn grade(
        &self,
        output: &TargetOutput,
        expected: Option<&CaseExpected>,
        _ctx: &GraderContext,
    ) -> GradeResult {
        (self.func)(output, expected)
    }
}
