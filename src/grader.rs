//! Grader trait, context and scoring policy bindings.

use crate::judge::Judge;
use crate::types::{CaseExpected, GradeResult, RunMode, TargetOutput};
use async_trait::async_trait;
use std::sync::Arc;

/// Ambient context passed to every grader invocation.
///
/// The judge handle is the only externally stateful resource a grader may
/// touch; everything else is read-only identification.
#[derive(Clone, Default)]
pub struct GraderContext {
    /// Id of the case being graded.
    pub case_id: String,
    /// Id of the suite being executed.
    pub suite_id: String,
    /// Mode of the enclosing run.
    pub mode: RunMode,
    /// Judge handle for LLM-backed graders.
    pub judge: Option<Arc<dyn Judge>>,
}

impl GraderContext {
    /// Create a context for one case.
    pub fn new(case_id: impl Into<String>, suite_id: impl Into<String>, mode: RunMode) -> Self {
        Self {
            case_id: case_id.into(),
            suite_id: suite_id.into(),
            mode,
            judge: None,
        }
    }

    /// Attach a judge handle.
    pub fn with_judge(mut self, judge: Arc<dyn Judge>) -> Self {
        self.judge = Some(judge);
        self
    }
}

impl std::fmt::Debug for GraderContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraderContext")
            .field("case_id", &self.case_id)
            .field("suite_id", &self.suite_id)
            .field("mode", &self.mode)
            .field("judge", &self.judge.is_some())
            .finish()
    }
}

/// A check over one target output.
///
/// Graders must be pure except for the judge handle and must not mutate
/// their inputs. Anything that can be rejected (a bad regex, an invalid
/// schema) is rejected when the grader is constructed, not while grading.
#[async_trait]
pub trait Grader: Send + Sync {
    /// Grader name, encoding the factory parameters for observability.
    fn name(&self) -> &str;

    /// Grade one output against an optional expected reference.
    async fn grade(
        &self,
        output: &TargetOutput,
        expected: Option<&CaseExpected>,
        ctx: &GraderContext,
    ) -> GradeResult;
}

/// Shared grader handle.
pub type SharedGrader = Arc<dyn Grader>;

/// Binds a grader with its scoring policy.
#[derive(Clone)]
pub struct GraderConfig {
    /// The grader itself.
    pub grader: SharedGrader,
    /// Weight in the case score (default 1).
    pub weight: f64,
    /// Whether a failure of this grader fails the case outright.
    pub required: bool,
    /// Per-grader pass threshold contribution in `[0, 1]`.
    pub threshold: Option<f64>,
}

impl GraderConfig {
    /// Bind a grader with default policy.
    pub fn new(grader: impl Grader + 'static) -> Self {
        Self::from_shared(Arc::new(grader))
    }

    /// Bind an already-shared grader with default policy.
    pub fn from_shared(grader: SharedGrader) -> Self {
        Self {
            grader,
            weight: 1.0,
            required: false,
            threshold: None,
        }
    }

    /// Set the weight.
    pub fn weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    /// Mark the grader as required.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Set the threshold contribution.
    pub fn threshold(mut self, threshold: f64) -> Self {
        self.threshold = Some(threshold);
        self
    }

    /// Validate the policy. Called before any case executes.
    pub fn validate(&self) -> Result<(), String> {
        if !self.weight.is_finite() || self.weight <= 0.0 {
            return Err(format!(
                "grader '{}': weight must be > 0, got {}",
                self.grader.name(),
                self.weight
            ));
        }
        if let Some(t) = self.threshold {
            if !t.is_finite() || !(0.0..=1.0).contains(&t) {
                return Err(format!(
                    "grader '{}': threshold must be in [0, 1], got {}",
                    self.grader.name(),
                    t
                ));
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for GraderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraderConfig")
            .field("grader", &self.grader.name())
            .field("weight", &self.weight)
            .field("required", &self.required)
            .field("threshold", &self.threshold)
            .finish()
    }
}

impl<G: Grader + 'static> From<G> for GraderConfig {
    fn from(grader: G) -> Self {
        Self::new(grader)
    }
}
