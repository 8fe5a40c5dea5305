//! Numeric grounding: every number in the response must come from somewhere.

use crate::grader::{Grader, GraderContext};
use crate::types::{CaseExpected, GradeResult, TargetOutput};
use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;

const DEFAULT_TOLERANCE: f64 = 0.005;
const NUMBER_PATTERN: &str = r"-?\d[\d,.]*\d|\d";

/// Check that every number in the output text is grounded in some number
/// appearing in the tool-call results.
///
/// Integers with `|n| < 10` and integer years in `[1900, 2100]` are skipped
/// by default. A text number is grounded when some tool-result number is
/// within relative tolerance `|a - b| / max(|a|, |b|)` of it; zero matches
/// zero exactly. The score is the grounded fraction; any ungrounded number
/// fails the grade.
pub fn no_hallucinated_numbers() -> NoHallucinatedNumbers {
    NoHallucinatedNumbers {
        name: "no_hallucinated_numbers".to_string(),
        tolerance: DEFAULT_TOLERANCE,
        skip_small_integers: true,
        pattern: Regex::new(NUMBER_PATTERN).expect("number pattern is valid"),
    }
}

/// Grader produced by [`no_hallucinated_numbers`].
#[derive(Debug, Clone)]
pub struct NoHallucinatedNumbers {
    name: String,
    tolerance: f64,
    skip_small_integers: bool,
    pattern: Regex,
}

impl NoHallucinatedNumbers {
    /// Set the relative tolerance (default 0.005).
    pub fn tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Control whether small integers and year-like integers are skipped
    /// (default true).
    pub fn skip_small_integers(mut self, skip: bool) -> Self {
        self.skip_small_integers = skip;
        self
    }

    fn extract_numbers(&self, text: &str) -> Vec<f64> {
        self.pattern
            .find_iter(text)
            .filter_map(|m| m.as_str().replace(',', "").parse::<f64>().ok())
            .collect()
    }

    fn is_skipped(&self, n: f64) -> bool {
        if !self.skip_small_integers || n.fract() != 0.0 {
            return false;
        }
        n.abs() < 10.0 || (1900.0..=2100.0).contains(&n)
    }

    fn collect_tool_numbers(&self, value: &Value, into: &mut Vec<f64>) {
        match value {
            Value::Number(n) => {
                if let Some(f) = n.as_f64() {
                    into.push(f);
                }
            }
            Value::String(s) => into.extend(self.extract_numbers(s)),
            Value::Array(items) => {
                for item in items {
                    self.collect_tool_numbers(item, into);
                }
            }
            Value::Object(map) => {
                for item in map.values() {
                    self.collect_tool_numbers(item, into);
                }
            }
            Value::Bool(_) | Value::Null => {}
        }
    }
}

fn within_tolerance(a: f64, b: f64, tolerance: f64) -> bool {
    if a == 0.0 && b == 0.0 {
        return true;
    }
    let denom = a.abs().max(b.abs());
    (a - b).abs() / denom <= tolerance
}

#[async_trait]
impl Grader for NoHallucinatedNumbers {
    fn name(&self) -> &str {
        &self.name
    }

    async fn grade(
        &self,
        output: &TargetOutput,
        _expected: Option<&CaseExpected>,
        _ctx: &GraderContext,
    ) -> GradeResult {
        let text_numbers: Vec<f64> = self
            .extract_numbers(output.text_or_empty())
            .into_iter()
            .filter(|&n| !self.is_skipped(n))
            .collect();

        if text_numbers.is_empty() {
            return GradeResult::pass(&self.name, "no numbers to verify");
        }

        let mut tool_numbers = Vec::new();
        for call in output.tool_calls_or_empty() {
            if let Some(result) = &call.result {
                self.collect_tool_numbers(result, &mut tool_numbers);
            }
        }

        let ungrounded: Vec<f64> = text_numbers
            .iter()
            .copied()
            .filter(|&n| {
                !tool_numbers
                    .iter()
                    .any(|&t| within_tolerance(n, t, self.tolerance))
            })
            .collect();

        let total = text_numbers.len();
        let grounded = total - ungrounded.len();
        let score = grounded as f64 / total as f64;

        if ungrounded.is_empty() {
            GradeResult::scored(
                &self.name,
                true,
                score,
                format!("all {total} numbers grounded in tool results"),
            )
        } else {
            let listed: Vec<String> = ungrounded.iter().map(|n| n.to_string()).collect();
            GradeResult::scored(
                &self.name,
                false,
                score,
                format!(
                    "{}/{} numbers not found in tool results: {}",
                    ungrounded.len(),
                    total,
                    listed.join(", ")
                ),
            )
        }
    }
}
