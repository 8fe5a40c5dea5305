//! Core value shapes shared by graders, the runner and persisted artifacts.
//!
//! Everything here round-trips losslessly through JSON. Persisted shapes use
//! camelCase keys and reject unknown fields so archived runs stay comparable
//! across versions.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Token counts reported by a target invocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TokenUsage {
    /// Input/prompt tokens.
    pub input: u64,
    /// Output/completion tokens.
    pub output: u64,
}

impl TokenUsage {
    /// Create a new usage record.
    pub fn new(input: u64, output: u64) -> Self {
        Self { input, output }
    }

    /// Total tokens across input and output.
    pub fn total(&self) -> u64 {
        self.input + self.output
    }
}

/// One tool invocation made by the target.
///
/// The position of a call within [`TargetOutput::tool_calls`] is the call
/// sequence; graders that check ordering rely on it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToolCall {
    /// Tool name.
    pub name: String,
    /// Arguments passed to the tool.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<Map<String, Value>>,
    /// Result returned by the tool.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
}

impl ToolCall {
    /// Create a call with just a name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: None,
            result: None,
        }
    }

    /// Set the arguments.
    pub fn with_args(mut self, args: Map<String, Value>) -> Self {
        self.args = Some(args);
        self
    }

    /// Set the result.
    pub fn with_result(mut self, result: Value) -> Self {
        self.result = Some(result);
        self
    }
}

/// Output produced by one target invocation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TargetOutput {
    /// Final text response.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Ordered tool calls made while producing the response.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    /// Wall-clock latency of the invocation in milliseconds.
    #[serde(default)]
    pub latency_ms: u64,
    /// Token usage, if the target reports it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_usage: Option<TokenUsage>,
    /// Dollar cost, if the target reports it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost: Option<f64>,
    /// Opaque provider payload, preserved verbatim.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw: Option<Value>,
}

impl TargetOutput {
    /// Create an output with just text.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    /// Set the latency.
    pub fn with_latency_ms(mut self, latency_ms: u64) -> Self {
        self.latency_ms = latency_ms;
        self
    }

    /// Set the tool calls.
    pub fn with_tool_calls(mut self, calls: Vec<ToolCall>) -> Self {
        self.tool_calls = Some(calls);
        self
    }

    /// Set the token usage.
    pub fn with_token_usage(mut self, usage: TokenUsage) -> Self {
        self.token_usage = Some(usage);
        self
    }

    /// Set the cost.
    pub fn with_cost(mut self, cost: f64) -> Self {
        self.cost = Some(cost);
        self
    }

    /// Text response, or an empty string when the target produced none.
    pub fn text_or_empty(&self) -> &str {
        self.text.as_deref().unwrap_or("")
    }

    /// Tool calls, or an empty slice when the target made none.
    pub fn tool_calls_or_empty(&self) -> &[ToolCall] {
        self.tool_calls.as_deref().unwrap_or(&[])
    }

    /// Structural validation beyond what serde enforces.
    pub fn validate(&self) -> Result<(), String> {
        if let Some(cost) = self.cost {
            if !cost.is_finite() || cost < 0.0 {
                return Err(format!("cost must be a non-negative number, got {cost}"));
            }
        }
        Ok(())
    }
}

/// Ground-truth reference attached to a case.
///
/// A capability bag: graders consume the fields they understand and ignore
/// the rest.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CaseExpected {
    /// Expected response text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Expected tool calls.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    /// Free-form reference metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}

impl CaseExpected {
    /// Create an expectation with just text.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    /// Set the expected tool calls.
    pub fn with_tool_calls(mut self, calls: Vec<ToolCall>) -> Self {
        self.tool_calls = Some(calls);
        self
    }

    /// Set the metadata.
    pub fn with_metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// Case category used for per-category statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Typical, well-formed input.
    HappyPath,
    /// Boundary or unusual input.
    EdgeCase,
    /// Input crafted to break the agent.
    Adversarial,
    /// Input requiring multiple tool steps.
    MultiStep,
    /// Input reproducing a previously fixed failure.
    Regression,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::HappyPath => "happy_path",
            Self::EdgeCase => "edge_case",
            Self::Adversarial => "adversarial",
            Self::MultiStep => "multi_step",
            Self::Regression => "regression",
        };
        f.write_str(s)
    }
}

/// How a run was produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunMode {
    /// Target invoked live.
    #[default]
    Live,
    /// Target outputs replayed from fixtures.
    Replay,
    /// Graders re-run over a stored run without invoking the target.
    JudgeOnly,
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Live => "live",
            Self::Replay => "replay",
            Self::JudgeOnly => "judge-only",
        };
        f.write_str(s)
    }
}

/// A single evaluation case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Case {
    /// Unique id within a loaded set.
    pub id: String,
    /// Human description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Input mapping handed to the target.
    pub input: Map<String, Value>,
    /// Ground-truth reference.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected: Option<CaseExpected>,
    /// Category for statistics.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
    /// Tags for filtering.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

impl Case {
    /// Create a case with an id and empty input.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: None,
            input: Map::new(),
            expected: None,
            category: None,
            tags: Vec::new(),
        }
    }

    /// Set the description.
    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }

    /// Set one input field.
    pub fn with_input(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.input.insert(key.into(), value.into());
        self
    }

    /// Set the expected reference.
    pub fn with_expected(mut self, expected: CaseExpected) -> Self {
        self.expected = Some(expected);
        self
    }

    /// Set the category.
    pub fn with_category(mut self, category: Category) -> Self {
        self.category = Some(category);
        self
    }

    /// Add a tag.
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Check if the case carries a tag.
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}

/// Result emitted by one grader invocation.
///
/// `pass` and `score` are independent: a grader may return `pass = true`
/// with a partial score, and composition preserves both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct GradeResult {
    /// Whether the grader considers the output acceptable.
    pub pass: bool,
    /// Score in `[0, 1]`.
    pub score: f64,
    /// Human-readable reason.
    pub reason: String,
    /// Name of the grader that produced this result.
    pub grader_name: String,
    /// Grader-specific metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

impl GradeResult {
    /// Create a passing result with score 1.
    pub fn pass(grader_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            pass: true,
            score: 1.0,
            reason: reason.into(),
            grader_name: grader_name.into(),
            metadata: None,
        }
    }

    /// Create a failing result with score 0.
    pub fn fail(grader_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            pass: false,
            score: 0.0,
            reason: reason.into(),
            grader_name: grader_name.into(),
            metadata: None,
        }
    }

    /// Create a result with an explicit pass flag and score.
    pub fn scored(
        grader_name: impl Into<String>,
        pass: bool,
        score: f64,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            pass,
            score: score.clamp(0.0, 1.0),
            reason: reason.into(),
            grader_name: grader_name.into(),
            metadata: None,
        }
    }

    /// Attach metadata.
    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

impl fmt::Display for GradeResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = if self.pass { "PASS" } else { "FAIL" };
        write!(
            f,
            "{} {} (score: {:.2}) - {}",
            status, self.grader_name, self.score, self.reason
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_token_usage_total() {
        let usage = TokenUsage::new(100, 50);
        assert_eq!(usage.total(), 150);
    }

    #[test]
    fn test_target_output_builder() {
        let output = TargetOutput::text("hello")
            .with_latency_ms(42)
            .with_cost(0.001)
            .with_token_usage(TokenUsage::new(10, 5));

        assert_eq!(output.text_or_empty(), "hello");
        assert_eq!(output.latency_ms, 42);
        assert!(output.validate().is_ok());
    }

    #[test]
    fn test_target_output_rejects_unknown_keys() {
        let result: Result<TargetOutput, _> =
            serde_json::from_value(json!({"text": "hi", "latencyMs": 1, "surprise": true}));
        assert!(result.is_err());
    }

    #[test]
    fn test_target_output_rejects_negative_cost() {
        let output = TargetOutput::text("hi").with_cost(-0.5);
        assert!(output.validate().is_err());
    }

    #[test]
    fn test_target_output_roundtrip() {
        let output = TargetOutput::text("Response")
            .with_latency_ms(50)
            .with_tool_calls(vec![ToolCall::new("search").with_result(json!({"n": 3}))]);

        let json = serde_json::to_string(&output).unwrap();
        let parsed: TargetOutput = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, output);
        assert!(json.contains("latencyMs"));
        assert!(json.contains("toolCalls"));
    }

    #[test]
    fn test_run_mode_serde_names() {
        assert_eq!(serde_json::to_string(&RunMode::JudgeOnly).unwrap(), "\"judge-only\"");
        let mode: RunMode = serde_json::from_str("\"live\"").unwrap();
        assert_eq!(mode, RunMode::Live);
    }

    #[test]
    fn test_category_serde_names() {
        assert_eq!(
            serde_json::to_string(&Category::HappyPath).unwrap(),
            "\"happy_path\""
        );
        let cat: Category = serde_json::from_str("\"multi_step\"").unwrap();
        assert_eq!(cat, Category::MultiStep);
    }

    #[test]
    fn test_case_builder() {
        let case = Case::new("C01")
            .with_input("query", "hi")
            .with_category(Category::HappyPath)
            .with_tag("smoke");

        assert_eq!(case.id, "C01");
        assert_eq!(case.input["query"], json!("hi"));
        assert!(case.has_tag("smoke"));
        assert!(!case.has_tag("slow"));
    }

    #[test]
    fn test_grade_result_display() {
        let grade = GradeResult::fail("contains(x)", "substring not found");
        let s = grade.to_string();
        assert!(s.contains("FAIL"));
        assert!(s.contains("contains(x)"));
    }

    #[test]
    fn test_grade_result_scored_clamps() {
        let grade = GradeResult::scored("g", true, 1.7, "over");
        assert_eq!(grade.score, 1.0);
        let grade = GradeResult::scored("g", false, -0.2, "under");
        assert_eq!(grade.score, 0.0);
    }

    #[test]
    fn test_grade_result_roundtrip() {
        let grade = GradeResult::scored("llm_rubric", true, 0.75, "good")
            .with_metadata(json!({"judgeScore": 3}));
        let json = serde_json::to_string(&grade).unwrap();
        let parsed: GradeResult = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, grade);
        assert!(json.contains("graderName"));
    }
}
