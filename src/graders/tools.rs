//! Tool-call graders: presence, ordering and argument checks.

use crate::grader::{Grader, GraderContext};
use crate::types::{CaseExpected, GradeResult, TargetOutput};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Check that a tool was called at least once.
///
/// An empty call list fails.
pub fn tool_called(name: impl Into<String>) -> ToolCalledGrader {
    let tool = name.into();
    ToolCalledGrader {
        name: format!("tool_called({tool})"),
        tool,
    }
}

/// Grader produced by [`tool_called`].
#[derive(Debug, Clone)]
pub struct ToolCalledGrader {
    name: String,
    tool: String,
}

#[async_trait]
impl Grader for ToolCalledGrader {
    fn name(&self) -> &str {
        &self.name
    }

    async fn grade(
        &self,
        output: &TargetOutput,
        _expected: Option<&CaseExpected>,
        _ctx: &GraderContext,
    ) -> GradeResult {
        let called = output
            .tool_calls_or_empty()
            .iter()
            .any(|c| c.name == self.tool);
        if called {
            GradeResult::pass(&self.name, format!("tool '{}' was called", self.tool))
        } else {
            GradeResult::fail(&self.name, format!("tool '{}' was not called", self.tool))
        }
    }
}

/// Check that a tool was never called.
///
/// An empty call list passes.
pub fn tool_not_called(name: impl Into<String>) -> ToolNotCalledGrader {
    let tool = name.into();
    ToolNotCalledGrader {
        name: format!("tool_not_called({tool})"),
        tool,
    }
}

/// Grader produced by [`tool_not_called`].
#[derive(Debug, Clone)]
pub struct ToolNotCalledGrader {
    name: String,
    tool: String,
}

#[async_trait]
impl Grader for ToolNotCalledGrader {
    fn name(&self) -> &str {
        &self.name
    }

    async fn grade(
        &self,
        output: &TargetOutput,
        _expected: Option<&CaseExpected>,
        _ctx: &GraderContext,
    ) -> GradeResult {
        let called = output
            .tool_calls_or_empty()
            .iter()
            .any(|c| c.name == self.tool);
        if called {
            GradeResult::fail(&self.name, format!("tool '{}' was called", self.tool))
        } else {
            GradeResult::pass(&self.name, format!("tool '{}' was not called", self.tool))
        }
    }
}

/// How [`tool_sequence`] compares the expected and actual call lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceMode {
    /// Length and positional equality.
    Strict,
    /// Same multiset of names, any order.
    Unordered,
    /// Every expected name appears; extras are allowed.
    Subset,
    /// Every actual name appears in the expected list.
    Superset,
}

impl fmt::Display for SequenceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Strict => "strict",
            Self::Unordered => "unordered",
            Self::Subset => "subset",
            Self::Superset => "superset",
        };
        f.write_str(s)
    }
}

/// Check the sequence of tool names called by the target.
pub fn tool_sequence(
    expected: impl IntoIterator<Item = impl Into<String>>,
    mode: SequenceMode,
) -> ToolSequenceGrader {
    let expected: Vec<String> = expected.into_iter().map(Into::into).collect();
    ToolSequenceGrader {
        name: format!("tool_sequence({mode}: {})", expected.join(",")),
        expected,
        mode,
    }
}

/// Grader produced by [`tool_sequence`].
#[derive(Debug, Clone)]
pub struct ToolSequenceGrader {
    name: String,
    expected: Vec<String>,
    mode: SequenceMode,
}

fn multiset(names: &[String]) -> BTreeMap<&str, usize> {
    let mut counts = BTreeMap::new();
    for name in names {
        *counts.entry(name.as_str()).or_insert(0) += 1;
    }
    counts
}

#[async_trait]
impl Grader for ToolSequenceGrader {
    fn name(&self) -> &str {
        &self.name
    }

    async fn grade(
        &self,
        output: &TargetOutput,
        _expected: Option<&CaseExpected>,
        _ctx: &GraderContext,
    ) -> GradeResult {
        let actual: Vec<String> = output
            .tool_calls_or_empty()
            .iter()
            .map(|c| c.name.clone())
            .collect();

        let ok = match self.mode {
            SequenceMode::Strict => actual == self.expected,
            SequenceMode::Unordered => multiset(&actual) == multiset(&self.expected),
            SequenceMode::Subset => self
                .expected
                .iter()
                .all(|name| actual.iter().any(|a| a == name)),
            SequenceMode::Superset => actual
                .iter()
                .all(|name| self.expected.iter().any(|e| e == name)),
        };

        let detail = format!(
            "expected [{}], got [{}] ({} mode)",
            self.expected.join(", "),
            actual.join(", "),
            self.mode
        );
        if ok {
            GradeResult::pass(&self.name, format!("tool sequence matches: {detail}"))
        } else {
            GradeResult::fail(&self.name, format!("tool sequence mismatch: {detail}"))
        }
    }
}

/// How [`tool_args_match`] compares argument objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgsMatchMode {
    /// Deep structural equality including the key set.
    Exact,
    /// Every expected key present with a deeply equal value.
    Subset,
    /// Like subset, but string values match by substring.
    Contains,
}

impl fmt::Display for ArgsMatchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Exact => "exact",
            Self::Subset => "subset",
            Self::Contains => "contains",
        };
        f.write_str(s)
    }
}

/// Check the arguments of the first call to a named tool.
///
/// Fails when the tool was never called.
pub fn tool_args_match(
    name: impl Into<String>,
    expected: Map<String, Value>,
    mode: ArgsMatchMode,
) -> ToolArgsMatchGrader {
    let tool = name.into();
    ToolArgsMatchGrader {
        name: format!("tool_args_match({tool}, {mode})"),
        tool,
        expected,
        mode,
    }
}

/// Grader produced by [`tool_args_match`].
#[derive(Debug, Clone)]
pub struct ToolArgsMatchGrader {
    name: String,
    tool: String,
    expected: Map<String, Value>,
    mode: ArgsMatchMode,
}

/// Substring-aware containment: strings match by substring, objects are
/// compared key-by-key recursively, everything else by equality.
fn value_contains(expected: &Value, actual: &Value) -> bool {
    match (expected, actual) {
        (Value::String(e), Value::String(a)) => a.contains(e.as_str()),
        (Value::Object(e), Value::Object(a)) => e
            .iter()
            .all(|(k, v)| a.get(k).is_some_and(|av| value_contains(v, av))),
        _ => expected == actual,
    }
}

fn args_match(expected: &Map<String, Value>, actual: &Map<String, Value>, mode: ArgsMatchMode) -> bool {
    match mode {
        ArgsMatchMode::Exact => {
            expected.len() == actual.len()
                && expected.iter().all(|(k, v)| actual.get(k) == Some(v))
        }
        ArgsMatchMode::Subset => expected.iter().all(|(k, v)| actual.get(k) == Some(v)),
        ArgsMatchMode::Contains => expected
            .iter()
            .all(|(k, v)| actual.get(k).is_some_and(|av| value_contains(v, av))),
    }
}

#[async_trait]
impl Grader for ToolArgsMatchGrader {
    fn name(&self) -> &str {
        &self.name
    }

    async fn grade(
        &self,
        output: &TargetOutput,
        _expected: Option<&CaseExpected>,
        _ctx: &GraderContext,
    ) -> GradeResult {
        let Some(call) = output
            .tool_calls_or_empty()
            .iter()
            .find(|c| c.name == self.tool)
        else {
            return GradeResult::fail(&self.name, format!("tool '{}' was not called", self.tool));
        };

        let empty = Map::new();
        let actual = call.args.as_ref().unwrap_or(&empty);

        if args_match(&self.expected, actual, self.mode) {
            GradeResult::pass(
                &self.name,
                format!("args of '{}' match ({} mode)", self.tool, self.mode),
            )
        } else {
            GradeResult::fail(
                &self.name,
                format!(
                    "args of '{}' do not match ({} mode): expected {}, got {}",
                    self.tool,
                    self.mode,
                    Value::Object(self.expected.clone()),
                    Value::Object(actual.clone()),
                ),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ToolCall;
    use serde_json::json;

    fn ctx() -> GraderContext {
        GraderContext::default()
    }

    fn output_with_calls(names: &[&str]) -> TargetOutput {
        TargetOutput::default()
            .with_tool_calls(names.iter().map(|n| ToolCall::new(*n)).collect())
    }

    fn args(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_tool_called() {
        let grader = tool_called("search");
        assert!(grader
            .grade(&output_with_calls(&["search", "format"]), None, &ctx())
            .await
            .pass);
        assert!(!grader
            .grade(&output_with_calls(&["format"]), None, &ctx())
            .await
            .pass);
    }

    #[tokio::test]
    async fn test_tool_called_empty_list_fails() {
        let grader = tool_called("search");
        assert!(!grader.grade(&TargetOutput::default(), None, &ctx()).await.pass);
    }

    #[tokio::test]
    async fn test_tool_not_called_empty_list_passes() {
        let grader = tool_not_called("search");
        assert!(grader.grade(&TargetOutput::default(), None, &ctx()).await.pass);
        assert!(!grader
            .grade(&output_with_calls(&["search"]), None, &ctx())
            .await
            .pass);
    }

    #[tokio::test]
    async fn test_sequence_strict() {
        let grader = tool_sequence(["search", "format"], SequenceMode::Strict);
        assert!(grader
            .grade(&output_with_calls(&["search", "format"]), None, &ctx())
            .await
            .pass);
        // Order matters.
        assert!(!grader
            .grade(&output_with_calls(&["format", "search"]), None, &ctx())
            .await
            .pass);
        // Length matters.
        assert!(!grader
            .grade(&output_with_calls(&["search"]), None, &ctx())
            .await
            .pass);
    }

    #[tokio::test]
    async fn test_sequence_unordered() {
        let grader = tool_sequence(["search", "format"], SequenceMode::Unordered);
        assert!(grader
            .grade(&output_with_calls(&["format", "search"]), None, &ctx())
            .await
            .pass);
        // Multiset mismatch: duplicate on one side.
        assert!(!grader
            .grade(
                &output_with_calls(&["search", "search", "format"]),
                None,
                &ctx()
            )
            .await
            .pass);
    }

    #[tokio::test]
    async fn test_sequence_subset() {
        let grader = tool_sequence(["search"], SequenceMode::Subset);
        assert!(grader
            .grade(&output_with_calls(&["search", "format"]), None, &ctx())
            .await
            .pass);
        assert!(!grader
            .grade(&output_with_calls(&["format"]), None, &ctx())
            .await
            .pass);
    }

    #[tokio::test]
    async fn test_sequence_superset() {
        let grader = tool_sequence(["search", "format"], SequenceMode::Superset);
        // Actual does fewer steps: allowed.
        assert!(grader
            .grade(&output_with_calls(&["search"]), None, &ctx())
            .await
            .pass);
        assert!(!grader
            .grade(&output_with_calls(&["search", "delete"]), None, &ctx())
            .await
            .pass);
    }

    #[tokio::test]
    async fn test_sequence_empty_expected() {
        let both_empty = tool_sequence(Vec::<String>::new(), SequenceMode::Strict);
        assert!(both_empty
            .grade(&TargetOutput::default(), None, &ctx())
            .await
            .pass);

        let strict = tool_sequence(Vec::<String>::new(), SequenceMode::Strict);
        assert!(!strict
            .grade(&output_with_calls(&["search"]), None, &ctx())
            .await
            .pass);

        let subset = tool_sequence(Vec::<String>::new(), SequenceMode::Subset);
        assert!(subset
            .grade(&output_with_calls(&["search"]), None, &ctx())
            .await
            .pass);
    }

    #[tokio::test]
    async fn test_args_match_exact() {
        let grader = tool_args_match("search", args(json!({"q": "hi"})), ArgsMatchMode::Exact);
        let output = TargetOutput::default().with_tool_calls(vec![
            ToolCall::new("search").with_args(args(json!({"q": "hi"}))),
        ]);
        assert!(grader.grade(&output, None, &ctx()).await.pass);

        // Extra key breaks exact equality.
        let output = TargetOutput::default().with_tool_calls(vec![
            ToolCall::new("search").with_args(args(json!({"q": "hi", "page": 1}))),
        ]);
        assert!(!grader.grade(&output, None, &ctx()).await.pass);
    }

    #[tokio::test]
    async fn test_args_match_subset() {
        let grader = tool_args_match("search", args(json!({"q": "hi"})), ArgsMatchMode::Subset);
        let output = TargetOutput::default().with_tool_calls(vec![
            ToolCall::new("search").with_args(args(json!({"q": "hi", "page": 1}))),
        ]);
        assert!(grader.grade(&output, None, &ctx()).await.pass);

        let grader = tool_args_match(
            "search",
            args(json!({"q": "other"})),
            ArgsMatchMode::Subset,
        );
        assert!(!grader.grade(&output, None, &ctx()).await.pass);
    }

    #[tokio::test]
    async fn test_args_match_contains_substring() {
        let grader = tool_args_match(
            "search",
            args(json!({"q": "weather"})),
            ArgsMatchMode::Contains,
        );
        let output = TargetOutput::default().with_tool_calls(vec![
            ToolCall::new("search").with_args(args(json!({"q": "weather in london"}))),
        ]);
        assert!(grader.grade(&output, None, &ctx()).await.pass);
    }

    #[tokio::test]
    async fn test_args_match_missing_tool_fails() {
        let grader = tool_args_match("search", Map::new(), ArgsMatchMode::Exact);
        let result = grader.grade(&TargetOutput::default(), None, &ctx()).await;
        assert!(!result.pass);
        assert!(result.reason.contains("not called"));
    }

    #[tokio::test]
    async fn test_args_match_uses_first_call() {
        let grader = tool_args_match("search", args(json!({"q": "a"})), ArgsMatchMode::Exact);
        let output = TargetOutput::default().with_tool_calls(vec![
            ToolCall::new("search").with_args(args(json!({"q": "a"}))),
            ToolCall::new("search").with_args(args(json!({"q": "b"}))),
        ]);
        assert!(grader.grade(&output, None, &ctx()).await.pass);
    }
}
