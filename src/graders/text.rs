//! Text graders: substring, equality, regex, schema and safety checks.

use crate::error::{EvalError, EvalResult};
use crate::grader::{Grader, GraderContext};
use crate::types::{CaseExpected, GradeResult, TargetOutput};
use async_trait::async_trait;
use jsonschema::JSONSchema;
use regex::Regex;
use serde_json::Value;

/// Check that the output text contains a substring.
///
/// Case-insensitive by default; an empty needle always passes.
pub fn contains(needle: impl Into<String>) -> ContainsGrader {
    let needle = needle.into();
    ContainsGrader {
        name: format!("contains({needle})"),
        needle,
        case_sensitive: false,
    }
}

/// Grader produced by [`contains`].
#[derive(Debug, Clone)]
pub struct ContainsGrader {
    name: String,
    needle: String,
    case_sensitive: bool,
}

impl ContainsGrader {
    /// Match case-sensitively.
    pub fn case_sensitive(mut self) -> Self {
        self.case_sensitive = true;
        self
    }
}

fn has_substring(haystack: &str, needle: &str, case_sensitive: bool) -> bool {
    if case_sensitive {
        haystack.contains(needle)
    } else {
        haystack.to_lowercase().contains(&needle.to_lowercase())
    }
}

#[async_trait]
impl Grader for ContainsGrader {
    fn name(&self) -> &str {
        &self.name
    }

    async fn grade(
        &self,
        output: &TargetOutput,
        _expected: Option<&CaseExpected>,
        _ctx: &GraderContext,
    ) -> GradeResult {
        if self.needle.is_empty() {
            return GradeResult::pass(&self.name, "empty needle always matches");
        }
        let text = output.text_or_empty();
        if has_substring(text, &self.needle, self.case_sensitive) {
            GradeResult::pass(&self.name, format!("output contains '{}'", self.needle))
        } else {
            GradeResult::fail(
                &self.name,
                format!("output does not contain '{}'", self.needle),
            )
        }
    }
}

/// Check that the output text does NOT contain a substring.
///
/// Empty output text passes.
pub fn not_contains(needle: impl Into<String>) -> NotContainsGrader {
    let needle = needle.into();
    NotContainsGrader {
        name: format!("not_contains({needle})"),
        needle,
        case_sensitive: false,
    }
}

/// Grader produced by [`not_contains`].
#[derive(Debug, Clone)]
pub struct NotContainsGrader {
    name: String,
    needle: String,
    case_sensitive: bool,
}

impl NotContainsGrader {
    /// Match case-sensitively.
    pub fn case_sensitive(mut self) -> Self {
        self.case_sensitive = true;
        self
    }
}

#[async_trait]
impl Grader for NotContainsGrader {
    fn name(&self) -> &str {
        &self.name
    }

    async fn grade(
        &self,
        output: &TargetOutput,
        _expected: Option<&CaseExpected>,
        _ctx: &GraderContext,
    ) -> GradeResult {
        let text = output.text_or_empty();
        if text.is_empty() {
            return GradeResult::pass(&self.name, "output is empty");
        }
        if has_substring(text, &self.needle, self.case_sensitive) {
            GradeResult::fail(&self.name, format!("output contains '{}'", self.needle))
        } else {
            GradeResult::pass(
                &self.name,
                format!("output does not contain '{}'", self.needle),
            )
        }
    }
}

/// Check that the output text equals an expected string.
///
/// Trims by default; case-sensitive by default.
pub fn exact_match(expected: impl Into<String>) -> ExactMatchGrader {
    let expected = expected.into();
    ExactMatchGrader {
        name: format!("exact_match({expected})"),
        expected,
        trim: true,
        case_sensitive: true,
    }
}

/// Grader produced by [`exact_match`].
#[derive(Debug, Clone)]
pub struct ExactMatchGrader {
    name: String,
    expected: String,
    trim: bool,
    case_sensitive: bool,
}

impl ExactMatchGrader {
    /// Compare without trimming surrounding whitespace.
    pub fn no_trim(mut self) -> Self {
        self.trim = false;
        self
    }

    /// Compare case-insensitively.
    pub fn ignore_case(mut self) -> Self {
        self.case_sensitive = false;
        self
    }
}

#[async_trait]
impl Grader for ExactMatchGrader {
    fn name(&self) -> &str {
        &self.name
    }

    async fn grade(
        &self,
        output: &TargetOutput,
        _expected: Option<&CaseExpected>,
        _ctx: &GraderContext,
    ) -> GradeResult {
        let text = output.text_or_empty();
        let (actual, wanted) = if self.trim {
            (text.trim(), self.expected.trim())
        } else {
            (text, self.expected.as_str())
        };

        let matches = if self.case_sensitive {
            actual == wanted
        } else {
            actual.to_lowercase() == wanted.to_lowercase()
        };

        if matches {
            GradeResult::pass(&self.name, "output matches expected exactly")
        } else {
            GradeResult::fail(
                &self.name,
                format!("expected '{}', got '{}'", wanted, actual),
            )
        }
    }
}

/// Check that the output text matches a regex pattern.
///
/// The pattern is compiled eagerly; an invalid pattern is a configuration
/// error at factory time.
pub fn regex(pattern: impl Into<String>) -> EvalResult<RegexGrader> {
    let pattern = pattern.into();
    let compiled = Regex::new(&pattern)
        .map_err(|e| EvalError::config(format!("invalid regex '{pattern}': {e}")))?;
    Ok(RegexGrader {
        name: format!("regex({pattern})"),
        pattern,
        compiled,
    })
}

/// Like [`regex`], with inline flags (e.g. `"i"` for case-insensitive,
/// `"m"` for multi-line, `"s"` for dot-matches-newline).
pub fn regex_with_flags(
    pattern: impl Into<String>,
    flags: impl Into<String>,
) -> EvalResult<RegexGrader> {
    let pattern = pattern.into();
    let flags = flags.into();
    if flags.is_empty() {
        return regex(pattern);
    }
    let flagged = format!("(?{flags}){pattern}");
    let compiled = Regex::new(&flagged)
        .map_err(|e| EvalError::config(format!("invalid regex '{flagged}': {e}")))?;
    Ok(RegexGrader {
        name: format!("regex({pattern})"),
        pattern,
        compiled,
    })
}

/// Grader produced by [`regex`].
#[derive(Debug, Clone)]
pub struct RegexGrader {
    name: String,
    pattern: String,
    compiled: Regex,
}

#[async_trait]
impl Grader for RegexGrader {
    fn name(&self) -> &str {
        &self.name
    }

    async fn grade(
        &self,
        output: &TargetOutput,
        _expected: Option<&CaseExpected>,
        _ctx: &GraderContext,
    ) -> GradeResult {
        if self.compiled.is_match(output.text_or_empty()) {
            GradeResult::pass(&self.name, format!("output matches /{}/", self.pattern))
        } else {
            GradeResult::fail(
                &self.name,
                format!("output does not match /{}/", self.pattern),
            )
        }
    }
}

/// Check that the output text parses as JSON and validates against a schema.
///
/// The schema is compiled eagerly; an invalid schema is a configuration
/// error at factory time. The failure reason distinguishes empty output,
/// invalid JSON and schema violations.
pub fn json_schema(schema: Value) -> EvalResult<JsonSchemaGrader> {
    let compiled = JSONSchema::compile(&schema)
        .map_err(|e| EvalError::config(format!("invalid JSON schema: {e}")))?;
    Ok(JsonSchemaGrader {
        name: "json_schema".to_string(),
        compiled,
    })
}

/// Grader produced by [`json_schema`].
pub struct JsonSchemaGrader {
    name: String,
    compiled: JSONSchema,
}

impl std::fmt::Debug for JsonSchemaGrader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonSchemaGrader").finish_non_exhaustive()
    }
}

#[async_trait]
impl Grader for JsonSchemaGrader {
    fn name(&self) -> &str {
        &self.name
    }

    async fn grade(
        &self,
        output: &TargetOutput,
        _expected: Option<&CaseExpected>,
        _ctx: &GraderContext,
    ) -> GradeResult {
        let text = output.text_or_empty().trim();
        if text.is_empty() {
            return GradeResult::fail(&self.name, "output is empty, expected JSON");
        }
        let value: Value = match serde_json::from_str(text) {
            Ok(v) => v,
            Err(e) => {
                return GradeResult::fail(&self.name, format!("output is not valid JSON: {e}"));
            }
        };
        let violations: Vec<String> = match self.compiled.validate(&value) {
            Ok(()) => Vec::new(),
            Err(errors) => errors.map(|e| e.to_string()).collect(),
        };
        if violations.is_empty() {
            GradeResult::pass(&self.name, "output validates against schema")
        } else {
            GradeResult::fail(
                &self.name,
                format!("schema violation: {}", violations.join("; ")),
            )
        }
    }
}

/// Check that none of the given keywords appear in the output text.
///
/// Matching is case-insensitive.
pub fn safety_keywords(keywords: impl IntoIterator<Item = impl Into<String>>) -> SafetyKeywordsGrader {
    let keywords: Vec<String> = keywords.into_iter().map(Into::into).collect();
    SafetyKeywordsGrader {
        name: format!("safety_keywords({})", keywords.join(",")),
        keywords,
    }
}

/// Grader produced by [`safety_keywords`].
#[derive(Debug, Clone)]
pub struct SafetyKeywordsGrader {
    name: String,
    keywords: Vec<String>,
}

#[async_trait]
impl Grader for SafetyKeywordsGrader {
    fn name(&self) -> &str {
        &self.name
    }

    async fn grade(
        &self,
        output: &TargetOutput,
        _expected: Option<&CaseExpected>,
        _ctx: &GraderContext,
    ) -> GradeResult {
        let text = output.text_or_empty().to_lowercase();
        let found: Vec<&str> = self
            .keywords
            .iter()
            .filter(|k| !k.is_empty() && text.contains(&k.to_lowercase()))
            .map(String::as_str)
            .collect();
        if found.is_empty() {
            GradeResult::pass(&self.name, "no safety keywords present")
        } else {
            GradeResult::fail(
                &self.name,
                format!("safety keywords present: {}", found.join(", ")),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx() -> GraderContext {
        GraderContext::default()
    }

    fn out(text: &str) -> TargetOutput {
        TargetOutput::text(text)
    }

    #[tokio::test]
    async fn test_contains_case_insensitive_default() {
        let grader = contains("WORLD");
        let result = grader.grade(&out("hello world"), None, &ctx()).await;
        assert!(result.pass);
    }

    #[tokio::test]
    async fn test_contains_case_sensitive() {
        let grader = contains("WORLD").case_sensitive();
        let result = grader.grade(&out("hello world"), None, &ctx()).await;
        assert!(!result.pass);
    }

    #[tokio::test]
    async fn test_contains_empty_needle_passes() {
        let grader = contains("");
        let result = grader.grade(&out(""), None, &ctx()).await;
        assert!(result.pass);
    }

    #[tokio::test]
    async fn test_contains_empty_haystack_fails() {
        let grader = contains("x");
        let result = grader.grade(&out(""), None, &ctx()).await;
        assert!(!result.pass);
        assert_eq!(result.score, 0.0);
    }

    #[tokio::test]
    async fn test_not_contains() {
        let grader = not_contains("error");
        assert!(grader.grade(&out("all good"), None, &ctx()).await.pass);
        assert!(!grader.grade(&out("an ERROR occurred"), None, &ctx()).await.pass);
    }

    #[tokio::test]
    async fn test_not_contains_empty_text_passes() {
        let grader = not_contains("error");
        let result = grader.grade(&TargetOutput::default(), None, &ctx()).await;
        assert!(result.pass);
    }

    #[tokio::test]
    async fn test_exact_match_trims_by_default() {
        let grader = exact_match("hello");
        assert!(grader.grade(&out("  hello  "), None, &ctx()).await.pass);
    }

    #[tokio::test]
    async fn test_exact_match_no_trim() {
        let grader = exact_match("hello").no_trim();
        assert!(!grader.grade(&out("  hello  "), None, &ctx()).await.pass);
    }

    #[tokio::test]
    async fn test_exact_match_case_sensitive_by_default() {
        let grader = exact_match("Hello");
        assert!(!grader.grade(&out("hello"), None, &ctx()).await.pass);
        let grader = exact_match("Hello").ignore_case();
        assert!(grader.grade(&out("hello"), None, &ctx()).await.pass);
    }

    #[tokio::test]
    async fn test_regex_match() {
        let grader = regex(r"\d{3}-\d{4}").unwrap();
        assert!(grader.grade(&out("Call 555-1234"), None, &ctx()).await.pass);
        assert!(!grader.grade(&out("no phone"), None, &ctx()).await.pass);
    }

    #[test]
    fn test_regex_invalid_pattern_fails_at_factory() {
        let err = regex("(unclosed").unwrap_err();
        assert!(err.to_string().contains("invalid regex"));
        assert_eq!(err.exit_code(), 2);
    }

    #[tokio::test]
    async fn test_regex_flags() {
        let grader = regex_with_flags("hello", "i").unwrap();
        assert!(grader.grade(&out("HELLO"), None, &ctx()).await.pass);
        assert_eq!(grader.name(), "regex(hello)");
    }

    #[tokio::test]
    async fn test_json_schema_distinct_reasons() {
        let grader = json_schema(json!({
            "type": "object",
            "properties": {"n": {"type": "integer"}},
            "required": ["n"]
        }))
        .unwrap();

        let empty = grader.grade(&out("   "), None, &ctx()).await;
        assert!(!empty.pass);
        assert!(empty.reason.contains("empty"));

        let not_json = grader.grade(&out("not json"), None, &ctx()).await;
        assert!(!not_json.pass);
        assert!(not_json.reason.contains("not valid JSON"));

        let violation = grader.grade(&out(r#"{"n": "three"}"#), None, &ctx()).await;
        assert!(!violation.pass);
        assert!(violation.reason.contains("schema violation"));

        let valid = grader.grade(&out(r#"{"n": 3}"#), None, &ctx()).await;
        assert!(valid.pass);
    }

    #[test]
    fn test_json_schema_invalid_schema_fails_at_factory() {
        let err = json_schema(json!({"type": "not-a-type"})).unwrap_err();
        assert!(matches!(err, EvalError::Config(_)));
    }

    #[tokio::test]
    async fn test_safety_keywords() {
        let grader = safety_keywords(["rm -rf", "DROP TABLE"]);
        assert!(grader.grade(&out("all safe here"), None, &ctx()).await.pass);
        let result = grader
            .grade(&out("run drop table users"), None, &ctx())
            .await;
        assert!(!result.pass);
        assert!(result.reason.contains("DROP TABLE"));
    }
}
