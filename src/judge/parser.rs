//! Fault-tolerant parser for judge responses.
//!
//! Judges are asked for `{"reasoning": string, "score": 1..4}` but models
//! wrap JSON in prose, fences, or drop it entirely. Parsing tries three
//! layers in order: strict JSON, JSON extracted from the surrounding text,
//! then a plain-text score pattern. A response that no layer can parse is a
//! structured error; it is never mapped to a passing grade.

use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;
use thiserror::Error;

const MAX_REASONING_CHARS: usize = 2000;

const SCORE_FIELDS: [&str; 3] = ["score", "rating", "total_rating"];
const REASONING_FIELDS: [&str; 4] = ["reasoning", "evaluation", "explanation", "rationale"];

/// Parsed judge verdict.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JudgeVerdict {
    /// Judge reasoning, trimmed and truncated to 2000 chars.
    pub reasoning: String,
    /// Integer score in `1..=4`.
    pub score: u8,
}

/// Error produced when no layer could extract a verdict.
#[derive(Debug, Clone, Error)]
#[error("failed to parse judge response: {message}")]
pub struct JudgeParseError {
    /// What went wrong, layer by layer.
    pub message: String,
    /// The raw judge text, preserved for diagnostics.
    pub raw: String,
}

fn fenced_json_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)```(?:json)?\s*(.*?)```").expect("fence pattern is valid"))
}

fn score_line_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // The full number is captured so "Score: 10" parses as 10 and is
    // rejected, rather than truncating to a valid 1.
    RE.get_or_init(|| {
        Regex::new(r"(?i)(?:score|rating)\s*[:=]\s*\*{0,2}(\d+(?:\.\d+)?)")
            .expect("score pattern is valid")
    })
}

fn reasoning_label_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?is)(?:reasoning|evaluation|explanation)\s*[:=]\s*(.+?)(?:\n\s*(?:score|rating)\s*[:=]|\z)")
            .expect("reasoning pattern is valid")
    })
}

fn truncate_reasoning(reasoning: &str) -> String {
    let trimmed = reasoning.trim();
    if trimmed.chars().count() <= MAX_REASONING_CHARS {
        trimmed.to_string()
    } else {
        trimmed.chars().take(MAX_REASONING_CHARS).collect()
    }
}

/// Validate a candidate score number: must be an integer in `1..=4`.
fn validate_score(value: &Value) -> Result<u8, String> {
    let as_float = match value {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| format!("score is not a finite number: {n}"))?,
        other => return Err(format!("score field is not a number: {other}")),
    };
    if as_float.fract() != 0.0 {
        return Err(format!("score must be an integer, got {as_float}"));
    }
    let score = as_float as i64;
    if !(1..=4).contains(&score) {
        return Err(format!("score must be in 1..=4, got {score}"));
    }
    Ok(score as u8)
}

/// Shared validation over a parsed JSON object.
fn validate_object(value: &Value) -> Result<JudgeVerdict, String> {
    let object = value
        .as_object()
        .ok_or_else(|| format!("expected a JSON object, got {value}"))?;

    let score_value = SCORE_FIELDS
        .iter()
        .find_map(|f| object.get(*f))
        .ok_or_else(|| "no score field (score/rating/total_rating)".to_string())?;
    let score = validate_score(score_value)?;

    let reasoning_value = REASONING_FIELDS
        .iter()
        .find_map(|f| object.get(*f))
        .ok_or_else(|| "no reasoning field (reasoning/evaluation/explanation/rationale)".to_string())?;
    let reasoning = reasoning_value
        .as_str()
        .ok_or_else(|| "reasoning field is not a string".to_string())?;
    let reasoning = truncate_reasoning(reasoning);
    if reasoning.is_empty() {
        return Err("reasoning is empty".to_string());
    }

    Ok(JudgeVerdict { reasoning, score })
}

/// Layer 1: the whole trimmed response is JSON.
fn parse_strict_json(text: &str) -> Result<JudgeVerdict, String> {
    let value: Value =
        serde_json::from_str(text.trim()).map_err(|e| format!("not strict JSON: {e}"))?;
    validate_object(&value)
}

/// Layer 2: JSON embedded in markdown fences or surrounding prose.
fn parse_extracted_json(text: &str) -> Result<JudgeVerdict, String> {
    if let Some(captures) = fenced_json_re().captures(text) {
        let candidate = captures[1].trim();
        if let Ok(value) = serde_json::from_str::<Value>(candidate) {
            return validate_object(&value);
        }
    }

    let start = text.find('{').ok_or("no JSON object in response")?;
    let end = text.rfind('}').ok_or("no closing brace in response")?;
    if end <= start {
        return Err("no JSON object in response".to_string());
    }
    let candidate = &text[start..=end];
    let value: Value =
        serde_json::from_str(candidate).map_err(|e| format!("extracted text is not JSON: {e}"))?;
    validate_object(&value)
}

/// Layer 3: a plain-text `Score: N` line with the reasoning around it.
fn parse_text_pattern(text: &str) -> Result<JudgeVerdict, String> {
    let captures = score_line_re()
        .captures(text)
        .ok_or("no score/rating line in response")?;
    let number: f64 = captures[1]
        .parse()
        .map_err(|_| format!("unparseable score number '{}'", &captures[1]))?;
    let score = validate_score(&serde_json::json!(number))?;

    let reasoning = if let Some(labeled) = reasoning_label_re().captures(text) {
        truncate_reasoning(&labeled[1])
    } else {
        let score_start = captures.get(0).map(|m| m.start()).unwrap_or(0);
        truncate_reasoning(&text[..score_start])
    };
    if reasoning.is_empty() {
        return Err("no reasoning text before the score line".to_string());
    }

    Ok(JudgeVerdict { reasoning, score })
}

/// Parse free-form judge text into a verdict.
///
/// Callers MUST surface an error as a failing grade; the parser never
/// defaults to a passing score.
pub fn parse_judge_response(text: &str) -> Result<JudgeVerdict, JudgeParseError> {
    if text.trim().is_empty() {
        return Err(JudgeParseError {
            message: "judge response is empty".to_string(),
            raw: text.to_string(),
        });
    }

    let strict = match parse_strict_json(text) {
        Ok(verdict) => return Ok(verdict),
        Err(e) => e,
    };
    let extracted = match parse_extracted_json(text) {
        Ok(verdict) => return Ok(verdict),
        Err(e) => e,
    };
    let pattern = match parse_text_pattern(text) {
        Ok(verdict) => return Ok(verdict),
        Err(e) => e,
    };

    Err(JudgeParseError {
        message: format!(
            "all layers failed (strict JSON: {strict}; extracted JSON: {extracted}; text pattern: {pattern})"
        ),
        raw: text.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strict_json() {
        let verdict = parse_judge_response(r#"{"reasoning":"x","score":3}"#).unwrap();
        assert_eq!(verdict.score, 3);
        assert_eq!(verdict.reasoning, "x");
    }

    #[test]
    fn test_strict_json_alternate_field_names() {
        let verdict =
            parse_judge_response(r#"{"evaluation":"solid answer","rating":2}"#).unwrap();
        assert_eq!(verdict.score, 2);
        assert_eq!(verdict.reasoning, "solid answer");

        let verdict =
            parse_judge_response(r#"{"rationale":"ok","total_rating":4}"#).unwrap();
        assert_eq!(verdict.score, 4);
    }

    #[test]
    fn test_fenced_json() {
        let text = "Here is my evaluation:\n```json\n{\"reasoning\":\"y\",\"score\":4}\n```\nDone.";
        let verdict = parse_judge_response(text).unwrap();
        assert_eq!(verdict.score, 4);
        assert_eq!(verdict.reasoning, "y");
    }

    #[test]
    fn test_embedded_json() {
        let text = "Sure! {\"reasoning\":\"embedded\",\"score\":1} hope that helps";
        let verdict = parse_judge_response(text).unwrap();
        assert_eq!(verdict.score, 1);
    }

    #[test]
    fn test_text_pattern() {
        let verdict = parse_judge_response("Reasoning: ok\nScore: 2").unwrap();
        assert_eq!(verdict.score, 2);
        assert_eq!(verdict.reasoning, "ok");
    }

    #[test]
    fn test_text_pattern_unlabeled_reasoning() {
        let verdict =
            parse_judge_response("The answer is correct and complete.\nScore: 4").unwrap();
        assert_eq!(verdict.score, 4);
        assert_eq!(verdict.reasoning, "The answer is correct and complete.");
    }

    #[test]
    fn test_score_ten_is_rejected_not_truncated() {
        let err = parse_judge_response("Score: 10").unwrap_err();
        assert!(!err.message.is_empty());
        assert!(err.message.contains("1..=4") || err.message.contains("score"));
    }

    #[test]
    fn test_empty_response_fails() {
        let err = parse_judge_response("").unwrap_err();
        assert!(err.message.contains("empty"));
    }

    #[test]
    fn test_score_out_of_range_in_json_fails() {
        let err = parse_judge_response(r#"{"reasoning":"x","score":7}"#).unwrap_err();
        assert!(err.message.contains("1..=4"));
    }

    #[test]
    fn test_non_integer_score_fails() {
        let err = parse_judge_response(r#"{"reasoning":"x","score":2.5}"#).unwrap_err();
        assert!(err.message.contains("integer"));
    }

    #[test]
    fn test_empty_reasoning_fails() {
        let err = parse_judge_response(r#"{"reasoning":"  ","score":3}"#).unwrap_err();
        assert!(err.message.contains("reasoning"));
    }

    #[test]
    fn test_score_without_reasoning_text_fails() {
        let err = parse_judge_response("Score: 2").unwrap_err();
        assert!(err.message.contains("reasoning"));
    }

    #[test]
    fn test_reasoning_truncated_to_2000_chars() {
        let long = "a".repeat(3000);
        let text = format!("{{\"reasoning\":\"{long}\",\"score\":3}}");
        let verdict = parse_judge_response(&text).unwrap();
        assert_eq!(verdict.reasoning.chars().count(), 2000);
    }

    #[test]
    fn test_rating_equals_sign() {
        let verdict = parse_judge_response("Evaluation: fine\nRating = 3").unwrap();
        assert_eq!(verdict.score, 3);
        assert_eq!(verdict.reasoning, "fine");
    }

    #[test]
    fn test_error_carries_raw_text() {
        let err = parse_judge_response("total gibberish").unwrap_err();
        assert_eq!(err.raw, "total gibberish");
    }
}
