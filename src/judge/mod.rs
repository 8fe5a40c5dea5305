//! LLM-judge contract and rubric graders.
//!
//! A judge is an LLM abstracted behind a handle: it receives a short
//! message list and returns text. Rubric graders build the prompt, call
//! the judge, and push the response through the fault-tolerant parser.
//! Every failure mode (no judge, judge error, unparseable text) surfaces
//! as a failing grade, never as a silent pass.

pub mod parser;

pub use parser::{parse_judge_response, JudgeParseError, JudgeVerdict};

use crate::grader::{Grader, GraderContext};
use crate::types::{CaseExpected, GradeResult, TargetOutput};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::warn;

/// Default pass threshold for rubric graders (judge score 3 of 4).
pub const DEFAULT_PASS_THRESHOLD: f64 = 0.75;

/// Role of a judge conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JudgeRole {
    /// System instruction.
    System,
    /// User turn.
    User,
    /// Assistant turn.
    Assistant,
}

/// One turn in a judge conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JudgeMessage {
    /// Turn role.
    pub role: JudgeRole,
    /// Turn content.
    pub content: String,
}

impl JudgeMessage {
    /// Create a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: JudgeRole::System,
            content: content.into(),
        }
    }

    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: JudgeRole::User,
            content: content.into(),
        }
    }

    /// Create an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: JudgeRole::Assistant,
            content: content.into(),
        }
    }
}

/// Response from one judge call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JudgeResponse {
    /// Raw response text.
    pub text: String,
    /// Model identifier, if the adapter reports it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_id: Option<String>,
    /// Dollar cost of the call, if the adapter reports it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost: Option<f64>,
}

impl JudgeResponse {
    /// Create a response with just text.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            model_id: None,
            cost: None,
        }
    }

    /// Set the model id.
    pub fn with_model_id(mut self, model_id: impl Into<String>) -> Self {
        self.model_id = Some(model_id.into());
        self
    }

    /// Set the cost.
    pub fn with_cost(mut self, cost: f64) -> Self {
        self.cost = Some(cost);
        self
    }
}

/// An LLM judge behind a handle.
///
/// Implementations may cache; messages are small, short-lived and
/// stateless.
#[async_trait]
pub trait Judge: Send + Sync {
    /// Complete a judge conversation.
    async fn complete(&self, messages: &[JudgeMessage]) -> anyhow::Result<JudgeResponse>;
}

/// Calibration example embedded in the rubric system prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RubricExample {
    /// Example agent output.
    pub output: String,
    /// Expected judge score for that output.
    pub score: u8,
    /// Expected judge reasoning.
    pub reasoning: String,
}

/// Grade output quality against free-form criteria using an LLM judge.
pub fn llm_rubric(criteria: impl Into<String>) -> LlmRubricGrader {
    LlmRubricGrader {
        name: "llm_rubric".to_string(),
        criteria: criteria.into(),
        judge: None,
        pass_threshold: DEFAULT_PASS_THRESHOLD,
        examples: Vec::new(),
    }
}

/// Grader produced by [`llm_rubric`].
#[derive(Clone)]
pub struct LlmRubricGrader {
    name: String,
    criteria: String,
    judge: Option<Arc<dyn Judge>>,
    pass_threshold: f64,
    examples: Vec<RubricExample>,
}

impl LlmRubricGrader {
    /// Pin a specific judge, taking precedence over the pipeline judge.
    pub fn judge(mut self, judge: Arc<dyn Judge>) -> Self {
        self.judge = Some(judge);
        self
    }

    /// Set the pass threshold on the normalized `[0, 1]` score
    /// (default 0.75, i.e. judge score 3 of 4).
    pub fn pass_threshold(mut self, threshold: f64) -> Self {
        self.pass_threshold = threshold;
        self
    }

    /// Append a calibration example.
    pub fn example(mut self, example: RubricExample) -> Self {
        self.examples.push(example);
        self
    }
}

#[async_trait]
impl Grader for LlmRubricGrader {
    fn name(&self) -> &str {
        &self.name
    }

    async fn grade(
        &self,
        output: &TargetOutput,
        expected: Option<&CaseExpected>,
        ctx: &GraderContext,
    ) -> GradeResult {
        rubric_grade(
            &self.name,
            &self.criteria,
            self.judge.as_ref(),
            self.pass_threshold,
            &self.examples,
            output,
            expected,
            ctx,
        )
        .await
    }
}

const FACTUALITY_CRITERIA: &str = "\
Judge the agent output strictly for factuality relative to the reference \
answer:\n\
- ACCURACY: every claim in the output must agree with the reference.\n\
- COMPLETENESS: the key facts of the reference must be covered.\n\
- NO FABRICATION: the output must not introduce facts absent from the \
reference.";

/// Grade factual agreement with `expected.text` using an LLM judge.
///
/// Fails outright when the case has no expected text.
pub fn factuality() -> FactualityGrader {
    FactualityGrader {
        judge: None,
        pass_threshold: DEFAULT_PASS_THRESHOLD,
    }
}

/// Grader produced by [`factuality`].
#[derive(Clone)]
pub struct FactualityGrader {
    judge: Option<Arc<dyn Judge>>,
    pass_threshold: f64,
}

impl FactualityGrader {
    /// Pin a specific judge, taking precedence over the pipeline judge.
    pub fn judge(mut self, judge: Arc<dyn Judge>) -> Self {
        self.judge = Some(judge);
        self
    }

    /// Set the pass threshold on the normalized `[0, 1]` score.
    pub fn pass_threshold(mut self, threshold: f64) -> Self {
        self.pass_threshold = threshold;
        self
    }
}

#[async_trait]
impl Grader for FactualityGrader {
    fn name(&self) -> &str {
        "factuality"
    }

    async fn grade(
        &self,
        output: &TargetOutput,
        expected: Option<&CaseExpected>,
        ctx: &GraderContext,
    ) -> GradeResult {
        if expected.and_then(|e| e.text.as_ref()).is_none() {
            return GradeResult::fail(
                "factuality",
                "expected.text is missing; factuality needs a reference answer",
            );
        }
        rubric_grade(
            "factuality",
            FACTUALITY_CRITERIA,
            self.judge.as_ref(),
            self.pass_threshold,
            &[],
            output,
            expected,
            ctx,
        )
        .await
    }
}

/// Build the system message: role, criteria, scale, bias guard, format.
fn build_system_message(criteria: &str, examples: &[RubricExample]) -> String {
    let mut prompt = format!(
        "You are an expert evaluator assessing the output of an AI agent.\n\n\
         Evaluate the output against these criteria:\n{criteria}\n\n\
         Score on a strict 4-point scale:\n\
         1 = poor: fails the criteria\n\
         2 = below average: significant gaps against the criteria\n\
         3 = good: meets the criteria with minor issues\n\
         4 = excellent: fully meets the criteria\n\n\
         Do NOT prefer longer responses over shorter ones.\n\n\
         Respond with a JSON object {{\"reasoning\": string, \"score\": 1-4}} \
         and nothing else."
    );
    if !examples.is_empty() {
        prompt.push_str("\n\nCalibration examples:");
        for example in examples {
            prompt.push_str(&format!(
                "\n\nOutput: {}\nScore: {}\nReasoning: {}",
                example.output, example.score, example.reasoning
            ));
        }
    }
    prompt
}

/// Build the user message: the output under evaluation plus the optional
/// expected reference.
fn build_user_message(output: &TargetOutput, expected: Option<&CaseExpected>) -> String {
    let mut prompt = String::from("<agent_output>\n");
    prompt.push_str(output.text_or_empty());
    let calls = output.tool_calls_or_empty();
    if !calls.is_empty() {
        prompt.push_str("\n\nTool calls:\n");
        prompt.push_str(
            &serde_json::to_string_pretty(calls).unwrap_or_else(|_| "[]".to_string()),
        );
    }
    prompt.push_str("\n</agent_output>");

    if let Some(expected) = expected {
        prompt.push_str("\n\n<expected_reference>\n");
        if let Some(text) = &expected.text {
            prompt.push_str(text);
        }
        if let Some(calls) = &expected.tool_calls {
            prompt.push_str("\n\nExpected tool calls:\n");
            prompt.push_str(
                &serde_json::to_string_pretty(calls).unwrap_or_else(|_| "[]".to_string()),
            );
        }
        if let Some(metadata) = &expected.metadata {
            prompt.push_str("\n\nReference metadata:\n");
            prompt.push_str(
                &serde_json::to_string_pretty(metadata).unwrap_or_else(|_| "{}".to_string()),
            );
        }
        prompt.push_str("\n</expected_reference>");
    }
    prompt
}

#[allow(clippy::too_many_arguments)]
async fn rubric_grade(
    name: &str,
    criteria: &str,
    own_judge: Option<&Arc<dyn Judge>>,
    pass_threshold: f64,
    examples: &[RubricExample],
    output: &TargetOutput,
    expected: Option<&CaseExpected>,
    ctx: &GraderContext,
) -> GradeResult {
    // Factory judge wins over the pipeline judge.
    let Some(judge) = own_judge.or(ctx.judge.as_ref()) else {
        return GradeResult::fail(name, "No judge configured");
    };

    let messages = [
        JudgeMessage::system(build_system_message(criteria, examples)),
        JudgeMessage::user(build_user_message(output, expected)),
    ];

    let response = match judge.complete(&messages).await {
        Ok(response) => response,
        Err(e) => {
            warn!(grader = name, case = %ctx.case_id, error = %e, "judge call failed");
            return GradeResult::fail(name, format!("judge call failed: {e}"));
        }
    };

    let verdict = match parse_judge_response(&response.text) {
        Ok(verdict) => verdict,
        Err(e) => {
            warn!(grader = name, case = %ctx.case_id, error = %e, "unparseable judge response");
            return GradeResult::fail(name, format!("unparseable judge response: {e}"));
        }
    };

    let score = f64::from(verdict.score) * 0.25;
    let pass = score >= pass_threshold;
    GradeResult::scored(
        name,
        pass,
        score,
        format!("judge score {}/4: {}", verdict.score, verdict.reasoning),
    )
    .with_metadata(json!({
        "reasoning": verdict.reasoning,
        "judgeScore": verdict.score,
        "judgeModelId": response.model_id,
        "judgeCost": response.cost,
    }))
}
