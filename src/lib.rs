//! # agent-evals
//!
//! Evaluation harness for AI-agent workflows.
//!
//! Declare suites of cases, point them at a target (an LLM call or agent
//! loop), and get back a persisted [`Run`] with per-case grades, aggregate
//! statistics and gate verdicts that stays comparable across time.
//!
//! ## Core concepts
//!
//! - **[`Case`] / [`Suite`]**: inputs, optional expected references, and
//!   the default graders and gates applied to them
//! - **[`Grader`]**: an async check producing a [`GradeResult`]; composed
//!   with [`all`], [`any`] and [`not`]
//! - **[`Judge`]**: an LLM handle used by [`llm_rubric`] and
//!   [`factuality`], with a fault-tolerant response parser
//! - **[`run_suite`]**: executes cases sequentially, grades, aggregates,
//!   evaluates gates and emits a [`Run`]
//! - **[`run_judge_only`]**: re-grades a stored Run without re-invoking
//!   the target
//! - **[`compare_runs`]**: diffs two Runs into a regression signal
//!
//! ## Example
//!
//! ```ignore
//! use agent_evals::prelude::*;
//!
//! let suite = Suite::new("weather_agent")
//!     .case(Case::new("nyc").with_input("query", "weather in NYC"))
//!     .grader(contains("New York"))
//!     .grader(GraderConfig::new(tool_called("lookup")).required())
//!     .gates(GateConfig::new().pass_rate(0.95));
//!
//! let run = run_suite(&suite, &target, &RunOptions::new()).await?;
//! run.save("runs/latest.json")?;
//! std::process::exit(run.exit_code());
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod compare;
pub mod dataset;
pub mod error;
pub mod gates;
pub mod grader;
pub mod graders;
pub mod judge;
pub mod pipeline;
pub mod run;
pub mod runner;
pub mod scoring;
pub mod suite;
pub mod target;
pub mod types;

// Re-exports
pub use compare::{
    compare_runs, CaseDiff, CategoryDelta, CompareOptions, ComparisonSummary, Direction,
    GraderDiff, RunComparison,
};
pub use dataset::load_cases;
pub use error::{EvalError, EvalResult};
pub use gates::{evaluate_gates, GateCheck, GateConfig, GateResult};
pub use grader::{Grader, GraderConfig, GraderContext, SharedGrader};
pub use graders::{
    all, any, contains, cost, exact_match, json_schema, latency, no_hallucinated_numbers, not,
    not_contains, regex, regex_with_flags, safety_keywords, token_count, tool_args_match,
    tool_called, tool_not_called, tool_sequence, AlwaysFail, AlwaysPass, ArgsMatchMode, FnGrader,
    SequenceMode,
};
pub use judge::{
    factuality, llm_rubric, parse_judge_response, Judge, JudgeMessage, JudgeParseError,
    JudgeResponse, JudgeRole, JudgeVerdict, RubricExample,
};
pub use pipeline::{run_pipeline, PipelineResult};
pub use run::{
    config_hash, CategoryStats, Run, RunSummary, Trial, TrialStatus, FRAMEWORK_VERSION,
    SCHEMA_VERSION,
};
pub use runner::{run_judge_only, run_suite, RunOptions};
pub use scoring::{score_case, CaseScore};
pub use suite::Suite;
pub use target::{target_fn, FnTarget, Target};
pub use types::{
    Case, CaseExpected, Category, GradeResult, RunMode, TargetOutput, TokenUsage, ToolCall,
};

/// Prelude for common imports.
pub mod prelude {
    pub use crate::{
        all, any, compare_runs, contains, cost, exact_match, factuality, json_schema, latency,
        llm_rubric, no_hallucinated_numbers, not, not_contains, regex, run_judge_only, run_suite,
        safety_keywords, target_fn, token_count, tool_args_match, tool_called, tool_not_called,
        tool_sequence, Case, CaseExpected, Category, CompareOptions, GateConfig, GradeResult,
        Grader, GraderConfig, GraderContext, Judge, JudgeMessage, JudgeResponse, Run, RunMode,
        RunOptions, SequenceMode, Suite, Target, TargetOutput, TokenUsage, ToolCall, TrialStatus,
    };
}
