//! Built-in graders.
//!
//! Each primitive is a factory from its parameters to the uniform
//! [`Grader`](crate::grader::Grader) interface. Anything that can fail to
//! compile (regex patterns, JSON schemas) fails at factory time with a
//! configuration error; grading itself never raises.

pub mod budget;
pub mod compose;
pub mod numbers;
pub mod testing;
pub mod text;
pub mod tools;

pub use budget::{cost, latency, token_count, CostGrader, LatencyGrader, TokenCountGrader};
pub use compose::{all, any, not, AllGrader, AnyGrader, NotGrader};
pub use numbers::{no_hallucinated_numbers, NoHallucinatedNumbers};
pub use testing::{AlwaysFail, AlwaysPass, FnGrader};
pub use text::{
    contains, exact_match, json_schema, not_contains, regex, regex_with_flags, safety_keywords,
    ContainsGrader, ExactMatchGrader, JsonSchemaGrader, NotContainsGrader, RegexGrader,
    SafetyKeywordsGrader,
};
pub use tools::{
    tool_args_match, tool_called, tool_not_called, tool_sequence, ArgsMatchMode, SequenceMode,
    ToolArgsMatchGrader, ToolCalledGrader, ToolNotCalledGrader, ToolSequenceGrader,
};
