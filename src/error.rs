//! Evaluation errors.

use thiserror::Error;

/// Errors that can occur while configuring or running an evaluation.
#[derive(Debug, Error)]
pub enum EvalError {
    /// Invalid configuration (bad regex, bad schema, bad grader options).
    #[error("Configuration error: {0}")]
    Config(String),

    /// Case file loading error.
    #[error("Failed to load cases: {0}")]
    CaseLoad(String),

    /// Run artifact serialization/validation error.
    #[error("Run artifact error: {0}")]
    Artifact(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML error.
    #[error("YAML error: {0}")]
    Yaml(String),

    /// Run was interrupted by the caller.
    #[error("Run interrupted")]
    Interrupted,

    /// Other error.
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl EvalError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a case loading error.
    pub fn case_load(msg: impl Into<String>) -> Self {
        Self::CaseLoad(msg.into())
    }

    /// Create a run artifact error.
    pub fn artifact(msg: impl Into<String>) -> Self {
        Self::Artifact(msg.into())
    }

    /// Process exit code a CLI frontend should map this error to.
    ///
    /// Configuration problems exit with 2, runtime failures with 3 and a
    /// user interrupt with 130. Gate failures are not errors; see
    /// [`Run::exit_code`](crate::run::Run::exit_code).
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::CaseLoad(_) | Self::Yaml(_) => 2,
            Self::Interrupted => 130,
            _ => 3,
        }
    }
}

/// Result type for evaluation operations.
pub type EvalResult<T> = Result<T, EvalError>;
