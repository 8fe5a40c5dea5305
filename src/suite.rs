//! Evaluation suite: cases, default graders and gates.

use crate::dataset;
use crate::error::{EvalError, EvalResult};
use crate::gates::GateConfig;
use crate::grader::GraderConfig;
use crate::types::Case;
use std::collections::HashSet;
use std::path::Path;

/// A named collection of cases with default graders and optional gates,
/// ready to be bound to a target.
#[derive(Debug, Clone, Default)]
pub struct Suite {
    /// Suite id.
    pub id: String,
    /// Human description.
    pub description: Option<String>,
    /// Cases in declaration order.
    pub cases: Vec<Case>,
    /// Graders applied to every case.
    pub default_graders: Vec<GraderConfig>,
    /// Post-run gates.
    pub gates: Option<GateConfig>,
}

impl Suite {
    /// Create an empty suite.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    /// Set the description.
    pub fn description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }

    /// Add a case.
    pub fn case(mut self, case: Case) -> Self {
        self.cases.push(case);
        self
    }

    /// Add multiple cases.
    pub fn cases(mut self, cases: impl IntoIterator<Item = Case>) -> Self {
        self.cases.extend(cases);
        self
    }

    /// Load cases from a `.jsonl`, `.yaml` or `.yml` file and append them.
    pub fn cases_from_file(mut self, path: impl AsRef<Path>) -> EvalResult<Self> {
        self.cases.extend(dataset::load_cases(path)?);
        Ok(self)
    }

    /// Add a default grader.
    pub fn grader(mut self, config: impl Into<GraderConfig>) -> Self {
        self.default_graders.push(config.into());
        self
    }

    /// Add multiple default graders.
    pub fn graders(mut self, configs: impl IntoIterator<Item = GraderConfig>) -> Self {
        self.default_graders.extend(configs);
        self
    }

    /// Set the gates.
    pub fn gates(mut self, gates: GateConfig) -> Self {
        self.gates = Some(gates);
        self
    }

    /// Number of cases.
    pub fn len(&self) -> usize {
        self.cases.len()
    }

    /// Check if the suite has no cases.
    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }

    /// Cases carrying a tag.
    pub fn filter_by_tag(&self, tag: &str) -> Vec<&Case> {
        self.cases.iter().filter(|c| c.has_tag(tag)).collect()
    }

    /// Case ids in declaration order.
    pub fn case_ids(&self) -> Vec<String> {
        self.cases.iter().map(|c| c.id.clone()).collect()
    }

    /// Look up a case by id.
    pub fn case_by_id(&self, id: &str) -> Option<&Case> {
        self.cases.iter().find(|c| c.id == id)
    }

    /// Validate the configuration. The runner calls this before any case
    /// executes; errors here never produce a Run.
    pub fn validate(&self) -> EvalResult<()> {
        if self.id.is_empty() {
            return Err(EvalError::config("suite id must not be empty"));
        }
        let mut seen = HashSet::new();
        for case in &self.cases {
            if !seen.insert(case.id.as_str()) {
                return Err(EvalError::config(format!(
                    "duplicate case id '{}' in suite '{}'",
                    case.id, self.id
                )));
            }
        }
        for config in &self.default_graders {
            config.validate().map_err(EvalError::config)?;
        }
        if let Some(gates) = &self.gates {
            if let Some(rate) = gates.pass_rate {
                if !(0.0..=1.0).contains(&rate) {
                    return Err(EvalError::config(format!(
                        "gate passRate must be in [0, 1], got {rate}"
                    )));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graders::testing::AlwaysPass;

    #[test]
    fn test_suite_builder() {
        let suite = Suite::new("smoke")
            .description("smoke tests")
            .case(Case::new("a").with_input("q", "1"))
            .case(Case::new("b").with_input("q", "2"))
            .grader(AlwaysPass)
            .gates(GateConfig::new().pass_rate(1.0));

        assert_eq!(suite.id, "smoke");
        assert_eq!(suite.len(), 2);
        assert_eq!(suite.default_graders.len(), 1);
        assert!(suite.validate().is_ok());
    }

    #[test]
    fn test_duplicate_case_ids_rejected() {
        let suite = Suite::new("dup")
            .case(Case::new("same"))
            .case(Case::new("same"));
        let err = suite.validate().unwrap_err();
        assert!(err.to_string().contains("duplicate case id 'same'"));
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_invalid_grader_config_rejected() {
        let suite = Suite::new("w").grader(GraderConfig::new(AlwaysPass).weight(-1.0));
        assert!(suite.validate().is_err());
    }

    #[test]
    fn test_invalid_gate_rate_rejected() {
        let suite = Suite::new("g").gates(GateConfig::new().pass_rate(1.5));
        assert!(suite.validate().is_err());
    }

    #[test]
    fn test_filter_by_tag() {
        let suite = Suite::new("t")
            .case(Case::new("a").with_tag("fast"))
            .case(Case::new("b").with_tag("slow"))
            .case(Case::new("c").with_tag("fast"));
        assert_eq!(suite.filter_by_tag("fast").len(), 2);
    }

    #[test]
    fn test_case_lookup() {
        let suite = Suite::new("l").case(Case::new("x"));
        assert!(suite.case_by_id("x").is_some());
        assert!(suite.case_by_id("y").is_none());
    }
}
