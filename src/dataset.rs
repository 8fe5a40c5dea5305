//! Case file loaders: JSONL and YAML.
//!
//! JSONL files hold one case per line; blank lines and lines starting with
//! `//` or `#` are skipped, a UTF-8 BOM is tolerated, and parse errors name
//! the offending line. YAML files must hold a top-level sequence of cases.
//! Duplicate case ids within one file are rejected at load time.

use crate::error::{EvalError, EvalResult};
use crate::types::Case;
use std::collections::HashSet;
use std::path::Path;
use tracing::debug;

/// Load cases from a file, dispatching on the extension.
pub fn load_cases(path: impl AsRef<Path>) -> EvalResult<Vec<Case>> {
    let path = path.as_ref();
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_lowercase();

    let content = std::fs::read_to_string(path)
        .map_err(|e| EvalError::case_load(format!("cannot read '{}': {e}", path.display())))?;
    let name = path.display().to_string();

    let cases = match extension.as_str() {
        "jsonl" => load_jsonl(&content, &name)?,
        "yaml" | "yml" => load_yaml(&content, &name)?,
        other => {
            return Err(EvalError::case_load(format!(
                "unsupported case file extension '.{other}' for '{name}'; \
                 supported formats: .jsonl, .yaml, .yml"
            )));
        }
    };

    debug!(file = %name, cases = cases.len(), "loaded cases");
    Ok(cases)
}

/// Parse JSONL content: one case per non-blank, non-comment line.
pub fn load_jsonl(content: &str, source: &str) -> EvalResult<Vec<Case>> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);

    let mut cases = Vec::new();
    for (index, line) in content.lines().enumerate() {
        let line_number = index + 1;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with("//") || trimmed.starts_with('#') {
            continue;
        }
        let case: Case = serde_json::from_str(trimmed).map_err(|e| {
            EvalError::case_load(format!("{source}:{line_number}: invalid case: {e}"))
        })?;
        cases.push(case);
    }

    reject_duplicates(&cases, source)?;
    Ok(cases)
}

/// Parse YAML content: the document must be a top-level sequence.
pub fn load_yaml(content: &str, source: &str) -> EvalResult<Vec<Case>> {
    let value: serde_yaml::Value = serde_yaml::from_str(content)
        .map_err(|e| EvalError::Yaml(format!("{source}: {e}")))?;

    if !value.is_sequence() {
        return Err(EvalError::case_load(format!(
            "{source}: top-level YAML value must be a sequence of cases"
        )));
    }

    let cases: Vec<Case> = serde_yaml::from_value(value)
        .map_err(|e| EvalError::Yaml(format!("{source}: {e}")))?;

    reject_duplicates(&cases, source)?;
    Ok(cases)
}

fn reject_duplicates(cases: &[Case], source: &str) -> EvalResult<()> {
    let mut seen = HashSet::new();
    for case in cases {
        if !seen.insert(case.id.as_str()) {
            return Err(EvalError::case_load(format!(
                "{source}: duplicate case id '{}'",
                case.id
            )));
        }
    }
    Ok(())
}
