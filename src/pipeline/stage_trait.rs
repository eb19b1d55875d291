use super::extract::StructuredOutput;
use super::state::{PipelineState, StageName};
use async_trait::async_trait;

/// Outcome of checking an extracted object against a stage's schema
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Validation {
    Valid,
    Invalid(String),
}

impl Validation {
    pub fn invalid(reason: impl Into<String>) -> Self {
        Validation::Invalid(reason.into())
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, Validation::Valid)
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            Validation::Valid => None,
            Validation::Invalid(reason) => Some(reason),
        }
    }
}

/// One analysis step of the pipeline.
///
/// `execute` never fails: reasoning errors, unparseable replies and schema
/// violations are appended to `state.errors` and replaced by the stage's
/// deterministic fallback, so the stage's output slot is always written.
#[async_trait]
pub trait Stage: Send + Sync {
    fn name(&self) -> StageName;

    fn validate_output(&self, output: &StructuredOutput) -> Validation;

    async fn execute(&self, state: &mut PipelineState);
}

/// Returns the string under `key` when present and non-blank.
pub(crate) fn non_empty_str<'a>(output: &'a StructuredOutput, key: &str) -> Option<&'a str> {
    output
        .get(key)
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Reads `key` as a list of strings, tolerating a single string or absence.
pub(crate) fn string_list(output: &StructuredOutput, key: &str) -> Vec<String> {
    match output.get(key) {
        Some(serde_json::Value::Array(items)) => items
            .iter()
            .filter_map(|item| match item {
                serde_json::Value::String(s) => Some(s.clone()),
                serde_json::Value::Null => None,
                other => Some(other.to_string()),
            })
            .collect(),
        Some(serde_json::Value::String(s)) if !s.trim().is_empty() => vec![s.clone()],
        _ => Vec::new(),
    }
}

/// Requires every key in `keys` to be present and non-null.
pub(crate) fn require_keys(output: &StructuredOutput, keys: &[&str]) -> Validation {
    let missing: Vec<&str> = keys
        .iter()
        .copied()
        .filter(|key| output.get(*key).map_or(true, |v| v.is_null()))
        .collect();

    if missing.is_empty() {
        Validation::Valid
    } else {
        Validation::invalid(format!("missing required keys: {}", missing.join(", ")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn output(value: serde_json::Value) -> StructuredOutput {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_require_keys() {
        let out = output(json!({"action": "chat", "reasoning": null}));
        assert_eq!(
            require_keys(&out, &["action", "reasoning", "tool"]),
            Validation::Invalid("missing required keys: reasoning, tool".to_string())
        );
        assert!(require_keys(&out, &["action"]).is_valid());
    }

    #[test]
    fn test_string_list_tolerates_shapes() {
        let out = output(json!({"a": ["x", 1, null], "b": "single", "c": 5}));
        assert_eq!(string_list(&out, "a"), vec!["x", "1"]);
        assert_eq!(string_list(&out, "b"), vec!["single"]);
        assert!(string_list(&out, "c").is_empty());
        assert!(string_list(&out, "missing").is_empty());
    }

    #[test]
    fn test_non_empty_str() {
        let out = output(json!({"a": "  ", "b": " ok "}));
        assert_eq!(non_empty_str(&out, "a"), None);
        assert_eq!(non_empty_str(&out, "b"), Some("ok"));
    }

    #[test]
    fn test_validation_reason() {
        assert_eq!(Validation::invalid("nope").reason(), Some("nope"));
        assert_eq!(Validation::Valid.reason(), None);
    }
}
