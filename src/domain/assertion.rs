use serde::Serialize;
use serde_json::Value;

/// Outcome of comparing a diff against an expected-changes document.
///
/// A mismatch is a regular result, not an error: the caller decides how to
/// surface it (the CLI turns it into a non-zero exit code).
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AssertionOutcome {
    Matched { actual: Value },
    Mismatched { expected: Value, actual: Value },
}

impl AssertionOutcome {
    pub fn is_match(&self) -> bool {
        matches!(self, AssertionOutcome::Matched { .. })
    }

    /// Canonical form of the actual diff.
    pub fn actual(&self) -> &Value {
        match self {
            AssertionOutcome::Matched { actual } => actual,
            AssertionOutcome::Mismatched { actual, .. } => actual,
        }
    }

    /// Pretty-printed `(expected, actual)` for diagnostics; `None` on a match.
    pub fn diagnostics(&self) -> Option<(String, String)> {
        match self {
            AssertionOutcome::Matched { .. } => None,
            AssertionOutcome::Mismatched { expected, actual } => Some((pretty(expected), pretty(actual))),
        }
    }
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}
