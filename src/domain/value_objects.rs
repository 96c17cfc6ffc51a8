use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Newtype to avoid confusion between schema names
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Schema(pub String);

/// SHA-256 hex fingerprint of a table's canonical row content.
///
/// Computed by `snapdiff::fingerprint(rows)` when a snapshot is saved and
/// recorded in the snapshot manifest.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint(pub String);

impl Fingerprint {
    /// Returns the raw hex string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Newtype for table names
#[derive(Debug, Clone, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct TableName(pub String);

/// Newtype for column names
#[derive(Debug, Clone, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct ColumnName(pub String);

/// Columns excluded from equality and from before/after payloads
/// (e.g. `updated_at`). Matching is by exact name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IgnoredColumns(pub BTreeSet<String>);

impl IgnoredColumns {
    pub fn contains(&self, col: &str) -> bool {
        self.0.contains(col)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for IgnoredColumns {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

/// Caller-chosen name of a stored snapshot.
///
/// Labels become directory names, so they must be non-empty and must not
/// contain path separators, `..` or control characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct SnapshotLabel(String);

impl SnapshotLabel {
    pub fn parse(raw: &str) -> Result<Self> {
        validate_path_segment("snapshot label", raw)?;
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SnapshotLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Reject names that cannot safely be used as a single path component.
pub fn validate_path_segment(what: &str, raw: &str) -> Result<()> {
    if raw.trim().is_empty() {
        bail!("{what} must not be empty");
    }
    if raw.contains('/') || raw.contains('\\') || raw.contains("..") || raw.starts_with('.') {
        bail!("invalid {what} '{raw}': path separators and leading dots are not allowed");
    }
    if raw.chars().any(char::is_control) {
        bail!("invalid {what} {raw:?}: control characters are not allowed");
    }
    Ok(())
}
