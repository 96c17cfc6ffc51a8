use anyhow::{bail, Context, Result};
use serde_json::{json, Map, Value};

use crate::domain::assertion::AssertionOutcome;
use crate::domain::diff_result::DiffResult;
use crate::domain::table_diff::TableDiff;

/// Serialisation format of an expected-changes document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpectedFormat {
    Json,
    Yaml,
}

impl ExpectedFormat {
    /// `.yaml` / `.yml` → YAML, anything else → JSON.
    pub fn from_path(path: &str) -> Self {
        let lower = path.to_ascii_lowercase();
        if lower.ends_with(".yaml") || lower.ends_with(".yml") {
            ExpectedFormat::Yaml
        } else {
            ExpectedFormat::Json
        }
    }
}

/// Parse an expected-changes document. The top level must be an object
/// keyed by table name.
pub fn parse_expected(text: &str, format: ExpectedFormat) -> Result<Value> {
    let value: Value = match format {
        ExpectedFormat::Json => {
            serde_json::from_str(text).context("Failed to parse expected changes as JSON")?
        }
        ExpectedFormat::Yaml => {
            serde_yaml::from_str(text).context("Failed to parse expected changes as YAML")?
        }
    };

    match value {
        Value::Object(_) => Ok(value),
        // an empty YAML document means "no changes"
        Value::Null if format == ExpectedFormat::Yaml => Ok(Value::Object(Map::new())),
        other => bail!(
            "expected changes must be an object keyed by table name, got {}",
            type_name(&other)
        ),
    }
}

/// Canonical structured form of a diff:
/// `{table: {inserted?, updated?: [{primary_key, before, after}], deleted?}}`.
/// Empty buckets and tables without any change are omitted.
pub fn canonicalize(result: &DiffResult) -> Value {
    let mut tables = Map::new();
    for (name, diff) in &result.tables {
        if let Some(entry) = canonical_table(diff) {
            tables.insert(name.clone(), entry);
        }
    }
    Value::Object(tables)
}

fn canonical_table(diff: &TableDiff) -> Option<Value> {
    let mut entry = Map::new();
    if !diff.inserted.is_empty() {
        entry.insert("inserted".into(), json!(diff.inserted));
    }
    if !diff.updated.is_empty() {
        let updated: Vec<Value> = diff
            .updated
            .iter()
            .map(|u| {
                json!({
                    "primary_key": u.primary_key,
                    "before": u.before,
                    "after": u.after,
                })
            })
            .collect();
        entry.insert("updated".into(), Value::Array(updated));
    }
    if !diff.deleted.is_empty() {
        entry.insert("deleted".into(), json!(diff.deleted));
    }
    (!entry.is_empty()).then_some(Value::Object(entry))
}

/// Compare `expected` against the canonical form of `actual`.
///
/// Both sides are normalised first (object keys sorted, entries inside every
/// bucket array sorted by their serialisation) and then compared as compact
/// JSON text, so value types must match exactly.
pub fn assert_matches(expected: &Value, actual: &DiffResult) -> AssertionOutcome {
    let expected = normalize(expected);
    let actual = normalize(&canonicalize(actual));

    let expected_text = serde_json::to_string(&expected).unwrap_or_default();
    let actual_text = serde_json::to_string(&actual).unwrap_or_default();

    if expected_text == actual_text {
        AssertionOutcome::Matched { actual }
    } else {
        AssertionOutcome::Mismatched { expected, actual }
    }
}

/// Sort object keys at every depth, then the rows of every
/// `{table: {bucket: [..]}}` array.
fn normalize(doc: &Value) -> Value {
    let sorted = sort_keys(doc);
    let Value::Object(tables) = &sorted else {
        return sorted;
    };

    let tables = tables
        .iter()
        .map(|(name, table)| {
            let table = match table {
                Value::Object(buckets) => Value::Object(
                    buckets
                        .iter()
                        .map(|(bucket, rows)| (bucket.clone(), sort_rows(rows)))
                        .collect(),
                ),
                other => other.clone(),
            };
            (name.clone(), table)
        })
        .collect();
    Value::Object(tables)
}

// Map may preserve insertion order depending on serde_json features.
fn sort_keys(v: &Value) -> Value {
    match v {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            Value::Object(
                entries
                    .into_iter()
                    .map(|(k, v)| (k.clone(), sort_keys(v)))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(items.iter().map(sort_keys).collect()),
        other => other.clone(),
    }
}

fn sort_rows(rows: &Value) -> Value {
    let Value::Array(items) = rows else {
        return rows.clone();
    };
    let mut keyed: Vec<(String, &Value)> = items
        .iter()
        .map(|v| (serde_json::to_string(v).unwrap_or_default(), v))
        .collect();
    keyed.sort_by(|a, b| a.0.cmp(&b.0));
    Value::Array(keyed.into_iter().map(|(_, v)| v.clone()).collect())
}

fn type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
