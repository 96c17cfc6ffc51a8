use serde_json::Value;
use std::collections::BTreeMap;

use crate::domain::value_objects::IgnoredColumns;

/// Type alias for a database row represented as a sorted map of column name → JSON value.
///
/// `serde_json::Value` is the closed value universe of a snapshot: null, bool,
/// number, string, array and object. Nothing else can reach the diff engine.
pub type RowMap = BTreeMap<String, Value>;

/// 2^63 and 2^64: `i64::MAX as f64` rounds up to 2^63, which `i64` cannot hold.
const I64_BOUND: f64 = 9_223_372_036_854_775_808.0;
const U64_BOUND: f64 = 18_446_744_073_709_551_616.0;

/// Render a value the way identity keys and text output expect it.
///
/// Strings render raw (no quotes). Floats holding an integral value render like
/// the equivalent integer so that `1` and `1.0` produce the same text, matching
/// the numeric equality policy in [`crate::domain::equality`].
pub fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => {
            if n.is_f64() {
                if let Some(f) = n.as_f64() {
                    if f.fract() == 0.0 {
                        if (-I64_BOUND..I64_BOUND).contains(&f) {
                            return (f as i64).to_string();
                        }
                        if (0.0..U64_BOUND).contains(&f) {
                            return (f as u64).to_string();
                        }
                    }
                }
            }
            n.to_string()
        }
        other => other.to_string(),
    }
}

/// Copy of `row` without the ignored columns.
pub fn strip_columns(row: &RowMap, ignored: &IgnoredColumns) -> RowMap {
    row.iter()
        .filter(|(col, _)| !ignored.contains(col))
        .map(|(col, v)| (col.clone(), v.clone()))
        .collect()
}

/// Turn a deserialised table payload into rows.
///
/// Returns `None` when the payload is not an array. Array elements that are
/// not objects are dropped; the second tuple field counts them.
pub fn rows_from_value(value: Value) -> Option<(Vec<RowMap>, usize)> {
    let Value::Array(items) = value else {
        return None;
    };

    let mut skipped = 0;
    let mut rows = Vec::with_capacity(items.len());
    for item in items {
        match item {
            Value::Object(map) => rows.push(map.into_iter().collect()),
            _ => skipped += 1,
        }
    }
    Some((rows, skipped))
}
