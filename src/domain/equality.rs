//! Row equality used to decide whether a matched pair is an update.
//!
//! Numbers compare by value, not by representation: integers compare exactly,
//! and as soon as one side is a float both sides are compared as `f64` within
//! [`FLOAT_TOLERANCE`]. So `1 == 1.0`, while `1 != "1"` and `null != 0`.

use serde_json::{Number, Value};

use crate::domain::value::RowMap;
use crate::domain::value_objects::IgnoredColumns;

pub const FLOAT_TOLERANCE: f64 = 1e-9;

/// Deep equality over the snapshot value universe.
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Number(x), Value::Number(y)) => numbers_equal(x, y),
        (Value::String(x), Value::String(y)) => x == y,
        (Value::Array(xs), Value::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| values_equal(x, y))
        }
        (Value::Object(xm), Value::Object(ym)) => {
            xm.len() == ym.len()
                && xm
                    .iter()
                    .all(|(k, x)| ym.get(k).is_some_and(|y| values_equal(x, y)))
        }
        _ => false,
    }
}

fn numbers_equal(a: &Number, b: &Number) -> bool {
    if let (Some(x), Some(y)) = (as_i128(a), as_i128(b)) {
        return x == y;
    }
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => (x - y).abs() < FLOAT_TOLERANCE,
        _ => a == b,
    }
}

fn as_i128(n: &Number) -> Option<i128> {
    n.as_i64()
        .map(i128::from)
        .or_else(|| n.as_u64().map(i128::from))
}

/// `true` when both rows hold the same non-ignored columns with equal values.
pub fn rows_equal(a: &RowMap, b: &RowMap, ignored: &IgnoredColumns) -> bool {
    let a_matches = a
        .iter()
        .filter(|(col, _)| !ignored.contains(col))
        .all(|(col, x)| b.get(col).is_some_and(|y| values_equal(x, y)));
    if !a_matches {
        return false;
    }

    // b may not carry extra retained columns
    b.keys()
        .filter(|col| !ignored.contains(col))
        .all(|col| a.contains_key(col))
}
