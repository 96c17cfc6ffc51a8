use serde::Serialize;
use std::fmt::Write as FmtWrite;

use crate::domain::value::{render_value, RowMap};
use crate::domain::value_objects::ColumnName;

/// Key used to match a row of the `from` snapshot with "the same" row of the
/// `to` snapshot. Ordered, so buckets built from it come out sorted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize)]
pub struct IdentityKey(pub String);

impl IdentityKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Port: strategy deriving row identity (implemented by `IdColumnResolver`
/// and `KeyColumnsResolver`).
pub trait IdentityResolver: Send + Sync {
    /// Join key of `row` across two snapshots.
    fn resolve(&self, row: &RowMap) -> IdentityKey;

    /// Minimal projection of `row` identifying it in an update entry.
    fn primary_key(&self, row: &RowMap) -> RowMap;
}

/// Default resolver: a single identifier column (`id` unless configured).
///
/// Rows without that column are keyed by their whole content, so on such
/// tables a value change shows up as a delete + insert pair, never an update.
#[derive(Debug, Clone)]
pub struct IdColumnResolver {
    column: String,
}

impl IdColumnResolver {
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
        }
    }
}

impl Default for IdColumnResolver {
    fn default() -> Self {
        Self::new("id")
    }
}

impl IdentityResolver for IdColumnResolver {
    fn resolve(&self, row: &RowMap) -> IdentityKey {
        match row.get(&self.column) {
            Some(id) => IdentityKey(render_value(id)),
            None => whole_row_key(row),
        }
    }

    fn primary_key(&self, row: &RowMap) -> RowMap {
        match row.get(&self.column) {
            Some(id) => [(self.column.clone(), id.clone())].into(),
            None => row.clone(),
        }
    }
}

/// Resolver for an explicit (possibly composite) key declared per table.
///
/// Falls back to the whole-row key for rows missing any key column.
#[derive(Debug, Clone)]
pub struct KeyColumnsResolver {
    columns: Vec<ColumnName>,
}

impl KeyColumnsResolver {
    pub fn new(columns: Vec<ColumnName>) -> Self {
        Self { columns }
    }

    fn has_all(&self, row: &RowMap) -> bool {
        !self.columns.is_empty() && self.columns.iter().all(|c| row.contains_key(&c.0))
    }
}

impl IdentityResolver for KeyColumnsResolver {
    fn resolve(&self, row: &RowMap) -> IdentityKey {
        if !self.has_all(row) {
            return whole_row_key(row);
        }
        let mut key = String::new();
        for col in &self.columns {
            let _ = write!(key, "{}:{};", col.0, render_value(&row[&col.0]));
        }
        IdentityKey(key)
    }

    fn primary_key(&self, row: &RowMap) -> RowMap {
        if !self.has_all(row) {
            return row.clone();
        }
        self.columns
            .iter()
            .filter_map(|col| row.get(&col.0).map(|v| (col.0.clone(), v.clone())))
            .collect()
    }
}

/// `name:value;` for every column in lexicographic column order.
/// The empty row yields the empty key.
pub fn whole_row_key(row: &RowMap) -> IdentityKey {
    let mut key = String::new();
    for (col, value) in row {
        let _ = write!(key, "{}:{};", col, render_value(value));
    }
    IdentityKey(key)
}
