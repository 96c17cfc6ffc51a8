use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeSet;

use crate::domain::equality::values_equal;
use crate::domain::value::RowMap;

/// Inserted / updated / deleted rows of one table between two snapshots.
///
/// Each bucket is ordered by identity key; a key never appears twice.
#[derive(Debug, Serialize, Clone, Default, PartialEq)]
pub struct TableDiff {
    pub table_name: String,
    pub inserted: Vec<RowMap>,
    pub updated: Vec<UpdatedRow>,
    pub deleted: Vec<RowMap>,
}

/// A row present in both snapshots whose retained columns changed.
/// `before` and `after` have the ignored columns removed.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct UpdatedRow {
    pub primary_key: RowMap,
    pub before: RowMap,
    pub after: RowMap,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct ColumnChange {
    pub column: String,
    pub before: Option<Value>,
    pub after: Option<Value>,
}

impl TableDiff {
    pub fn empty(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.inserted.is_empty() && self.updated.is_empty() && self.deleted.is_empty()
    }

    pub fn change_count(&self) -> usize {
        self.inserted.len() + self.updated.len() + self.deleted.len()
    }
}

impl UpdatedRow {
    /// Columns whose value differs, or that exist on one side only, sorted by name.
    pub fn changed_columns(&self) -> Vec<ColumnChange> {
        let columns: BTreeSet<&String> = self.before.keys().chain(self.after.keys()).collect();

        columns
            .into_iter()
            .filter_map(|col| {
                let before = self.before.get(col);
                let after = self.after.get(col);
                let same = match (before, after) {
                    (Some(b), Some(a)) => values_equal(b, a),
                    _ => false,
                };
                (!same).then(|| ColumnChange {
                    column: col.clone(),
                    before: before.cloned(),
                    after: after.cloned(),
                })
            })
            .collect()
    }
}
