use serde::Serialize;
use std::collections::BTreeMap;

use crate::domain::table_diff::TableDiff;

/// Per-table diffs of one `from` → `to` comparison, keyed (and ordered) by table name.
#[derive(Debug, Serialize, Clone, Default, PartialEq)]
pub struct DiffResult {
    pub from: String,
    pub to: String,
    pub tables: BTreeMap<String, TableDiff>,
}

#[derive(Debug, Serialize, Clone, Default, PartialEq, Eq)]
pub struct Summary {
    pub total_inserted: usize,
    pub total_updated: usize,
    pub total_deleted: usize,
    pub total_changes: usize,
    pub tables_affected: usize,
}

impl DiffResult {
    pub fn new(from: &str, to: &str, tables: BTreeMap<String, TableDiff>) -> Self {
        Self {
            from: from.to_string(),
            to: to.to_string(),
            tables,
        }
    }

    /// `true` if no table has any change.
    pub fn is_clean(&self) -> bool {
        self.tables.values().all(TableDiff::is_empty)
    }

    pub fn summary(&self) -> Summary {
        let total_inserted: usize = self.tables.values().map(|t| t.inserted.len()).sum();
        let total_updated: usize = self.tables.values().map(|t| t.updated.len()).sum();
        let total_deleted: usize = self.tables.values().map(|t| t.deleted.len()).sum();

        Summary {
            total_inserted,
            total_updated,
            total_deleted,
            total_changes: total_inserted + total_updated + total_deleted,
            tables_affected: self.tables.values().filter(|t| !t.is_empty()).count(),
        }
    }
}
