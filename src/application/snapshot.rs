use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};

use crate::domain::ports::RowSource;
use crate::domain::value::RowMap;
use crate::domain::value_objects::{IgnoredColumns, Schema, TableName};

// ─────────────────────────────────────────────────────────────────────────────
// SnapshotService
// ─────────────────────────────────────────────────────────────────────────────

/// Reads the current contents of a set of tables from a live database.
///
/// The returned `BTreeMap<table_name, Vec<RowMap>>` is what the snapshot
/// store persists under a label. Ignored columns are never selected.
pub struct SnapshotService {
    source: Arc<dyn RowSource>,
}

impl SnapshotService {
    pub fn new(source: Arc<dyn RowSource>) -> Self {
        Self { source }
    }

    /// Fetch every requested table (all tables of `schema` when `tables` is
    /// empty), one task per table.
    ///
    /// Tables whose columns are all ignored are skipped.
    pub async fn capture(
        &self,
        schema: &Schema,
        tables: &[String],
        ignored: &IgnoredColumns,
    ) -> Result<BTreeMap<String, Vec<RowMap>>> {
        let tables: Vec<TableName> = if tables.is_empty() {
            self.source
                .list_tables(schema)
                .await
                .with_context(|| format!("Failed to list tables of schema {}", schema.0))?
        } else {
            tables.iter().map(|t| TableName(t.clone())).collect()
        };

        let mut handles = Vec::with_capacity(tables.len());

        for table in tables {
            let source = Arc::clone(&self.source);
            let schema = schema.clone();
            let ignored = ignored.clone();

            let handle = tokio::spawn(async move {
                let columns: Vec<String> = source
                    .table_columns(&schema, &table)
                    .await?
                    .into_iter()
                    .filter(|c| !ignored.contains(c))
                    .collect();

                if columns.is_empty() {
                    warn!(table = %table.0, "skipping table: all columns are ignored");
                    return Ok::<_, anyhow::Error>(None);
                }

                let rows = source.fetch_rows(&schema, &table, &columns).await?;
                Ok(Some((table.0, rows)))
            });

            handles.push(handle);
        }

        let mut snapshot = BTreeMap::new();
        for handle in handles {
            if let Some((table, rows)) = handle.await?? {
                info!(table = %table, rows = rows.len(), "captured table");
                snapshot.insert(table, rows);
            }
        }

        Ok(snapshot)
    }
}
