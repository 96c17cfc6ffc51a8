use crate::domain::identity::IdentityResolver;
use crate::domain::ports::{Differ, RowSource};
use crate::domain::{
    table_diff::TableDiff,
    value::RowMap,
    value_objects::{IgnoredColumns, Schema, TableName},
};
use anyhow::Result;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::{info, instrument};

// ─── PerfReport ──────────────────────────────────────────────────────────────

/// A single timed operation.
#[derive(Debug, Clone, serde::Serialize)]
pub struct OpTiming {
    /// Operation name: "fetch_rows" or "diff_table".
    pub operation: &'static str,
    pub table: String,
    /// Elapsed wall time in milliseconds.
    pub duration_ms: u128,
    /// Rows fetched, or rows on both sides of a diff.
    pub rows: usize,
}

/// Timings accumulated over one snapshot or diff run.
///
/// Shared by every decorator of the run through `Arc<Mutex<_>>`.
#[derive(Debug, Default, Clone, serde::Serialize)]
pub struct PerfReport {
    pub timings: Vec<OpTiming>,
    pub total_rows_fetched: usize,
    pub total_ms: u128,
}

impl PerfReport {
    pub fn new() -> Arc<Mutex<Self>> {
        Arc::new(Mutex::new(Self::default()))
    }

    /// Copy out the current state; a poisoned lock yields an empty report.
    pub fn snapshot(report: &Arc<Mutex<Self>>) -> Self {
        report.lock().map(|r| r.clone()).unwrap_or_default()
    }

    fn record(report: &Arc<Mutex<Self>>, timing: OpTiming) {
        if let Ok(mut r) = report.lock() {
            r.total_ms += timing.duration_ms;
            if timing.operation == "fetch_rows" {
                r.total_rows_fetched += timing.rows;
            }
            r.timings.push(timing);
        }
    }
}

// ─── MonitoringRowSource ─────────────────────────────────────────────────────

/// Decorator: wraps any `RowSource` and times each `fetch_rows` call.
pub struct MonitoringRowSource {
    inner: Arc<dyn RowSource>,
    report: Arc<Mutex<PerfReport>>,
}

impl MonitoringRowSource {
    pub fn new(inner: Arc<dyn RowSource>, report: Arc<Mutex<PerfReport>>) -> Self {
        Self { inner, report }
    }
}

#[async_trait]
impl RowSource for MonitoringRowSource {
    async fn list_tables(&self, schema: &Schema) -> Result<Vec<TableName>> {
        self.inner.list_tables(schema).await
    }

    async fn table_columns(&self, schema: &Schema, table: &TableName) -> Result<Vec<String>> {
        self.inner.table_columns(schema, table).await
    }

    #[instrument(
        name = "fetch_rows",
        skip(self, schema, table, columns),
        fields(db.schema = %schema.0, db.table = %table.0, columns = columns.len()),
        level = "info"
    )]
    async fn fetch_rows(
        &self,
        schema: &Schema,
        table: &TableName,
        columns: &[String],
    ) -> Result<Vec<RowMap>> {
        let start = Instant::now();
        let rows = self.inner.fetch_rows(schema, table, columns).await?;
        let duration_ms = start.elapsed().as_millis();

        info!(table = %table.0, rows = rows.len(), duration_ms, "fetch_rows completed");

        PerfReport::record(
            &self.report,
            OpTiming {
                operation: "fetch_rows",
                table: table.0.clone(),
                duration_ms,
                rows: rows.len(),
            },
        );

        Ok(rows)
    }
}

// ─── MonitoringDiffer ────────────────────────────────────────────────────────

/// Decorator: wraps any `Differ` and times each `diff_table` call.
pub struct MonitoringDiffer {
    inner: Arc<dyn Differ>,
    report: Arc<Mutex<PerfReport>>,
}

impl MonitoringDiffer {
    pub fn new(inner: Arc<dyn Differ>, report: Arc<Mutex<PerfReport>>) -> Self {
        Self { inner, report }
    }
}

impl Differ for MonitoringDiffer {
    #[instrument(
        name = "diff_table",
        skip(self, table_name, from, to, resolver, ignored),
        fields(db.table = %table_name.0, from.rows = from.len(), to.rows = to.len()),
        level = "info"
    )]
    fn diff_table(
        &self,
        table_name: &TableName,
        from: &[RowMap],
        to: &[RowMap],
        resolver: &dyn IdentityResolver,
        ignored: &IgnoredColumns,
    ) -> TableDiff {
        let start = Instant::now();
        let result = self.inner.diff_table(table_name, from, to, resolver, ignored);
        let duration_ms = start.elapsed().as_millis();

        info!(
            table = %table_name.0,
            inserted = result.inserted.len(),
            updated = result.updated.len(),
            deleted = result.deleted.len(),
            duration_ms,
            "diff_table completed"
        );

        PerfReport::record(
            &self.report,
            OpTiming {
                operation: "diff_table",
                table: table_name.0.clone(),
                duration_ms,
                rows: from.len() + to.len(),
            },
        );

        result
    }
}
