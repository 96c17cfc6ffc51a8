use crate::domain::{
    diff_result::DiffResult,
    identity::IdentityResolver,
    snapshot::{MapSnapshotProvider, SnapshotInfo},
    table_diff::TableDiff,
    value::RowMap,
    value_objects::{IgnoredColumns, Schema, SnapshotLabel, TableName},
};
use anyhow::Result;
use async_trait::async_trait;
use std::collections::BTreeMap;

/// Port: read access to a live database (implemented by SqlxRowSource)
#[async_trait]
pub trait RowSource: Send + Sync {
    async fn list_tables(&self, schema: &Schema) -> Result<Vec<TableName>>;

    /// Column names in ordinal order.
    async fn table_columns(&self, schema: &Schema, table: &TableName) -> Result<Vec<String>>;

    async fn fetch_rows(
        &self,
        schema: &Schema,
        table: &TableName,
        columns: &[String],
    ) -> Result<Vec<RowMap>>;
}

/// Port: one side of a comparison (implemented by MapSnapshotProvider)
pub trait SnapshotProvider: Send + Sync {
    fn get(&self, table: &TableName) -> Option<&[RowMap]>;

    /// Names of every table present, sorted.
    fn table_names(&self) -> Vec<String>;
}

/// Port: labelled snapshot persistence (implemented by FsSnapshotStore)
pub trait SnapshotStore: Send + Sync {
    fn save(&self, label: &SnapshotLabel, tables: &BTreeMap<String, Vec<RowMap>>) -> Result<()>;
    fn load(&self, label: &SnapshotLabel) -> Result<MapSnapshotProvider>;
    fn list(&self) -> Result<Vec<SnapshotInfo>>;
    fn tables(&self, label: &SnapshotLabel) -> Result<Vec<String>>;
    /// Returns the number of tables removed.
    fn delete(&self, label: &SnapshotLabel) -> Result<usize>;
}

/// Port: table diff algorithm (implemented by TableDiffer)
pub trait Differ: Send + Sync {
    fn diff_table(
        &self,
        table_name: &TableName,
        from: &[RowMap],
        to: &[RowMap],
        resolver: &dyn IdentityResolver,
        ignored: &IgnoredColumns,
    ) -> TableDiff;
}

/// Presentation knobs shared by all writers.
#[derive(Debug, Clone, Copy, Default)]
pub struct RenderOptions {
    /// Max rows shown per bucket; 0 = no limit.
    pub limit: usize,
}

/// Port: output formatting (implemented by TextWriter, MarkdownWriter, YamlWriter, JsonWriter, HtmlWriter)
pub trait OutputWriter: Send + Sync {
    /// Renders the diff result as a string (text, Markdown, YAML, ...)
    fn format(&self, result: &DiffResult, opts: &RenderOptions) -> Result<String>;
    /// Name accepted by `--format`
    fn name(&self) -> &'static str;
}
